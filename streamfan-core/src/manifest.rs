//! Manifest loading: CSV rows of `identifier,weight` into a [`WeightedCollection`].
//!
//! The manifest has no header row. Fields are trimmed, blank lines are
//! skipped, and any row that is not exactly two fields with an integer
//! weight fails the whole load before a single election happens.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::election::{ElectionError, WeightedCollection};

/// Errors from loading a manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest file must be in CSV format: {}", path.display())]
    WrongFormat { path: PathBuf },

    #[error("manifest file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: ElectionError,
    },

    #[error("manifest CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Load a manifest from disk.
///
/// The path must end in `.csv`.
pub fn load_manifest(path: &Path) -> Result<WeightedCollection, ManifestError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
        return Err(ManifestError::WrongFormat {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ManifestError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ManifestError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    parse_manifest(file)
}

/// Parse manifest rows from any reader.
pub fn parse_manifest<R: Read>(reader: R) -> Result<WeightedCollection, ManifestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut collection = WeightedCollection::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let fields: Vec<&str> = record.iter().collect();
        collection
            .insert_fields(&fields)
            .map_err(|source| ManifestError::Row { line, source })?;
    }
    Ok(collection)
}
