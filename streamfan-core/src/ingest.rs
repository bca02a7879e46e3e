//! Ingest step: the streamer needs an auxiliary index (`<stem>.aux`) next to
//! each transport-stream file. When it is missing, `ingests -p <pcr pid> <file>`
//! builds it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Path of the auxiliary index for `ts_file`.
///
/// The stem is everything before the first `.` of the file name, so
/// `dir/promo.hd.ts` maps to `dir/promo.aux`.
pub fn aux_path_for(ts_file: &Path) -> PathBuf {
    let name = ts_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    ts_file.with_file_name(format!("{stem}.aux"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl IngestInvocation {
    pub fn new(program: &str, pcr_pid: u16, ts_file: &str) -> Self {
        Self {
            program: program.to_string(),
            args: vec!["-p".to_string(), pcr_pid.to_string(), ts_file.to_string()],
        }
    }

    /// Whether `ts_file` still needs ingesting (its `.aux` index is absent).
    pub fn needed_for(ts_file: &Path) -> bool {
        !aux_path_for(ts_file).exists()
    }
}

impl fmt::Display for IngestInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}
