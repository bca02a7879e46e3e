//! Run reporting: the file-choice distribution and a JSON run report.
//!
//! Persisted reports carry a `schema_version`; newer versions are rejected
//! on load.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LaunchConfig;
use crate::pool::LaunchSummary;

pub const SCHEMA_VERSION: u32 = 1;

/// Human-readable tally of how often each file was elected.
pub fn format_distribution(selections: &BTreeMap<String, u64>) -> String {
    let mut out = String::from("Distribution of file choices:\n");
    for (file, count) in selections {
        out.push_str(&format!("\n\t{file} was selected {count} times\n"));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Ok { plays: u64, ingested: bool },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub thread_no: usize,
    pub file: String,
    pub command: String,
    #[serde(flatten)]
    pub status: UnitStatus,
}

/// Persistable record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchReport {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub config: LaunchConfig,
    /// Empty when no manifest was used.
    pub selections: BTreeMap<String, u64>,
    pub units: Vec<UnitReport>,
}

impl LaunchReport {
    pub fn from_summary(config: &LaunchConfig, summary: &LaunchSummary) -> Self {
        let units = summary
            .units
            .iter()
            .map(|unit| UnitReport {
                thread_no: unit.job.thread_no,
                file: unit.job.file.clone(),
                command: unit.job.streamer.to_string(),
                status: match &unit.result {
                    Ok(outcome) => UnitStatus::Ok {
                        plays: outcome.plays,
                        ingested: outcome.ingested,
                    },
                    Err(e) => UnitStatus::Failed {
                        error: e.to_string(),
                    },
                },
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            config: config.clone(),
            selections: summary.selections.clone().unwrap_or_default(),
            units,
        }
    }
}

/// Serialize a report to pretty JSON.
pub fn export_json(report: &LaunchReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize LaunchReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<LaunchReport> {
    let report: LaunchReport =
        serde_json::from_str(json).context("failed to deserialize LaunchReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Write a report as pretty JSON, creating parent directories as needed.
pub fn write_report(report: &LaunchReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = export_json(report)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
