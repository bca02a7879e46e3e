//! Streamfan Runner: launch orchestration on top of `streamfan-core`.
//!
//! This crate provides:
//! - Launch configuration (CLI-built or TOML) with up-front validation
//! - Sequential launch planning with per-job file election
//! - A staggered coordinator feeding a private fixed-size worker pool
//! - Process and dry-run launchers
//! - Progress reporting and JSON run reports

pub mod config;
pub mod launcher;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod report;

pub use config::{ConfigError, FileSource, LaunchConfig};
pub use launcher::{DryRunLauncher, LaunchError, LaunchOutcome, Launcher, ProcessLauncher};
pub use plan::{FileChoice, LaunchJob, LaunchPlanner, PlanError};
pub use pool::{run_launch, LaunchSummary, RunError, UnitResult};
pub use progress::{describe_job, LaunchProgress, StdoutProgress};
pub use report::{format_distribution, write_report, LaunchReport, UnitReport, UnitStatus};
