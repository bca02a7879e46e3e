//! Launchers run a planned job to completion on a worker thread.

use std::path::Path;
use std::process::{Command, ExitStatus};

use serde::{Deserialize, Serialize};
use streamfan_core::IngestInvocation;
use thiserror::Error;

use crate::plan::LaunchJob;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited unsuccessfully ({status})")]
    Exited { program: String, status: ExitStatus },
}

/// What a successful unit did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOutcome {
    pub thread_no: usize,
    /// How many times the streamer ran to a clean exit.
    pub plays: u64,
    /// Whether the ingest step ran first.
    pub ingested: bool,
}

/// Runs one job. Implementations are shared by every worker in the pool.
pub trait Launcher: Send + Sync {
    fn launch(&self, job: &LaunchJob) -> Result<LaunchOutcome, LaunchError>;
}

/// Runs the ingest and streamer binaries as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    /// Restart the streamer after every clean exit. A failed run ends the loop.
    pub loop_playback: bool,
}

impl ProcessLauncher {
    pub fn new(loop_playback: bool) -> Self {
        Self { loop_playback }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, job: &LaunchJob) -> Result<LaunchOutcome, LaunchError> {
        let mut ingested = false;
        if let Some(ingest) = &job.ingest {
            if IngestInvocation::needed_for(Path::new(&job.file)) {
                log::info!(
                    "[{}] no .aux index for {}; running {ingest}",
                    job.thread_no,
                    job.file
                );
                run_to_completion(&ingest.program, &ingest.args)?;
                ingested = true;
            }
        }

        let mut plays = 0;
        loop {
            log::debug!("[{}] starting {}", job.thread_no, job.streamer);
            run_to_completion(&job.streamer.program, &job.streamer.args)?;
            plays += 1;
            if !self.loop_playback {
                break;
            }
            log::debug!("[{}] {} finished play {plays}; restarting", job.thread_no, job.file);
        }

        Ok(LaunchOutcome {
            thread_no: job.thread_no,
            plays,
            ingested,
        })
    }
}

fn run_to_completion(program: &str, args: &[String]) -> Result<(), LaunchError> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| LaunchError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(LaunchError::Exited {
            program: program.to_string(),
            status,
        })
    }
}

/// Spawns nothing; every job succeeds with zero plays.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunLauncher;

impl Launcher for DryRunLauncher {
    fn launch(&self, job: &LaunchJob) -> Result<LaunchOutcome, LaunchError> {
        log::info!("[{}] dry run: {}", job.thread_no, job.streamer);
        Ok(LaunchOutcome {
            thread_no: job.thread_no,
            plays: 0,
            ingested: false,
        })
    }
}
