//! Staggered submission into a fixed-size worker pool.
//!
//! The calling thread is the coordinator: it sleeps the stagger interval,
//! plans (and elects) the next job, and hands it to a private rayon pool
//! sized to the instance count. Each unit is logged and reported to the
//! progress sink by its worker as soon as it ends, then sent back over an
//! `mpsc` channel for the summary. A failed unit does not stop the run.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

use thiserror::Error;

use crate::launcher::{LaunchError, LaunchOutcome, Launcher};
use crate::plan::{LaunchJob, LaunchPlanner, PlanError};
use crate::progress::LaunchProgress;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// One submitted unit and how it ended.
#[derive(Debug)]
pub struct UnitResult {
    pub job: LaunchJob,
    pub result: Result<LaunchOutcome, LaunchError>,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct LaunchSummary {
    /// Units in `thread_no` order.
    pub units: Vec<UnitResult>,
    /// Election tallies; `None` when no manifest was used.
    pub selections: Option<BTreeMap<String, u64>>,
}

impl LaunchSummary {
    pub fn submitted(&self) -> usize {
        self.units.len()
    }

    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.submitted() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Plan, stagger, and launch every instance, then wait for all of them.
///
/// Planning errors stop further submissions; units already submitted still
/// run to completion before the error is returned.
pub fn run_launch(
    planner: &mut LaunchPlanner<'_>,
    launcher: &dyn Launcher,
    progress: &dyn LaunchProgress,
) -> Result<LaunchSummary, RunError> {
    let config = planner.config();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .thread_name(|i| format!("streamfan-worker-{i}"))
        .build()?;

    let (tx, rx) = mpsc::channel::<UnitResult>();
    let planned: Result<usize, PlanError> = pool.in_place_scope(|scope| {
        let mut submitted = 0;
        while planner.remaining() > 0 {
            thread::sleep(config.stagger());
            let Some(job) = planner.next_job()? else {
                break;
            };
            progress.on_submit(&job, config);
            log::debug!("submitting instance {} ({})", job.thread_no, job.file);

            let tx = tx.clone();
            scope.spawn(move |_| {
                let result = launcher.launch(&job);
                report_unit(&job, &result, progress);
                let _ = tx.send(UnitResult { job, result });
            });
            submitted += 1;
        }
        Ok(submitted)
    });
    drop(tx);

    let mut units: Vec<UnitResult> = rx.iter().collect();
    units.sort_by_key(|u| u.job.thread_no);

    let submitted = planned?;
    debug_assert_eq!(submitted, units.len());

    let summary = LaunchSummary {
        units,
        selections: planner.selections().cloned(),
    };
    progress.on_run_complete(&summary, config);
    Ok(summary)
}

/// Log a finished unit and tell `progress`, from the worker that ran it.
fn report_unit(
    job: &LaunchJob,
    result: &Result<LaunchOutcome, LaunchError>,
    progress: &dyn LaunchProgress,
) {
    match result {
        Ok(outcome) => log::info!(
            "instance {} finished: {} play(s) of {}",
            outcome.thread_no,
            outcome.plays,
            job.file
        ),
        Err(e) => log::error!("instance {} failed: {e}", job.thread_no),
    }
    progress.on_complete(job, result);
}
