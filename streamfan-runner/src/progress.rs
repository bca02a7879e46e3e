//! Operator-facing progress reporting for a launch run.

use crate::config::LaunchConfig;
use crate::launcher::{LaunchError, LaunchOutcome};
use crate::plan::LaunchJob;
use crate::pool::LaunchSummary;
use crate::report::format_distribution;

/// Callback trait for launch progress.
pub trait LaunchProgress: Send + Sync {
    /// Called on the coordinator right before a job goes to the pool.
    fn on_submit(&self, job: &LaunchJob, config: &LaunchConfig);

    /// Called on the worker as soon as its unit ends, while other units may still run.
    fn on_complete(&self, job: &LaunchJob, result: &Result<LaunchOutcome, LaunchError>);

    /// Called when the entire run is done.
    fn on_run_complete(&self, summary: &LaunchSummary, config: &LaunchConfig);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl LaunchProgress for StdoutProgress {
    fn on_submit(&self, job: &LaunchJob, config: &LaunchConfig) {
        if job.thread_no > 1 {
            println!();
        }
        println!("{}", describe_job(job, config));
        println!("Running {}:\n\n\t{}\n", config.streamer_bin, job.streamer);
    }

    fn on_complete(&self, job: &LaunchJob, result: &Result<LaunchOutcome, LaunchError>) {
        match result {
            Ok(outcome) => println!(
                "  OK: thread {} ({} play(s){})",
                job.thread_no,
                outcome.plays,
                if outcome.ingested { ", ingested" } else { "" }
            ),
            Err(e) => println!("  FAIL: thread {}: {e}", job.thread_no),
        }
    }

    fn on_run_complete(&self, summary: &LaunchSummary, config: &LaunchConfig) {
        println!(
            "\nLaunch complete: {}/{} succeeded, {} failed",
            summary.succeeded(),
            summary.submitted(),
            summary.failed()
        );
        if config.threads > 1 && config.uses_manifest() {
            if let Some(selections) = &summary.selections {
                println!("\n{}", format_distribution(selections));
            }
        }
    }
}

/// The per-instance "Using values" block.
pub fn describe_job(job: &LaunchJob, config: &LaunchConfig) -> String {
    let bind_ip = config
        .bind_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());
    let bind_port = config
        .bind_port
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let flags = config.streamer.expand().join(" ");

    format!(
        "Thread no: {}\n\
         Using values:\n\
         \tts file = {}\n\
         \tpcr pid = {}\n\
         \tthread count = {}\n\
         \tconnect ip address = {}\n\
         \tinitial connect port = {}\n\
         \tbind ip address = {}\n\
         \tinitial bind port = {}\n\
         \tmilliseconds stagger = {}\n\
         \tstreamer flags = {}",
        job.thread_no,
        job.file,
        config.pcr_pid,
        config.threads,
        job.connect.ip,
        config.connect_port,
        bind_ip,
        bind_port,
        config.stagger_ms,
        if flags.is_empty() { "-" } else { flags.as_str() },
    )
}
