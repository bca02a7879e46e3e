//! Integration tests for the staggered launch flow.
//!
//! These use in-memory launchers and progress recorders, so nothing is
//! spawned; they exercise planning, election, pacing and failure handling
//! end to end through `run_launch`.

use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use streamfan_runner::{
    run_launch, FileSource, LaunchConfig, LaunchError, LaunchJob, LaunchOutcome, LaunchPlanner,
    LaunchProgress, LaunchSummary, Launcher, PlanError, RunError,
};

/// Records every job it is given; fails the thread numbers listed in `fail`.
#[derive(Default)]
struct RecordingLauncher {
    jobs: Mutex<Vec<LaunchJob>>,
    fail: Vec<usize>,
}

impl Launcher for RecordingLauncher {
    fn launch(&self, job: &LaunchJob) -> Result<LaunchOutcome, LaunchError> {
        self.jobs.lock().unwrap().push(job.clone());
        if self.fail.contains(&job.thread_no) {
            return Err(LaunchError::Spawn {
                program: job.streamer.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(LaunchOutcome {
            thread_no: job.thread_no,
            plays: 1,
            ingested: false,
        })
    }
}

#[derive(Default)]
struct RecordingProgress {
    submitted: Mutex<Vec<(usize, Instant)>>,
    completed: Mutex<Vec<(usize, bool)>>,
    runs: Mutex<usize>,
}

impl LaunchProgress for RecordingProgress {
    fn on_submit(&self, job: &LaunchJob, _config: &LaunchConfig) {
        self.submitted
            .lock()
            .unwrap()
            .push((job.thread_no, Instant::now()));
    }

    fn on_complete(&self, job: &LaunchJob, result: &Result<LaunchOutcome, LaunchError>) {
        self.completed
            .lock()
            .unwrap()
            .push((job.thread_no, result.is_ok()));
    }

    fn on_run_complete(&self, _summary: &LaunchSummary, _config: &LaunchConfig) {
        *self.runs.lock().unwrap() += 1;
    }
}

fn write_manifest(rows: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(rows.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn config(source: FileSource, threads: usize) -> LaunchConfig {
    let mut c = LaunchConfig::new(source);
    c.threads = threads;
    c.stagger_ms = 0;
    c.ingest = false;
    c
}

#[test]
fn every_instance_is_launched_once() {
    let mut cfg = config(FileSource::File("promo.ts".into()), 4);
    cfg.increment_port = true;
    let launcher = RecordingLauncher::default();
    let progress = RecordingProgress::default();

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    let summary = run_launch(&mut planner, &launcher, &progress).unwrap();

    assert_eq!(summary.submitted(), 4);
    assert!(summary.all_succeeded());
    assert!(summary.selections.is_none());

    let mut ports: Vec<u16> = launcher
        .jobs
        .lock()
        .unwrap()
        .iter()
        .map(|j| j.connect.port)
        .collect();
    ports.sort_unstable();
    assert_eq!(ports, vec![5001, 5002, 5003, 5004]);

    let thread_nos: Vec<usize> = summary.units.iter().map(|u| u.job.thread_no).collect();
    assert_eq!(thread_nos, vec![1, 2, 3, 4]);
    assert_eq!(*progress.runs.lock().unwrap(), 1);
}

#[test]
fn manifest_elections_are_tallied() {
    let manifest = write_manifest("a.ts,1\nb.ts,3\n");
    let mut cfg = config(FileSource::Manifest(manifest.path().to_path_buf()), 40);
    cfg.seed = Some(3);
    let launcher = RecordingLauncher::default();
    let progress = RecordingProgress::default();

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    let summary = run_launch(&mut planner, &launcher, &progress).unwrap();

    let selections = summary.selections.as_ref().unwrap();
    assert_eq!(selections.values().sum::<u64>(), 40);
    for unit in &summary.units {
        assert!(selections.contains_key(&unit.job.file));
    }
    let launched_b = summary
        .units
        .iter()
        .filter(|u| u.job.file == "b.ts")
        .count() as u64;
    assert_eq!(launched_b, selections.get("b.ts").copied().unwrap_or(0));
}

#[test]
fn zero_weight_manifest_always_launches_first_file() {
    let manifest = write_manifest("y.ts,0\nx.ts,0\n");
    let cfg = config(FileSource::Manifest(manifest.path().to_path_buf()), 10);
    let launcher = RecordingLauncher::default();

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    let summary = run_launch(&mut planner, &launcher, &RecordingProgress::default()).unwrap();

    assert!(summary.units.iter().all(|u| u.job.file == "x.ts"));
    assert_eq!(summary.selections.unwrap()["x.ts"], 10);
}

#[test]
fn failed_units_do_not_stop_the_run() {
    let cfg = config(FileSource::File("promo.ts".into()), 3);
    let launcher = RecordingLauncher {
        fail: vec![2],
        ..Default::default()
    };
    let progress = RecordingProgress::default();

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    let summary = run_launch(&mut planner, &launcher, &progress).unwrap();

    assert_eq!(summary.submitted(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(summary.units[1].result.is_err());

    let mut completed = progress.completed.lock().unwrap().clone();
    completed.sort_unstable();
    assert_eq!(completed, vec![(1, true), (2, false), (3, true)]);
}

#[test]
fn submissions_are_staggered() {
    let mut cfg = config(FileSource::File("promo.ts".into()), 3);
    cfg.stagger_ms = 30;
    let progress = RecordingProgress::default();
    let start = Instant::now();

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    run_launch(&mut planner, &RecordingLauncher::default(), &progress).unwrap();

    let submitted = progress.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 3);
    // The coordinator sleeps before every submission, including the first.
    assert!(submitted[0].1.duration_since(start) >= Duration::from_millis(30));
    for pair in submitted.windows(2) {
        assert!(pair[1].1.duration_since(pair[0].1) >= Duration::from_millis(30));
    }
}

#[test]
fn malformed_manifest_fails_before_any_launch() {
    let manifest = write_manifest("a.ts,1\nonly_one_field\n");
    let cfg = config(FileSource::Manifest(manifest.path().to_path_buf()), 2);
    assert!(matches!(
        LaunchPlanner::from_config(&cfg),
        Err(PlanError::Manifest(_))
    ));
}

#[test]
fn empty_manifest_fails_before_any_launch() {
    let manifest = write_manifest("");
    let cfg = config(FileSource::Manifest(manifest.path().to_path_buf()), 2);
    assert!(matches!(
        LaunchPlanner::from_config(&cfg),
        Err(PlanError::Election(_))
    ));
}

#[test]
fn destination_exhaustion_stops_submission_after_running_units_finish() {
    // Unvalidated config: the fourth instance would need 10.0.0.256.
    let mut cfg = config(FileSource::File("promo.ts".into()), 4);
    cfg.connect_ip = Ipv4Addr::new(10, 0, 0, 253);
    cfg.increment_ip = true;
    let launcher = RecordingLauncher::default();

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    let err = run_launch(&mut planner, &launcher, &RecordingProgress::default()).unwrap_err();

    assert!(matches!(err, RunError::Plan(PlanError::Endpoint(_))));
    assert_eq!(launcher.jobs.lock().unwrap().len(), 3);
}

/// Instance 1 fails at once; instance 2 waits until that failure is reported.
struct FailFastThenWait {
    reported: Mutex<Receiver<usize>>,
    saw_report: Mutex<Option<bool>>,
}

impl Launcher for FailFastThenWait {
    fn launch(&self, job: &LaunchJob) -> Result<LaunchOutcome, LaunchError> {
        if job.thread_no == 1 {
            return Err(LaunchError::Spawn {
                program: job.streamer.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let seen = self
            .reported
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .map(|thread_no| thread_no == 1)
            .unwrap_or(false);
        *self.saw_report.lock().unwrap() = Some(seen);
        Ok(LaunchOutcome {
            thread_no: job.thread_no,
            plays: 1,
            ingested: false,
        })
    }
}

struct ForwardingProgress {
    completed: Mutex<Sender<usize>>,
}

impl LaunchProgress for ForwardingProgress {
    fn on_submit(&self, _job: &LaunchJob, _config: &LaunchConfig) {}

    fn on_complete(&self, job: &LaunchJob, _result: &Result<LaunchOutcome, LaunchError>) {
        let _ = self.completed.lock().unwrap().send(job.thread_no);
    }

    fn on_run_complete(&self, _summary: &LaunchSummary, _config: &LaunchConfig) {}
}

#[test]
fn failures_are_reported_while_other_units_still_run() {
    let cfg = config(FileSource::File("promo.ts".into()), 2);
    let (tx, rx) = mpsc::channel();
    let launcher = FailFastThenWait {
        reported: Mutex::new(rx),
        saw_report: Mutex::new(None),
    };
    let progress = ForwardingProgress {
        completed: Mutex::new(tx),
    };

    let mut planner = LaunchPlanner::from_config(&cfg).unwrap();
    let summary = run_launch(&mut planner, &launcher, &progress).unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(*launcher.saw_report.lock().unwrap(), Some(true));
}
