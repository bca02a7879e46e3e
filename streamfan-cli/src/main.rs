//! Streamfan CLI: launch staggered streamer instances.
//!
//! Commands:
//! - `launch`: run N streamer instances against one file or a weighted manifest
//! - `elect`: draw from a manifest without launching anything and print the tally

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use streamfan_core::{load_manifest, StreamerFlag, StreamerOptions};
use streamfan_runner::{
    format_distribution, run_launch, write_report, DryRunLauncher, FileSource, LaunchConfig,
    LaunchPlanner, LaunchReport, LaunchSummary, Launcher, ProcessLauncher, StdoutProgress,
};

#[derive(Parser)]
#[command(
    name = "streamfan",
    about = "Streamfan: staggered parallel launcher for a transport-stream streamer"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch streamer instances, one per thread, staggered.
    Launch(LaunchArgs),
    /// Elect from a manifest repeatedly and print how often each file won.
    Elect {
        /// Manifest CSV of `file,weight` rows.
        #[arg(long, short)]
        manifest: PathBuf,

        /// Number of elections to draw.
        #[arg(long, default_value_t = 1000)]
        draws: u64,

        /// Seed for reproducible draws.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "manifest", "config"])))]
struct LaunchArgs {
    /// Transport stream file every instance streams.
    #[arg(long, short)]
    file: Option<PathBuf>,

    /// Manifest CSV of `file,weight` rows; each instance elects a file.
    #[arg(long, short)]
    manifest: Option<PathBuf>,

    /// TOML launch config. When given, the other launch options are ignored.
    #[arg(long)]
    config: Option<PathBuf>,

    /// PCR PID of the ts file(s), used by the ingest step.
    #[arg(long, default_value_t = 33)]
    pid: u16,

    /// Thread count (instances of the streamer).
    #[arg(long, short, default_value_t = 1)]
    threads: usize,

    /// Connect IPv4 address.
    #[arg(long, short, default_value_t = Ipv4Addr::UNSPECIFIED)]
    ip: Ipv4Addr,

    /// Starting connect port.
    #[arg(long, short, default_value_t = 5001)]
    port: u16,

    /// Bind IPv4 address.
    #[arg(long, default_value_t = Ipv4Addr::new(10, 10, 111, 2))]
    bip: Ipv4Addr,

    /// Do not append a bind address to the destination.
    #[arg(long, default_value_t = false)]
    no_bind: bool,

    /// Bind port.
    #[arg(long)]
    bport: Option<u16>,

    /// Milliseconds to wait before launching each instance.
    #[arg(long, default_value_t = 500)]
    ms: u64,

    /// Advance the last octet of the connect address with each instance.
    #[arg(long, default_value_t = false)]
    incr_ip: bool,

    /// Advance the connect port with each instance.
    #[arg(long, default_value_t = false)]
    incr_port: bool,

    /// Restart the streamer each time it finishes cleanly.
    #[arg(long = "loop", short, default_value_t = false)]
    loop_playback: bool,

    /// RTP value, passed to the streamer as `-u <value>`.
    #[arg(long)]
    rtp: Option<String>,

    /// TTL, passed to the streamer as `-t <ttl>`.
    #[arg(long)]
    ttl: Option<u32>,

    /// Streamer flags as bare letters (e.g. `--flags X U`).
    #[arg(long, num_args = 1.., value_name = "LETTER")]
    flags: Vec<StreamerFlag>,

    /// Streamer binary.
    #[arg(long, default_value = "multicat")]
    streamer: String,

    /// Ingest binary.
    #[arg(long, default_value = "ingests")]
    ingest_bin: String,

    /// Skip the ingest step even when a file has no `.aux` index.
    #[arg(long, default_value_t = false)]
    skip_ingest: bool,

    /// Seed for file elections.
    #[arg(long)]
    seed: Option<u64>,

    /// Plan and print every instance without spawning anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Launch(args) => run_launch_cmd(args),
        Commands::Elect {
            manifest,
            draws,
            seed,
        } => run_elect_cmd(manifest, draws, seed).map(|()| ExitCode::SUCCESS),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run_launch_cmd(args: LaunchArgs) -> Result<ExitCode> {
    let dry_run = args.dry_run;
    let report_path = args.report.clone();
    let config = build_config(args)?;

    log::info!(
        "launching {} instance(s) of {} ({} ms stagger)",
        config.threads,
        config.streamer_bin,
        config.stagger_ms
    );

    let mut planner = LaunchPlanner::from_config(&config).context("failed to prepare launch")?;
    let process_launcher = ProcessLauncher::new(config.loop_playback);
    let launcher: &dyn Launcher = if dry_run {
        &DryRunLauncher
    } else {
        &process_launcher
    };

    let summary = run_launch(&mut planner, launcher, &StdoutProgress)?;

    if let Some(path) = report_path {
        write_report(&LaunchReport::from_summary(&config, &summary), &path)?;
        println!("Report saved to: {}", path.display());
    }

    Ok(ExitCode::from(exit_status(&summary)))
}

/// 0 when every unit succeeded, 1 otherwise.
fn exit_status(summary: &LaunchSummary) -> u8 {
    if summary.all_succeeded() {
        0
    } else {
        1
    }
}

fn build_config(args: LaunchArgs) -> Result<LaunchConfig> {
    if let Some(path) = &args.config {
        return LaunchConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    // The clap group guarantees exactly one of file/manifest/config.
    let source = match (args.file, args.manifest) {
        (Some(file), _) => FileSource::File(file),
        (None, Some(manifest)) => FileSource::Manifest(manifest),
        (None, None) => anyhow::bail!("one of --file, --manifest or --config is required"),
    };

    let config = LaunchConfig {
        source,
        pcr_pid: args.pid,
        threads: args.threads,
        connect_ip: args.ip,
        connect_port: args.port,
        bind_ip: (!args.no_bind).then_some(args.bip),
        bind_port: args.bport,
        stagger_ms: args.ms,
        increment_ip: args.incr_ip,
        increment_port: args.incr_port,
        loop_playback: args.loop_playback,
        streamer: StreamerOptions {
            flags: args.flags,
            ttl: args.ttl,
            rtp: args.rtp,
        },
        streamer_bin: args.streamer,
        ingest_bin: args.ingest_bin,
        ingest: !args.skip_ingest,
        seed: args.seed,
    };
    config.validate()?;
    Ok(config)
}

fn run_elect_cmd(manifest: PathBuf, draws: u64, seed: Option<u64>) -> Result<()> {
    let mut files = load_manifest(&manifest)
        .with_context(|| format!("failed to load manifest {}", manifest.display()))?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for _ in 0..draws {
        files.elect_with(&mut rng)?;
    }

    println!("{}", format_distribution(files.selections()));

    let total = files.total_weight();
    if total > 0 {
        println!("Expected vs observed share:");
        for item in files.items() {
            let expected = item.weight as f64 / total as f64;
            let observed = files.selection_count(&item.identifier) as f64 / draws.max(1) as f64;
            println!(
                "  {:<32} weight {:>6}  expected {:>6.2}%  observed {:>6.2}%",
                item.identifier,
                item.weight,
                expected * 100.0,
                observed * 100.0
            );
        }
    }
    Ok(())
}
