//! fcmd - drive-aware file operations and directory sync.
//!
//! Usage:
//!   fcmd diff LEFT RIGHT        Compare two directories
//!   fcmd sync LEFT RIGHT        Queue the copies that reconcile two directories
//!   fcmd copy SRC... DEST       Copy into a directory
//!   fcmd move SRC... DEST       Move into a directory
//!   fcmd delete PATH...         Delete files or directories
//!   fcmd config                 Show or initialize settings
//!   fcmd --help                 Show help

mod settings;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use filecommander_core::{Job, JobStatus, OperationKind};
use filecommander_diff::{
    DiffConfig, DiffReport, DiffType, DirectoryDiff, SyncAction, SyncDirection, plan_sync,
};
use filecommander_queue::{QueueError, QueueEvent, TaskQueue, execute_sync_with};

use settings::Settings;

#[derive(Parser)]
#[command(
    name = "fcmd",
    version,
    about = "Drive-aware file operations and directory sync",
    long_about = "fcmd queues copy, move and delete operations so that work on the same \
                  pair of drives runs one at a time while different drives run in parallel.\n\n\
                  It can also compare two directories and queue the copies that bring \
                  them in sync."
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare two directories
    Diff {
        /// Left directory
        left: PathBuf,

        /// Right directory
        right: PathBuf,

        /// Descend into sub-directories even if settings disable it
        #[arg(short, long)]
        recursive: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Copy newer and missing entries between two directories
    Sync {
        /// Left directory
        left: PathBuf,

        /// Right directory
        right: PathBuf,

        /// Which way copies may flow (both, left-to-right, right-to-left)
        #[arg(short, long, default_value = "both")]
        direction: SyncDirection,

        /// Print the planned copies without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Copy files or directories into DEST
    Copy {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move files or directories into DEST
    Move {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Delete files or directories
    Delete {
        /// Paths to delete
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show the settings file
    Config {
        /// Write default settings if no settings file exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load();

    match cli.command {
        Command::Diff {
            left,
            right,
            recursive,
            format,
        } => run_diff(&settings, &left, &right, recursive, format),
        Command::Sync {
            left,
            right,
            direction,
            dry_run,
        } => {
            if dry_run {
                run_sync_plan(&settings, &left, &right, direction)
            } else {
                runtime()?.block_on(run_sync(&settings, &left, &right, direction))
            }
        }
        Command::Copy { paths } => {
            let jobs = transfer_jobs(OperationKind::Copy, paths)?;
            runtime()?.block_on(run_jobs(&settings, jobs))
        }
        Command::Move { paths } => {
            let jobs = transfer_jobs(OperationKind::Move, paths)?;
            runtime()?.block_on(run_jobs(&settings, jobs))
        }
        Command::Delete { paths } => {
            let jobs = paths
                .into_iter()
                .map(|path| absolute(&path).map(Job::delete))
                .collect::<Result<Vec<_>>>()?;
            runtime()?.block_on(run_jobs(&settings, jobs))
        }
        Command::Config { init } => run_config(&settings, init),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

/// Turn `SRC... DEST` into one job per source targeting `DEST/<file name>`.
fn transfer_jobs(operation: OperationKind, mut paths: Vec<PathBuf>) -> Result<Vec<Job>> {
    let Some(dest) = paths.pop() else {
        bail!("Missing destination directory");
    };
    let dest = absolute(&dest)?;

    paths
        .iter()
        .map(|source| {
            let source = absolute(source)?;
            let Some(name) = source.file_name() else {
                bail!("{} has no file name", source.display());
            };
            let target = dest.join(name);
            Ok(Job::new(operation, source, Some(target)))
        })
        .collect()
}

fn run_diff(
    settings: &Settings,
    left: &Path,
    right: &Path,
    recursive: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = DiffConfig {
        recursive: recursive || settings.diff.recursive,
        ..settings.diff.clone()
    };

    eprintln!("Comparing {} and {}...", left.display(), right.display());
    let report = DirectoryDiff::with_config(config).compare(left, right);

    match format {
        OutputFormat::Text => print_diff(&report),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Some(error) = report.entries.iter().find_map(|e| e.error.as_deref()) {
        bail!("Comparison failed: {error}");
    }
    Ok(())
}

fn print_diff(report: &DiffReport) {
    let summary = report.summary();

    println!();
    println!("{}", "─".repeat(70));
    println!(" {}", report.left_root.display());
    println!(" {}", report.right_root.display());
    println!("{}", "─".repeat(70));
    println!();

    for entry in &report.entries {
        if entry.is_error() {
            println!(" !  {}", entry.error.as_deref().unwrap_or_default());
            continue;
        }
        if entry.diff_type == DiffType::Identical {
            continue;
        }

        let size = entry
            .left
            .as_ref()
            .or(entry.right.as_ref())
            .filter(|side| !side.is_dir)
            .map(|side| format_size(side.size))
            .unwrap_or_default();
        let suffix = if entry.is_dir { "/" } else { "" };
        println!(
            " {}  {}{}  {:>10}  {}",
            diff_marker(entry.diff_type),
            entry.relative_path.display(),
            suffix,
            size,
            action_label(entry.action)
        );
    }

    println!();
    if report.is_in_sync() {
        println!(" Directories are in sync ({} identical)", summary.identical);
    } else {
        println!(
            " {} identical, {} left only, {} right only, {} left newer, {} right newer, {} conflicts",
            summary.identical,
            summary.left_only,
            summary.right_only,
            summary.left_newer,
            summary.right_newer,
            summary.conflicts
        );
    }
    println!();
}

fn diff_marker(diff_type: DiffType) -> &'static str {
    match diff_type {
        DiffType::Identical => "=",
        DiffType::LeftOnly => "<+",
        DiffType::RightOnly => "+>",
        DiffType::LeftNewer => "<",
        DiffType::RightNewer => ">",
        DiffType::Conflict => "!=",
    }
}

fn action_label(action: SyncAction) -> &'static str {
    match action {
        SyncAction::None => "",
        SyncAction::CopyLeftToRight => "copy →",
        SyncAction::CopyRightToLeft => "← copy",
        SyncAction::DeleteLeft => "delete left",
        SyncAction::DeleteRight => "delete right",
        SyncAction::Skip => "skip",
    }
}

fn run_sync_plan(
    settings: &Settings,
    left: &Path,
    right: &Path,
    direction: SyncDirection,
) -> Result<()> {
    let config = DiffConfig {
        recursive: true,
        ..settings.diff.clone()
    };

    eprintln!("Comparing {} and {}...", left.display(), right.display());
    let report = DirectoryDiff::with_config(config).compare(left, right);
    if let Some(error) = report.entries.iter().find_map(|e| e.error.as_deref()) {
        bail!("Comparison failed: {error}");
    }

    let jobs = plan_sync(&report.entries, left, right, direction);
    let conflicts = report.summary().conflicts;

    println!();
    println!("{}", "─".repeat(70));
    println!(" Sync plan ({direction})");
    println!("{}", "─".repeat(70));
    println!();

    if jobs.is_empty() {
        println!(" Nothing to copy.");
    }
    for job in &jobs {
        println!(
            " {} → {}",
            job.source.display(),
            job.destination_path().display()
        );
    }
    if conflicts > 0 {
        println!();
        println!(" {conflicts} conflict(s) left for manual resolution");
    }
    println!();

    Ok(())
}

async fn run_sync(
    settings: &Settings,
    left: &Path,
    right: &Path,
    direction: SyncDirection,
) -> Result<()> {
    let (left, right) = (absolute(left)?, absolute(right)?);
    let queue = TaskQueue::new(settings.queue.clone());
    let mut events = queue.subscribe();
    queue.resume();

    eprintln!("Comparing {} and {}...", left.display(), right.display());
    let report =
        execute_sync_with(&queue, &left, &right, direction, settings.diff.clone()).await?;

    if !report.errors.is_empty() {
        queue.shutdown().await;
        for error in &report.errors {
            eprintln!("{error}");
        }
        bail!("Comparison failed, nothing was queued");
    }

    eprintln!(
        "Queued {} copies ({} conflict(s) skipped)",
        report.queued.len(),
        report.skipped_conflicts
    );

    let finished = drain_until_idle(&queue, &mut events).await;
    queue.shutdown().await;

    print_outcomes(&finished, &report.rejected)
}

async fn run_jobs(settings: &Settings, jobs: Vec<Job>) -> Result<()> {
    let queue = TaskQueue::new(settings.queue.clone());
    let mut events = queue.subscribe();
    let mut rejected = Vec::new();

    for job in jobs {
        let source = job.source.clone();
        if let Err(e) = queue.enqueue(job) {
            rejected.push((source, e));
        }
    }
    queue.resume();

    let finished = drain_until_idle(&queue, &mut events).await;
    queue.shutdown().await;

    print_outcomes(&finished, &rejected)
}

/// Collect terminal job snapshots until the queue goes idle, echoing status
/// text to stderr as it arrives.
async fn drain_until_idle(
    queue: &TaskQueue,
    events: &mut broadcast::Receiver<QueueEvent>,
) -> Vec<Job> {
    let mut finished = Vec::new();
    let idle = queue.wait_idle();
    tokio::pin!(idle);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => record_event(event, &mut finished),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} queue events", n);
                }
                Err(RecvError::Closed) => return finished,
            },
            () = &mut idle => break,
        }
    }

    // Terminal events are published before a job stops counting as live.
    loop {
        match events.try_recv() {
            Ok(event) => record_event(event, &mut finished),
            Err(TryRecvError::Lagged(n)) => tracing::warn!("Missed {} queue events", n),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    finished
}

fn record_event(event: QueueEvent, finished: &mut Vec<Job>) {
    match event {
        QueueEvent::StatusChanged { message, .. } => eprintln!("{message}"),
        QueueEvent::JobCompleted(job) | QueueEvent::JobFailed(job) | QueueEvent::JobCancelled(job) => {
            finished.push(job);
        }
        _ => {}
    }
}

fn print_outcomes(finished: &[Job], rejected: &[(PathBuf, QueueError)]) -> Result<()> {
    let failed = finished
        .iter()
        .filter(|job| job.status == JobStatus::Failed)
        .count();

    println!();
    println!("{}", "─".repeat(70));
    println!(" Job Report");
    println!("{}", "─".repeat(70));
    println!();

    for job in finished {
        let marker = match job.status {
            JobStatus::Completed => "ok",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            _ => "?",
        };
        let elapsed = match (job.started_at, job.completed_at) {
            (Some(start), Some(end)) => {
                format!("{:.2}s", (end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => String::new(),
        };
        match &job.destination {
            Some(dest) => println!(
                " {:<9} {} {} → {}  {}",
                marker,
                job.operation,
                job.source.display(),
                dest.display(),
                elapsed
            ),
            None => println!(
                " {:<9} {} {}  {}",
                marker,
                job.operation,
                job.source.display(),
                elapsed
            ),
        }
        if let Some(error) = &job.error {
            println!("           {error}");
        }
    }

    for (path, reason) in rejected {
        println!(" {:<9} {}: {}", "skipped", path.display(), reason);
    }

    println!();
    println!(
        " {} finished, {} failed, {} skipped",
        finished.len() - failed,
        failed,
        rejected.len()
    );
    println!();

    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn run_config(settings: &Settings, init: bool) -> Result<()> {
    let path = Settings::config_path();

    if init {
        match &path {
            Some(path) if path.exists() => {
                eprintln!("Settings already exist at {}", path.display());
            }
            Some(_) => {
                let written = Settings::default()
                    .save()
                    .context("Failed to write settings")?;
                eprintln!("Wrote default settings to {}", written.display());
            }
            None => bail!("No config directory on this platform"),
        }
        return Ok(());
    }

    match &path {
        Some(path) if path.exists() => eprintln!("# {}", path.display()),
        Some(path) => eprintln!("# {} (not present, showing defaults)", path.display()),
        None => eprintln!("# no config directory, showing defaults"),
    }
    print!("{}", settings.to_toml().context("Failed to render settings")?);

    Ok(())
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
