//! # Treemirror CLI
//!
//! Keeps a replica directory identical to a source directory, syncing at a
//! fixed interval until interrupted.
//!
//! ## Usage
//! ```bash
//! # Sync every 30 seconds, logging to ./logs
//! treemirror ./source ./replica 30 ./logs
//!
//! # Human-readable intervals work too
//! treemirror ./source ./replica 5m ./logs --exclude '*.tmp'
//!
//! # One cycle, report as JSON
//! treemirror ./source ./replica 30 ./logs --once --json
//!
//! # Show what would change without touching the replica
//! treemirror ./source ./replica 30 ./logs --dry-run
//! ```

use clap::Parser;
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use treemirror::logging::{self, LogSettings};
use treemirror::{
    config, CycleOutcome, CycleReport, MirrorBuilder, MirrorError, Result, SyncConfig,
    SyncScheduler,
};

/// Periodic one-way directory mirror
#[derive(Parser)]
#[command(name = "treemirror")]
#[command(version)]
#[command(about = "Keep a replica directory identical to a source directory")]
#[command(long_about = None)]
struct Cli {
    /// Directory to mirror
    source: PathBuf,

    /// Directory kept identical to the source
    replica: PathBuf,

    /// Interval between cycles: seconds, or a duration such as "90s" or "5m"
    interval: String,

    /// Directory for log files
    log_dir: PathBuf,

    /// Glob pattern to exclude (repeatable)
    #[arg(short, long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,

    /// Mirror the content of symlinked source directories instead of skipping them
    #[arg(long)]
    follow_symlinks: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the planned changes without applying them (implies --once)
    #[arg(long)]
    dry_run: bool,

    /// Print the cycle report as JSON (with --once or --dry-run)
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonOutcome<'a> {
    success: bool,
    error: Option<String>,
    report: &'a CycleReport,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when a single cycle failed
async fn run(cli: Cli) -> Result<bool> {
    let interval = config::parse_interval(&cli.interval)?;
    let config = SyncConfig::new(cli.source, cli.replica, interval, cli.log_dir).validate()?;

    let _guard = logging::init(&LogSettings::new(&config.log_dir).with_verbose(cli.verbose))?;

    let engine = MirrorBuilder::new()
        .exclude_patterns(cli.excludes)
        .follow_symlinks(cli.follow_symlinks)
        .dry_run(cli.dry_run)
        .build(&config.source, &config.replica)?;
    let scheduler = SyncScheduler::new(Arc::new(engine), config.interval)?;

    if cli.once || cli.dry_run {
        let outcome = scheduler.run_once().await;
        print_outcome(&outcome, cli.json, cli.dry_run)?;
        return Ok(outcome.is_success());
    }

    if !cli.json {
        println!(
            "{} {} {} {} (every {})",
            "Mirroring".blue().bold(),
            config.source.display().to_string().cyan(),
            "->".dimmed(),
            config.replica.display().to_string().cyan(),
            humantime::format_duration(config.interval)
        );
        println!("Press Ctrl-C to stop");
    }

    let handle = scheduler.start();
    tokio::signal::ctrl_c().await?;
    handle.stop();
    let cycles = handle.join().await?;

    if !cli.json {
        println!("{} after {} cycle(s)", "Stopped".yellow().bold(), cycles);
    }
    Ok(true)
}

fn print_outcome(outcome: &CycleOutcome, json: bool, dry_run: bool) -> Result<()> {
    let report = outcome.report();

    if json {
        let output = JsonOutcome {
            success: outcome.is_success(),
            error: outcome.error().map(|e| e.to_string()),
            report,
        };
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|e| MirrorError::internal(format!("failed to render report: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    let title = if dry_run { "Planned changes" } else { "Sync summary" };
    println!("{}", title.bold());
    println!("  Files deleted:       {}", report.files_deleted);
    println!("  Directories deleted: {}", report.dirs_deleted);
    println!("  Directories created: {}", report.dirs_created);
    println!("  Files copied:        {}", report.files_copied);
    if !dry_run {
        println!("  Bytes copied:        {}", report.bytes_copied);
    }
    println!("  Unchanged:           {}", report.files_unchanged);
    println!("  Duration:            {}ms", report.duration_ms);

    match outcome {
        CycleOutcome::Success(_) => {
            let mark = if dry_run { "Nothing was changed" } else { "Replica is up to date" };
            println!("{} {}", "✓".green().bold(), mark);
        }
        CycleOutcome::Failed { error, report } => {
            println!("{} {}", "✗".red().bold(), error);
            for failure in &report.failures {
                println!("  {} {}", "-".red(), failure);
            }
        }
    }
    Ok(())
}
