//! # Replisync CLI - keep a replica directory in sync
//!
//! ## Usage
//! ```bash
//! # Sync ./photos into /mnt/backup/photos every 30 seconds, logging to sync.log
//! replisync ./photos /mnt/backup/photos 30 ./sync.log
//!
//! # Skip temporary files and use 4 hashing threads
//! replisync ./src ./mirror 10 ./mirror.log --exclude '*.tmp' --workers 4
//! ```
//!
//! Runs until interrupted. Every decision and action is printed to stdout
//! and appended to the log file; diagnostics go to stderr (`-v` or
//! `RUST_LOG` for more).

use clap::error::ErrorKind;
use clap::Parser;
use colored::*;
use replisync::config::parse_interval;
use replisync::{ReplisyncBuilder, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Replisync CLI - one-way directory synchronization
#[derive(Parser)]
#[command(name = "replisync")]
#[command(version)]
#[command(about = "Periodically synchronize a replica directory with a source directory")]
#[command(long_about = None)]
struct Cli {
    /// Source directory (must exist, never modified)
    source_path: PathBuf,

    /// Replica directory (created if missing)
    replica_path: PathBuf,

    /// Seconds between synchronization cycles
    #[arg(allow_hyphen_values = true)]
    interval_seconds: String,

    /// Log file that events are appended to
    log_path: PathBuf,

    /// Exclude files matching this glob pattern (repeatable)
    #[arg(short, long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Number of threads used to hash files
    #[arg(short, long)]
    workers: Option<usize>,

    /// Follow symbolic links while scanning
    #[arg(long)]
    follow_symlinks: bool,

    /// Enable verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{}", e);
                std::process::exit(0);
            }
            _ => {
                // Usage errors go to stdout, same exit path as every other startup failure
                print!("{}", e);
                std::process::exit(1);
            }
        },
    };

    init_tracing(cli.verbose);

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        println!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "replisync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate arguments, build the sync loop and run it until interrupted
fn run(cli: Cli) -> Result<()> {
    let interval = parse_interval(&cli.interval_seconds)?;

    let mut builder = ReplisyncBuilder::new()
        .interval(interval)
        .log_file(cli.log_path.clone())
        .exclude_patterns(cli.exclude)
        .follow_symlinks(cli.follow_symlinks);
    if let Some(workers) = cli.workers {
        builder = builder.parallel_workers(workers);
    }

    let replisync = builder.build(cli.source_path, cli.replica_path)?;
    debug!("Configuration: {}", serde_json::to_string(replisync.config())?);

    println!(
        "{} {} {} {} every {} (log: {})",
        "Syncing".blue().bold(),
        replisync.config().source_path.display().to_string().cyan(),
        "->".dimmed(),
        replisync.config().replica_path.display().to_string().cyan(),
        humantime::format_duration(interval).to_string().yellow(),
        cli.log_path.display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .thread_name("replisync-driver")
        .build()?;

    runtime.block_on(Arc::new(replisync).run())
}
