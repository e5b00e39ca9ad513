//! treesync - Mirror a source directory tree into a destination tree.
//!
//! Usage:
//!   treesync [OPTIONS] SOURCE DESTINATION
//!   treesync --dry-run SOURCE DESTINATION   Show what would be copied
//!   treesync --help                         Show help

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use treesync_core::{SyncConfig, TimePrecision};
use treesync_ops::{synchronize, SyncReport};

#[derive(Parser)]
#[command(
    name = "treesync",
    version,
    about = "Synchronize a destination directory with a source directory",
    long_about = "treesync copies every file and directory that is missing or different \
                  in DESTINATION from SOURCE, preserving permissions and modification \
                  times. Files present only in DESTINATION are never removed."
)]
struct Cli {
    /// Directory to copy from
    source: PathBuf,

    /// Directory to bring in line with SOURCE (created if missing)
    destination: PathBuf,

    /// Analyzer workers per tree in parallel mode
    #[arg(short = 'n', long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,

    /// Compare size and modification time only, without content hashes
    #[arg(long)]
    date_size_only: bool,

    /// Build both trees on the calling thread
    #[arg(long)]
    no_parallel: bool,

    /// Print the planned actions without applying them
    #[arg(long)]
    dry_run: bool,

    /// Print every action and enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Precision used when comparing modification times
    #[arg(long, value_enum, default_value_t = Precision::Seconds)]
    time_precision: Precision,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Precision {
    Seconds,
    Millis,
    Nanos,
}

impl From<Precision> for TimePrecision {
    fn from(p: Precision) -> Self {
        match p {
            Precision::Seconds => TimePrecision::Seconds,
            Precision::Millis => TimePrecision::Millis,
            Precision::Nanos => TimePrecision::Nanos,
        }
    }
}

impl Cli {
    fn to_config(&self) -> Result<SyncConfig> {
        SyncConfig::builder()
            .source(&self.source)
            .destination(&self.destination)
            .workers(usize::from(self.workers))
            .hashing(!self.date_size_only)
            .parallel(!self.no_parallel)
            .dry_run(self.dry_run)
            .verbose(self.verbose)
            .time_precision(TimePrecision::from(self.time_precision))
            .build()
            .context("Invalid configuration")
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.to_config()?;
    let report = match synchronize(&config) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Synchronization aborted");
            return Err(e).context("Synchronization failed");
        }
    };
    info!(
        actions = report.actions.len(),
        issues = report.issues.len(),
        "Run complete"
    );

    print_report(&report, config.verbose || config.dry_run);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &SyncReport, show_actions: bool) {
    if show_actions {
        for action in &report.actions {
            println!("{action}");
        }
    }

    println!("{}", report.summary());

    for e in &report.teardown {
        warn!(error = %e, "Worker did not exit cleanly");
    }

    if !report.issues.is_empty() {
        eprintln!();
        eprintln!("{} issue(s):", report.issues.len());
        for issue in &report.issues {
            eprintln!("  {issue}");
        }
    }
}
