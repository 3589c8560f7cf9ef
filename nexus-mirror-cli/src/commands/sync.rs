//! Sync command - mirror a repository into a local directory.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use nexus_mirror::sync::{ProgressCallback, ProgressSnapshot, SyncEngine, SyncReport};
use tokio_util::sync::CancellationToken;

use super::common::ConnectionArgs;
use super::{EXIT_COMPLETE, EXIT_INCOMPLETE};
use crate::error::CliError;

/// Arguments for the sync command.
#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Local mirror directory [default: a new temporary directory]
    pub path: Option<PathBuf>,

    /// Number of parallel download workers
    #[arg(long, value_name = "N", default_value_t = nexus_mirror::config::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Fetch and download on a single thread
    #[arg(long, conflicts_with = "workers")]
    pub single: bool,

    /// Stop outstanding downloads after this many seconds
    #[arg(long, value_name = "SECS")]
    pub drain_timeout: Option<u64>,

    /// Create the mirror directory if it does not exist
    #[arg(long)]
    pub create_dir: bool,

    /// Resume listing from this continuation token
    #[arg(long, value_name = "TOKEN")]
    pub continuation_token: Option<String>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Run the sync command.
pub fn run(args: Args) -> Result<ExitCode, CliError> {
    if args.workers == 0 {
        return Err(CliError::Config("--workers must be at least 1".to_string()));
    }

    let mut config = args
        .connection
        .to_config()?
        .with_create_missing_dir(args.create_dir)
        .with_drain_timeout(args.drain_timeout.map(Duration::from_secs));
    if let Some(path) = args.path {
        config = config.with_mirror_path(path);
    }
    config = if args.single {
        config.single()
    } else {
        config.with_workers(args.workers)
    };

    let cancel = CancellationToken::new();
    let mut engine = SyncEngine::from_config(&config)?.with_cancellation(cancel.clone());

    println!("nexus-mirror v{}", nexus_mirror::VERSION);
    println!("Repository: {} ({})", config.repository, config.base_url);
    println!("Mirror:     {}", engine.mirror_root().path().display());
    println!("Mode:       {:?}", config.mode);
    println!();

    let bar = if args.no_progress {
        None
    } else {
        let bar = progress_bar();
        engine = engine.with_progress(progress_callback(bar.clone()));
        Some(bar)
    };

    let handler_bar = bar.clone();
    ctrlc::set_handler(move || {
        match &handler_bar {
            Some(bar) => bar.println("Received interrupt, stopping..."),
            None => eprintln!("Received interrupt, stopping..."),
        }
        cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let report = engine.run(args.continuation_token);

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    print_summary(&report);

    if engine.mirror_root().is_temporary() {
        println!();
        println!("Mirror kept at {}", engine.mirror_root().path().display());
    }

    Ok(if report.is_complete() {
        ExitCode::from(EXIT_COMPLETE)
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    })
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(200));
    bar
}

fn progress_callback(bar: ProgressBar) -> ProgressCallback {
    Arc::new(move |snapshot: ProgressSnapshot| {
        bar.set_length(snapshot.found);
        bar.set_position(snapshot.processed);
        if snapshot.failures() > 0 {
            bar.set_message(format!("{} failed", snapshot.failures()));
        }
    })
}

fn print_summary(report: &SyncReport) {
    let p = &report.progress;

    println!("Sync Summary");
    println!("────────────");
    println!("  Assets found:       {}", p.found);
    println!("  Processed:          {}", p.processed);
    println!("  Downloaded:         {} ({} bytes)", p.downloaded, p.bytes_downloaded);
    println!("  Already present:    {}", p.already_present);
    println!("  Checksum mismatch:  {}", p.checksum_mismatches);
    println!("  I/O failures:       {}", p.io_failures);
    println!("  Cancelled:          {}", p.cancelled);
    println!("  Pages:              {}", p.pages);
    println!("  Elapsed:            {:.1}s", report.elapsed.as_secs_f64());

    if let Some(error) = &report.listing_error {
        println!();
        println!("Listing stopped early: {}", error);
        println!("Check the repository URL and id, and the credentials file if the repository requires authentication.");
    }
    if report.cancelled {
        println!();
        println!("Sync was cancelled; {} assets were not downloaded.", p.cancelled);
    }
    if report.unprocessed() > 0 && !report.stopped_early() {
        println!();
        println!("{} discovered assets were never processed.", report.unprocessed());
    }
    if report.timed_out {
        println!();
        println!("Drain timeout reached; {} assets were not downloaded.", p.cancelled);
    }
}
