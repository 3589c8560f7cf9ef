//! nexus-mirror CLI
//!
//! Mirrors a Nexus 3 repository onto local disk, or lists what it holds.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{list, sync};

#[derive(Parser)]
#[command(name = "nexus-mirror")]
#[command(author, version, about = "Mirror every asset of a Nexus 3 repository onto local disk")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every asset of a repository into a local directory
    Sync(sync::Args),

    /// Print the path and SHA-1 of every asset in a repository
    List(list::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A progress bar and per-item info logs would fight over the terminal.
    let quiet_default = match &cli.command {
        Commands::Sync(args) => !args.no_progress,
        Commands::List(_) => true,
    };
    let filter = match (cli.verbose, quiet_default) {
        (0, true) => "warn",
        (0, false) | (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Sync(args) => sync::run(args),
        Commands::List(args) => list::run(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(commands::EXIT_FATAL)
        }
    }
}
