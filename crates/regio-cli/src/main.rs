//! # regio CLI entry point
//!
//! Parses command-line arguments, initializes tracing, and dispatches to
//! the subcommand handlers in the library crate.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use regio_cli::purge::{run_purge, PurgeArgs};
use regio_cli::run::{run_pipeline, RunArgs};
use regio_cli::shares::{run_shares, SharesArgs};
use regio_cli::status::{run_status, StatusArgs};

/// Trade-based regionalization of process graphs.
///
/// Clones production technologies per exporting country, builds export and
/// consumption markets from bilateral trade statistics, and rewires every
/// consumer to the consumption market at its location.
#[derive(Parser, Debug)]
#[command(name = "regio", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regionalize every configured commodity into an output directory.
    Run(RunArgs),

    /// Print the trade shares of one commodity.
    Shares(SharesArgs),

    /// Print the checkpoint ledger of an output directory.
    Status(StatusArgs),

    /// Delete slices the ledger does not vouch for.
    Purge(PurgeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let result = match cli.command {
        Commands::Run(args) => run_pipeline(&args),
        Commands::Shares(args) => run_shares(&args),
        Commands::Status(args) => run_status(&args),
        Commands::Purge(args) => run_purge(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
