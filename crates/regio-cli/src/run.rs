//! # Run Subcommand
//!
//! `regio run`: loads the configuration, template graph and trade dataset,
//! runs the pipeline into a JSON directory store under `--out`, and writes
//! the run summary next to it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use regio_engine::{Pipeline, RunLedger, RunOptions, RunSummary};
use regio_graph::JsonDirStore;
use regio_trade::InMemoryFeed;

use crate::{load_config, load_templates, EXIT_PARTIAL, SUMMARY_FILE};

/// Arguments for `regio run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Engine configuration (YAML).
    #[arg(long)]
    pub config: PathBuf,

    /// Template processes (JSON array).
    #[arg(long)]
    pub templates: PathBuf,

    /// Trade dataset (JSON).
    #[arg(long)]
    pub trade: PathBuf,

    /// Output directory holding the slices and the ledger.
    #[arg(long)]
    pub out: PathBuf,

    /// Reuse slices committed by an earlier run.
    #[arg(long)]
    pub resume: bool,

    /// Where to write the run summary. Defaults to `<out>/run-summary.json`.
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

/// Execute `regio run`.
pub fn run_pipeline(args: &RunArgs) -> Result<u8> {
    let config = load_config(&args.config)?;
    let templates = load_templates(&args.templates)?;
    let feed = InMemoryFeed::from_json_file(&args.trade)
        .with_context(|| format!("failed to load trade dataset {}", args.trade.display()))?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let store = JsonDirStore::new(&args.out);
    let mut ledger = RunLedger::open(&RunLedger::path_in(&args.out), &config.namespace)
        .context("failed to open run ledger")?;

    let summary = Pipeline::new(&config, &templates, &feed, &store)
        .run(&mut ledger, RunOptions { resume: args.resume })
        .context("run aborted")?;

    let summary_path = args
        .summary
        .clone()
        .unwrap_or_else(|| args.out.join(SUMMARY_FILE));
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(&summary_path, json)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    print_summary(&summary);
    println!("  Summary: {}", summary_path.display());
    Ok(if summary.is_clean() { 0 } else { EXIT_PARTIAL })
}

fn print_summary(summary: &RunSummary) {
    let resumed = summary.completed.iter().filter(|c| c.resumed).count();
    println!("Run into namespace {}", summary.namespace);
    println!(
        "  Completed: {} ({} resumed)",
        summary.completed.len(),
        resumed
    );
    println!("  Failed:    {}", summary.failed.len());
    for failed in &summary.failed {
        println!("    {} [{:?}]: {}", failed.commodity, failed.kind, failed.reason);
    }
    println!("  Processes written: {}", summary.processes_written);
    println!(
        "  Rewired: {} processes, {} exchanges",
        summary.processes_rewired, summary.exchanges_rewired
    );
    if !summary.purged.is_empty() {
        println!("  Purged:    {}", summary.purged.join(", "));
    }
    if !summary.events.degraded_assignments.is_empty() {
        println!("  Degraded assignments: {}", summary.events.degraded_assignments.len());
    }
}
