//! # Purge Subcommand
//!
//! `regio purge`: delete stored slices the ledger does not vouch for (in
//! flight, digest mismatch, unknown) and return their checkpoints to
//! `PLANNED`. The namespace is the ledger's own.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use regio_engine::{purge_uncommitted, RunLedger};
use regio_graph::JsonDirStore;

/// Arguments for `regio purge`.
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Output directory of a run.
    #[arg(long)]
    pub out: PathBuf,
}

/// Execute `regio purge`.
pub fn run_purge(args: &PurgeArgs) -> Result<u8> {
    let path = RunLedger::path_in(&args.out);
    if !path.exists() {
        bail!("no ledger at {}", path.display());
    }
    let mut ledger = RunLedger::load(&path)
        .with_context(|| format!("failed to load ledger {}", path.display()))?;
    let store = JsonDirStore::new(&args.out);
    let purged = purge_uncommitted(&store, &mut ledger).context("purge failed")?;

    if purged.is_empty() {
        println!("Nothing to purge in namespace {}", ledger.namespace());
    } else {
        println!("Purged {} slice(s) from namespace {}:", purged.len(), ledger.namespace());
        for slice in &purged {
            println!("  {slice}");
        }
    }
    Ok(0)
}
