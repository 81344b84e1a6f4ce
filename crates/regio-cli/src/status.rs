//! # Status Subcommand
//!
//! `regio status`: print the checkpoint ledger of an output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use regio_engine::{CheckpointRecord, CheckpointStatus, RunLedger};

/// Arguments for `regio status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output directory of a run.
    #[arg(long)]
    pub out: PathBuf,

    /// Print the ledger as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `regio status`.
///
/// Returns `1` when no ledger exists and `2` when slices are in flight.
pub fn run_status(args: &StatusArgs) -> Result<u8> {
    let path = RunLedger::path_in(&args.out);
    if !path.exists() {
        println!("No ledger at {}", path.display());
        return Ok(1);
    }
    let ledger = RunLedger::load(&path)
        .with_context(|| format!("failed to load ledger {}", path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
    } else {
        println!("Ledger: {}", path.display());
        println!("  Namespace: {}", ledger.namespace());
        for record in ledger.entries() {
            println!("  {}", describe(record));
        }
    }

    let in_flight = ledger.in_flight().count();
    if in_flight > 0 {
        println!("{in_flight} slice(s) in flight; run `regio purge` or `regio run --resume`");
        return Ok(2);
    }
    Ok(0)
}

fn describe(record: &CheckpointRecord) -> String {
    let commodity = record
        .commodity
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    match (&record.status, &record.digest) {
        (CheckpointStatus::Committed, Some(digest)) => format!(
            "{:<10} {} [{}] {} processes, {}",
            record.status.name(), record.slice, commodity, record.processes, digest
        ),
        _ => format!("{:<10} {} [{}]", record.status.name(), record.slice, commodity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regio_core::{ContentDigest, DigestAlgorithm, Namespace};

    #[test]
    fn test_missing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_status(&StatusArgs {
            out: dir.path().to_path_buf(),
            json: false,
        })
        .unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_committed_ledger_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunLedger::path_in(dir.path());
        let mut ledger = RunLedger::open(&path, &Namespace::default()).unwrap();
        let checkpoint = ledger.begin("steel", None).unwrap();
        let digest = ContentDigest::new(DigestAlgorithm::Sha256, &[7u8; 32]);
        ledger.commit(checkpoint.commit(digest, 3)).unwrap();

        let args = StatusArgs {
            out: dir.path().to_path_buf(),
            json: true,
        };
        assert_eq!(run_status(&args).unwrap(), 0);
        let line = describe(ledger.get("steel").unwrap());
        assert!(line.starts_with("COMMITTED"));
        assert!(line.contains("3 processes"));
    }

    #[test]
    fn test_in_flight_slice_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunLedger::path_in(dir.path());
        let mut ledger = RunLedger::open(&path, &Namespace::default()).unwrap();
        let _checkpoint = ledger.begin("steel", None).unwrap();
        let args = StatusArgs {
            out: dir.path().to_path_buf(),
            json: false,
        };
        assert_eq!(run_status(&args).unwrap(), 2);
    }
}
