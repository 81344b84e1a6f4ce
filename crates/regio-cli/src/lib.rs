//! # regio-cli: Command-Line Interface
//!
//! Provides the `regio` binary.
//!
//! ## Subcommands
//!
//! - `regio run`: regionalize every configured commodity into an output
//!   directory, optionally resuming committed slices.
//! - `regio shares`: print the production or consumption shares of one
//!   commodity.
//! - `regio status`: print the checkpoint ledger of an output directory.
//! - `regio purge`: delete slices the ledger does not vouch for.
//!
//! ```bash
//! regio run --config regio.yaml --templates templates.json \
//!     --trade trade.json --out out/ --resume
//! regio shares --config regio.yaml --trade trade.json \
//!     --commodity "steel, low-alloyed" --consumption
//! regio status --out out/
//! ```
//!
//! Handlers return the process exit code: `0` on success, `2` when a run
//! completed with failed commodities. Errors map to `1` in `main`.

pub mod purge;
pub mod run;
pub mod shares;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};

use regio_engine::EngineConfig;
use regio_graph::{Process, ProcessGraph};

/// Default file name of the run summary inside the output directory.
pub const SUMMARY_FILE: &str = "run-summary.json";

/// Exit code of a run that finished with failed commodities.
pub const EXIT_PARTIAL: u8 = 2;

/// Load and validate an engine configuration.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    EngineConfig::from_yaml_file(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))
}

/// Load a template graph from a JSON array of processes.
pub fn load_templates(path: &Path) -> Result<ProcessGraph> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read templates {}", path.display()))?;
    let processes: Vec<Process> = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse templates {}", path.display()))?;
    let graph = ProcessGraph::from_processes(processes)
        .with_context(|| format!("invalid template graph {}", path.display()))?;
    tracing::info!(path = %path.display(), processes = graph.len(), "loaded templates");
    Ok(graph)
}
