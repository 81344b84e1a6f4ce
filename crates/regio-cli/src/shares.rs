//! # Shares Subcommand
//!
//! `regio shares`: print the trade shares of one configured commodity as
//! JSON, without building anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use regio_core::CommodityId;
use regio_engine::{consumption_shares, production_shares};
use regio_trade::InMemoryFeed;

use crate::load_config;

/// Arguments for `regio shares`.
#[derive(Args, Debug)]
pub struct SharesArgs {
    /// Engine configuration (YAML).
    #[arg(long)]
    pub config: PathBuf,

    /// Trade dataset (JSON).
    #[arg(long)]
    pub trade: PathBuf,

    /// Commodity name, as configured.
    #[arg(long)]
    pub commodity: String,

    /// Print importer × partner consumption shares instead of exporter shares.
    #[arg(long)]
    pub consumption: bool,
}

/// Execute `regio shares`.
pub fn run_shares(args: &SharesArgs) -> Result<u8> {
    println!("{}", render_shares(args)?);
    Ok(0)
}

fn render_shares(args: &SharesArgs) -> Result<String> {
    let config = load_config(&args.config)?;
    let commodity = CommodityId::new(args.commodity.as_str())?;
    let hs = config
        .hs_code(&commodity)
        .with_context(|| format!("commodity {commodity:?} is not configured"))?;
    let feed = InMemoryFeed::from_json_file(&args.trade)
        .with_context(|| format!("failed to load trade dataset {}", args.trade.display()))?;

    let json = if args.consumption {
        let shares = consumption_shares(&config, &feed, &commodity, hs)
            .with_context(|| format!("consumption shares of {commodity}"))?;
        serde_json::to_string_pretty(&shares)?
    } else {
        let shares = production_shares(&config, &feed, &commodity, hs)
            .with_context(|| format!("production shares of {commodity}"))?;
        serde_json::to_string_pretty(&shares)?
    };
    Ok(json)
}
