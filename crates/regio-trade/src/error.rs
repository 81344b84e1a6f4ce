//! # Trade Errors

use regio_core::{CommodityId, Unit};
use thiserror::Error;

/// Errors raised while turning trade statistics into shares.
///
/// Every variant is scoped to one commodity: the pipeline records it and
/// carries on with the rest of the batch.
#[derive(Error, Debug)]
pub enum TradeError {
    /// Non-zero records for one commodity report more than one unit.
    #[error("{commodity}: trade records use more than one unit: {units:?}")]
    MixedUnits {
        /// Affected commodity.
        commodity: CommodityId,
        /// The distinct units found, sorted.
        units: Vec<Unit>,
    },

    /// No usable (non-zero) records exist for the commodity.
    #[error("{commodity}: no usable trade records")]
    NoTradeData {
        /// Affected commodity.
        commodity: CommodityId,
    },

    /// Cutoff outside (0, 1].
    #[error("cutoff must lie in (0, 1], got {0}")]
    InvalidCutoff(f64),

    /// The dataset file could not be read.
    #[error("failed to read trade dataset: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset file could not be parsed.
    #[error("failed to parse trade dataset: {0}")]
    Json(#[from] serde_json::Error),
}
