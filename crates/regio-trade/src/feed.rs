//! # Trade Feed
//!
//! [`TradeFeed`] is the boundary to the trade-statistics store. The engine
//! asks it for one commodity's records at a time and never sees raw units
//! cleanup or code conversion, which happen upstream.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use regio_core::HsCode;

use crate::error::TradeError;
use crate::records::{DomesticProductionRatio, ExportRecord, ImportRecord};

/// Read access to trade statistics.
pub trait TradeFeed: Send + Sync {
    /// Export records for one HS code.
    fn exports(&self, hs: &HsCode) -> Vec<ExportRecord>;

    /// Import records for one HS code, world-total rows included.
    fn imports(&self, hs: &HsCode) -> Vec<ImportRecord>;

    /// Domestic use (percent) of a sector's output in a production region.
    fn domestic_use_percent(&self, region: &str, sector: &str) -> Option<f64>;
}

/// The on-disk layout of a trade dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeDataset {
    /// Export volumes.
    #[serde(default)]
    pub exports: Vec<ExportRecord>,
    /// Import volumes.
    #[serde(default)]
    pub imports: Vec<ImportRecord>,
    /// Domestic-use ratios.
    #[serde(default)]
    pub domestic: Vec<DomesticProductionRatio>,
}

/// A feed held entirely in memory, grouped by HS code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeed {
    exports: HashMap<HsCode, Vec<ExportRecord>>,
    imports: HashMap<HsCode, Vec<ImportRecord>>,
    domestic: HashMap<(String, String), f64>,
}

impl InMemoryFeed {
    /// Group a dataset by HS code.
    pub fn new(dataset: TradeDataset) -> Self {
        let mut feed = Self::default();
        for record in dataset.exports {
            feed.exports.entry(record.hs.clone()).or_default().push(record);
        }
        for record in dataset.imports {
            feed.imports.entry(record.hs.clone()).or_default().push(record);
        }
        for ratio in dataset.domestic {
            feed.domestic
                .insert((ratio.region, ratio.sector), ratio.domestic_use_percent);
        }
        feed
    }

    /// Load a JSON dataset file.
    pub fn from_json_file(path: &Path) -> Result<Self, TradeError> {
        let bytes = std::fs::read(path)?;
        let dataset: TradeDataset = serde_json::from_slice(&bytes)?;
        tracing::info!(
            path = %path.display(),
            exports = dataset.exports.len(),
            imports = dataset.imports.len(),
            ratios = dataset.domestic.len(),
            "loaded trade dataset"
        );
        Ok(Self::new(dataset))
    }
}

impl TradeFeed for InMemoryFeed {
    fn exports(&self, hs: &HsCode) -> Vec<ExportRecord> {
        self.exports.get(hs).cloned().unwrap_or_default()
    }

    fn imports(&self, hs: &HsCode) -> Vec<ImportRecord> {
        self.imports.get(hs).cloned().unwrap_or_default()
    }

    fn domestic_use_percent(&self, region: &str, sector: &str) -> Option<f64> {
        self.domestic
            .get(&(region.to_string(), sector.to_string()))
            .copied()
    }
}
