//! # Domestic Production Estimate
//!
//! Trade statistics only cover cross-border flows. Domestic production is
//! estimated from a country's exports and the domestic-use share `p` of the
//! matching production sector:
//!
//! ```text
//! q_dom = q_exp / (1 - p/100) * p/100
//! ```
//!
//! A country that uses its whole output domestically (`p = 100`) yields a
//! non-finite estimate, which is replaced by zero. The estimate enters the
//! consumption data as an import of the country from itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use regio_core::{Geography, HsCode};

use crate::feed::TradeFeed;
use crate::records::{ExportRecord, ImportRecord, TradeLocation};

/// Apply the domestic-use formula. Non-finite results become zero.
pub fn domestic_quantity(exported: f64, domestic_use_percent: f64) -> f64 {
    let p = domestic_use_percent / 100.0;
    let q = exported / (1.0 - p) * p;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// How trade geographies and HS codes map onto the production dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomesticMapping {
    /// Trade geography → production region code. Unmapped geographies use
    /// their own code.
    #[serde(default)]
    pub production_regions: BTreeMap<Geography, String>,
    /// HS code → production sector. Commodities without a sector get no
    /// domestic estimate.
    #[serde(default)]
    pub sectors: BTreeMap<HsCode, String>,
}

impl DomesticMapping {
    fn region_of<'a>(&'a self, geography: &'a Geography) -> &'a str {
        self.production_regions
            .get(geography)
            .map(String::as_str)
            .unwrap_or_else(|| geography.as_str())
    }

    /// Estimate domestic-production rows for one HS code from its exports.
    pub fn estimate(&self, feed: &dyn TradeFeed, hs: &HsCode) -> Vec<ImportRecord> {
        let Some(sector) = self.sectors.get(hs) else {
            tracing::debug!(hs = %hs, "no production sector mapped, skipping domestic estimate");
            return Vec::new();
        };
        feed.exports(hs)
            .iter()
            .filter_map(|record| self.estimate_record(feed, sector, record))
            .collect()
    }

    fn estimate_record(
        &self,
        feed: &dyn TradeFeed,
        sector: &str,
        record: &ExportRecord,
    ) -> Option<ImportRecord> {
        let geography = record.exporter.geography()?;
        let exported = record.effective_quantity()?;
        let percent = feed.domestic_use_percent(self.region_of(geography), sector)?;
        Some(ImportRecord {
            hs: record.hs.clone(),
            year: record.year,
            importer: TradeLocation::Geography(geography.clone()),
            partner: TradeLocation::Geography(geography.clone()),
            quantity: Some(domestic_quantity(exported, percent)),
            alt_quantity: None,
            unit: record.unit.clone(),
        })
    }
}
