//! # Trade Records
//!
//! The three tabular feeds consumed from the trade-statistics store:
//! export volumes per `(hs, year, exporter)`, import volumes per
//! `(hs, year, importer, partner)`, and domestic-use ratios per
//! `(region, sector)`.
//!
//! Raw statistics mark world totals with a sentinel partner code. Those rows
//! are parsed into [`TradeLocation::WorldTotal`] at the boundary and never
//! reach the bilateral share tables.

use serde::{Deserialize, Serialize};

use regio_core::{Geography, HsCode, RegioError, Unit};

/// Partner codes that denote a world total rather than a trading partner.
pub const WORLD_TOTAL_CODES: &[&str] = &["W00", "WLD", "World"];

/// A reporter or partner in a trade record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TradeLocation {
    /// A real geography.
    Geography(Geography),
    /// The world-total sentinel row.
    WorldTotal,
}

impl TradeLocation {
    /// Parse a raw code.
    pub fn parse(code: &str) -> Result<Self, RegioError> {
        if WORLD_TOTAL_CODES.contains(&code.trim()) {
            return Ok(Self::WorldTotal);
        }
        Geography::parse(code).map(Self::Geography)
    }

    /// The geography, unless this is the world-total sentinel.
    pub fn geography(&self) -> Option<&Geography> {
        match self {
            Self::Geography(g) => Some(g),
            Self::WorldTotal => None,
        }
    }
}

impl From<Geography> for TradeLocation {
    fn from(value: Geography) -> Self {
        Self::Geography(value)
    }
}

impl TryFrom<String> for TradeLocation {
    type Error = RegioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TradeLocation> for String {
    fn from(value: TradeLocation) -> Self {
        match value {
            TradeLocation::Geography(g) => g.into(),
            TradeLocation::WorldTotal => WORLD_TOTAL_CODES[0].to_string(),
        }
    }
}

/// The usable quantity of a record: the primary field when positive, else
/// the alternate field when positive, else nothing.
fn effective(quantity: Option<f64>, alt_quantity: Option<f64>) -> Option<f64> {
    let usable = |q: Option<f64>| q.filter(|v| v.is_finite() && *v > 0.0);
    usable(quantity).or_else(|| usable(alt_quantity))
}

/// Export volume of one exporter in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Trade classification code.
    pub hs: HsCode,
    /// Reference year.
    pub year: u16,
    /// Exporting geography.
    pub exporter: TradeLocation,
    /// Primary quantity.
    #[serde(default)]
    pub quantity: Option<f64>,
    /// Alternate quantity, used when the primary is zero or missing.
    #[serde(default)]
    pub alt_quantity: Option<f64>,
    /// Unit of both quantity fields.
    pub unit: Unit,
}

impl ExportRecord {
    /// The usable quantity, if any.
    pub fn effective_quantity(&self) -> Option<f64> {
        effective(self.quantity, self.alt_quantity)
    }
}

/// Import volume of one importer from one partner in one year.
///
/// Domestic production enters as a record whose importer and partner are
/// the same geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Trade classification code.
    pub hs: HsCode,
    /// Reference year.
    pub year: u16,
    /// Importing geography.
    pub importer: TradeLocation,
    /// Supplying geography.
    pub partner: TradeLocation,
    /// Primary quantity.
    #[serde(default)]
    pub quantity: Option<f64>,
    /// Alternate quantity, used when the primary is zero or missing.
    #[serde(default)]
    pub alt_quantity: Option<f64>,
    /// Unit of both quantity fields.
    pub unit: Unit,
}

impl ImportRecord {
    /// The usable quantity, if any.
    pub fn effective_quantity(&self) -> Option<f64> {
        effective(self.quantity, self.alt_quantity)
    }

    /// Whether this row is bilateral detail (neither side a world total).
    pub fn is_bilateral(&self) -> bool {
        self.importer != TradeLocation::WorldTotal && self.partner != TradeLocation::WorldTotal
    }
}

/// Share of a sector's output used domestically in a production region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomesticProductionRatio {
    /// Production region code (may differ from the trade geography).
    pub region: String,
    /// Production sector.
    pub sector: String,
    /// Domestic use, in percent.
    pub domestic_use_percent: f64,
}
