//! # regio-trade: Trade Statistics and Market Shares
//!
//! Converts bilateral trade statistics into the share tables that drive
//! regionalization:
//!
//! - **Production shares**: each exporter's share of world exports of a
//!   commodity, with the tail below the cutoff folded into `RoW`.
//! - **Consumption shares**: per importer, each partner's share of what the
//!   importer consumes (imports plus estimated domestic production).
//!
//! ## Data Consistency
//!
//! All usable records of one commodity must report the same unit. A mixed
//! set is a [`TradeError::MixedUnits`] for that commodity and is never
//! coerced. World-total sentinel rows (`W00`, `WLD`, `World`) are excluded
//! from bilateral detail at parse time.

pub mod domestic;
pub mod error;
pub mod feed;
pub mod records;
pub mod shares;

pub use domestic::{domestic_quantity, DomesticMapping};
pub use error::TradeError;
pub use feed::{InMemoryFeed, TradeDataset, TradeFeed};
pub use records::{
    DomesticProductionRatio, ExportRecord, ImportRecord, TradeLocation, WORLD_TOTAL_CODES,
};
pub use shares::{
    ConsumptionShares, CountryShares, ProductionShares, ShareEntry, TradeShareCalculator,
};
