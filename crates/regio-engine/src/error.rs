//! # Engine Errors
//!
//! Failures are scoped. A [`ResolutionError`] or [`SubstitutionError`] is
//! fatal for one process or one input family; a [`CommodityError`] is fatal
//! for one commodity; only an [`EngineError`] stops the run.

use regio_core::{CommodityId, Geography, RegioError, SubstitutionFamily, Unit};
use regio_graph::{GraphError, StoreError};
use regio_trade::TradeError;
use thiserror::Error;

/// The fallback chain found nothing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// No candidate geography was available at any tier.
    #[error("no available geography for {requested}")]
    Exhausted {
        /// The geography that was asked for.
        requested: Geography,
    },
}

/// A sensitive-input family could not be re-sourced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubstitutionError {
    /// No supplier could be found, even via the fallback chain.
    #[error("{family}: no supplier of {product:?} for {country}")]
    Unresolved {
        /// The family being substituted.
        family: SubstitutionFamily,
        /// The input product.
        product: String,
        /// The country of the process.
        country: Geography,
    },

    /// Matching exchanges disagree on their unit.
    #[error("{family}: exchanges of {product:?} use more than one unit: {units:?}")]
    MixedUnits {
        /// The family being substituted.
        family: SubstitutionFamily,
        /// The input product.
        product: String,
        /// The distinct units found.
        units: Vec<Unit>,
    },
}

impl SubstitutionError {
    /// The family the failure belongs to.
    pub fn family(&self) -> SubstitutionFamily {
        match self {
            Self::Unresolved { family, .. } | Self::MixedUnits { family, .. } => *family,
        }
    }
}

/// Errors reading or updating the run ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Ledger file could not be read or written.
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger file is not valid JSON.
    #[error("ledger is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    /// Attempted transition is not allowed by the checkpoint state machine.
    #[error("invalid checkpoint transition for {slice:?}: {from} -> {to}")]
    InvalidTransition {
        /// The slice.
        slice: String,
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The ledger belongs to another namespace.
    #[error("ledger is for namespace {found:?}, run targets {expected:?}")]
    NamespaceMismatch {
        /// Namespace of the current run.
        expected: String,
        /// Namespace recorded in the ledger.
        found: String,
    },
}

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML did not match the schema.
    #[error("cannot parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value parsed but is inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of one commodity. Recorded in the run summary; other
/// commodities continue.
#[derive(Error, Debug)]
pub enum CommodityError {
    /// Trade data could not produce shares.
    #[error(transparent)]
    Trade(#[from] TradeError),

    /// No production technology exists for the commodity.
    #[error("{0}: no production templates")]
    NoTemplates(CommodityId),

    /// Every exporter was skipped.
    #[error("{0}: no exporter received a clone")]
    NoClones(CommodityId),

    /// A substitution failure under the drop-process policy left no clone.
    #[error(transparent)]
    Substitution(#[from] SubstitutionError),

    /// Generated processes violated a graph invariant.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Writing the slice failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value failed validation.
    #[error(transparent)]
    Core(#[from] RegioError),
}

/// Category of a commodity failure, for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Inconsistent input data (mixed units, no data).
    DataInconsistency,
    /// Nothing could be resolved.
    ResolutionFailure,
    /// Storage or graph failure.
    Internal,
}

impl CommodityError {
    /// Classify the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Trade(_) | Self::Core(_) => FailureKind::DataInconsistency,
            Self::NoTemplates(_) | Self::NoClones(_) | Self::Substitution(_) => {
                FailureKind::ResolutionFailure
            }
            Self::Graph(_) | Self::Store(_) => FailureKind::Internal,
        }
    }
}

/// Failures that stop the whole run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The run was cancelled. Committed slices remain; the ledger marks the
    /// rest for purge.
    #[error("run cancelled")]
    Cancelled,

    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Store failure outside any single commodity.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Graph failure while merging deltas or rewiring.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
