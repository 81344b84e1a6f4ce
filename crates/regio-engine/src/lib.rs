//! # regio-engine: Trade-Based Regionalization
//!
//! Turns a country-agnostic process graph into a regionalized one: country
//! clones of every production technology, an `export market` per commodity
//! weighted by trade, a `consumption market` per importer, and every
//! consumer in the graph rewired to the consumption market at its location.
//!
//! ## Passes
//!
//! 1. **Shares** (`regio-trade`): exporter and importer × partner shares.
//! 2. **Cloning** ([`ProcessCloner`]): templates chosen through the
//!    [`GeographyResolver`] fallback chain, sensitive inputs re-sourced by the
//!    [`InputSubstitutor`], clones weighted into the production market.
//! 3. **Consumption markets** ([`ConsumptionMarketBuilder`]).
//! 4. **Rewiring** ([`GraphRewirer`]), after a barrier over all commodities.
//!
//! [`aggregate_process`] runs wherever exchanges may collide.
//!
//! Passes 1 to 3 run per commodity in parallel and never touch shared state.
//! The [`Pipeline`] merges their output, rewires, and flushes one slice per
//! commodity under a [`RunLedger`] checkpoint, so an interrupted run can be
//! purged and resumed.
//!
//! ## Failure scope
//!
//! A commodity failure is recorded in the [`RunSummary`] and the batch goes
//! on. Degraded assignments (first available geography) are not failures but
//! are recorded too. Only ledger, store-wide and cancellation errors stop a
//! run.

pub mod aggregate;
pub mod cloner;
pub mod config;
pub mod consumption;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod resolver;
pub mod rewire;
pub mod substitution;
pub mod summary;
pub mod telemetry;

pub use aggregate::{aggregate_exchanges, aggregate_process};
pub use cloner::{ClonedCommodity, ProcessCloner, TechnologyMix};
pub use config::{EngineConfig, RewireConfig, SubstitutionPolicy};
pub use consumption::ConsumptionMarketBuilder;
pub use error::{
    CommodityError, ConfigError, EngineError, FailureKind, LedgerError, ResolutionError,
    SubstitutionError,
};
pub use ledger::{Checkpoint, CheckpointRecord, CheckpointStatus, RunLedger, LEDGER_FILE};
pub use pipeline::{
    consumption_shares, production_shares, purge_uncommitted, slice_name, CancelFlag, Pipeline,
    RunOptions, REWIRED_SLICE,
};
pub use resolver::{GeographyResolver, Resolution, ResolutionTier};
pub use rewire::{GraphRewirer, RewireOutcome};
pub use substitution::{AppliedSubstitution, InputSubstitutor, SubstitutionOutcome};
pub use summary::{CommodityReport, RunSummary};
