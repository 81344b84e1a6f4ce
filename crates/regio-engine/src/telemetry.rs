//! Counter names emitted through the `metrics` facade. No recorder is
//! installed by the library; without one the counters are no-ops.

/// Commodities whose slice was committed.
pub const COMMODITIES_COMPLETED: &str = "regio_commodities_completed_total";
/// Commodities that failed.
pub const COMMODITIES_FAILED: &str = "regio_commodities_failed_total";
/// Exporters that got no clone.
pub const EXPORTERS_SKIPPED: &str = "regio_exporters_skipped_total";
/// Resolutions that fell through to the first available geography.
pub const DEGRADED_ASSIGNMENTS: &str = "regio_degraded_assignments_total";
/// Families left unsubstituted.
pub const SUBSTITUTION_FAILURES: &str = "regio_substitution_failures_total";
/// Exchanges redirected by the rewiring pass.
pub const EXCHANGES_REWIRED: &str = "regio_exchanges_rewired_total";
