//! # Run Summary
//!
//! Everything an operator needs after a run, beyond the logs: which
//! commodities completed or failed, which exporters were skipped, and which
//! assignments fell through to an arbitrary geography. Per-commodity
//! [`CommodityReport`]s are produced in parallel and folded into the
//! [`RunSummary`] afterwards.
//!
//! Recording an event also logs it and bumps its counter.

use serde::{Deserialize, Serialize};

use regio_core::{CommodityId, ContentDigest, Geography, Namespace, ProcessId, SubstitutionFamily, Timestamp};

use crate::error::{CommodityError, FailureKind, SubstitutionError};
use crate::telemetry;

/// An exporter that got no clone for a commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedExporter {
    /// The commodity.
    pub commodity: CommodityId,
    /// The exporter.
    pub exporter: Geography,
    /// Why.
    pub reason: String,
}

/// A resolution that fell through to the first available geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedAssignment {
    /// The commodity being built.
    pub commodity: CommodityId,
    /// The technology, or the substitution family.
    pub context: String,
    /// The geography asked for.
    pub requested: Geography,
    /// The geography assigned.
    pub assigned: Geography,
}

/// A family left unsubstituted in one clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionFailure {
    /// The commodity being built.
    pub commodity: CommodityId,
    /// The clone.
    pub process: ProcessId,
    /// The clone's country.
    pub geography: Geography,
    /// The family.
    pub family: SubstitutionFamily,
    /// Whether the clone was dropped because of it.
    pub dropped: bool,
    /// The error.
    pub reason: String,
}

/// A partner, consumer or template that could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    /// The commodity.
    pub commodity: CommodityId,
    /// What was being resolved (`partner`, `technology`, `consumer`).
    pub context: String,
    /// The geography asked for.
    pub requested: Geography,
    /// The error.
    pub reason: String,
}

/// Events of one commodity's construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommodityReport {
    /// Skipped exporters.
    pub skipped_exporters: Vec<SkippedExporter>,
    /// Degraded assignments.
    pub degraded_assignments: Vec<DegradedAssignment>,
    /// Substitution failures.
    pub substitution_failures: Vec<SubstitutionFailure>,
    /// Resolution failures.
    pub resolution_failures: Vec<ResolutionFailure>,
}

impl CommodityReport {
    /// Record a skipped exporter.
    pub fn skip_exporter(&mut self, commodity: &CommodityId, exporter: &Geography, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(commodity = %commodity, exporter = %exporter, %reason, "exporter skipped");
        metrics::counter!(telemetry::EXPORTERS_SKIPPED).increment(1);
        self.skipped_exporters.push(SkippedExporter {
            commodity: commodity.clone(),
            exporter: exporter.clone(),
            reason,
        });
    }

    /// Record a degraded assignment.
    pub fn degraded(
        &mut self,
        commodity: &CommodityId,
        context: impl Into<String>,
        requested: &Geography,
        assigned: &Geography,
    ) {
        let context = context.into();
        tracing::warn!(
            commodity = %commodity,
            context = %context,
            requested = %requested,
            geography = %assigned,
            "degraded assignment to first available geography"
        );
        metrics::counter!(telemetry::DEGRADED_ASSIGNMENTS).increment(1);
        self.degraded_assignments.push(DegradedAssignment {
            commodity: commodity.clone(),
            context,
            requested: requested.clone(),
            assigned: assigned.clone(),
        });
    }

    /// Record a family left unsubstituted.
    pub fn substitution_failure(
        &mut self,
        commodity: &CommodityId,
        process: ProcessId,
        geography: &Geography,
        error: &SubstitutionError,
        dropped: bool,
    ) {
        metrics::counter!(telemetry::SUBSTITUTION_FAILURES).increment(1);
        self.substitution_failures.push(SubstitutionFailure {
            commodity: commodity.clone(),
            process,
            geography: geography.clone(),
            family: error.family(),
            dropped,
            reason: error.to_string(),
        });
    }

    /// Record a resolution failure.
    pub fn resolution_failure(
        &mut self,
        commodity: &CommodityId,
        context: impl Into<String>,
        requested: &Geography,
        reason: impl Into<String>,
    ) {
        let context = context.into();
        let reason = reason.into();
        tracing::warn!(
            commodity = %commodity,
            context = %context,
            geography = %requested,
            %reason,
            "resolution failed"
        );
        self.resolution_failures.push(ResolutionFailure {
            commodity: commodity.clone(),
            context,
            requested: requested.clone(),
            reason,
        });
    }

    /// Append another report.
    pub fn merge(&mut self, other: CommodityReport) {
        self.skipped_exporters.extend(other.skipped_exporters);
        self.degraded_assignments.extend(other.degraded_assignments);
        self.substitution_failures.extend(other.substitution_failures);
        self.resolution_failures.extend(other.resolution_failures);
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.skipped_exporters.is_empty()
            && self.degraded_assignments.is_empty()
            && self.substitution_failures.is_empty()
            && self.resolution_failures.is_empty()
    }
}

/// A commodity whose slice is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedCommodity {
    /// The commodity.
    pub commodity: CommodityId,
    /// Its slice name in the store.
    pub slice: String,
    /// Processes in the slice.
    pub processes: usize,
    /// Digest of the slice.
    pub digest: String,
    /// Whether it was carried over from an earlier run.
    pub resumed: bool,
}

/// A commodity that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCommodity {
    /// The commodity.
    pub commodity: CommodityId,
    /// Taxonomy of the failure.
    pub kind: FailureKind,
    /// The error.
    pub reason: String,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started.
    pub started_at: Timestamp,
    /// When it finished.
    pub finished_at: Timestamp,
    /// Destination namespace.
    pub namespace: Namespace,
    /// Coverage cutoff used.
    pub cutoff: f64,
    /// Committed commodities.
    pub completed: Vec<CompletedCommodity>,
    /// Failed commodities.
    pub failed: Vec<FailedCommodity>,
    /// Events of all commodities.
    #[serde(flatten)]
    pub events: CommodityReport,
    /// Slices purged during recovery.
    pub purged: Vec<String>,
    /// Processes written to the store.
    pub processes_written: usize,
    /// Processes changed by the rewiring pass.
    pub processes_rewired: usize,
    /// Exchanges redirected by the rewiring pass.
    pub exchanges_rewired: usize,
}

impl RunSummary {
    /// An empty summary for a run starting now.
    pub fn start(namespace: Namespace, cutoff: f64) -> Self {
        let now = Timestamp::now();
        Self {
            started_at: now,
            finished_at: now,
            namespace,
            cutoff,
            completed: Vec::new(),
            failed: Vec::new(),
            events: CommodityReport::default(),
            purged: Vec::new(),
            processes_written: 0,
            processes_rewired: 0,
            exchanges_rewired: 0,
        }
    }

    /// Record a committed commodity.
    pub fn complete(&mut self, commodity: &CommodityId, slice: &str, processes: usize, digest: &ContentDigest, resumed: bool) {
        metrics::counter!(telemetry::COMMODITIES_COMPLETED).increment(1);
        self.completed.push(CompletedCommodity {
            commodity: commodity.clone(),
            slice: slice.to_string(),
            processes,
            digest: digest.to_string(),
            resumed,
        });
    }

    /// Record a failed commodity.
    pub fn fail(&mut self, commodity: &CommodityId, error: &CommodityError) {
        tracing::error!(commodity = %commodity, %error, "commodity failed");
        metrics::counter!(telemetry::COMMODITIES_FAILED).increment(1);
        self.failed.push(FailedCommodity {
            commodity: commodity.clone(),
            kind: error.kind(),
            reason: error.to_string(),
        });
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Timestamp::now();
    }

    /// Whether every commodity completed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
