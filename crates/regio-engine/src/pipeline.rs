//! # Pipeline
//!
//! One run over every configured commodity:
//!
//! 1. **Recover.** Slices the ledger does not vouch for (in flight, digest
//!    mismatch, unknown) are purged from the store.
//! 2. **Build.** Commodities are built in parallel. Each task reads only the
//!    immutable template graph and index and returns its processes and a
//!    report. With `resume`, committed slices are read back instead.
//! 3. **Barrier.** All results are merged into one working graph.
//! 4. **Rewire.** Consumers of every regionalized commodity are redirected.
//! 5. **Flush.** Each commodity slice, then the rewired template consumers,
//!    is written under an `IN_FLIGHT` → `COMMITTED` checkpoint. Slices whose
//!    content is already committed are not rewritten.
//!
//! A cancellation flag is checked before the build and before every write.
//! A cancelled run leaves at most one slice in flight.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use regio_core::{CommodityId, ContentDigest, HsCode, ProcessId};
use regio_graph::{slice_digest, GraphDelta, Process, ProcessGraph, ProcessIndex, ProcessStore};
use regio_trade::{ConsumptionShares, ProductionShares, TradeError, TradeFeed, TradeShareCalculator};

use crate::cloner::ProcessCloner;
use crate::config::EngineConfig;
use crate::consumption::ConsumptionMarketBuilder;
use crate::error::{CommodityError, EngineError, LedgerError};
use crate::ledger::{CheckpointStatus, RunLedger};
use crate::resolver::GeographyResolver;
use crate::rewire::GraphRewirer;
use crate::summary::{CommodityReport, RunSummary};

/// Slice holding template processes changed by the rewiring pass.
pub const REWIRED_SLICE: &str = "rewired-consumers";

/// Options of one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Reuse committed slices whose stored digest still matches.
    pub resume: bool,
}

/// A cooperative cancellation flag, shared with whoever may cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Store slice name of a commodity: a readable prefix plus a short
/// identity suffix, so that names differing only in punctuation stay apart.
pub fn slice_name(commodity: &CommodityId) -> String {
    let mut readable = String::with_capacity(commodity.as_str().len());
    for c in commodity.as_str().chars() {
        if c.is_ascii_alphanumeric() {
            readable.push(c.to_ascii_lowercase());
        } else if !readable.ends_with('-') {
            readable.push('-');
        }
    }
    let readable = readable.trim_matches('-');
    let suffix = ProcessId::derive(&Default::default(), &["slice", commodity.as_str()])
        .as_uuid()
        .simple()
        .to_string();
    let suffix = suffix.get(..8).unwrap_or(&suffix);
    if readable.is_empty() {
        format!("commodity-{suffix}")
    } else {
        format!("{readable}-{suffix}")
    }
}

/// Exporter shares of one commodity.
pub fn production_shares(
    config: &EngineConfig,
    feed: &dyn TradeFeed,
    commodity: &CommodityId,
    hs: &HsCode,
) -> Result<ProductionShares, TradeError> {
    TradeShareCalculator::with_cutoff(config.cutoff).production_shares(commodity, &feed.exports(hs))
}

/// Importer × partner shares of one commodity, with the domestic
/// production estimate folded into the import data.
pub fn consumption_shares(
    config: &EngineConfig,
    feed: &dyn TradeFeed,
    commodity: &CommodityId,
    hs: &HsCode,
) -> Result<ConsumptionShares, TradeError> {
    let mut imports = feed.imports(hs);
    imports.extend(config.trade.estimate(feed, hs));
    TradeShareCalculator::with_cutoff(config.cutoff).consumption_shares(commodity, &imports)
}

/// Delete every stored slice the ledger does not vouch for, and return
/// in-flight or missing checkpoints to `PLANNED`. Returns the purged slices.
pub fn purge_uncommitted(store: &dyn ProcessStore, ledger: &mut RunLedger) -> Result<Vec<String>, EngineError> {
    let namespace = ledger.namespace().clone();
    let stored = store.slices(&namespace)?;
    let mut purged = Vec::new();
    for slice in &stored {
        let vouched = match ledger.get(slice) {
            Some(record) if record.status == CheckpointStatus::Committed => store
                .stored_digest(&namespace, slice)?
                .is_some_and(|digest| record.is_committed_as(&digest)),
            _ => false,
        };
        if vouched {
            continue;
        }
        store.delete_slice(&namespace, slice)?;
        ledger.reset(slice, "purged: not committed")?;
        tracing::warn!(slice = %slice, "purged uncommitted slice");
        purged.push(slice.clone());
    }

    let present: BTreeSet<&String> = stored.iter().collect();
    let missing: Vec<String> = ledger
        .entries()
        .filter(|r| r.status != CheckpointStatus::Planned && !present.contains(&r.slice))
        .map(|r| r.slice.clone())
        .collect();
    for slice in missing {
        ledger.reset(&slice, "slice missing from store")?;
        tracing::warn!(slice = %slice, "checkpoint reset: slice missing from store");
    }
    Ok(purged)
}

/// Processes of one commodity waiting to be flushed.
struct PendingSlice {
    commodity: CommodityId,
    slice: String,
    ids: Vec<ProcessId>,
    resumed: bool,
}

/// The regionalization pipeline over one template graph.
pub struct Pipeline<'a> {
    config: &'a EngineConfig,
    templates: &'a ProcessGraph,
    feed: &'a dyn TradeFeed,
    store: &'a dyn ProcessStore,
    cancel: CancelFlag,
}

impl<'a> Pipeline<'a> {
    /// A pipeline writing to `store`.
    pub fn new(
        config: &'a EngineConfig,
        templates: &'a ProcessGraph,
        feed: &'a dyn TradeFeed,
        store: &'a dyn ProcessStore,
    ) -> Self {
        Self {
            config,
            templates,
            feed,
            store,
            cancel: CancelFlag::new(),
        }
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            tracing::warn!("run cancelled");
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Build the generated processes of one commodity: the production
    /// market, the country clones, and the consumption markets.
    pub fn build_commodity(
        &self,
        index: &ProcessIndex,
        resolver: &GeographyResolver,
        commodity: &CommodityId,
        hs: &HsCode,
        report: &mut CommodityReport,
    ) -> Result<Vec<Process>, CommodityError> {
        let production = production_shares(self.config, self.feed, commodity, hs)?;
        let consumption = consumption_shares(self.config, self.feed, commodity, hs)?;
        let cloned = ProcessCloner::new(self.config, self.templates, index, resolver)
            .clone_commodity(&production, hs, report)?;
        let markets = ConsumptionMarketBuilder::new(self.config, resolver).build(&consumption, &cloned, report);

        let mut processes = Vec::with_capacity(1 + cloned.clones.len() + markets.len());
        processes.push(cloned.production_market);
        processes.extend(cloned.clones);
        processes.extend(markets);
        tracing::info!(commodity = %commodity, processes = processes.len(), "commodity built");
        Ok(processes)
    }

    /// Execute a run, recording progress in `ledger`.
    pub fn run(&self, ledger: &mut RunLedger, options: RunOptions) -> Result<RunSummary, EngineError> {
        let namespace = &self.config.namespace;
        if ledger.namespace() != namespace {
            return Err(LedgerError::NamespaceMismatch {
                expected: namespace.to_string(),
                found: ledger.namespace().to_string(),
            }
            .into());
        }
        let mut summary = RunSummary::start(namespace.clone(), self.config.cutoff.value());
        tracing::info!(
            namespace = %namespace,
            commodities = self.config.commodities.len(),
            resume = options.resume,
            "run started"
        );

        summary.purged = purge_uncommitted(self.store, ledger)?;

        let index = ProcessIndex::build(self.templates)?;
        let resolver = GeographyResolver::new(self.config.macro_regions.clone());

        let mut resumed = Vec::new();
        let mut pending: Vec<(&CommodityId, &HsCode)> = Vec::new();
        for (commodity, hs) in &self.config.commodities {
            let slice = slice_name(commodity);
            if options.resume {
                if let Some(processes) = self.committed_slice(ledger, &slice)? {
                    tracing::info!(commodity = %commodity, slice = %slice, "resuming committed slice");
                    resumed.push((commodity.clone(), slice, processes));
                    continue;
                }
            }
            pending.push((commodity, hs));
        }

        self.check_cancelled()?;
        let built: Vec<(CommodityId, Result<Vec<Process>, CommodityError>, CommodityReport)> = pending
            .par_iter()
            .filter(|_| !self.cancel.is_cancelled())
            .map(|(commodity, hs)| {
                let mut report = CommodityReport::default();
                let result = self.build_commodity(&index, &resolver, commodity, hs, &mut report);
                ((*commodity).clone(), result, report)
            })
            .collect();
        self.check_cancelled()?;
        tracing::info!(built = built.len(), resumed = resumed.len(), "build pass complete");

        let mut graph = self.templates.clone();
        let mut slices = Vec::new();
        for (commodity, slice, processes) in resumed {
            match merge_into(&mut graph, processes) {
                Ok(ids) => slices.push(PendingSlice {
                    commodity,
                    slice,
                    ids,
                    resumed: true,
                }),
                Err(error) => summary.fail(&commodity, &error),
            }
        }
        for (commodity, result, report) in built {
            summary.events.merge(report);
            match result.and_then(|processes| merge_into(&mut graph, processes)) {
                Ok(ids) => slices.push(PendingSlice {
                    slice: slice_name(&commodity),
                    commodity,
                    ids,
                    resumed: false,
                }),
                Err(error) => summary.fail(&commodity, &error),
            }
        }

        let outcome = GraphRewirer::new(&self.config.rewire, &resolver, &graph).rewire(&graph);
        summary.events.merge(outcome.report);
        summary.processes_rewired = outcome.processes_rewired;
        summary.exchanges_rewired = outcome.exchanges_rewired;
        let rewired_templates: Vec<ProcessId> = outcome
            .delta
            .replaced()
            .map(|p| p.id)
            .filter(|id| self.templates.contains(id))
            .collect();
        graph.apply(outcome.delta)?;

        slices.sort_by(|a, b| a.slice.cmp(&b.slice));
        for pending in &slices {
            let processes = collect(&graph, &pending.ids);
            match self.flush(ledger, &pending.slice, Some(&pending.commodity), &processes) {
                Ok((digest, written)) => {
                    if written {
                        summary.processes_written += processes.len();
                    }
                    summary.complete(
                        &pending.commodity,
                        &pending.slice,
                        processes.len(),
                        &digest,
                        pending.resumed && !written,
                    );
                }
                Err(EngineError::Store(error)) => summary.fail(&pending.commodity, &CommodityError::Store(error)),
                Err(error) => return Err(error),
            }
        }

        let consumers = collect(&graph, &rewired_templates);
        if !consumers.is_empty() || ledger.get(REWIRED_SLICE).is_some() {
            let (_, written) = self.flush(ledger, REWIRED_SLICE, None, &consumers)?;
            if written {
                summary.processes_written += consumers.len();
            }
        }

        summary.finish();
        tracing::info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            written = summary.processes_written,
            rewired = summary.processes_rewired,
            "run finished"
        );
        Ok(summary)
    }

    /// The stored processes of a committed slice whose digest still matches.
    fn committed_slice(&self, ledger: &RunLedger, slice: &str) -> Result<Option<Vec<Process>>, EngineError> {
        let Some(record) = ledger.get(slice) else {
            return Ok(None);
        };
        if record.status != CheckpointStatus::Committed {
            return Ok(None);
        }
        let Some(processes) = self.store.read_slice(&self.config.namespace, slice)? else {
            return Ok(None);
        };
        let digest = slice_digest(&processes)?;
        Ok(record.is_committed_as(&digest).then_some(processes))
    }

    /// Write one slice under a checkpoint unless its content is already
    /// committed. Returns the digest and whether a write happened.
    fn flush(
        &self,
        ledger: &mut RunLedger,
        slice: &str,
        commodity: Option<&CommodityId>,
        processes: &[Process],
    ) -> Result<(ContentDigest, bool), EngineError> {
        let namespace = &self.config.namespace;
        let digest = slice_digest(processes)?;
        let unchanged = ledger.get(slice).is_some_and(|r| r.is_committed_as(&digest))
            && self.store.stored_digest(namespace, slice)?.as_ref() == Some(&digest);
        if unchanged {
            tracing::debug!(slice = %slice, "slice unchanged, not rewritten");
            return Ok((digest, false));
        }

        self.check_cancelled()?;
        let checkpoint = ledger.begin(slice, commodity.cloned())?;
        let written = self.store.write_slice(namespace, slice, processes)?;
        ledger.commit(checkpoint.commit(written.clone(), processes.len()))?;
        tracing::info!(slice = %slice, processes = processes.len(), digest = %written, "slice committed");
        Ok((written, true))
    }
}

/// Add generated processes to the working graph. Nothing is added if any
/// identity collides.
fn merge_into(graph: &mut ProcessGraph, processes: Vec<Process>) -> Result<Vec<ProcessId>, CommodityError> {
    let ids = processes.iter().map(|p| p.id).collect();
    let mut delta = GraphDelta::new();
    for process in processes {
        delta.add(process)?;
    }
    graph.apply(delta)?;
    Ok(ids)
}

fn collect(graph: &ProcessGraph, ids: &[ProcessId]) -> Vec<Process> {
    ids.iter().filter_map(|id| graph.get(id).cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloner::fixtures::{geo, steel, steel_templates, STEEL};
    use regio_core::{Cutoff, Namespace, Unit};
    use regio_graph::{Exchange, MemoryStore, ProcessKind};
    use regio_trade::{ExportRecord, ImportRecord, InMemoryFeed, TradeDataset, TradeLocation};

    fn hs() -> HsCode {
        HsCode::new("7207").unwrap()
    }

    fn export(exporter: &str, quantity: f64) -> ExportRecord {
        ExportRecord {
            hs: hs(),
            year: 2020,
            exporter: TradeLocation::parse(exporter).unwrap(),
            quantity: Some(quantity),
            alt_quantity: None,
            unit: Unit::new("tonne").unwrap(),
        }
    }

    fn import(importer: &str, partner: &str, quantity: f64) -> ImportRecord {
        ImportRecord {
            hs: hs(),
            year: 2020,
            importer: TradeLocation::parse(importer).unwrap(),
            partner: TradeLocation::parse(partner).unwrap(),
            quantity: Some(quantity),
            alt_quantity: None,
            unit: Unit::new("tonne").unwrap(),
        }
    }

    fn feed() -> InMemoryFeed {
        InMemoryFeed::new(TradeDataset {
            exports: vec![export("DE", 60.0), export("CN", 30.0), export("BR", 10.0)],
            imports: vec![
                import("FR", "DE", 70.0),
                import("FR", "CN", 30.0),
                import("US", "CN", 50.0),
                import("US", "W00", 500.0),
            ],
            domestic: vec![],
        })
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::new(Cutoff::new(0.8).unwrap(), [(steel(), hs())].into());
        config.macro_regions.insert(geo("DE"), vec![geo("RER")]);
        config.macro_regions.insert(geo("FR"), vec![geo("RER")]);
        config
    }

    /// Steel templates plus a car factory in FR consuming steel from two
    /// template producers.
    fn templates() -> ProcessGraph {
        let mut processes = steel_templates();
        let producers: Vec<Process> = processes
            .iter()
            .filter(|p| p.kind == ProcessKind::Transformation && p.commodity.as_str() == STEEL)
            .cloned()
            .collect();
        let mut car = Process::new(
            ProcessId::new(),
            regio_core::CommodityId::new("passenger car").unwrap(),
            "passenger car production",
            geo("FR"),
            Unit::new("unit").unwrap(),
            ProcessKind::Transformation,
        );
        car.exchanges.push(Exchange::supplied_by(3.0, &producers[0]));
        car.exchanges.push(Exchange::supplied_by(4.0, &producers[1]));
        processes.push(car);
        ProcessGraph::from_processes(processes).unwrap()
    }

    #[test]
    fn test_slice_name_is_safe_and_stable() {
        let name = slice_name(&steel());
        assert!(name.starts_with("steel-low-alloyed-"));
        assert_eq!(name, slice_name(&steel()));
        assert!(!name.contains(['/', ',', ' ']));
        let other = slice_name(&regio_core::CommodityId::new("steel low alloyed").unwrap());
        assert_ne!(name, other);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_run_writes_and_commits_every_slice() {
        let config = config();
        let templates = templates();
        let feed = feed();
        let store = MemoryStore::new();
        let mut ledger = RunLedger::in_memory(Namespace::default());

        let summary = Pipeline::new(&config, &templates, &feed, &store)
            .run(&mut ledger, RunOptions::default())
            .unwrap();

        assert!(summary.is_clean());
        assert_eq!(summary.completed.len(), 1);
        assert!(!summary.completed[0].resumed);
        // The car and both template steel markets.
        assert_eq!(summary.processes_rewired, 3);
        assert_eq!(summary.exchanges_rewired, 6);
        assert_eq!(ledger.committed().count(), 2);
        assert_eq!(ledger.in_flight().count(), 0);

        let consumers = store
            .read_slice(&config.namespace, REWIRED_SLICE)
            .unwrap()
            .unwrap();
        assert_eq!(consumers.len(), 3);
        let car = consumers
            .iter()
            .find(|p| p.commodity.as_str() == "passenger car")
            .unwrap();
        let steel_inputs: Vec<&Exchange> = car
            .technosphere()
            .filter(|e| e.product == STEEL)
            .collect();
        assert_eq!(steel_inputs.len(), 1);
        assert!((steel_inputs[0].amount - 7.0).abs() < 1e-12);
        assert_eq!(steel_inputs[0].geography, Some(geo("FR")));
    }

    #[test]
    fn test_second_run_rewrites_nothing() {
        let config = config();
        let templates = templates();
        let feed = feed();
        let store = MemoryStore::new();
        let mut ledger = RunLedger::in_memory(Namespace::default());
        let pipeline = Pipeline::new(&config, &templates, &feed, &store);
        pipeline.run(&mut ledger, RunOptions::default()).unwrap();

        let again = pipeline.run(&mut ledger, RunOptions { resume: true }).unwrap();
        assert_eq!(again.processes_written, 0);
        assert!(again.completed.iter().all(|c| c.resumed));
        assert!(again.purged.is_empty());
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let config = config();
        let templates = templates();
        let feed = feed();
        let store = MemoryStore::new();
        let mut ledger = RunLedger::in_memory(Namespace::default());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = Pipeline::new(&config, &templates, &feed, &store)
            .with_cancel(cancel)
            .run(&mut ledger, RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(store.process_count(), 0);
    }

    #[test]
    fn test_purge_removes_in_flight_and_unknown_slices() {
        let store = MemoryStore::new();
        let namespace = Namespace::default();
        let mut ledger = RunLedger::in_memory(namespace.clone());
        let process = steel_templates().remove(0);

        let checkpoint = ledger.begin("kept", None).unwrap();
        let digest = store.write_slice(&namespace, "kept", &[process.clone()]).unwrap();
        ledger.commit(checkpoint.commit(digest, 1)).unwrap();
        let _partial = ledger.begin("partial", None).unwrap();
        store.write_slice(&namespace, "partial", &[process.clone()]).unwrap();
        store.write_slice(&namespace, "orphan", &[process]).unwrap();

        let purged = purge_uncommitted(&store, &mut ledger).unwrap();
        assert_eq!(purged, vec!["orphan".to_string(), "partial".to_string()]);
        assert_eq!(store.slices(&namespace).unwrap(), vec!["kept".to_string()]);
        assert_eq!(ledger.get("partial").unwrap().status, CheckpointStatus::Planned);
    }

    #[test]
    fn test_failed_commodity_does_not_abort_run() {
        let mut config = config();
        let copper = regio_core::CommodityId::new("copper").unwrap();
        config.commodities.insert(copper.clone(), HsCode::new("7403").unwrap());
        let templates = templates();
        let feed = feed();
        let store = MemoryStore::new();
        let mut ledger = RunLedger::in_memory(Namespace::default());

        let summary = Pipeline::new(&config, &templates, &feed, &store)
            .run(&mut ledger, RunOptions::default())
            .unwrap();
        assert_eq!(summary.completed.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].commodity, copper);
    }

    #[test]
    fn test_namespace_mismatch_is_fatal() {
        let config = config();
        let templates = templates();
        let feed = feed();
        let store = MemoryStore::new();
        let mut ledger = RunLedger::in_memory(Namespace::new("elsewhere").unwrap());
        let err = Pipeline::new(&config, &templates, &feed, &store)
            .run(&mut ledger, RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(LedgerError::NamespaceMismatch { .. })));
    }
}
