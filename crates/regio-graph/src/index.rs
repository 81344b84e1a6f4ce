//! # Process Index
//!
//! Built once per run over the template graph and read-only afterwards.
//! Replaces name-substring searches with exact lookups on
//! `(commodity, geography, activity)`, plus per-commodity views of the
//! production technologies and markets that exist.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use regio_core::{CommodityId, Geography, ProcessId};

use crate::error::GraphError;
use crate::graph::ProcessGraph;
use crate::model::{ProcessKey, ProcessKind};

/// One indexed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Identity in the graph.
    pub id: ProcessId,
    /// Role of the process.
    pub kind: ProcessKind,
    /// Activity name.
    pub activity: String,
    /// Location.
    pub geography: Geography,
}

/// Exact-key and per-commodity lookup over a process graph.
#[derive(Debug, Clone, Default)]
pub struct ProcessIndex {
    by_key: HashMap<ProcessKey, ProcessId>,
    by_commodity: BTreeMap<CommodityId, Vec<IndexEntry>>,
}

impl ProcessIndex {
    /// Index every process of `graph`. Fails if two processes share a key.
    pub fn build(graph: &ProcessGraph) -> Result<Self, GraphError> {
        let mut index = Self::default();
        for process in graph.iter() {
            let key = process.key();
            if let Some(first) = index.by_key.get(&key) {
                return Err(GraphError::DuplicateKey {
                    commodity: key.commodity,
                    geography: key.geography,
                    activity: key.activity,
                    first: *first,
                    second: process.id,
                });
            }
            index.by_key.insert(key, process.id);
            index
                .by_commodity
                .entry(process.commodity.clone())
                .or_default()
                .push(IndexEntry {
                    id: process.id,
                    kind: process.kind,
                    activity: process.activity.clone(),
                    geography: process.geography.clone(),
                });
        }
        tracing::debug!(
            processes = index.by_key.len(),
            commodities = index.by_commodity.len(),
            "built process index"
        );
        Ok(index)
    }

    /// The unique process with this key, if any.
    pub fn lookup(
        &self,
        commodity: &CommodityId,
        geography: &Geography,
        activity: &str,
    ) -> Option<ProcessId> {
        self.by_key
            .get(&ProcessKey::new(commodity.clone(), geography.clone(), activity))
            .copied()
    }

    /// Every indexed process producing `commodity`.
    pub fn entries(&self, commodity: &CommodityId) -> &[IndexEntry] {
        self.by_commodity
            .get(commodity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Production technologies of `commodity` and the geographies each
    /// is available in.
    pub fn technologies(&self, commodity: &CommodityId) -> BTreeMap<String, BTreeSet<Geography>> {
        let mut out: BTreeMap<String, BTreeSet<Geography>> = BTreeMap::new();
        for entry in self.entries(commodity) {
            if entry.kind == ProcessKind::Transformation {
                out.entry(entry.activity.clone())
                    .or_default()
                    .insert(entry.geography.clone());
            }
        }
        out
    }

    /// Template markets and market groups of `commodity`.
    pub fn markets(&self, commodity: &CommodityId) -> impl Iterator<Item = &IndexEntry> {
        self.entries(commodity).iter().filter(|e| e.kind.is_market())
    }

    /// Template markets and market groups of `commodity` located at `geography`.
    pub fn markets_at<'a>(
        &'a self,
        commodity: &CommodityId,
        geography: &'a Geography,
    ) -> impl Iterator<Item = &'a IndexEntry> {
        self.markets(commodity).filter(move |e| &e.geography == geography)
    }

    /// Geographies where a template market of `commodity` exists.
    pub fn market_geographies(&self, commodity: &CommodityId) -> BTreeSet<Geography> {
        self.markets(commodity).map(|e| e.geography.clone()).collect()
    }

    /// Generated markets of `commodity` of the given kind, by location.
    pub fn generated(&self, commodity: &CommodityId, kind: ProcessKind) -> BTreeMap<Geography, ProcessId> {
        self.entries(commodity)
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.geography.clone(), e.id))
            .collect()
    }

    /// Every commodity with at least one indexed process.
    pub fn commodities(&self) -> impl Iterator<Item = &CommodityId> {
        self.by_commodity.keys()
    }

    /// Number of indexed processes.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Process;
    use regio_core::Unit;

    fn p(product: &str, activity: &str, geo: &str) -> Process {
        Process::new(
            ProcessId::new(),
            CommodityId::new(product).unwrap(),
            activity,
            Geography::parse(geo).unwrap(),
            Unit::new("kilogram").unwrap(),
            ProcessKind::infer(activity),
        )
    }

    fn graph() -> ProcessGraph {
        ProcessGraph::from_processes([
            p("steel", "steel production, converter", "RER"),
            p("steel", "steel production, converter", "RoW"),
            p("steel", "steel production, electric", "US"),
            p("steel", "market for steel", "GLO"),
            p("steel", "market group for steel", "RER"),
            p("copper", "copper production", "CL"),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_exact_key() {
        let idx = ProcessIndex::build(&graph()).unwrap();
        let steel = CommodityId::new("steel").unwrap();
        assert!(idx
            .lookup(&steel, &Geography::RestOfWorld, "steel production, converter")
            .is_some());
        assert!(idx
            .lookup(&steel, &Geography::country("US"), "steel production, converter")
            .is_none());
    }

    #[test]
    fn test_technologies_group_geographies() {
        let idx = ProcessIndex::build(&graph()).unwrap();
        let techs = idx.technologies(&CommodityId::new("steel").unwrap());
        assert_eq!(techs.len(), 2);
        assert_eq!(techs["steel production, converter"].len(), 2);
        assert!(techs["steel production, electric"].contains(&Geography::country("US")));
    }

    #[test]
    fn test_markets() {
        let idx = ProcessIndex::build(&graph()).unwrap();
        let steel = CommodityId::new("steel").unwrap();
        assert_eq!(idx.markets(&steel).count(), 2);
        assert_eq!(idx.markets_at(&steel, &Geography::region("RER")).count(), 1);
        assert!(idx.market_geographies(&steel).contains(&Geography::Global));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let g = ProcessGraph::from_processes([
            p("steel", "market for steel", "GLO"),
            p("steel", "market for steel", "GLO"),
        ])
        .unwrap();
        assert!(matches!(
            ProcessIndex::build(&g),
            Err(GraphError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_unknown_commodity_is_empty() {
        let idx = ProcessIndex::build(&graph()).unwrap();
        let none = CommodityId::new("zinc").unwrap();
        assert!(idx.entries(&none).is_empty());
        assert!(idx.technologies(&none).is_empty());
    }
}
