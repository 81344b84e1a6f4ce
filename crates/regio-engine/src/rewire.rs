//! # Second-Order Regionalization
//!
//! After every commodity has its consumption markets, each consumer of a
//! regionalized commodity anywhere in the graph is redirected to the
//! consumption market for that commodity at its own location (exact
//! country, parent country, macro-region, `RoW`). All of a consumer's
//! exchanges of one commodity are summed into a single exchange first, then
//! the process is aggregated again.
//!
//! Generated markets and consumers in exempt geographies are left alone.
//! Producers and template markets that consume their own commodity are
//! rewired like any other consumer. The pass reads the graph and returns
//! a [`GraphDelta`] of replacements.

use std::collections::{BTreeMap, BTreeSet};

use regio_core::{CommodityId, Geography, ProcessId};
use regio_graph::{GraphDelta, Process, ProcessGraph, ProcessKind};

use crate::aggregate::aggregate_process;
use crate::config::RewireConfig;
use crate::resolver::GeographyResolver;
use crate::summary::CommodityReport;
use crate::telemetry;

/// Result of the rewiring pass.
#[derive(Debug, Clone, Default)]
pub struct RewireOutcome {
    /// Replacement processes.
    pub delta: GraphDelta,
    /// Processes that changed.
    pub processes_rewired: usize,
    /// Original exchanges redirected.
    pub exchanges_rewired: usize,
    /// Consumers whose location could not be resolved.
    pub report: CommodityReport,
}

/// Redirects consumers to consumption markets.
#[derive(Debug)]
pub struct GraphRewirer<'a> {
    config: &'a RewireConfig,
    resolver: &'a GeographyResolver,
    markets: BTreeMap<CommodityId, BTreeMap<Geography, ProcessId>>,
}

impl<'a> GraphRewirer<'a> {
    /// A rewirer targeting the consumption markets present in `graph`.
    pub fn new(config: &'a RewireConfig, resolver: &'a GeographyResolver, graph: &ProcessGraph) -> Self {
        let mut markets: BTreeMap<CommodityId, BTreeMap<Geography, ProcessId>> = BTreeMap::new();
        for market in graph.iter().filter(|p| p.kind == ProcessKind::ConsumptionMarket) {
            markets
                .entry(market.commodity.clone())
                .or_default()
                .insert(market.geography.clone(), market.id);
        }
        Self {
            config,
            resolver,
            markets,
        }
    }

    /// Commodities that have consumption markets.
    pub fn commodities(&self) -> impl Iterator<Item = &CommodityId> {
        self.markets.keys()
    }

    /// Rewire every consumer in `graph`.
    pub fn rewire(&self, graph: &ProcessGraph) -> RewireOutcome {
        let mut outcome = RewireOutcome::default();
        if self.markets.is_empty() {
            return outcome;
        }
        for process in graph.iter() {
            if process.kind.is_generated_market() || self.config.is_exempt(&process.geography) {
                continue;
            }
            let mut rewired = process.clone();
            let redirected = self.rewire_process(graph, &mut rewired, &mut outcome.report);
            if redirected > 0 && rewired != *process {
                outcome.processes_rewired += 1;
                outcome.exchanges_rewired += redirected;
                outcome.delta.replace(rewired);
            }
        }
        metrics::counter!(telemetry::EXCHANGES_REWIRED).increment(outcome.exchanges_rewired as u64);
        tracing::info!(
            processes = outcome.processes_rewired,
            exchanges = outcome.exchanges_rewired,
            "rewired consumers"
        );
        outcome
    }

    /// Rewire one consumer in place. Returns the number of original
    /// exchanges folded into rewired ones.
    fn rewire_process(&self, graph: &ProcessGraph, process: &mut Process, report: &mut CommodityReport) -> usize {
        let consumed: BTreeSet<&CommodityId> = self
            .markets
            .keys()
            .filter(|c| process.technosphere().any(|e| e.product == c.as_str()))
            .collect();

        let mut redirected = 0;
        for commodity in consumed {
            let Some(by_geography) = self.markets.get(commodity) else {
                continue;
            };
            let available: BTreeSet<Geography> = by_geography.keys().cloned().collect();
            let resolution = match self.resolver.resolve_market(&process.geography, &available) {
                Ok(resolution) => resolution,
                Err(error) => {
                    report.resolution_failure(commodity, "consumer", &process.geography, error.to_string());
                    continue;
                }
            };
            let Some(market) = by_geography
                .get(&resolution.geography)
                .and_then(|id| graph.get(id))
            else {
                continue;
            };

            let positions: Vec<usize> = process
                .exchanges
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_technosphere() && e.product == commodity.as_str())
                .map(|(i, _)| i)
                .collect();
            let Some(&first) = positions.first() else {
                continue;
            };
            let total: f64 = positions.iter().map(|&i| process.exchanges[i].amount).sum();
            let mut exchange = process.exchanges[first].clone();
            exchange.point_to(market);
            exchange.amount = total;

            let mut position = 0;
            process.exchanges.retain(|_| {
                let keep = positions.binary_search(&position).is_err();
                position += 1;
                keep
            });
            let insert_at = first.min(process.exchanges.len());
            process.exchanges.insert(insert_at, exchange);
            redirected += positions.len();
            tracing::trace!(
                process = %process.id,
                commodity = %commodity,
                geography = %resolution.geography,
                exchanges = positions.len(),
                "rewired consumer"
            );
        }
        if redirected > 0 {
            aggregate_process(process);
        }
        redirected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regio_core::Unit;
    use regio_graph::Exchange;

    fn geo(code: &str) -> Geography {
        Geography::parse(code).unwrap()
    }

    fn process(commodity: &str, activity: &str, location: &str, kind: ProcessKind) -> Process {
        Process::new(
            ProcessId::new(),
            CommodityId::new(commodity).unwrap(),
            activity,
            geo(location),
            Unit::new("kilogram").unwrap(),
            kind,
        )
    }

    fn consumption_market(commodity: &str, location: &str) -> Process {
        process(
            commodity,
            &format!("consumption market for {commodity}"),
            location,
            ProcessKind::ConsumptionMarket,
        )
    }

    struct World {
        graph: ProcessGraph,
        resolver: GeographyResolver,
        market_de: ProcessId,
        market_row: ProcessId,
    }

    /// Steel templates at RER and RoW, steel consumption markets at DE and
    /// RoW, plus whatever `consumers` builds from the two templates.
    fn world(consumers: impl FnOnce(&Process, &Process) -> Vec<Process>) -> World {
        let steel_rer = process("steel", "steel production", "RER", ProcessKind::Transformation);
        let steel_row = process("steel", "steel production", "RoW", ProcessKind::Transformation);
        let market_de = consumption_market("steel", "DE");
        let market_row = consumption_market("steel", "RoW");
        let (market_de_id, market_row_id) = (market_de.id, market_row.id);
        let extra = consumers(&steel_rer, &steel_row);
        let mut processes = vec![steel_rer, steel_row, market_de, market_row];
        processes.extend(extra);
        World {
            graph: ProcessGraph::from_processes(processes).unwrap(),
            resolver: GeographyResolver::new([(geo("AT"), vec![geo("RER")])].into()),
            market_de: market_de_id,
            market_row: market_row_id,
        }
    }

    fn car(location: &str, rer: &Process, row: &Process) -> Process {
        let mut car = process("car", "car production", location, ProcessKind::Transformation);
        car.exchanges.push(Exchange::supplied_by(3.0, rer));
        car.exchanges.push(Exchange::supplied_by(4.0, row));
        car
    }

    fn consumer_with_two_steel_inputs(location: &str) -> (ProcessId, World) {
        let mut id = None;
        let w = world(|rer, row| {
            let consumer = car(location, rer, row);
            id = Some(consumer.id);
            vec![consumer]
        });
        (id.unwrap(), w)
    }

    fn steel_inputs(process: &Process) -> Vec<&Exchange> {
        process.technosphere().filter(|e| e.product == "steel").collect()
    }

    #[test]
    fn test_two_exchanges_merge_into_one() {
        let (consumer, w) = consumer_with_two_steel_inputs("DE");
        let config = RewireConfig::default();
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);

        assert_eq!(outcome.processes_rewired, 1);
        assert_eq!(outcome.exchanges_rewired, 2);
        let rewired = outcome.delta.get(&consumer).unwrap();
        let inputs = steel_inputs(rewired);
        assert_eq!(inputs.len(), 1);
        assert!((inputs[0].amount - 7.0).abs() < 1e-12);
        assert_eq!(inputs[0].target_process(), Some(w.market_de));
        assert!(rewired.validate().is_ok());
    }

    #[test]
    fn test_unmapped_consumer_goes_to_row_market() {
        let (consumer, w) = consumer_with_two_steel_inputs("JP");
        let config = RewireConfig::default();
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);
        let rewired = outcome.delta.get(&consumer).unwrap();
        assert_eq!(steel_inputs(rewired)[0].target_process(), Some(w.market_row));
    }

    #[test]
    fn test_subdivision_uses_parent_country_market() {
        let (consumer, w) = consumer_with_two_steel_inputs("DE-BY");
        let config = RewireConfig::default();
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);
        let rewired = outcome.delta.get(&consumer).unwrap();
        assert_eq!(steel_inputs(rewired)[0].target_process(), Some(w.market_de));
    }

    #[test]
    fn test_exempt_geography_untouched() {
        let (consumer, w) = consumer_with_two_steel_inputs("CH");
        let config = RewireConfig {
            exempt_geographies: [geo("CH")].into(),
        };
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);
        assert!(outcome.delta.get(&consumer).is_none());
        assert_eq!(outcome.processes_rewired, 0);
    }

    #[test]
    fn test_generated_markets_skipped() {
        let w = world(|rer, _| {
            let mut generated = consumption_market("steel", "FR");
            generated.exchanges.push(Exchange::supplied_by(1.0, rer));
            vec![generated]
        });
        let config = RewireConfig::default();
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);
        assert!(outcome.delta.is_empty());
    }

    #[test]
    fn test_own_commodity_inputs_rewired() {
        let mut producer_id = None;
        let mut market_id = None;
        let w = world(|rer, _| {
            let mut producer = process("steel", "steel production", "DE", ProcessKind::Transformation);
            producer.exchanges.push(Exchange::supplied_by(0.2, rer));
            let mut template_market = process("steel", "market for steel", "DE", ProcessKind::Market);
            template_market.exchanges.push(Exchange::supplied_by(1.0, rer));
            producer_id = Some(producer.id);
            market_id = Some(template_market.id);
            vec![producer, template_market]
        });
        let config = RewireConfig::default();
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);
        assert_eq!(outcome.processes_rewired, 2);

        let producer = outcome.delta.get(&producer_id.unwrap()).unwrap();
        let inputs = steel_inputs(producer);
        assert_eq!(inputs.len(), 1);
        assert!((inputs[0].amount - 0.2).abs() < 1e-12);
        assert_eq!(inputs[0].target_process(), Some(w.market_de));
        assert!(producer.validate().is_ok());

        let market = outcome.delta.get(&market_id.unwrap()).unwrap();
        assert_eq!(steel_inputs(market)[0].target_process(), Some(w.market_de));
    }

    #[test]
    fn test_rewiring_is_idempotent() {
        let (_, w) = consumer_with_two_steel_inputs("DE");
        let config = RewireConfig::default();
        let outcome = GraphRewirer::new(&config, &w.resolver, &w.graph).rewire(&w.graph);
        let mut graph = w.graph.clone();
        graph.apply(outcome.delta).unwrap();
        let again = GraphRewirer::new(&config, &w.resolver, &graph).rewire(&graph);
        assert!(again.delta.is_empty());
        assert_eq!(again.exchanges_rewired, 0);
    }

    #[test]
    fn test_no_consumption_markets_no_changes() {
        let steel = process("steel", "steel production", "RER", ProcessKind::Transformation);
        let mut consumer = process("car", "car production", "DE", ProcessKind::Transformation);
        consumer.exchanges.push(Exchange::supplied_by(3.0, &steel));
        let graph = ProcessGraph::from_processes(vec![steel, consumer]).unwrap();
        let config = RewireConfig::default();
        let resolver = GeographyResolver::default();
        let outcome = GraphRewirer::new(&config, &resolver, &graph).rewire(&graph);
        assert!(outcome.delta.is_empty());
    }
}
