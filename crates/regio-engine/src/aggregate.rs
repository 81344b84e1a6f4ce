//! # Duplicate Aggregation
//!
//! Collapses technosphere exchanges that point at the same supplier into one
//! exchange. The merged exchange keeps the position and metadata of the first
//! member and carries the summed amount. Production and biosphere exchanges
//! are never touched. Idempotent and amount-conserving.

use std::collections::HashMap;

use regio_core::ProcessId;
use regio_graph::{Exchange, Process};

/// Merge duplicate technosphere exchanges in place. Returns the number of
/// exchanges removed.
pub fn aggregate_exchanges(exchanges: &mut Vec<Exchange>) -> usize {
    let before = exchanges.len();
    let mut first_at: HashMap<ProcessId, usize> = HashMap::new();
    let mut merged: Vec<Exchange> = Vec::with_capacity(before);
    for exchange in exchanges.drain(..) {
        let target = exchange
            .is_technosphere()
            .then(|| exchange.target_process())
            .flatten();
        match target.and_then(|id| first_at.get(&id).copied()) {
            Some(position) => merged[position].amount += exchange.amount,
            None => {
                if let Some(id) = target {
                    first_at.insert(id, merged.len());
                }
                merged.push(exchange);
            }
        }
    }
    *exchanges = merged;
    before - exchanges.len()
}

/// Merge duplicate technosphere exchanges of `process`.
pub fn aggregate_process(process: &mut Process) -> usize {
    let removed = aggregate_exchanges(&mut process.exchanges);
    if removed > 0 {
        tracing::trace!(process = %process.id, removed, "merged duplicate exchanges");
    }
    removed
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use regio_core::{CommodityId, Geography, Unit};
    use regio_graph::ProcessKind;

    fn supplier(i: usize) -> Process {
        Process::new(
            ProcessId::new(),
            CommodityId::new(format!("c{i}")).unwrap(),
            format!("market for c{i}"),
            Geography::Global,
            Unit::new("kilogram").unwrap(),
            ProcessKind::Market,
        )
    }

    proptest! {
        /// Total technosphere amount is conserved and a second pass is a no-op.
        #[test]
        fn aggregation_conserves_and_is_idempotent(
            picks in proptest::collection::vec((0usize..4, 0.0f64..100.0), 0..24),
        ) {
            let suppliers: Vec<Process> = (0..4).map(supplier).collect();
            let mut consumer = supplier(99);
            for (i, amount) in &picks {
                consumer.exchanges.push(Exchange::supplied_by(*amount, &suppliers[*i]));
            }
            let before = consumer.technosphere_total();
            aggregate_process(&mut consumer);
            prop_assert!((consumer.technosphere_total() - before).abs() < 1e-6);
            prop_assert!(consumer.technosphere().count() <= 4);

            let once = consumer.clone();
            aggregate_process(&mut consumer);
            prop_assert_eq!(consumer, once);
        }
    }
}
