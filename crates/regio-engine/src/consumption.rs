//! # Consumption Markets
//!
//! One `consumption market for <commodity>` per importer. Each partner with
//! a non-zero share is resolved against the geographies that received a
//! clone (exact, parent country, macro-region, `RoW`), and contributes one
//! exchange per technology weighted `partner share × technology share`.
//! Several partners may land on the same clone, so the market is
//! aggregated afterwards.

use std::collections::HashMap;

use regio_core::{Geography, ProcessId};
use regio_graph::{Exchange, Process, ProcessKind};
use regio_trade::ConsumptionShares;

use crate::aggregate::aggregate_process;
use crate::cloner::ClonedCommodity;
use crate::config::EngineConfig;
use crate::resolver::GeographyResolver;
use crate::summary::CommodityReport;

/// Builds the consumption markets of a commodity from its clones.
#[derive(Debug, Clone, Copy)]
pub struct ConsumptionMarketBuilder<'a> {
    config: &'a EngineConfig,
    resolver: &'a GeographyResolver,
}

impl<'a> ConsumptionMarketBuilder<'a> {
    /// A builder under `config`.
    pub fn new(config: &'a EngineConfig, resolver: &'a GeographyResolver) -> Self {
        Self { config, resolver }
    }

    /// One consumption market per importer in `shares`.
    pub fn build(
        &self,
        shares: &ConsumptionShares,
        cloned: &ClonedCommodity,
        report: &mut CommodityReport,
    ) -> Vec<Process> {
        let commodity = &cloned.commodity;
        let available = cloned.cloned_geographies();
        let clones: HashMap<ProcessId, &Process> = cloned.clones.iter().map(|p| (p.id, p)).collect();
        let clone_of = |geography: &Geography, technology: &str| {
            cloned
                .by_exporter
                .get(geography)
                .and_then(|by_technology| by_technology.get(technology))
                .and_then(|id| clones.get(id).copied())
        };

        let mut markets = Vec::with_capacity(shares.importers.len());
        for (importer, partners) in &shares.importers {
            let mut market = Process::new(
                ProcessId::derive(
                    &self.config.namespace,
                    &["consumption-market", commodity.as_str(), importer.as_str()],
                ),
                commodity.clone(),
                format!("consumption market for {commodity}"),
                importer.clone(),
                cloned.unit.clone(),
                ProcessKind::ConsumptionMarket,
            )
            .with_comment(format!(
                "Consumption market of {commodity} in {importer}: imports and estimated \
                 domestic production, partners covering {}% of consumption named.",
                self.config.cutoff.percent()
            ));

            for entry in partners.iter().filter(|e| e.share > 0.0) {
                let resolution = match self.resolver.resolve_market(&entry.geography, &available) {
                    Ok(resolution) => resolution,
                    Err(error) => {
                        report.resolution_failure(commodity, "partner", &entry.geography, error.to_string());
                        continue;
                    }
                };
                for (technology, technology_share) in &cloned.technology_mix {
                    let supplier = clone_of(&resolution.geography, technology)
                        .or_else(|| clone_of(&Geography::RestOfWorld, technology));
                    let Some(supplier) = supplier else {
                        report.resolution_failure(
                            commodity,
                            format!("partner technology {technology}"),
                            &entry.geography,
                            "no clone of the technology",
                        );
                        continue;
                    };
                    let amount = entry.share * technology_share;
                    if amount > 0.0 {
                        market.exchanges.push(Exchange::supplied_by(amount, supplier));
                    }
                }
            }
            market.exchanges.extend(cloned.transport.iter().cloned());
            aggregate_process(&mut market);
            markets.push(market);
        }
        tracing::debug!(commodity = %commodity, markets = markets.len(), "built consumption markets");
        markets
    }
}
