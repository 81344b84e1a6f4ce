//! # Process Cloning and the Production Market
//!
//! For every (technology, exporter) pair of a commodity the cloner picks a
//! template of that technology through the [`GeographyResolver`], copies it
//! into the exporter's country under a derived identity, re-sources its
//! sensitive inputs, and registers it in the commodity's production market
//! with weight `exporter share × technology share`.
//!
//! The technology shares come from the composition of the commodity's
//! template markets. Transport inputs of those markets are averaged and
//! carried into the production market.
//!
//! Cloning is pure: nothing is written to the graph. The caller receives a
//! [`ClonedCommodity`] and merges it into a delta.

use std::collections::{BTreeMap, BTreeSet};

use regio_core::{CommodityId, Geography, HsCode, ProcessId, Unit};
use regio_graph::{Exchange, Process, ProcessGraph, ProcessIndex, ProcessKind};
use regio_trade::ProductionShares;

use crate::config::{EngineConfig, SubstitutionPolicy};
use crate::error::{CommodityError, ResolutionError};
use crate::resolver::GeographyResolver;
use crate::substitution::InputSubstitutor;
use crate::summary::CommodityReport;

/// Technology → share of the commodity's production. Sums to 1.
pub type TechnologyMix = BTreeMap<String, f64>;

/// Clones of one exporter, by technology.
pub type ExporterClones = BTreeMap<String, ProcessId>;

/// Everything the cloner produced for one commodity.
#[derive(Debug, Clone, PartialEq)]
pub struct ClonedCommodity {
    /// The commodity.
    pub commodity: CommodityId,
    /// Unit of the commodity's templates.
    pub unit: Unit,
    /// The `export market for <commodity>` process at `GLO`.
    pub production_market: Process,
    /// Country clones, in creation order.
    pub clones: Vec<Process>,
    /// Exporter → technology → clone.
    pub by_exporter: BTreeMap<Geography, ExporterClones>,
    /// Technology shares.
    pub technology_mix: TechnologyMix,
    /// Averaged transport inputs of the template markets.
    pub transport: Vec<Exchange>,
}

impl ClonedCommodity {
    /// Exporters that received at least one clone.
    pub fn cloned_geographies(&self) -> BTreeSet<Geography> {
        self.by_exporter.keys().cloned().collect()
    }

    /// A clone by identity.
    pub fn clone_process(&self, id: &ProcessId) -> Option<&Process> {
        self.clones.iter().find(|p| &p.id == id)
    }
}

// ─── Template composition ────────────────────────────────────────────

/// Technology shares of `commodity` across all its template markets and
/// market groups. Uniform when the markets list none of the technologies.
pub fn technology_mix(
    templates: &ProcessGraph,
    index: &ProcessIndex,
    commodity: &CommodityId,
    technologies: &BTreeMap<String, BTreeSet<Geography>>,
) -> TechnologyMix {
    let mut sums: TechnologyMix = technologies.keys().map(|t| (t.clone(), 0.0)).collect();
    let markets = index
        .markets(commodity)
        .filter_map(|entry| templates.get(&entry.id));
    for market in markets {
        for exchange in market.technosphere() {
            if exchange.product != commodity.as_str() || exchange.amount <= 0.0 {
                continue;
            }
            if let Some(sum) = sums.get_mut(&exchange.activity) {
                *sum += exchange.amount;
            }
        }
    }
    let total: f64 = sums.values().sum();
    if total > 0.0 {
        sums.values_mut().for_each(|v| *v /= total);
    } else if !sums.is_empty() {
        let uniform = 1.0 / sums.len() as f64;
        sums.values_mut().for_each(|v| *v = uniform);
    }
    sums
}

fn is_transport(exchange: &Exchange) -> bool {
    let activity = exchange.activity.to_lowercase();
    activity.contains("transport") && activity.contains("market")
}

/// Transport inputs of the template markets of `commodity`, summed per
/// supplier and divided by the number of markets.
pub fn transport_inputs(
    templates: &ProcessGraph,
    index: &ProcessIndex,
    commodity: &CommodityId,
) -> Vec<Exchange> {
    let markets: Vec<&Process> = index
        .markets(commodity)
        .filter(|entry| entry.kind == ProcessKind::Market)
        .filter_map(|entry| templates.get(&entry.id))
        .collect();
    if markets.is_empty() {
        return Vec::new();
    }
    let mut summed: BTreeMap<ProcessId, Exchange> = BTreeMap::new();
    for exchange in markets
        .iter()
        .flat_map(|m| m.technosphere())
        .filter(|e| is_transport(e))
    {
        let Some(target) = exchange.target_process() else {
            continue;
        };
        summed
            .entry(target)
            .and_modify(|e| e.amount += exchange.amount)
            .or_insert_with(|| exchange.clone());
    }
    let count = markets.len() as f64;
    summed
        .into_values()
        .map(|mut e| {
            e.amount /= count;
            e
        })
        .collect()
}

// ─── Cloner ──────────────────────────────────────────────────────────

/// Builds country clones and the production market of a commodity.
#[derive(Debug, Clone, Copy)]
pub struct ProcessCloner<'a> {
    config: &'a EngineConfig,
    templates: &'a ProcessGraph,
    index: &'a ProcessIndex,
    resolver: &'a GeographyResolver,
    substitutor: InputSubstitutor<'a>,
}

impl<'a> ProcessCloner<'a> {
    /// Build a cloner over the template graph.
    pub fn new(
        config: &'a EngineConfig,
        templates: &'a ProcessGraph,
        index: &'a ProcessIndex,
        resolver: &'a GeographyResolver,
    ) -> Self {
        Self {
            config,
            templates,
            index,
            resolver,
            substitutor: InputSubstitutor::new(config, templates, index, resolver),
        }
    }

    /// Clone `shares.commodity` for every exporter in `shares`.
    pub fn clone_commodity(
        &self,
        shares: &ProductionShares,
        hs: &HsCode,
        report: &mut CommodityReport,
    ) -> Result<ClonedCommodity, CommodityError> {
        let commodity = &shares.commodity;
        let technologies = self.index.technologies(commodity);
        let unit = self
            .template_unit(commodity)
            .ok_or_else(|| CommodityError::NoTemplates(commodity.clone()))?;
        let technology_mix = technology_mix(self.templates, self.index, commodity, &technologies);
        let transport = transport_inputs(self.templates, self.index, commodity);
        let cutoff = self.config.cutoff.percent();

        let mut production_market = Process::new(
            ProcessId::derive(&self.config.namespace, &["production-market", commodity.as_str()]),
            commodity.clone(),
            format!("export market for {commodity}"),
            Geography::Global,
            unit.clone(),
            ProcessKind::ProductionMarket,
        )
        .with_comment(format!(
            "Production market of {commodity} (HS {hs}). Export volumes are averaged over \
             the years each exporter reported; exporters covering {cutoff}% of world exports \
             are named and the remainder is aggregated as RoW."
        ));

        let mut clones = Vec::new();
        let mut by_exporter = BTreeMap::new();
        for entry in shares.exporters.iter() {
            let exporter = &entry.geography;
            let mut produced = ExporterClones::new();
            for (technology, available) in &technologies {
                let clone = match self.clone_one(commodity, technology, available, exporter, report) {
                    Ok(Some(clone)) => clone,
                    Ok(None) => continue,
                    Err(error) => {
                        report.resolution_failure(commodity, technology.as_str(), exporter, error.to_string());
                        continue;
                    }
                };
                let weight = entry.share * technology_mix.get(technology).copied().unwrap_or(0.0);
                if weight > 0.0 {
                    production_market
                        .exchanges
                        .push(Exchange::supplied_by(weight, &clone));
                }
                produced.insert(technology.clone(), clone.id);
                clones.push(clone);
            }
            if produced.is_empty() {
                report.skip_exporter(commodity, exporter, "no technology could be cloned");
            } else {
                by_exporter.insert(exporter.clone(), produced);
            }
        }
        if by_exporter.is_empty() {
            return Err(CommodityError::NoClones(commodity.clone()));
        }
        production_market.exchanges.extend(transport.iter().cloned());

        tracing::debug!(
            commodity = %commodity,
            technologies = technologies.len(),
            exporters = by_exporter.len(),
            clones = clones.len(),
            "cloned commodity"
        );
        Ok(ClonedCommodity {
            commodity: commodity.clone(),
            unit,
            production_market,
            clones,
            by_exporter,
            technology_mix,
            transport,
        })
    }

    fn template_unit(&self, commodity: &CommodityId) -> Option<Unit> {
        self.index
            .entries(commodity)
            .iter()
            .filter(|e| e.kind == ProcessKind::Transformation)
            .find_map(|e| self.templates.get(&e.id))
            .map(|p| p.unit.clone())
    }

    /// Clone one technology for one exporter. `Ok(None)` when the clone is
    /// dropped by the substitution policy.
    fn clone_one(
        &self,
        commodity: &CommodityId,
        technology: &str,
        available: &BTreeSet<Geography>,
        exporter: &Geography,
        report: &mut CommodityReport,
    ) -> Result<Option<Process>, ResolutionError> {
        let resolution = self.resolver.resolve(exporter, available)?;
        if resolution.is_degraded() {
            report.degraded(commodity, technology, exporter, &resolution.geography);
        }
        let template = self
            .index
            .lookup(commodity, &resolution.geography, technology)
            .and_then(|id| self.templates.get(&id))
            .ok_or_else(|| ResolutionError::Exhausted {
                requested: exporter.clone(),
            })?;

        let mut clone = template.clone();
        clone.relocate(
            ProcessId::derive(
                &self.config.namespace,
                &["clone", commodity.as_str(), technology, exporter.as_str()],
            ),
            exporter.clone(),
        );
        clone.comment = Some(format!(
            "regionalized adaptation of {technology} | {commodity} | {}. Cutoff {}%.",
            resolution.geography,
            self.config.cutoff.percent()
        ));

        let outcome = self.substitutor.substitute(&mut clone, exporter);
        for applied in outcome.degraded() {
            report.degraded(commodity, applied.family.as_str(), exporter, &applied.geography);
        }
        let drop = self.config.substitution_policy == SubstitutionPolicy::DropProcess
            && !outcome.failures.is_empty();
        for failure in &outcome.failures {
            report.substitution_failure(commodity, clone.id, exporter, failure, drop);
        }
        Ok((!drop).then_some(clone))
    }
}
