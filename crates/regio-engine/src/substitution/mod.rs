//! # Input Substitution
//!
//! A cloned process still consumes the inputs of its template's location.
//! For the sensitive families (electricity, waste treatment, heat, water)
//! the substitutor re-sources those inputs for the clone's country.
//!
//! ## Procedure per family
//!
//! 1. Detect the family's technosphere exchanges and group them by product.
//! 2. Require a single unit per product and sum the amounts.
//! 3. Resolve the target suppliers through [`InputSubstitutor::resolve_with`]
//!    against the family's own availability set.
//! 4. Replace the group with one exchange per target supplier, each carrying
//!    `total × weight`. Weights sum to 1, so the family total is conserved.
//!
//! A family is planned completely before the process is touched. If any of
//! its products fails, the process keeps that family's original exchanges
//! and the failure is reported in the [`SubstitutionOutcome`].
//!
//! Only one electricity family is substituted per process, in the order
//! aluminium, cobalt, grid.

mod electricity;
mod heat;
mod waste;
mod water;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use regio_core::{CommodityId, Geography, ProcessId, SubstitutionFamily, Unit};
use regio_graph::{Exchange, Process, ProcessGraph, ProcessIndex, ProcessKind};

use crate::config::EngineConfig;
use crate::error::SubstitutionError;
use crate::resolver::{GeographyResolver, Resolution, ResolutionTier};

pub use heat::{HEAT_DISTRICT_NATURAL_GAS, HEAT_DISTRICT_OTHER, HEAT_SMALL_SCALE};
pub use waste::MUNICIPAL_SOLID_WASTE;

/// A supplier and its fraction of the family quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedSupplier {
    /// The supplying template process.
    pub supplier: ProcessId,
    /// Fraction of the total, in (0, 1].
    pub weight: f64,
}

/// Where a family's input is re-sourced from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyTarget {
    /// The resolved geography.
    pub geography: Geography,
    /// The tier that chose it.
    pub tier: ResolutionTier,
    /// Suppliers; weights sum to 1.
    pub suppliers: Vec<WeightedSupplier>,
}

impl FamilyTarget {
    fn single(resolution: Resolution, supplier: ProcessId) -> Self {
        Self {
            geography: resolution.geography,
            tier: resolution.tier,
            suppliers: vec![WeightedSupplier {
                supplier,
                weight: 1.0,
            }],
        }
    }
}

/// One substituted product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedSubstitution {
    /// The family.
    pub family: SubstitutionFamily,
    /// The input product (or flow base name, for water).
    pub product: String,
    /// Quantity before and after substitution.
    pub quantity: f64,
    /// Where it is now sourced from.
    pub geography: Geography,
    /// How that geography was reached.
    pub tier: ResolutionTier,
}

/// Result of substituting one process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionOutcome {
    /// Families that were re-sourced.
    pub applied: Vec<AppliedSubstitution>,
    /// Families that were present but left untouched.
    pub failures: Vec<SubstitutionError>,
}

impl SubstitutionOutcome {
    /// Applied substitutions that fell through to an arbitrary geography.
    pub fn degraded(&self) -> impl Iterator<Item = &AppliedSubstitution> {
        self.applied.iter().filter(|a| a.tier.is_degraded())
    }
}

/// Planned replacement of one family's exchanges.
struct FamilyPlan {
    remove: BTreeSet<usize>,
    add: Vec<Exchange>,
    applied: Vec<AppliedSubstitution>,
}

/// Re-sources sensitive inputs of cloned processes.
#[derive(Debug, Clone, Copy)]
pub struct InputSubstitutor<'a> {
    config: &'a EngineConfig,
    templates: &'a ProcessGraph,
    index: &'a ProcessIndex,
    resolver: &'a GeographyResolver,
}

impl<'a> InputSubstitutor<'a> {
    /// Build a substitutor over the template graph and its index.
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
        }
    }

    /// The family a technosphere product belongs to, if any.
    pub fn family_of(product: &str) -> Option<SubstitutionFamily> {
        electricity::family_of(product)
            .or_else(|| waste::family_of(product))
            .or_else(|| heat::family_of(product))
    }

    /// Availability of `family` for `product`: configured, or derived from
    /// the template index (producer locations for heat, market locations
    /// otherwise).
    pub fn availability(&self, family: SubstitutionFamily, product: &str) -> Cow<'a, BTreeSet<Geography>> {
        if let Some(configured) = self.config.availability.get(&family) {
            return Cow::Borrowed(configured);
        }
        let Ok(commodity) = CommodityId::new(product) else {
            return Cow::Owned(BTreeSet::new());
        };
        let derived = if family.is_heat() {
            self.index
                .entries(&commodity)
                .iter()
                .filter(|e| e.kind == ProcessKind::Transformation)
                .map(|e| e.geography.clone())
                .collect()
        } else {
            self.index.market_geographies(&commodity)
        };
        Cow::Owned(derived)
    }

    /// Resolve `family` for `product` in `country` against its availability.
    pub fn resolve(
        &self,
        family: SubstitutionFamily,
        product: &str,
        country: &Geography,
    ) -> Result<FamilyTarget, SubstitutionError> {
        let availability = self.availability(family, product);
        self.resolve_with(family, product, country, &availability)
    }

    /// Resolve `family` for `product` in `country` against `availability`.
    pub fn resolve_with(
        &self,
        family: SubstitutionFamily,
        product: &str,
        country: &Geography,
        availability: &BTreeSet<Geography>,
    ) -> Result<FamilyTarget, SubstitutionError> {
        match family {
            SubstitutionFamily::Electricity
            | SubstitutionFamily::AluminiumElectricity
            | SubstitutionFamily::CobaltElectricity
            | SubstitutionFamily::Waste => {
                self.market_target(family, product, country, availability)
            }
            SubstitutionFamily::HeatDistrictNaturalGas
            | SubstitutionFamily::HeatDistrictOther
            | SubstitutionFamily::HeatSmallScale => {
                heat::resolve(self, family, product, country, availability)
            }
            SubstitutionFamily::Water => water::resolve(self, country, availability),
        }
    }

    /// Substitute every present family of `process`, which is located in
    /// `country`.
    pub fn substitute(&self, process: &mut Process, country: &Geography) -> SubstitutionOutcome {
        let mut outcome = SubstitutionOutcome::default();
        let electricity = electricity::present_family(process);
        for family in SubstitutionFamily::all().iter().copied() {
            if family.is_electricity() && Some(family) != electricity {
                continue;
            }
            let planned = if family.is_elementary() {
                water::plan(self, process, country)
            } else {
                self.plan_technosphere(process, family, country)
            };
            match planned {
                Ok(Some(plan)) => {
                    apply_plan(process, plan.remove, plan.add);
                    outcome.applied.extend(plan.applied);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        process = %process.id,
                        family = %family,
                        geography = %country,
                        %error,
                        "input family left unsubstituted"
                    );
                    outcome.failures.push(error);
                }
            }
        }
        outcome
    }

    // ─── Planning ────────────────────────────────────────────────────

    fn plan_technosphere(
        &self,
        process: &Process,
        family: SubstitutionFamily,
        country: &Geography,
    ) -> Result<Option<FamilyPlan>, SubstitutionError> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, exchange) in process.exchanges.iter().enumerate() {
            if exchange.is_technosphere() && Self::family_of(&exchange.product) == Some(family) {
                groups.entry(exchange.product.as_str()).or_default().push(i);
            }
        }
        if groups.is_empty() {
            return Ok(None);
        }

        let mut plan = FamilyPlan {
            remove: BTreeSet::new(),
            add: Vec::new(),
            applied: Vec::new(),
        };
        for (product, positions) in groups {
            let unit = single_unit(family, product, positions.iter().map(|&i| &process.exchanges[i].unit))?;
            let total: f64 = positions.iter().map(|&i| process.exchanges[i].amount).sum();
            let target = self.resolve(family, product, country)?;
            for weighted in &target.suppliers {
                let supplier = self.supplier(family, product, country, weighted.supplier)?;
                let mut exchange = Exchange::supplied_by(total * weighted.weight, supplier);
                exchange.unit = unit.clone();
                plan.add.push(exchange);
            }
            plan.remove.extend(positions);
            plan.applied.push(AppliedSubstitution {
                family,
                product: product.to_string(),
                quantity: total,
                geography: target.geography,
                tier: target.tier,
            });
        }
        Ok(Some(plan))
    }

    // ─── Shared resolution helpers ───────────────────────────────────

    fn supplier(
        &self,
        family: SubstitutionFamily,
        product: &str,
        country: &Geography,
        id: ProcessId,
    ) -> Result<&'a Process, SubstitutionError> {
        self.templates
            .get(&id)
            .ok_or_else(|| unresolved(family, product, country))
    }

    /// The market (or market group) of `product` at `geography`, preferring
    /// the kind configured for the family there.
    fn market_at(
        &self,
        family: SubstitutionFamily,
        commodity: &CommodityId,
        geography: &Geography,
    ) -> Option<ProcessId> {
        let preferred = if self.config.prefers_market_group(family, geography) {
            ProcessKind::MarketGroup
        } else {
            ProcessKind::Market
        };
        let mut markets: Vec<_> = self.index.markets_at(commodity, geography).collect();
        markets.sort_by(|a, b| {
            (a.kind != preferred, &a.activity).cmp(&(b.kind != preferred, &b.activity))
        });
        markets.first().map(|entry| entry.id)
    }

    /// Resolve a single supplying market through the full chain.
    fn market_target(
        &self,
        family: SubstitutionFamily,
        product: &str,
        country: &Geography,
        availability: &BTreeSet<Geography>,
    ) -> Result<FamilyTarget, SubstitutionError> {
        let commodity =
            CommodityId::new(product).map_err(|_| unresolved(family, product, country))?;
        let resolution = self
            .resolver
            .resolve(country, availability)
            .map_err(|_| unresolved(family, product, country))?;
        let supplier = self
            .market_at(family, &commodity, &resolution.geography)
            .ok_or_else(|| unresolved(family, product, country))?;
        Ok(FamilyTarget::single(resolution, supplier))
    }
}

fn unresolved(family: SubstitutionFamily, product: &str, country: &Geography) -> SubstitutionError {
    SubstitutionError::Unresolved {
        family,
        product: product.to_string(),
        country: country.clone(),
    }
}

fn single_unit<'u>(
    family: SubstitutionFamily,
    product: &str,
    units: impl Iterator<Item = &'u Unit>,
) -> Result<Unit, SubstitutionError> {
    let distinct: BTreeSet<&Unit> = units.collect();
    let mut iter = distinct.iter();
    match (iter.next(), iter.next()) {
        (Some(unit), None) => Ok((*unit).clone()),
        _ => Err(SubstitutionError::MixedUnits {
            family,
            product: product.to_string(),
            units: distinct.into_iter().cloned().collect(),
        }),
    }
}

fn apply_plan(process: &mut Process, remove: BTreeSet<usize>, add: Vec<Exchange>) {
    let mut position = 0;
    process.exchanges.retain(|_| {
        let keep = !remove.contains(&position);
        position += 1;
        keep
    });
    process.exchanges.extend(add);
}
