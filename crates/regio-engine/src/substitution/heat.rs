//! # Heat
//!
//! Heat is not re-sourced from one market. The clone gets the national
//! producers of its country directly, weighted by their relative amounts
//! inside the regional aggregate market that lists them:
//!
//! 1. Resolve the producing geography against the family's producer
//!    availability. A federated country counts as available when any of its
//!    subdivisions is.
//! 2. Walk the request's fallback candidates and take the first market of
//!    the heat product there that lists producers in that geography (for a
//!    federated country, in any of its subdivisions).
//! 3. For countries under the global correction (district heat only), scale
//!    those weights by the `RoW` share of the `GLO` market and add the
//!    producers the `GLO` market lists directly.
//! 4. Normalize. With no weights at all, fall back to a single market.

use std::collections::{BTreeMap, BTreeSet};

use regio_core::{CommodityId, Geography, ProcessId, SubstitutionFamily};
use regio_graph::ProcessKind;

use super::{unresolved, FamilyTarget, InputSubstitutor, WeightedSupplier};
use crate::error::SubstitutionError;
use crate::resolver::{Resolution, ResolutionTier};

/// District or industrial heat from natural gas.
pub const HEAT_DISTRICT_NATURAL_GAS: &str = "heat, district or industrial, natural gas";
/// District or industrial heat from other sources.
pub const HEAT_DISTRICT_OTHER: &str = "heat, district or industrial, other than natural gas";
/// Central or small-scale heat from sources other than natural gas.
pub const HEAT_SMALL_SCALE: &str = "heat, central or small-scale, other than natural gas";

pub(super) fn family_of(product: &str) -> Option<SubstitutionFamily> {
    match product {
        HEAT_DISTRICT_NATURAL_GAS => Some(SubstitutionFamily::HeatDistrictNaturalGas),
        HEAT_DISTRICT_OTHER => Some(SubstitutionFamily::HeatDistrictOther),
        HEAT_SMALL_SCALE => Some(SubstitutionFamily::HeatSmallScale),
        _ => None,
    }
}

type Weights = BTreeMap<ProcessId, f64>;

pub(super) fn resolve(
    sub: &InputSubstitutor<'_>,
    family: SubstitutionFamily,
    product: &str,
    country: &Geography,
    availability: &BTreeSet<Geography>,
) -> Result<FamilyTarget, SubstitutionError> {
    let commodity =
        CommodityId::new(product).map_err(|_| unresolved(family, product, country))?;
    let federated = sub.config.federated_countries.contains(country)
        && availability.iter().any(|g| g.within_country(country));
    let producer = if federated {
        Resolution {
            geography: country.clone(),
            tier: ResolutionTier::Exact,
        }
    } else {
        sub.resolver
            .resolve(country, availability)
            .map_err(|_| unresolved(family, product, country))?
    };

    let found = regional_weights(sub, &commodity, country, &producer.geography, federated);
    let weights = match found {
        Some((region, weights))
            if family != SubstitutionFamily::HeatSmallScale
                && sub.config.heat_global_correction.contains(&producer.geography) =>
        {
            with_global_correction(sub, &commodity, &producer.geography, &region, weights)
        }
        Some((_, weights)) => weights,
        None => Weights::new(),
    };

    match normalized(&weights) {
        Some(suppliers) => Ok(FamilyTarget {
            geography: producer.geography,
            tier: producer.tier,
            suppliers,
        }),
        None => {
            tracing::debug!(
                family = %family,
                geography = %country,
                "no national heat producers listed, using a single market"
            );
            let markets = sub.index.market_geographies(&commodity);
            sub.market_target(family, product, country, &markets)
        }
    }
}

/// Weights of `producer`'s suppliers in the first candidate market of
/// `country` that lists any, with the geography of that market.
fn regional_weights(
    sub: &InputSubstitutor<'_>,
    commodity: &CommodityId,
    country: &Geography,
    producer: &Geography,
    federated: bool,
) -> Option<(Geography, Weights)> {
    let mut seen = BTreeSet::new();
    sub.resolver
        .candidates(country)
        .into_iter()
        .filter(|(region, _)| seen.insert(region.clone()))
        .find_map(|(region, _)| {
            let weights = market_weights(sub, commodity, &region, |g| {
                if federated {
                    g.within_country(producer)
                } else {
                    g == producer
                }
            });
            (!weights.is_empty()).then_some((region, weights))
        })
}

fn market_weights(
    sub: &InputSubstitutor<'_>,
    commodity: &CommodityId,
    region: &Geography,
    located: impl Fn(&Geography) -> bool,
) -> Weights {
    let mut weights = Weights::new();
    let markets = sub
        .index
        .markets_at(commodity, region)
        .filter_map(|entry| sub.templates.get(&entry.id));
    for market in markets {
        for exchange in market.technosphere() {
            if exchange.product != commodity.as_str() {
                continue;
            }
            let Some(target) = exchange.target_process().filter(|t| *t != market.id) else {
                continue;
            };
            if exchange.geography.as_ref().is_some_and(&located) {
                *weights.entry(target).or_insert(0.0) += exchange.amount;
            }
        }
    }
    weights
}

fn with_global_correction(
    sub: &InputSubstitutor<'_>,
    commodity: &CommodityId,
    producer: &Geography,
    region: &Geography,
    weights: Weights,
) -> Weights {
    if *region == Geography::Global {
        return weights;
    }
    let mut rest_of_world: Option<f64> = None;
    let mut direct = Weights::new();
    let markets = sub
        .index
        .markets_at(commodity, &Geography::Global)
        .filter(|entry| entry.kind == ProcessKind::Market || entry.kind == ProcessKind::MarketGroup)
        .filter_map(|entry| sub.templates.get(&entry.id));
    for market in markets {
        for exchange in market.technosphere().filter(|e| e.product == commodity.as_str()) {
            match (&exchange.geography, exchange.target_process()) {
                (Some(Geography::RestOfWorld), _) => {
                    *rest_of_world.get_or_insert(0.0) += exchange.amount;
                }
                (Some(g), Some(target)) if g.within_country(producer) => {
                    *direct.entry(target).or_insert(0.0) += exchange.amount;
                }
                _ => {}
            }
        }
    }
    let Some(factor) = rest_of_world else {
        return weights;
    };
    let mut corrected: Weights = weights.into_iter().map(|(id, w)| (id, w * factor)).collect();
    for (id, w) in direct {
        *corrected.entry(id).or_insert(0.0) += w;
    }
    corrected
}

fn normalized(weights: &Weights) -> Option<Vec<WeightedSupplier>> {
    let positive = || weights.iter().filter(|(_, w)| **w > 0.0);
    let total: f64 = positive().map(|(_, w)| w).sum();
    (total > 0.0).then(|| {
        positive()
            .map(|(id, w)| WeightedSupplier {
                supplier: *id,
                weight: w / total,
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use regio_graph::{Exchange, Process};

    const FURNACE: &str = "heat production, natural gas, at industrial furnace";
    const BOILER: &str = "heat production, natural gas, at boiler";

    fn producer(activity: &str, geography: &str) -> Process {
        process(HEAT_DISTRICT_NATURAL_GAS, activity, geography, "megajoule")
    }

    fn market_with(geography: &str, inputs: &[(&Process, f64)]) -> Process {
        let mut m = market(HEAT_DISTRICT_NATURAL_GAS, geography, "megajoule");
        for (supplier, amount) in inputs {
            m.exchanges.push(Exchange::supplied_by(*amount, supplier));
        }
        m
    }

    fn european() -> (Templates, Process) {
        let de_furnace = producer(FURNACE, "DE");
        let de_boiler = producer(BOILER, "DE");
        let fr_furnace = producer(FURNACE, "FR");
        let row_furnace = producer(FURNACE, "RoW");
        let europe = market_with(
            "Europe without Switzerland",
            &[(&de_furnace, 0.3), (&de_boiler, 0.1), (&fr_furnace, 0.6)],
        );
        let row = market_with("RoW", &[(&row_furnace, 1.0)]);
        let europe_copy = europe.clone();
        let t = Templates::new(
            vec![de_furnace, de_boiler, fr_furnace, row_furnace, europe, row],
            &[("DE", &["RER", "Europe without Switzerland"])],
        );
        (t, europe_copy)
    }

    #[test]
    fn test_national_weights_from_regional_market() {
        let (t, europe) = european();
        let config = config();
        let mut clone = process("steel", "steel production", "DE", "kilogram");
        clone.exchanges.push(Exchange::supplied_by(10.0, &europe));

        let outcome = t.substitutor(&config).substitute(&mut clone, &geo("DE"));
        assert!(outcome.failures.is_empty());
        assert!((total_of(&clone, HEAT_DISTRICT_NATURAL_GAS) - 10.0).abs() < 1e-9);

        let furnace = t.id(HEAT_DISTRICT_NATURAL_GAS, "DE", FURNACE);
        let boiler = t.id(HEAT_DISTRICT_NATURAL_GAS, "DE", BOILER);
        let amount_of = |id| {
            clone
                .technosphere()
                .find(|e| e.target_process() == Some(id))
                .map(|e| e.amount)
                .unwrap()
        };
        assert!((amount_of(furnace) - 7.5).abs() < 1e-9);
        assert!((amount_of(boiler) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_country_without_producers_uses_row() {
        let (t, _) = european();
        let config = config();
        let target = t
            .substitutor(&config)
            .resolve(
                SubstitutionFamily::HeatDistrictNaturalGas,
                HEAT_DISTRICT_NATURAL_GAS,
                &geo("JP"),
            )
            .unwrap();
        assert_eq!(target.geography, Geography::RestOfWorld);
        assert_eq!(target.suppliers.len(), 1);
        assert_eq!(
            target.suppliers[0].supplier,
            t.id(HEAT_DISTRICT_NATURAL_GAS, "RoW", FURNACE)
        );
    }

    fn federated() -> Templates {
        let qc = producer(FURNACE, "CA-QC");
        let ab = producer(FURNACE, "CA-AB");
        let row_furnace = producer(FURNACE, "RoW");
        let row = market_with("RoW", &[(&qc, 0.2), (&ab, 0.2), (&row_furnace, 0.6)]);
        let glo = market_with("GLO", &[(&row, 0.5), (&qc, 0.1)]);
        Templates::new(vec![qc, ab, row_furnace, row, glo], &[])
    }

    #[test]
    fn test_federated_country_enumerates_subdivisions() {
        let t = federated();
        let mut config = config();
        config.federated_countries.insert(geo("CA"));
        let target = t
            .substitutor(&config)
            .resolve(
                SubstitutionFamily::HeatDistrictNaturalGas,
                HEAT_DISTRICT_NATURAL_GAS,
                &geo("CA"),
            )
            .unwrap();
        assert_eq!(target.geography, geo("CA"));
        assert_eq!(target.suppliers.len(), 2);
        for s in &target.suppliers {
            assert!((s.weight - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_global_correction_adds_direct_entries() {
        let t = federated();
        let mut config = config();
        config.federated_countries.insert(geo("CA"));
        config.heat_global_correction.insert(geo("CA"));
        let target = t
            .substitutor(&config)
            .resolve(
                SubstitutionFamily::HeatDistrictNaturalGas,
                HEAT_DISTRICT_NATURAL_GAS,
                &geo("CA"),
            )
            .unwrap();
        // RoW weights 0.2 and 0.2 scaled by 0.5, plus 0.1 direct for QC.
        let qc = t.id(HEAT_DISTRICT_NATURAL_GAS, "CA-QC", FURNACE);
        let weight_of = |id| {
            target
                .suppliers
                .iter()
                .find(|s| s.supplier == id)
                .map(|s| s.weight)
                .unwrap()
        };
        assert!((weight_of(qc) - 2.0 / 3.0).abs() < 1e-9);
        let total: f64 = target.suppliers.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_listed_producers_falls_back_to_market() {
        let lonely = producer(FURNACE, "US");
        let row = market(HEAT_DISTRICT_NATURAL_GAS, "RoW", "megajoule");
        let t = Templates::new(vec![lonely, row], &[]);
        let config = config();
        let target = t
            .substitutor(&config)
            .resolve(
                SubstitutionFamily::HeatDistrictNaturalGas,
                HEAT_DISTRICT_NATURAL_GAS,
                &geo("US"),
            )
            .unwrap();
        assert_eq!(target.geography, Geography::RestOfWorld);
        assert_eq!(
            target.suppliers[0].supplier,
            t.id(
                HEAT_DISTRICT_NATURAL_GAS,
                "RoW",
                &format!("market for {HEAT_DISTRICT_NATURAL_GAS}")
            )
        );
    }
}
