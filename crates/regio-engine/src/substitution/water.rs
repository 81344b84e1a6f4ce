//! Water elementary flows. A spatialized flow is named `<base>, <location>`;
//! the clone's flows are renamed to its own location, or to the resolved
//! location when an availability set is configured for the family.

use std::collections::{BTreeMap, BTreeSet};

use regio_core::{Geography, SubstitutionFamily};
use regio_graph::{ElementaryFlow, ExchangeTarget, Process};

use super::{unresolved, AppliedSubstitution, FamilyPlan, FamilyTarget, InputSubstitutor};
use crate::error::SubstitutionError;
use crate::resolver::{Resolution, ResolutionTier};

pub(super) fn resolve(
    sub: &InputSubstitutor<'_>,
    country: &Geography,
    availability: &BTreeSet<Geography>,
) -> Result<FamilyTarget, SubstitutionError> {
    let resolution = if availability.is_empty() {
        Resolution {
            geography: country.clone(),
            tier: ResolutionTier::Exact,
        }
    } else {
        sub.resolver
            .resolve(country, availability)
            .map_err(|_| unresolved(SubstitutionFamily::Water, "water", country))?
    };
    Ok(FamilyTarget {
        geography: resolution.geography,
        tier: resolution.tier,
        suppliers: Vec::new(),
    })
}

/// The configured base name of a water flow, if it is one.
fn spatialized_base<'f>(
    flows: &'f BTreeMap<String, BTreeSet<String>>,
    flow: &ElementaryFlow,
) -> Option<&'f str> {
    let base = flows
        .get_key_value(flow.name.as_str())
        .or_else(|| {
            flow.name
                .rsplit_once(", ")
                .and_then(|(prefix, _)| flows.get_key_value(prefix))
        })?;
    let (name, compartments) = base;
    let compartment_matches = compartments.is_empty()
        || flow
            .compartment()
            .is_some_and(|c| compartments.contains(c));
    compartment_matches.then_some(name.as_str())
}

pub(super) fn plan(
    sub: &InputSubstitutor<'_>,
    process: &Process,
    country: &Geography,
) -> Result<Option<FamilyPlan>, SubstitutionError> {
    let flows = &sub.config.water_flows;
    if flows.is_empty() {
        return Ok(None);
    }
    let matching: Vec<(usize, &str)> = process
        .exchanges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_biosphere())
        .filter_map(|(i, e)| {
            e.elementary_flow()
                .and_then(|flow| spatialized_base(flows, flow))
                .map(|base| (i, base))
        })
        .collect();
    if matching.is_empty() {
        return Ok(None);
    }

    let availability = sub
        .config
        .availability
        .get(&SubstitutionFamily::Water)
        .cloned()
        .unwrap_or_default();
    let target = resolve(sub, country, &availability)?;

    let mut plan = FamilyPlan {
        remove: BTreeSet::new(),
        add: Vec::new(),
        applied: Vec::new(),
    };
    let mut quantities: BTreeMap<&str, f64> = BTreeMap::new();
    for (i, base) in matching {
        let exchange = &process.exchanges[i];
        let Some(flow) = exchange.elementary_flow() else {
            continue;
        };
        let name = format!("{base}, {}", target.geography);
        if flow.name == name {
            continue;
        }
        let mut renamed = exchange.clone();
        renamed.input = ExchangeTarget::Elementary(ElementaryFlow {
            name,
            categories: flow.categories.clone(),
        });
        plan.remove.insert(i);
        plan.add.push(renamed);
        *quantities.entry(base).or_insert(0.0) += exchange.amount;
    }
    if plan.remove.is_empty() {
        return Ok(None);
    }
    plan.applied = quantities
        .into_iter()
        .map(|(base, quantity)| AppliedSubstitution {
            family: SubstitutionFamily::Water,
            product: base.to_string(),
            quantity,
            geography: target.geography.clone(),
            tier: target.tier,
        })
        .collect();
    Ok(Some(plan))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use regio_graph::Exchange;

    fn water_total(process: &Process, base: &str) -> f64 {
        process
            .biosphere()
            .filter(|e| e.name().starts_with(base))
            .map(|e| e.amount)
            .sum()
    }

    fn flow(name: &str, compartment: &str) -> ElementaryFlow {
        ElementaryFlow {
            name: name.into(),
            categories: vec![compartment.into()],
        }
    }

    fn with_water(location: &str) -> Process {
        let mut p = process("steel", "steel production", location, "kilogram");
        let m3 = unit("cubic meter");
        p.exchanges.push(Exchange::biosphere(
            2.0,
            m3.clone(),
            flow("Water, river, RoW", "natural resource"),
        ));
        p.exchanges
            .push(Exchange::biosphere(1.0, m3.clone(), flow("Water", "air")));
        p.exchanges
            .push(Exchange::biosphere(0.5, m3, flow("Water, river", "natural resource")));
        p
    }

    fn water_config() -> crate::config::EngineConfig {
        let mut config = config();
        config.water_flows.insert(
            "Water, river".into(),
            ["natural resource".to_string()].into(),
        );
        config
    }

    #[test]
    fn test_flows_renamed_to_clone_location() {
        let t = Templates::new(vec![], &[]);
        let config = water_config();
        let mut p = with_water("DE");
        let outcome = t.substitutor(&config).substitute(&mut p, &geo("DE"));

        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].family, SubstitutionFamily::Water);
        assert!((outcome.applied[0].quantity - 2.5).abs() < 1e-12);
        let names: Vec<&str> = p.biosphere().map(Exchange::name).collect();
        assert_eq!(names.iter().filter(|n| **n == "Water, river, DE").count(), 2);
        assert!(names.contains(&"Water"));
        assert!((water_total(&p, "Water, river") - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_configured_availability_resolves() {
        let t = Templates::new(vec![], &[("DE", &["RER"])]);
        let mut config = water_config();
        config
            .availability
            .insert(SubstitutionFamily::Water, [geo("RER"), geo("RoW")].into());
        let mut p = with_water("DE");
        t.substitutor(&config).substitute(&mut p, &geo("DE"));
        assert_eq!(
            p.biosphere()
                .filter(|e| e.name() == "Water, river, RER")
                .count(),
            2
        );
    }

    #[test]
    fn test_disabled_without_configured_flows() {
        let t = Templates::new(vec![], &[]);
        let config = config();
        let mut p = with_water("DE");
        let before = p.clone();
        t.substitutor(&config).substitute(&mut p, &geo("DE"));
        assert_eq!(p, before);
    }
}
