//! Electricity detection. Aluminium- and cobalt-industry electricity are
//! distinct families with their own availability; a process carries at most
//! one substituted electricity family.

use regio_core::SubstitutionFamily;
use regio_graph::Process;

/// The electricity family of a product name, if any.
pub(super) fn family_of(product: &str) -> Option<SubstitutionFamily> {
    let product = product.to_lowercase();
    if !product.contains("electricity") {
        return None;
    }
    if product.contains("aluminium") && product.contains("voltage") {
        Some(SubstitutionFamily::AluminiumElectricity)
    } else if product.contains("cobalt") {
        Some(SubstitutionFamily::CobaltElectricity)
    } else if product.contains("voltage") {
        Some(SubstitutionFamily::Electricity)
    } else {
        None
    }
}

/// The electricity family to substitute in `process`: the first present of
/// aluminium, cobalt and grid electricity.
pub(super) fn present_family(process: &Process) -> Option<SubstitutionFamily> {
    let present: Vec<SubstitutionFamily> = process
        .technosphere()
        .filter_map(|e| family_of(&e.product))
        .collect();
    SubstitutionFamily::all()
        .iter()
        .copied()
        .filter(SubstitutionFamily::is_electricity)
        .find(|family| present.contains(family))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use regio_graph::Exchange;

    #[test]
    fn test_family_of_variants() {
        assert_eq!(
            family_of("electricity, high voltage, aluminium industry"),
            Some(SubstitutionFamily::AluminiumElectricity)
        );
        assert_eq!(
            family_of("electricity, high voltage, cobalt industry"),
            Some(SubstitutionFamily::CobaltElectricity)
        );
        assert_eq!(
            family_of("electricity, low voltage"),
            Some(SubstitutionFamily::Electricity)
        );
        assert_eq!(family_of("electricity, from wind"), None);
        assert_eq!(family_of("heat, district or industrial, natural gas"), None);
    }

    #[test]
    fn test_aluminium_takes_precedence() {
        let grid = market("electricity, medium voltage", "DE", "kilowatt hour");
        let smelter = market(
            "electricity, high voltage, aluminium industry",
            "RoW",
            "kilowatt hour",
        );
        let mut p = process("aluminium, primary", "aluminium production", "DE", "kilogram");
        assert_eq!(present_family(&p), None);
        p.exchanges.push(Exchange::supplied_by(1.0, &grid));
        assert_eq!(present_family(&p), Some(SubstitutionFamily::Electricity));
        p.exchanges.push(Exchange::supplied_by(13.0, &smelter));
        assert_eq!(
            present_family(&p),
            Some(SubstitutionFamily::AluminiumElectricity)
        );
    }
}
