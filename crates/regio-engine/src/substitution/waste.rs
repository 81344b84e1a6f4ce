//! Municipal solid waste treatment. Resolved as a single market through the
//! full chain; European countries typically land on a macro-region market
//! group configured for the family.

use regio_core::SubstitutionFamily;

/// Product name of municipal solid waste treatment.
pub const MUNICIPAL_SOLID_WASTE: &str = "municipal solid waste";

pub(super) fn family_of(product: &str) -> Option<SubstitutionFamily> {
    (product == MUNICIPAL_SOLID_WASTE).then_some(SubstitutionFamily::Waste)
}
