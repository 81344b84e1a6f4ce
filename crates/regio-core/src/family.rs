//! # Substitution Families: Single Source of Truth
//!
//! Defines the `SubstitutionFamily` enum: every kind of country-sensitive
//! input that a cloned process has re-sourced from its new location. This is
//! the ONE definition used across the workspace; every `match` on it is
//! exhaustive, so adding a family forces every consumer to handle it.
//!
//! | # | Family | Detected by |
//! |---|--------|-------------|
//! | 1 | Electricity | `electricity` + `voltage` |
//! | 2 | AluminiumElectricity | `electricity` + `aluminium` |
//! | 3 | CobaltElectricity | `electricity` + `cobalt` |
//! | 4 | Waste | `municipal solid waste` |
//! | 5 | HeatDistrictNaturalGas | `heat, district or industrial, natural gas` |
//! | 6 | HeatDistrictOther | `heat, district or industrial, other than natural gas` |
//! | 7 | HeatSmallScale | `heat, central or small-scale, other than natural gas` |
//! | 8 | Water | spatialized water elementary flows |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RegioError;

/// A family of country-sensitive inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionFamily {
    /// Grid electricity at high, medium or low voltage.
    Electricity,
    /// Electricity supplied through the aluminium-industry mixes.
    AluminiumElectricity,
    /// Electricity supplied through the cobalt-industry mix.
    CobaltElectricity,
    /// Municipal solid waste treatment.
    Waste,
    /// District or industrial heat from natural gas.
    HeatDistrictNaturalGas,
    /// District or industrial heat from other sources.
    HeatDistrictOther,
    /// Central or small-scale heat from sources other than natural gas.
    HeatSmallScale,
    /// Spatialized water elementary flows.
    Water,
}

/// Total number of substitution families.
pub const SUBSTITUTION_FAMILY_COUNT: usize = 8;

impl SubstitutionFamily {
    /// All families, in the order the substitutor applies them.
    pub fn all() -> &'static [SubstitutionFamily] {
        &[
            Self::AluminiumElectricity,
            Self::CobaltElectricity,
            Self::Electricity,
            Self::Waste,
            Self::HeatDistrictNaturalGas,
            Self::HeatDistrictOther,
            Self::HeatSmallScale,
            Self::Water,
        ]
    }

    /// The snake_case identifier used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::AluminiumElectricity => "aluminium_electricity",
            Self::CobaltElectricity => "cobalt_electricity",
            Self::Waste => "waste",
            Self::HeatDistrictNaturalGas => "heat_district_natural_gas",
            Self::HeatDistrictOther => "heat_district_other",
            Self::HeatSmallScale => "heat_small_scale",
            Self::Water => "water",
        }
    }

    /// Whether this is one of the three electricity families.
    ///
    /// At most one electricity family is substituted per process; the
    /// aluminium and cobalt mixes take precedence over grid electricity.
    pub fn is_electricity(&self) -> bool {
        matches!(
            self,
            Self::Electricity | Self::AluminiumElectricity | Self::CobaltElectricity
        )
    }

    /// Whether this is one of the three heat families.
    pub fn is_heat(&self) -> bool {
        matches!(
            self,
            Self::HeatDistrictNaturalGas | Self::HeatDistrictOther | Self::HeatSmallScale
        )
    }

    /// Whether the family re-sources biosphere rather than technosphere exchanges.
    pub fn is_elementary(&self) -> bool {
        matches!(self, Self::Water)
    }
}

impl std::fmt::Display for SubstitutionFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubstitutionFamily {
    type Err = RegioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| RegioError::UnknownFamily(s.to_string()))
    }
}
