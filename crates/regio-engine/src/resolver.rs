//! # Geography Resolver
//!
//! One fallback chain shared by cloning, input substitution, consumption
//! markets and rewiring. Each caller supplies its own availability set; the
//! chain itself is fixed:
//!
//! 1. **Exact**: the requested geography.
//! 2. **ParentCountry**: for a subdivision (`CA-QC`), its country (`CA`).
//! 3. **MacroRegion**: the configured macro-regions of the geography (then
//!    of its parent country), in configured order.
//! 4. **RestOfWorld**: `RoW`.
//! 5. **Global**: `GLO`.
//! 6. **FirstAvailable**: the smallest available geography. A degraded
//!    assignment, recorded by the caller.
//!
//! Market resolution (consumption partners, rewired consumers) stops after
//! tier 4.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use regio_core::Geography;

use crate::error::ResolutionError;

/// The tier of the chain that produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// The requested geography itself.
    Exact,
    /// The parent country of a subdivision.
    ParentCountry,
    /// A configured macro-region.
    MacroRegion,
    /// The `RoW` aggregate.
    RestOfWorld,
    /// The `GLO` aggregate.
    Global,
    /// Arbitrary pick. Degraded.
    FirstAvailable,
}

impl ResolutionTier {
    /// Whether this tier is a degraded assignment.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::FirstAvailable)
    }

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::ParentCountry => "parent_country",
            Self::MacroRegion => "macro_region",
            Self::RestOfWorld => "rest_of_world",
            Self::Global => "global",
            Self::FirstAvailable => "first_available",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved geography and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The chosen geography.
    pub geography: Geography,
    /// The tier that chose it.
    pub tier: ResolutionTier,
}

impl Resolution {
    /// Whether the resolution fell through to an arbitrary pick.
    pub fn is_degraded(&self) -> bool {
        self.tier.is_degraded()
    }
}

/// The fallback chain over a static macro-region mapping.
#[derive(Debug, Clone, Default)]
pub struct GeographyResolver {
    macro_regions: BTreeMap<Geography, Vec<Geography>>,
}

impl GeographyResolver {
    /// Build a resolver over a country → macro-regions mapping.
    pub fn new(macro_regions: BTreeMap<Geography, Vec<Geography>>) -> Self {
        Self { macro_regions }
    }

    /// The configured macro-regions of `geography`, in order.
    pub fn macro_regions(&self, geography: &Geography) -> &[Geography] {
        self.macro_regions
            .get(geography)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Candidate geographies for `requested`, tiers 1 to 5, in order.
    /// May repeat a geography; the first occurrence wins.
    pub fn candidates(&self, requested: &Geography) -> Vec<(Geography, ResolutionTier)> {
        let mut out = Vec::new();
        let exact_tier = match requested {
            Geography::RestOfWorld => ResolutionTier::RestOfWorld,
            Geography::Global => ResolutionTier::Global,
            _ => ResolutionTier::Exact,
        };
        out.push((requested.clone(), exact_tier));
        let parent = requested.parent_country();
        if let Some(parent) = &parent {
            out.push((parent.clone(), ResolutionTier::ParentCountry));
        }
        out.extend(
            self.macro_regions(requested)
                .iter()
                .chain(parent.iter().flat_map(|p| self.macro_regions(p)))
                .map(|region| (region.clone(), ResolutionTier::MacroRegion)),
        );
        out.push((Geography::RestOfWorld, ResolutionTier::RestOfWorld));
        out.push((Geography::Global, ResolutionTier::Global));
        out
    }

    /// Run the full chain. Fails only when `available` is empty.
    pub fn resolve(
        &self,
        requested: &Geography,
        available: &BTreeSet<Geography>,
    ) -> Result<Resolution, ResolutionError> {
        if let Some(found) = self.first_match(requested, available, ResolutionTier::Global) {
            return Ok(found);
        }
        available
            .iter()
            .next()
            .map(|geography| Resolution {
                geography: geography.clone(),
                tier: ResolutionTier::FirstAvailable,
            })
            .ok_or_else(|| ResolutionError::Exhausted {
                requested: requested.clone(),
            })
    }

    /// Run the market chain (exact, parent, macro-region, `RoW`).
    pub fn resolve_market(
        &self,
        requested: &Geography,
        available: &BTreeSet<Geography>,
    ) -> Result<Resolution, ResolutionError> {
        self.first_match(requested, available, ResolutionTier::RestOfWorld)
            .ok_or_else(|| ResolutionError::Exhausted {
                requested: requested.clone(),
            })
    }

    fn first_match(
        &self,
        requested: &Geography,
        available: &BTreeSet<Geography>,
        last_tier: ResolutionTier,
    ) -> Option<Resolution> {
        self.candidates(requested)
            .into_iter()
            .filter(|(_, tier)| *tier <= last_tier)
            .find(|(geography, _)| available.contains(geography))
            .map(|(geography, tier)| Resolution { geography, tier })
    }
}
