//! # Engine Configuration
//!
//! Everything the engine needs that it does not compute itself: the
//! coverage cutoff, the commodity → HS code table, the country →
//! macro-region mapping, and the per-family parameters of input
//! substitution. Loaded from YAML.
//!
//! ```yaml
//! cutoff: 0.95
//! namespace: regionalized
//! commodities:
//!   steel, low-alloyed: "7207"
//! macro_regions:
//!   DE: [RER, Europe without Switzerland]
//! availability:
//!   electricity: [DE, FR, RER, GLO]
//! market_group_geographies:
//!   electricity: [RER, GLO, US]
//! federated_countries: [CA, US]
//! rewire:
//!   exempt_geographies: [CH]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use regio_core::{CommodityId, Cutoff, Geography, HsCode, Namespace, SubstitutionFamily};
use regio_trade::DomesticMapping;

use crate::error::ConfigError;

/// What to do with a clone when one of its families cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionPolicy {
    /// Keep the clone with the family's original exchanges.
    #[default]
    SkipFamily,
    /// Drop the clone.
    DropProcess,
}

/// Parameters of the second-order rewiring pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewireConfig {
    /// Consumer geographies that are never rewired. A subdivision is
    /// exempt when its parent country is.
    #[serde(default)]
    pub exempt_geographies: BTreeSet<Geography>,
}

impl RewireConfig {
    /// Whether consumers located at `geography` are left untouched.
    pub fn is_exempt(&self, geography: &Geography) -> bool {
        self.exempt_geographies.contains(geography)
            || geography
                .parent_country()
                .is_some_and(|parent| self.exempt_geographies.contains(&parent))
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Fraction of trade volume covered by named geographies.
    pub cutoff: Cutoff,
    /// Destination namespace for the bulk write.
    #[serde(default)]
    pub namespace: Namespace,
    /// Commodity → HS code. Must be one-to-one.
    pub commodities: BTreeMap<CommodityId, HsCode>,
    /// Country → ordered macro-regions, tried in order.
    #[serde(default)]
    pub macro_regions: BTreeMap<Geography, Vec<Geography>>,
    /// Explicit availability per family. Families absent here derive their
    /// availability from the template index.
    #[serde(default)]
    pub availability: BTreeMap<SubstitutionFamily, BTreeSet<Geography>>,
    /// Geographies where a family's supplier is a "market group for"
    /// process rather than a "market for" process.
    #[serde(default)]
    pub market_group_geographies: BTreeMap<SubstitutionFamily, BTreeSet<Geography>>,
    /// Countries whose heat supply is split into sub-national markets.
    #[serde(default)]
    pub federated_countries: BTreeSet<Geography>,
    /// Countries whose district heat weights are corrected by the `GLO`
    /// market's `RoW` share.
    #[serde(default)]
    pub heat_global_correction: BTreeSet<Geography>,
    /// Spatialized water flow base name → compartments it is spatialized for.
    /// Empty disables the water family.
    #[serde(default)]
    pub water_flows: BTreeMap<String, BTreeSet<String>>,
    /// Behavior when a family cannot be resolved.
    #[serde(default)]
    pub substitution_policy: SubstitutionPolicy,
    /// Rewiring parameters.
    #[serde(default)]
    pub rewire: RewireConfig,
    /// Trade geography and sector mapping for the domestic estimate.
    #[serde(default)]
    pub trade: DomesticMapping,
}

impl EngineConfig {
    /// A configuration with the given cutoff and commodities and every
    /// other field at its default.
    pub fn new(cutoff: Cutoff, commodities: BTreeMap<CommodityId, HsCode>) -> Self {
        Self {
            cutoff,
            namespace: Namespace::default(),
            commodities,
            macro_regions: BTreeMap::new(),
            availability: BTreeMap::new(),
            market_group_geographies: BTreeMap::new(),
            federated_countries: BTreeSet::new(),
            heat_global_correction: BTreeSet::new(),
            water_flows: BTreeMap::new(),
            substitution_policy: SubstitutionPolicy::default(),
            rewire: RewireConfig::default(),
            trade: DomesticMapping::default(),
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            commodities = config.commodities.len(),
            cutoff = config.cutoff.value(),
            "loaded engine configuration"
        );
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commodities.is_empty() {
            return Err(ConfigError::Invalid("no commodities configured".into()));
        }
        let mut seen: BTreeMap<&HsCode, &CommodityId> = BTreeMap::new();
        for (commodity, hs) in &self.commodities {
            if let Some(previous) = seen.insert(hs, commodity) {
                return Err(ConfigError::Invalid(format!(
                    "HS code {hs} is mapped to both {previous:?} and {commodity:?}"
                )));
            }
        }
        if let Some(family) = self
            .availability
            .iter()
            .find_map(|(family, set)| set.is_empty().then_some(family))
        {
            return Err(ConfigError::Invalid(format!(
                "availability for {family} is empty"
            )));
        }
        Ok(())
    }

    /// The configured HS code of `commodity`.
    pub fn hs_code(&self, commodity: &CommodityId) -> Option<&HsCode> {
        self.commodities.get(commodity)
    }

    /// Whether `family` prefers a market group at `geography`.
    pub fn prefers_market_group(&self, family: SubstitutionFamily, geography: &Geography) -> bool {
        self.market_group_geographies
            .get(&family)
            .is_some_and(|set| set.contains(geography))
    }
}
