//! # Geography
//!
//! A location a process can be placed in: a country (optionally a
//! sub-national subdivision such as `CA-QC`), a broader region (`RER`,
//! `Europe without Switzerland`), or one of the two pseudo-geographies.
//!
//! `RoW` and `GLO` are not trade partners. They are parsed into dedicated
//! variants at the boundary so that aggregation code can match on them
//! instead of comparing strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegioError;

/// Code used for the Rest-of-World aggregate.
pub const REST_OF_WORLD_CODE: &str = "RoW";

/// Code used for the global aggregate.
pub const GLOBAL_CODE: &str = "GLO";

/// A process location.
///
/// Ordering is total and deterministic (variant order, then code), which
/// makes every `BTreeMap<Geography, _>` in the engine iterate identically
/// across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Geography {
    /// A country code, possibly with a subdivision suffix (`CA`, `CA-QC`).
    Country(String),
    /// Any other named area (`RER`, `RAS`, `Europe without Switzerland`).
    Region(String),
    /// The Rest-of-World aggregate.
    RestOfWorld,
    /// The global aggregate.
    Global,
}

impl Geography {
    /// Parse a geography code.
    ///
    /// `RoW` and `GLO` become sentinels; two uppercase letters optionally
    /// followed by `-`-separated alphanumeric segments become a country;
    /// anything else non-empty is a region.
    pub fn parse(code: &str) -> Result<Self, RegioError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(RegioError::InvalidGeography(code.to_string()));
        }
        Ok(match code {
            REST_OF_WORLD_CODE => Self::RestOfWorld,
            GLOBAL_CODE => Self::Global,
            c if is_country_code(c) => Self::Country(c.to_string()),
            c => Self::Region(c.to_string()),
        })
    }

    /// Shorthand for a country geography. Does not validate the shape.
    pub fn country(code: impl Into<String>) -> Self {
        Self::Country(code.into())
    }

    /// Shorthand for a region geography. Does not validate the shape.
    pub fn region(name: impl Into<String>) -> Self {
        Self::Region(name.into())
    }

    /// The code as it appears in data files.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Country(c) | Self::Region(c) => c,
            Self::RestOfWorld => REST_OF_WORLD_CODE,
            Self::Global => GLOBAL_CODE,
        }
    }

    /// Whether this is `RoW` or `GLO`.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::RestOfWorld | Self::Global)
    }

    /// Whether this is a country or a sub-national subdivision.
    pub fn is_country(&self) -> bool {
        matches!(self, Self::Country(_))
    }

    /// Whether this is a sub-national subdivision (`CA-QC`).
    pub fn is_subdivision(&self) -> bool {
        matches!(self, Self::Country(c) if c.contains('-'))
    }

    /// For a subdivision, the country it belongs to (`CA-QC` → `CA`).
    pub fn parent_country(&self) -> Option<Geography> {
        match self {
            Self::Country(c) => c
                .split_once('-')
                .map(|(country, _)| Self::Country(country.to_string())),
            _ => None,
        }
    }

    /// Whether `self` is `country` itself or one of its subdivisions.
    pub fn within_country(&self, country: &Geography) -> bool {
        if self == country {
            return true;
        }
        self.parent_country().as_ref() == Some(country)
    }
}

fn is_country_code(code: &str) -> bool {
    let mut segments = code.split('-');
    let head = match segments.next() {
        Some(h) => h,
        None => return false,
    };
    if head.len() != 2 || !head.chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }
    segments.all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Geography {
    type Err = RegioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Geography {
    type Error = RegioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Geography> for String {
    fn from(value: Geography) -> Self {
        value.as_str().to_string()
    }
}
