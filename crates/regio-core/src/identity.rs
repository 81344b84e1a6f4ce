//! # Identity Newtypes
//!
//! Newtype wrappers for every identifier the engine handles. You cannot pass
//! a `CommodityId` where an `HsCode` is expected, and a `Unit` is never a
//! bare string that could be compared against an activity name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegioError;

/// Stable identity of a process node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub Uuid);

impl ProcessId {
    /// Generate a new random process identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a name-based identifier from a namespace and role parts.
    ///
    /// The same inputs always produce the same identifier, so a rebuilt
    /// commodity slice reuses the identities of the slice it replaces.
    pub fn derive(namespace: &Namespace, parts: &[&str]) -> Self {
        let mut name = String::with_capacity(64);
        name.push_str(namespace.as_str());
        for part in parts {
            name.push('\u{1f}');
            name.push_str(part);
        }
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "process:{}", self.0)
    }
}

/// Declares a validated, non-empty string newtype.
macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Construct after trimming; rejects empty values.
            pub fn new(value: impl Into<String>) -> Result<Self, RegioError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(RegioError::InvalidIdentifier {
                        kind: $kind,
                        value,
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = RegioError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(
    /// A reference-product identity (e.g. `"steel, low-alloyed"`).
    ///
    /// Every regionalized commodity maps 1:1 onto an [`HsCode`].
    CommodityId,
    "commodity"
);

string_newtype!(
    /// A trade classification code (HS) for a commodity.
    HsCode,
    "hs code"
);

string_newtype!(
    /// A unit of measure (e.g. `"kilogram"`, `"megajoule"`).
    Unit,
    "unit"
);

string_newtype!(
    /// Destination namespace for bulk writes of generated processes.
    Namespace,
    "namespace"
);

impl Default for Namespace {
    fn default() -> Self {
        Self("regionalized".to_string())
    }
}
