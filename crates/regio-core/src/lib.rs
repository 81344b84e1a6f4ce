//! # regio-core: Foundational Types for the Regionalization Engine
//!
//! This crate is the leaf of the workspace DAG. It defines the type-system
//! primitives every other `regio-*` crate builds on, so that geography codes,
//! process identities and substitution families cannot be confused with one
//! another or with bare strings.
//!
//! ## Key Design Principles
//!
//! 1. **Sentinels are variants, not strings.** [`Geography::RestOfWorld`] and
//!    [`Geography::Global`] are explicit enum variants. A trade partner coded
//!    `"RoW"` in raw data is parsed into the sentinel once, at the boundary,
//!    and can never collide with a real ISO country code downstream.
//!
//! 2. **Newtype wrappers for identifiers.** `ProcessId`, `CommodityId`,
//!    `HsCode`, `Unit`, `Namespace`, all validated at construction.
//!
//! 3. **Single `SubstitutionFamily` enum.** One definition of the
//!    country-sensitive input families, exhaustive `match` everywhere.
//!
//! 4. **Deterministic identities.** Generated processes receive name-based
//!    (UUID v5) identifiers derived from their namespace and role, so a
//!    rebuilt commodity slice has the same identities as the one it replaces.
//!
//! 5. **Canonical digests.** Slice fingerprints flow through
//!    [`CanonicalBytes`] (RFC 8785) before hashing.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `regio-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod family;
pub mod geography;
pub mod identity;
pub mod share;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, RegioError};
pub use family::{SubstitutionFamily, SUBSTITUTION_FAMILY_COUNT};
pub use geography::Geography;
pub use identity::{CommodityId, HsCode, Namespace, ProcessId, Unit};
pub use share::{approx_eq, Cutoff, SHARE_TOLERANCE};
pub use temporal::Timestamp;
