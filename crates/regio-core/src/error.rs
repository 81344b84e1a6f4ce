//! # Error Types
//!
//! Errors shared by every crate in the workspace. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations; crate-specific
//! errors (`TradeError`, `StoreError`, `EngineError`, ...) wrap these via
//! `#[from]` where a boundary is crossed.

use thiserror::Error;

/// Top-level error type for foundational operations.
#[derive(Error, Debug)]
pub enum RegioError {
    /// An identifier failed validation (empty, whitespace, bad shape).
    #[error("invalid {kind}: {value:?}")]
    InvalidIdentifier {
        /// Which identifier kind was being constructed.
        kind: &'static str,
        /// The rejected raw value.
        value: String,
    },

    /// A geography code could not be parsed.
    #[error("invalid geography code: {0:?}")]
    InvalidGeography(String),

    /// A coverage cutoff outside (0, 1].
    #[error("cutoff must lie in (0, 1], got {0}")]
    InvalidCutoff(f64),

    /// Unknown substitution family name.
    #[error("unknown substitution family: {0:?}")]
    UnknownFamily(String),

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Timestamp parsing failed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
