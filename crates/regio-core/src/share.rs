//! # Shares and Coverage Cutoff
//!
//! The coverage cutoff `c ∈ (0, 1]` is the fraction of total trade volume
//! that must be covered by named geographies before the remainder folds into
//! `RoW`. It is validated once, at construction.

use serde::{Deserialize, Serialize};

use crate::error::RegioError;

/// Absolute tolerance for share comparisons.
///
/// Cumulative shares are built from normalized floats; `0.5 + 0.3` must be
/// treated as having reached a cutoff of `0.8`.
pub const SHARE_TOLERANCE: f64 = 1e-9;

/// Compare two share values within [`SHARE_TOLERANCE`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= SHARE_TOLERANCE
}

/// A validated coverage cutoff in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Cutoff(f64);

impl Cutoff {
    /// Validate and wrap a cutoff value.
    pub fn new(value: f64) -> Result<Self, RegioError> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(RegioError::InvalidCutoff(value))
        }
    }

    /// The raw fraction.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// The cutoff as a percentage, for provenance comments.
    pub fn percent(&self) -> f64 {
        self.0 * 100.0
    }

    /// Whether a cumulative share has reached this cutoff.
    pub fn is_reached_by(&self, cumulative: f64) -> bool {
        cumulative >= self.0 - SHARE_TOLERANCE
    }
}

impl TryFrom<f64> for Cutoff {
    type Error = RegioError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cutoff> for f64 {
    fn from(value: Cutoff) -> Self {
        value.0
    }
}
