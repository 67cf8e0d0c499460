//! The persisted state document of a seasonal component.
//!
//! The document is a tree of named fields. Fields which are not recognized
//! are skipped on restore and any missing field fails it. Buckets are stored
//! in boundary order so a restored component checksums identically.

use serde::{Deserialize, Serialize};

use super::bucketing::AdaptiveBucketing;
use super::spline::{PeriodicSpline, SplineKind};
use crate::error::{Result, SeasonalError};

/// Position of the jitter generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    /// The seed the generator was created from.
    pub seed: u64,
    /// The number of 32-bit words consumed since seeding.
    pub word_pos: u64,
}

/// The knots of a fitted spline.
///
/// Only the knots are stored; the spline is refitted on restore, which is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineState {
    /// Requested interpolation style.
    pub kind: SplineKind,
    /// Knot phases.
    pub knots: Vec<f64>,
    /// Knot values.
    pub values: Vec<f64>,
}

impl SplineState {
    /// Capture the knots of `spline`.
    pub fn from_spline(spline: &PeriodicSpline) -> Self {
        Self {
            kind: spline.kind(),
            knots: spline.knots().to_vec(),
            values: spline.values().to_vec(),
        }
    }

    /// Refit the spline over `period`, checking the knots are usable.
    pub fn to_spline(&self, period: f64) -> Result<PeriodicSpline> {
        if self.knots.len() != self.values.len() {
            return Err(SeasonalError::MalformedState(format!(
                "{} spline knots but {} values",
                self.knots.len(),
                self.values.len()
            )));
        }
        if !self.values.iter().all(|v| v.is_finite()) {
            return Err(SeasonalError::MalformedState(
                "spline values must be finite".into(),
            ));
        }
        if !self.knots.iter().all(|&k| k.is_finite() && (0.0..=period).contains(&k))
            || self.knots.windows(2).any(|pair| pair[0] >= pair[1])
        {
            return Err(SeasonalError::MalformedState(
                "spline knots must be increasing and inside the period".into(),
            ));
        }
        Ok(PeriodicSpline::fit(period, &self.knots, &self.values, self.kind))
    }
}

/// Everything needed to resume a seasonal component exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    /// Jitter generator position.
    pub rng: RngState,
    /// Bucket boundaries and statistics.
    pub bucketing: AdaptiveBucketing,
    /// Knots of the value spline.
    pub value_spline: SplineState,
    /// Knots of the variance spline.
    pub variance_spline: SplineState,
}
