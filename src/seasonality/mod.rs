//! Adaptive seasonal component estimation.
//!
//! This module provides the pieces of an online seasonal estimator:
//! - [`BucketModel`]: regression and residual variance for one interval
//! - [`AdaptiveBucketing`]: a refining partition of the period into buckets
//! - [`PeriodicSpline`]: periodic interpolation through the bucket values
//! - [`SeasonalComponent`]: the add/interpolate/query lifecycle

mod bucket;
mod bucketing;
mod component;
mod config;
mod spline;
mod state;

pub use bucket::{BucketModel, MINIMUM_SAMPLES_TO_PREDICT};
pub use bucketing::AdaptiveBucketing;
pub use component::{Estimate, SeasonalComponent};
pub use config::{SeasonalComponentConfig, DEFAULT_JITTER_SEED, DEFAULT_MAX_SIZE};
pub use spline::{PeriodicSpline, SplineKind};
pub use state::{ComponentState, RngState, SplineState};
