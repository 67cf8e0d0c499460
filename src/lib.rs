//! # anofox-seasonal
//!
//! Online estimation of the seasonal components of streaming time series.
//!
//! A [`SeasonalComponent`](seasonality::SeasonalComponent) learns a periodic
//! function of time from a stream of values using an adaptive bucketing of
//! its period, answers value and variance queries with confidence intervals
//! from periodic splines, forgets old information at a configurable rate and
//! can be persisted and restored exactly.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod error;
pub mod seasonality;
pub mod utils;

pub use error::{Result, SeasonalError};

pub mod prelude {
    pub use crate::core::{PeriodicTime, SeasonalTime, Time, WindowSummary};
    pub use crate::error::{Result, SeasonalError};
    pub use crate::seasonality::{
        AdaptiveBucketing, Estimate, PeriodicSpline, SeasonalComponent, SeasonalComponentConfig,
        SplineKind,
    };
}
