//! Numeric utilities shared by the seasonal estimators.

pub mod checksum;
pub mod regression;
pub mod stats;

pub use checksum::Checksum;
pub use regression::{CovarianceMatrix, LinearRegression};
pub use stats::{
    chi_squared_quantile, normal_quantile, smooth_heaviside, MeanAccumulator, MeanVarAccumulator,
};
