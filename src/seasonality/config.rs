//! Configuration of a seasonal component.

use serde::{Deserialize, Serialize};

use super::spline::SplineKind;
use crate::error::{Result, SeasonalError};

/// Default maximum number of buckets.
pub const DEFAULT_MAX_SIZE: usize = 36;

/// Default seed of the phase jitter generator.
pub const DEFAULT_JITTER_SEED: u64 = 0x5EA5_0A1C;

/// Seasonal component configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponentConfig {
    /// Maximum number of buckets
    pub max_size: usize,
    /// Rate at which old values are forgotten, per second
    pub decay_rate: f64,
    /// Smallest permitted bucket length, in seconds
    pub minimum_bucket_length: f64,
    /// Interpolation used for the value spline
    pub value_interpolation: SplineKind,
    /// Interpolation used for the variance spline
    pub variance_interpolation: SplineKind,
    /// Seed of the phase jitter generator
    pub jitter_seed: u64,
}

impl Default for SeasonalComponentConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            decay_rate: 0.0,
            minimum_bucket_length: 0.0,
            value_interpolation: SplineKind::Cubic,
            variance_interpolation: SplineKind::Linear,
            jitter_seed: DEFAULT_JITTER_SEED,
        }
    }
}

impl SeasonalComponentConfig {
    /// Set the maximum number of buckets.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the decay rate.
    pub fn with_decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    /// Set the minimum bucket length.
    pub fn with_minimum_bucket_length(mut self, length: f64) -> Self {
        self.minimum_bucket_length = length;
        self
    }

    /// Set the value spline interpolation.
    pub fn with_value_interpolation(mut self, kind: SplineKind) -> Self {
        self.value_interpolation = kind;
        self
    }

    /// Set the variance spline interpolation.
    pub fn with_variance_interpolation(mut self, kind: SplineKind) -> Self {
        self.variance_interpolation = kind;
        self
    }

    /// Set the jitter seed.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = seed;
        self
    }

    /// Check the configuration is usable for a component with `period`.
    pub fn validate(&self, period: f64) -> Result<()> {
        if self.max_size == 0 {
            return Err(SeasonalError::InvalidParameter(
                "max_size must be at least 1".into(),
            ));
        }
        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return Err(SeasonalError::InvalidParameter(format!(
                "decay_rate must be finite and non-negative, got {}",
                self.decay_rate
            )));
        }
        if !self.minimum_bucket_length.is_finite() || self.minimum_bucket_length < 0.0 {
            return Err(SeasonalError::InvalidParameter(format!(
                "minimum_bucket_length must be finite and non-negative, got {}",
                self.minimum_bucket_length
            )));
        }
        if !period.is_finite() || period <= 0.0 {
            return Err(SeasonalError::InvalidParameter(format!(
                "period must be positive, got {period}"
            )));
        }
        if period < self.minimum_bucket_length {
            return Err(SeasonalError::InvalidParameter(format!(
                "period {period} is shorter than the minimum bucket length {}",
                self.minimum_bucket_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SeasonalComponentConfig::default();
        assert_eq!(config.max_size, 36);
        assert_eq!(config.value_interpolation, SplineKind::Cubic);
        assert_eq!(config.variance_interpolation, SplineKind::Linear);
        assert!(config.validate(86_400.0).is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = SeasonalComponentConfig::default()
            .with_max_size(24)
            .with_decay_rate(0.001)
            .with_minimum_bucket_length(600.0)
            .with_value_interpolation(SplineKind::Linear)
            .with_jitter_seed(1);
        assert_eq!(config.max_size, 24);
        assert_eq!(config.decay_rate, 0.001);
        assert_eq!(config.minimum_bucket_length, 600.0);
        assert_eq!(config.value_interpolation, SplineKind::Linear);
        assert_eq!(config.jitter_seed, 1);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let base = SeasonalComponentConfig::default();
        assert!(base.clone().with_max_size(0).validate(100.0).is_err());
        assert!(base.clone().with_decay_rate(-1.0).validate(100.0).is_err());
        assert!(base.clone().with_decay_rate(f64::INFINITY).validate(100.0).is_err());
        assert!(base
            .clone()
            .with_minimum_bucket_length(f64::NAN)
            .validate(100.0)
            .is_err());
        assert!(base.clone().validate(0.0).is_err());
        assert!(base
            .with_minimum_bucket_length(200.0)
            .validate(100.0)
            .is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = SeasonalComponentConfig::default().with_max_size(12);
        let json = serde_json::to_string(&config).unwrap();
        let restored: SeasonalComponentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
