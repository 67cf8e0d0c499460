//! Statistical utility functions and weighted moment accumulators.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use tracing::warn;

/// Weighted running mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanAccumulator {
    count: f64,
    mean: f64,
}

impl MeanAccumulator {
    /// Create an accumulator holding `mean` with weight `count`.
    pub fn from_moments(count: f64, mean: f64) -> Self {
        Self { count, mean }
    }

    /// Add `x` with weight `weight`.
    pub fn add(&mut self, x: f64, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        self.count += weight;
        self.mean += weight / self.count * (x - self.mean);
    }

    /// Combine with another accumulator.
    pub fn merge(&mut self, other: &Self) {
        let count = self.count + other.count;
        if count <= 0.0 {
            return;
        }
        self.mean += other.count / count * (other.mean - self.mean);
        self.count = count;
    }

    /// Multiply the weight by `factor`.
    pub fn age(&mut self, factor: f64) {
        self.count *= factor;
    }

    /// The accumulated weight.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// The weighted mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Whether the weight and mean are finite.
    pub fn is_finite(&self) -> bool {
        self.count.is_finite() && self.mean.is_finite()
    }
}

/// Weighted running mean and (population) variance.
///
/// Ageing scales the weight only, so older information loses influence in
/// later merges without the moments themselves changing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanVarAccumulator {
    count: f64,
    mean: f64,
    variance: f64,
}

impl MeanVarAccumulator {
    /// Create an accumulator from its moments.
    pub fn from_moments(count: f64, mean: f64, variance: f64) -> Self {
        Self {
            count,
            mean,
            variance: variance.max(0.0),
        }
    }

    /// Add `x` with weight `weight`.
    pub fn add(&mut self, x: f64, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        let count = self.count + weight;
        let delta = x - self.mean;
        let mean = self.mean + weight / count * delta;
        self.variance =
            ((self.count * self.variance + weight * delta * (x - mean)) / count).max(0.0);
        self.mean = mean;
        self.count = count;
    }

    /// Combine with another accumulator.
    pub fn merge(&mut self, other: &Self) {
        let count = self.count + other.count;
        if count <= 0.0 {
            return;
        }
        let delta = other.mean - self.mean;
        let mean = self.mean + other.count / count * delta;
        self.variance = ((self.count * self.variance
            + other.count * other.variance
            + delta * delta * self.count * other.count / count)
            / count)
            .max(0.0);
        self.mean = mean;
        self.count = count;
    }

    /// Multiply the weight by `factor`.
    pub fn age(&mut self, factor: f64) {
        self.count *= factor;
    }

    /// A copy with weight multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            count: self.count * factor,
            ..*self
        }
    }

    /// Move the moments a fraction `alpha` of the way toward `mean` and
    /// `variance`.
    pub fn relax_toward(&mut self, mean: f64, variance: f64, alpha: f64) {
        self.mean += alpha * (mean - self.mean);
        self.variance = (self.variance + alpha * (variance - self.variance)).max(0.0);
    }

    /// Whether all moments are finite.
    pub fn is_finite(&self) -> bool {
        self.count.is_finite() && self.mean.is_finite() && self.variance.is_finite()
    }

    /// The accumulated weight.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// The weighted mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// The weighted population variance.
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

/// Quantile of the standard normal distribution.
///
/// Returns `None` if `p` is outside `(0, 1)`.
///
/// # Example
/// ```
/// use anofox_seasonal::utils::normal_quantile;
///
/// // 95% two-sided confidence level -> z ≈ 1.96
/// let z = normal_quantile(0.975).unwrap();
/// assert!((z - 1.96).abs() < 0.01);
/// ```
pub fn normal_quantile(p: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => Some(normal.inverse_cdf(p)),
        Err(error) => {
            warn!(%error, "failed to construct standard normal");
            None
        }
    }
}

/// Quantile of the chi-squared distribution with `degrees_freedom`.
pub fn chi_squared_quantile(degrees_freedom: f64, p: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    match ChiSquared::new(degrees_freedom) {
        Ok(chi) => {
            let q = chi.inverse_cdf(p);
            q.is_finite().then_some(q)
        }
        Err(error) => {
            warn!(%error, degrees_freedom, "failed to construct chi-squared");
            None
        }
    }
}

/// Smooth step from zero (for `x` well below `edge`) to one, over `width`.
pub fn smooth_heaviside(x: f64, edge: f64, width: f64) -> f64 {
    let t = ((x - edge) / width).clamp(-0.5, 0.5) + 0.5;
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_accumulator_weighted() {
        let mut mean = MeanAccumulator::default();
        mean.add(1.0, 1.0);
        mean.add(4.0, 2.0);
        assert_relative_eq!(mean.count(), 3.0);
        assert_relative_eq!(mean.mean(), 3.0, epsilon = 1e-12);

        mean.add(100.0, 0.0);
        assert_relative_eq!(mean.mean(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn mean_var_matches_batch_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut moments = MeanVarAccumulator::default();
        for &v in &values {
            moments.add(v, 1.0);
        }
        assert_relative_eq!(moments.mean(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(moments.variance(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn merge_equals_sequential() {
        let mut left = MeanVarAccumulator::default();
        let mut right = MeanVarAccumulator::default();
        let mut all = MeanVarAccumulator::default();
        for i in 0..10 {
            let x = (i as f64 * 0.7).sin() * 3.0;
            if i < 4 {
                left.add(x, 1.5);
            } else {
                right.add(x, 1.5);
            }
            all.add(x, 1.5);
        }
        left.merge(&right);
        assert_relative_eq!(left.count(), all.count(), epsilon = 1e-12);
        assert_relative_eq!(left.mean(), all.mean(), epsilon = 1e-12);
        assert_relative_eq!(left.variance(), all.variance(), epsilon = 1e-12);
    }

    #[test]
    fn ageing_scales_weight_only() {
        let mut moments = MeanVarAccumulator::from_moments(10.0, 2.0, 3.0);
        moments.age(0.5);
        assert_relative_eq!(moments.count(), 5.0);
        assert_relative_eq!(moments.mean(), 2.0);
        assert_relative_eq!(moments.variance(), 3.0);
    }

    #[test]
    fn relax_toward_target() {
        let mut moments = MeanVarAccumulator::from_moments(1.0, 0.0, 4.0);
        moments.relax_toward(2.0, 2.0, 0.5);
        assert_relative_eq!(moments.mean(), 1.0);
        assert_relative_eq!(moments.variance(), 3.0);
    }

    #[test]
    fn normal_quantile_known_values() {
        assert_relative_eq!(normal_quantile(0.5).unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(normal_quantile(0.975).unwrap(), 1.96, epsilon = 0.01);
        assert_relative_eq!(normal_quantile(0.75).unwrap(), 0.6745, epsilon = 1e-3);
        assert!(normal_quantile(0.0).is_none());
        assert!(normal_quantile(1.0).is_none());
    }

    #[test]
    fn chi_squared_quantile_known_values() {
        // Median of chi-squared(1) ≈ 0.455
        assert_relative_eq!(chi_squared_quantile(1.0, 0.5).unwrap(), 0.4549, epsilon = 1e-3);
        assert!(chi_squared_quantile(0.0, 0.5).is_none());
    }

    #[test]
    fn smooth_heaviside_is_a_step() {
        assert_relative_eq!(smooth_heaviside(0.0, 1.0, 0.5), 0.0);
        assert_relative_eq!(smooth_heaviside(1.0, 1.0, 0.5), 0.5);
        assert_relative_eq!(smooth_heaviside(2.0, 1.0, 0.5), 1.0);
    }
}
