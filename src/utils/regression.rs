//! Online weighted least squares for a single regressor.
//!
//! The regression keeps weighted first and second moments of `(x, y)` so
//! samples can be folded in one at a time, aged, merged and shifted without
//! retaining them.

use serde::{Deserialize, Serialize};

/// Symmetric 2x2 covariance matrix of `(intercept, slope)`.
pub type CovarianceMatrix = [[f64; 2]; 2];

/// Relative abscissa variance below which the slope is not identifiable.
const MIN_RELATIVE_ABSCISSA_VARIANCE: f64 = 1e-10;

/// Online weighted fit of `y = a + b x`.
///
/// # Example
/// ```
/// use anofox_seasonal::utils::LinearRegression;
///
/// let mut regression = LinearRegression::default();
/// for i in 0..5 {
///     let x = i as f64;
///     regression.add(x, 2.0 + 3.0 * x, 1.0);
/// }
/// assert!((regression.slope() - 3.0).abs() < 1e-9);
/// assert!((regression.predict(10.0) - 32.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    count: f64,
    mean_x: f64,
    mean_y: f64,
    var_x: f64,
    cov_xy: f64,
}

impl LinearRegression {
    /// Add the point `(x, y)` with weight `weight`.
    pub fn add(&mut self, x: f64, y: f64, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        let count = self.count + weight;
        let dx = x - self.mean_x;
        let mean_x = self.mean_x + weight / count * dx;
        let mean_y = self.mean_y + weight / count * (y - self.mean_y);
        self.var_x = ((self.count * self.var_x + weight * dx * (x - mean_x)) / count).max(0.0);
        self.cov_xy = (self.count * self.cov_xy + weight * dx * (y - mean_y)) / count;
        self.mean_x = mean_x;
        self.mean_y = mean_y;
        self.count = count;
    }

    /// Combine with the regression of a disjoint sample.
    pub fn merge(&mut self, other: &Self) {
        let count = self.count + other.count;
        if count <= 0.0 {
            return;
        }
        let dx = other.mean_x - self.mean_x;
        let dy = other.mean_y - self.mean_y;
        let cross = self.count * other.count / count;
        self.var_x = ((self.count * self.var_x + other.count * other.var_x + dx * dx * cross)
            / count)
            .max(0.0);
        self.cov_xy =
            (self.count * self.cov_xy + other.count * other.cov_xy + dx * dy * cross) / count;
        self.mean_x += other.count / count * dx;
        self.mean_y += other.count / count * dy;
        self.count = count;
    }

    /// Multiply the weight by `factor`; the fitted line is unchanged.
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

    /// The accumulated weight.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// The weighted mean of the ordinates.
    pub fn mean(&self) -> f64 {
        self.mean_y
    }

    /// The weighted mean of the abscissas.
    pub fn mean_x(&self) -> f64 {
        self.mean_x
    }

    /// Whether all moments are finite.
    pub fn is_finite(&self) -> bool {
        [self.count, self.mean_x, self.mean_y, self.var_x, self.cov_xy]
            .iter()
            .all(|moment| moment.is_finite())
    }

    /// Whether the abscissas are spread enough to estimate a slope.
    pub fn has_slope(&self) -> bool {
        self.count > 0.0
            && self.var_x
                > MIN_RELATIVE_ABSCISSA_VARIANCE * (1.0 + self.mean_x * self.mean_x)
    }

    /// The fitted slope, zero if it is not identifiable.
    pub fn slope(&self) -> f64 {
        if self.has_slope() {
            self.cov_xy / self.var_x
        } else {
            0.0
        }
    }

    /// The fitted value at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.mean_y + self.slope() * (x - self.mean_x)
    }

    /// Translate all abscissas by `dx`.
    pub fn shift_abscissa(&mut self, dx: f64) {
        self.mean_x += dx;
    }

    /// Translate all ordinates by `dy`.
    pub fn shift_ordinate(&mut self, dy: f64) {
        self.mean_y += dy;
    }

    /// Add `db * x` to every ordinate.
    pub fn shift_gradient(&mut self, db: f64) {
        self.mean_y += db * self.mean_x;
        self.cov_xy += db * self.var_x;
    }

    /// Shrink the slope by `factor`.
    pub fn shrink_slope(&mut self, factor: f64) {
        self.cov_xy *= factor;
    }

    /// Covariance of `(intercept at at_x, slope)` for residual variance
    /// `noise_variance`.
    ///
    /// The slope variance is zero when the slope is not identifiable.
    pub fn parameter_covariance(&self, noise_variance: f64, at_x: f64) -> Option<CovarianceMatrix> {
        if self.count <= 0.0 {
            return None;
        }
        let noise_variance = noise_variance.max(0.0);
        let var_mean = noise_variance / self.count;
        if !self.has_slope() {
            return Some([[var_mean, 0.0], [0.0, 0.0]]);
        }
        let var_slope = noise_variance / (self.count * self.var_x);
        let d = at_x - self.mean_x;
        let cov = d * var_slope;
        Some([[var_mean + d * d * var_slope, cov], [cov, var_slope]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fit(points: &[(f64, f64)]) -> LinearRegression {
        let mut regression = LinearRegression::default();
        for &(x, y) in points {
            regression.add(x, y, 1.0);
        }
        regression
    }

    #[test]
    fn fits_simple_line() {
        // y = 2 + 3x
        let regression = fit(&[(1.0, 5.0), (2.0, 8.0), (3.0, 11.0), (4.0, 14.0), (5.0, 17.0)]);
        assert_relative_eq!(regression.slope(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(regression.predict(0.0), 2.0, epsilon = 1e-9);
        assert_relative_eq!(regression.mean(), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn single_abscissa_has_no_slope() {
        let regression = fit(&[(1.0, 5.0), (1.0, 7.0)]);
        assert!(!regression.has_slope());
        assert_eq!(regression.slope(), 0.0);
        assert_relative_eq!(regression.predict(100.0), 6.0);
    }

    #[test]
    fn merge_equals_sequential() {
        let points: Vec<(f64, f64)> = (0..12)
            .map(|i| (i as f64 * 0.5, 1.0 + 0.3 * i as f64 + (i as f64).sin()))
            .collect();
        let mut left = fit(&points[..5]);
        let right = fit(&points[5..]);
        let all = fit(&points);
        left.merge(&right);
        assert_relative_eq!(left.count(), all.count(), epsilon = 1e-12);
        assert_relative_eq!(left.slope(), all.slope(), epsilon = 1e-9);
        assert_relative_eq!(left.predict(3.0), all.predict(3.0), epsilon = 1e-9);
    }

    #[test]
    fn ageing_keeps_coefficients() {
        let mut regression = fit(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]);
        let slope = regression.slope();
        regression.age(0.1);
        assert_relative_eq!(regression.count(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(regression.slope(), slope, epsilon = 1e-12);
    }

    #[test]
    fn shifts_translate_predictions() {
        let mut regression = fit(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]);
        let before = regression.predict(1.5);

        regression.shift_abscissa(10.0);
        assert_relative_eq!(regression.predict(11.5), before, epsilon = 1e-9);

        regression.shift_ordinate(2.0);
        assert_relative_eq!(regression.predict(11.5), before + 2.0, epsilon = 1e-9);

        let slope = regression.slope();
        let at = regression.predict(11.5);
        regression.shift_gradient(0.5);
        assert_relative_eq!(regression.slope(), slope + 0.5, epsilon = 1e-9);
        assert_relative_eq!(regression.predict(11.5), at + 0.5 * 11.5, epsilon = 1e-9);
    }

    #[test]
    fn parameter_covariance_of_centred_intercept() {
        let regression = fit(&[(-1.0, 0.0), (0.0, 0.0), (1.0, 0.0)]);
        let covariance = regression.parameter_covariance(3.0, 0.0).unwrap();
        // var(mean) = 3 / 3, var(slope) = 3 / (3 * 2/3)
        assert_relative_eq!(covariance[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(covariance[1][1], 1.5, epsilon = 1e-12);
        assert_relative_eq!(covariance[0][1], 0.0, epsilon = 1e-12);

        let shifted = regression.parameter_covariance(3.0, 2.0).unwrap();
        assert_relative_eq!(shifted[0][0], 1.0 + 4.0 * 1.5, epsilon = 1e-12);
        assert_relative_eq!(shifted[0][1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(shifted[1][0], shifted[0][1]);
    }

    #[test]
    fn empty_regression_has_no_covariance() {
        assert!(LinearRegression::default()
            .parameter_covariance(1.0, 0.0)
            .is_none());
    }
}
