//! A single bucket of the adaptive bucketing.
//!
//! Each bucket covers a contiguous interval of the period and fits a linear
//! regression in (scaled) absolute time through the values which land in it,
//! together with the variance of the values about that regression.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::Time;
use crate::utils::{
    smooth_heaviside, Checksum, CovarianceMatrix, LinearRegression, MeanAccumulator,
    MeanVarAccumulator,
};

/// The effective weight a bucket needs before its fit is trusted.
pub const MINIMUM_SAMPLES_TO_PREDICT: f64 = 3.0;

/// Weighted regression and residual variance for one phase interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketModel {
    start: f64,
    end: f64,
    regression: LinearRegression,
    variance: MeanVarAccumulator,
    centre: MeanAccumulator,
    first_update: Option<Time>,
    last_update: Option<Time>,
    error: MeanAccumulator,
}

impl BucketModel {
    /// Create an empty bucket covering `[start, end)`.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            regression: LinearRegression::default(),
            variance: MeanVarAccumulator::default(),
            centre: MeanAccumulator::default(),
            first_update: None,
            last_update: None,
            error: MeanAccumulator::default(),
        }
    }

    /// The start of the interval.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// The end of the interval.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// The interval length.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `phase` is inside the interval.
    pub fn contains(&self, phase: f64) -> bool {
        phase >= self.start && phase < self.end
    }

    /// The regression through the bucket values.
    pub fn regression(&self) -> &LinearRegression {
        &self.regression
    }

    /// The residual moments about the regression.
    pub fn residuals(&self) -> &MeanVarAccumulator {
        &self.variance
    }

    /// The effective number of samples.
    pub fn count(&self) -> f64 {
        self.regression.count()
    }

    /// The weighted mean phase of the samples, or the interval midpoint if
    /// the bucket is empty.
    pub fn centre(&self) -> f64 {
        if self.centre.count() > 0.0 {
            self.centre.mean().clamp(self.start, self.end)
        } else {
            0.5 * (self.start + self.end)
        }
    }

    /// The time of the earliest sample.
    pub fn first_update(&self) -> Option<Time> {
        self.first_update
    }

    /// The time of the latest sample.
    pub fn last_update(&self) -> Option<Time> {
        self.last_update
    }

    /// Mean squared prediction error of the samples added since the last
    /// refine, with its weight.
    pub fn refine_error(&self) -> &MeanAccumulator {
        &self.error
    }

    pub(crate) fn reset_refine_error(&mut self) {
        self.error = MeanAccumulator::default();
    }

    /// Residual variance about the regression.
    pub fn variance(&self) -> f64 {
        self.variance.variance()
    }

    /// Fold in `value` observed at `time`.
    ///
    /// `phase` is the (possibly jittered) offset into the period and `x` the
    /// regression abscissa of `time`.
    ///
    /// A value whose residual or moments overflow is dropped with a warning,
    /// leaving the bucket unchanged.
    pub fn update(&mut self, phase: f64, x: f64, time: Time, value: f64, weight: f64, period: f64) {
        if weight <= 0.0 {
            return;
        }
        let residual = value - self.predict_mean(x, time, period);
        let squared = residual * residual;
        if !squared.is_finite() {
            warn!(time, value, residual, "ignoring value with overflowing residual");
            return;
        }
        let mut variance = self.variance;
        let mut error = self.error;
        let mut regression = self.regression;
        if self.count() > 0.0 {
            variance.add(residual, weight);
            error.add(squared, weight);
        }
        regression.add(x, value, weight);
        if !(variance.is_finite() && error.is_finite() && regression.is_finite()) {
            warn!(time, value, weight, "ignoring value which overflows bucket moments");
            return;
        }
        self.variance = variance;
        self.error = error;
        self.regression = regression;
        self.centre.add(phase, weight);
        self.first_update = Some(self.first_update.map_or(time, |first| first.min(time)));
        self.last_update = Some(self.last_update.map_or(time, |last| last.max(time)));
    }

    /// Seed from the summary of a window of values.
    pub(crate) fn seed(&mut self, phase: f64, x: f64, time: Time, moments: &MeanVarAccumulator) {
        let count = moments.count();
        if count <= 0.0 {
            return;
        }
        self.regression.add(x, moments.mean(), count);
        self.variance
            .merge(&MeanVarAccumulator::from_moments(count, 0.0, moments.variance()));
        self.centre.add(phase, count);
        self.first_update = Some(self.first_update.map_or(time, |first| first.min(time)));
        self.last_update = Some(self.last_update.map_or(time, |last| last.max(time)));
    }

    /// Multiply all accumulated weight by `factor`.
    pub fn age(&mut self, factor: f64) {
        self.regression.age(factor);
        self.variance.age(factor);
        self.centre.age(factor);
        self.error.age(factor);
    }

    /// The predicted value at abscissa `x` for `time`.
    ///
    /// The slope is only used once the samples span a full period and the
    /// prediction reverts to the bucket mean when extrapolating further than
    /// the observed interval.
    pub fn predict_mean(&self, x: f64, time: Time, period: f64) -> f64 {
        let (first, last) = match (self.first_update, self.last_update) {
            (Some(first), Some(last)) => (first, last),
            _ => return self.regression.mean(),
        };
        let interval = (last - first) as f64;
        if interval < period {
            return self.regression.mean();
        }
        let extrapolation = (time - last).max(first - time).max(0) as f64;
        if extrapolation == 0.0 {
            return self.regression.predict(x);
        }
        let beta = smooth_heaviside(extrapolation / interval, 1.0, 1.0 / 6.0);
        (1.0 - beta) * self.regression.predict(x) + beta * self.regression.mean()
    }

    /// The predicted `(mean, variance)` at abscissa `x` for `time`.
    pub fn predict(&self, x: f64, time: Time, period: f64) -> (f64, f64) {
        (self.predict_mean(x, time, period), self.variance())
    }

    /// Covariance of the regression parameters, with the intercept taken at
    /// `at_x`, or `None` if the bucket has too little data.
    pub fn covariance(&self, at_x: f64) -> Option<CovarianceMatrix> {
        if self.count() < MINIMUM_SAMPLES_TO_PREDICT {
            return None;
        }
        self.regression.parameter_covariance(self.variance(), at_x)
    }

    /// Prediction variance at `x` due to uncertainty in the parameters
    /// fitted up to `last_x`.
    pub fn drift_variance(&self, last_x: f64, x: f64) -> f64 {
        match self.covariance(last_x) {
            Some(covariance) => {
                let t = (x - last_x).max(0.0);
                covariance[0][0] + 2.0 * t * covariance[0][1] + t * t * covariance[1][1]
            }
            None => 0.0,
        }
    }

    /// A copy restricted to `[lo, hi]` with weight in proportion to the
    /// overlap with this bucket.
    ///
    /// The value is moved along `gradient` by the displacement of the centre.
    pub(crate) fn restricted(&self, lo: f64, hi: f64, gradient: f64) -> Self {
        let length = self.length();
        let overlap = (hi.min(self.end) - lo.max(self.start)).max(0.0);
        let factor = if length > 0.0 {
            (overlap / length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let relative = if length > 0.0 {
            ((self.centre() - self.start) / length).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let piece_centre = lo + relative * (hi - lo);
        let mut centre = MeanAccumulator::default();
        centre.add(piece_centre, self.centre.count() * factor);
        let mut regression = self.regression.scaled(factor);
        regression.shift_ordinate(gradient * (piece_centre - self.centre()));
        let mut error = self.error;
        error.age(factor);
        Self {
            start: lo,
            end: hi,
            regression,
            variance: self.variance.scaled(factor),
            centre,
            first_update: self.first_update,
            last_update: self.last_update,
            error,
        }
    }

    /// Combine with `other`, covering the union of the two intervals.
    pub(crate) fn absorb(&mut self, other: &Self) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.regression.merge(&other.regression);
        self.variance.merge(&other.variance);
        self.centre.merge(&other.centre);
        self.error.merge(&other.error);
        self.first_update = min_time(self.first_update, other.first_update);
        self.last_update = max_time(self.last_update, other.last_update);
    }

    pub(crate) fn set_interval(&mut self, start: f64, end: f64) {
        self.start = start;
        self.end = end;
    }

    pub(crate) fn shift_abscissa(&mut self, dx: f64) {
        self.regression.shift_abscissa(dx);
    }

    pub(crate) fn shift_level(&mut self, shift: f64) {
        self.regression.shift_ordinate(shift);
    }

    pub(crate) fn shift_slope(&mut self, shift: f64) {
        self.regression.shift_gradient(shift);
    }

    /// Relax the value and variance a fraction `alpha` toward the population
    /// `mean` and `variance`, shrinking the slope likewise.
    pub(crate) fn mean_revert(&mut self, mean: f64, variance: f64, alpha: f64) {
        if self.count() <= 0.0 {
            return;
        }
        self.regression
            .shift_ordinate(alpha * (mean - self.regression.mean()));
        self.regression.shrink_slope(1.0 - alpha);
        self.variance.relax_toward(0.0, variance, alpha);
    }

    pub(crate) fn checksum(&self, checksum: &mut Checksum) {
        let regression = &self.regression;
        checksum
            .add_f64(self.start)
            .add_f64(self.end)
            .add_f64(regression.count())
            .add_f64(regression.mean_x())
            .add_f64(regression.mean())
            .add_f64(regression.slope())
            .add_f64(self.variance.count())
            .add_f64(self.variance.mean())
            .add_f64(self.variance.variance())
            .add_f64(self.centre.count())
            .add_f64(self.centre.mean())
            .add_i64(self.first_update.unwrap_or(i64::MIN))
            .add_i64(self.last_update.unwrap_or(i64::MIN))
            .add_f64(self.error.count())
            .add_f64(self.error.mean());
    }

    /// Whether every stored number is finite and weights are non-negative.
    pub(crate) fn is_valid(&self) -> bool {
        let regression = &self.regression;
        [
            self.start,
            self.end,
            regression.count(),
            regression.mean_x(),
            regression.mean(),
            regression.slope(),
            self.variance.count(),
            self.variance.mean(),
            self.variance.variance(),
            self.centre.count(),
            self.centre.mean(),
            self.error.count(),
            self.error.mean(),
        ]
        .iter()
        .all(|v| v.is_finite())
            && self.start < self.end
            && regression.count() >= 0.0
            && self.variance.count() >= 0.0
            && self.centre.count() >= 0.0
    }
}

fn min_time(a: Option<Time>, b: Option<Time>) -> Option<Time> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_time(a: Option<Time>, b: Option<Time>) -> Option<Time> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
