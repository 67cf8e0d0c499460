//! Online estimate of one seasonal component of a time series.
//!
//! A [`SeasonalComponent`] adds values into an [`AdaptiveBucketing`] of its
//! period and answers queries from periodic splines through the bucket
//! values and variances. The splines are only rebuilt by
//! [`SeasonalComponent::interpolate`], so callers should batch many
//! [`SeasonalComponent::add`] calls between interpolations. Queries in the
//! meantime are answered from the last interpolation.
//!
//! Added phases are jittered by up to half the minimum bucket length using a
//! seeded counter-based generator, so values arriving at exactly the same
//! offset do not pile up on one side of a bucket boundary.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Triangular};
use serde::Deserialize;
use tracing::{debug, warn};

use super::bucket::MINIMUM_SAMPLES_TO_PREDICT;
use super::bucketing::AdaptiveBucketing;
use super::config::SeasonalComponentConfig;
use super::spline::PeriodicSpline;
use super::state::{ComponentState, RngState, SplineState};
use crate::core::{SeasonalTime, Time, WindowSummary};
use crate::error::{Result, SeasonalError};
use crate::utils::{chi_squared_quantile, normal_quantile, Checksum, CovarianceMatrix};

/// Largest confidence percentage used for interval widths.
const MAX_CONFIDENCE: f64 = 99.999_999;

/// A point estimate with a symmetric confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Estimate {
    /// The point estimate.
    pub mean: f64,
    /// Half the width of the confidence interval.
    pub half_width: f64,
}

impl Estimate {
    /// The lower end of the confidence interval.
    pub fn lower(&self) -> f64 {
        self.mean - self.half_width
    }

    /// The upper end of the confidence interval.
    pub fn upper(&self) -> f64 {
        self.mean + self.half_width
    }
}

/// Estimates a periodic function of time from a stream of values.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use anofox_seasonal::core::{PeriodicTime, WindowSummary, DAY};
/// use anofox_seasonal::seasonality::{SeasonalComponent, SeasonalComponentConfig};
///
/// let time = Arc::new(PeriodicTime::new(DAY));
/// let config = SeasonalComponentConfig::default().with_max_size(24);
/// let mut component = SeasonalComponent::new(time, config).unwrap();
///
/// let windows: Vec<WindowSummary> = (0..24)
///     .map(|h| WindowSummary::from_values(h * 3600, (h + 1) * 3600, &[10.0, 10.0]))
///     .collect();
/// component.initialize(0, DAY, &windows).unwrap();
///
/// for t in (DAY..3 * DAY).step_by(300) {
///     component.add(t, 10.0, 1.0);
/// }
/// component.interpolate(3 * DAY, true);
/// assert!((component.value(3 * DAY + 3600, 95.0).mean - 10.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct SeasonalComponent {
    time: Arc<dyn SeasonalTime>,
    config: SeasonalComponentConfig,
    rng: ChaCha8Rng,
    bucketing: AdaptiveBucketing,
    value_spline: PeriodicSpline,
    variance_spline: PeriodicSpline,
}

impl SeasonalComponent {
    /// Create an uninitialized component for the period of `time`.
    ///
    /// # Errors
    /// Returns [`SeasonalError::InvalidParameter`] if `config` is not valid
    /// for the period.
    pub fn new(time: Arc<dyn SeasonalTime>, config: SeasonalComponentConfig) -> Result<Self> {
        let period = time.period() as f64;
        config.validate(period)?;
        let bucketing = AdaptiveBucketing::new(
            period,
            config.max_size,
            config.decay_rate,
            config.minimum_bucket_length,
            time.regression_time_scale() as f64,
        )?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.jitter_seed),
            value_spline: PeriodicSpline::fit(period, &[], &[], config.value_interpolation),
            variance_spline: PeriodicSpline::fit(period, &[], &[], config.variance_interpolation),
            time,
            config,
            bucketing,
        })
    }

    /// Create a component from a document written by [`Self::persist`].
    pub fn from_state(time: Arc<dyn SeasonalTime>, document: &serde_json::Value) -> Result<Self> {
        let state = parse_state(document)?;
        let config = SeasonalComponentConfig {
            max_size: state.bucketing.max_size(),
            decay_rate: state.bucketing.decay_rate(),
            minimum_bucket_length: state.bucketing.minimum_bucket_length(),
            value_interpolation: state.value_spline.kind,
            variance_interpolation: state.variance_spline.kind,
            jitter_seed: state.rng.seed,
        };
        let mut component = Self::new(time, config)?;
        component.apply(state)?;
        Ok(component)
    }

    /// Whether the component has been initialized or restored.
    pub fn initialized(&self) -> bool {
        self.bucketing.initialized()
    }

    /// Create the buckets and seed them from summaries of the values seen in
    /// `[start_time, end_time)`.
    ///
    /// On failure the component is left as it was.
    pub fn initialize(
        &mut self,
        start_time: Time,
        end_time: Time,
        summaries: &[WindowSummary],
    ) -> Result<()> {
        self.bucketing
            .initialize(start_time, end_time, summaries, self.time.as_ref())?;
        self.interpolate(end_time, false);
        Ok(())
    }

    /// The number of buckets.
    pub fn size(&self) -> usize {
        self.bucketing.len()
    }

    /// Reset to the uninitialized state.
    ///
    /// The jitter generator restarts from the configured seed, so a cleared
    /// component matches a newly constructed one.
    pub fn clear(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.jitter_seed);
        self.bucketing.clear();
        self.value_spline.clear();
        self.variance_spline.clear();
    }

    /// Re-anchor the regression time origin at `time`.
    pub fn shift_origin(&mut self, time: Time) {
        self.bucketing.shift_origin(time);
    }

    /// Add `shift` to the component's values.
    pub fn shift_level(&mut self, shift: f64) {
        self.bucketing.shift_level(shift);
        let values: Vec<f64> = self.value_spline.values().iter().map(|v| v + shift).collect();
        self.value_spline = PeriodicSpline::fit(
            self.period(),
            self.value_spline.knots(),
            &values,
            self.value_spline.kind(),
        );
    }

    /// Add `shift` to the component's slope.
    pub fn shift_slope(&mut self, shift: f64) {
        self.bucketing.shift_slope(shift);
    }

    /// Add `value` observed at `time` with `weight`.
    ///
    /// Non-finite values, non-positive weights and times outside the time
    /// provider's window are ignored.
    pub fn add(&mut self, time: Time, value: f64, weight: f64) {
        if !value.is_finite() || !weight.is_finite() {
            warn!(time, value, weight, "ignoring non-finite value");
            return;
        }
        if weight <= 0.0 || !self.initialized() || !self.time.in_window(time) {
            return;
        }
        let phase = self.jitter(self.time.phase(time).value);
        self.bucketing.add(phase, time, value, weight);
    }

    fn jitter(&mut self, phase: f64) -> f64 {
        let half_width = 0.5 * self.bucketing.minimum_bucket_length();
        if half_width <= 0.0 {
            return phase;
        }
        match Triangular::new(-half_width, half_width, 0.0) {
            Ok(distribution) => {
                let offset = distribution.sample(&mut self.rng);
                (phase + offset).rem_euclid(self.period())
            }
            Err(error) => {
                warn!(%error, half_width, "invalid jitter distribution");
                phase
            }
        }
    }

    /// Rebuild the splines from the bucket values at `time`, first refining
    /// the bucketing if `refine` is set.
    pub fn interpolate(&mut self, time: Time, refine: bool) {
        if !self.initialized() {
            return;
        }
        if refine {
            self.bucketing.refine(time);
        }
        let (knots, values, variances) = self.bucketing.knots(time);
        let period = self.period();
        self.value_spline =
            PeriodicSpline::fit(period, &knots, &values, self.config.value_interpolation);
        self.variance_spline =
            PeriodicSpline::fit(period, &knots, &variances, self.config.variance_interpolation);
        debug!(time, knots = knots.len(), "interpolated seasonal component");
    }

    /// The rate at which information is forgotten.
    pub fn decay_rate(&self) -> f64 {
        self.bucketing.decay_rate()
    }

    /// Change the rate at which information is forgotten.
    pub fn set_decay_rate(&mut self, decay_rate: f64) {
        self.bucketing.set_decay_rate(decay_rate);
        self.config.decay_rate = self.bucketing.decay_rate();
    }

    /// Age the component to account for `elapsed` seconds.
    ///
    /// With `mean_revert` the bucket values and boundaries also relax back
    /// toward the uninformed state.
    pub fn propagate_forwards_by_time(&mut self, elapsed: f64, mean_revert: bool) {
        self.bucketing.propagate_forwards_by_time(elapsed, mean_revert);
    }

    /// The time provider.
    pub fn time(&self) -> &Arc<dyn SeasonalTime> {
        &self.time
    }

    /// The configuration the component was created with.
    pub fn config(&self) -> &SeasonalComponentConfig {
        &self.config
    }

    /// The bucketing of the period.
    pub fn bucketing(&self) -> &AdaptiveBucketing {
        &self.bucketing
    }

    /// The value spline of the last interpolation.
    pub fn value_spline(&self) -> &PeriodicSpline {
        &self.value_spline
    }

    /// The variance spline of the last interpolation.
    pub fn variance_spline(&self) -> &PeriodicSpline {
        &self.variance_spline
    }

    fn period(&self) -> f64 {
        self.bucketing.period()
    }

    fn phase(&self, time: Time) -> f64 {
        self.time.phase(time).value
    }

    /// The component value at `time` with a `confidence` percent interval.
    ///
    /// The interval combines the residual variance, scaled by the weight of
    /// the owning bucket, with the parameter drift variance.
    pub fn value(&self, time: Time, confidence: f64) -> Estimate {
        if !self.initialized() || !self.value_spline.is_fitted() {
            return Estimate::default();
        }
        let phase = self.phase(time);
        let mean = self.value_spline.evaluate(phase);
        let confidence = confidence.clamp(0.0, MAX_CONFIDENCE);
        if confidence <= 0.0 {
            return Estimate { mean, half_width: 0.0 };
        }
        let n = self.bucketing.count_at(phase).max(1.0);
        let variance = self.variance_spline.evaluate(phase).max(0.0);
        let drift = self.variance_due_to_parameter_drift(time);
        let z = normal_quantile((100.0 + confidence) / 200.0).unwrap_or(0.0);
        Estimate {
            mean,
            half_width: z * (variance / n + drift).sqrt(),
        }
    }

    /// The mean of the component over its period.
    pub fn mean_value(&self) -> f64 {
        if self.value_spline.is_fitted() {
            self.value_spline.mean()
        } else {
            self.bucketing.mean_value()
        }
    }

    /// The sum over the repeats of `period` in the component's period of
    /// the difference between the value at `time` and the mean.
    ///
    /// Returns zero unless `period` divides the component's period.
    pub fn difference_from_mean(&self, time: Time, period: Time) -> f64 {
        let total = self.time.period();
        if !self.value_spline.is_fitted() || period <= 0 || total % period != 0 {
            return 0.0;
        }
        let mean = self.value_spline.mean();
        (0..total / period)
            .map(|k| self.value_spline.evaluate(self.phase(time + k * period)) - mean)
            .sum()
    }

    /// The residual variance at `time` with a `confidence` percent interval.
    pub fn variance(&self, time: Time, confidence: f64) -> Estimate {
        if !self.initialized() || !self.variance_spline.is_fitted() {
            return Estimate::default();
        }
        let phase = self.phase(time);
        let mean = self.variance_spline.evaluate(phase).max(0.0);
        let confidence = confidence.clamp(0.0, MAX_CONFIDENCE);
        if confidence <= 0.0 {
            return Estimate { mean, half_width: 0.0 };
        }
        let degrees_freedom = self.bucketing.count_at(phase).max(2.0) - 1.0;
        let lower = chi_squared_quantile(degrees_freedom, (100.0 - confidence) / 200.0);
        let upper = chi_squared_quantile(degrees_freedom, (100.0 + confidence) / 200.0);
        let half_width = match (lower, upper) {
            (Some(lower), Some(upper)) => 0.5 * (upper - lower) * mean / degrees_freedom,
            _ => 0.0,
        };
        Estimate { mean, half_width }
    }

    /// The mean of the residual variance over the period.
    pub fn mean_variance(&self) -> f64 {
        if self.variance_spline.is_fitted() {
            self.variance_spline.mean()
        } else {
            self.bucketing.mean_variance()
        }
    }

    /// The largest ratio of a bucket residual variance to the mean residual
    /// variance.
    ///
    /// Both are read from the current buckets rather than the variance
    /// spline, so the ratio is 1 for a single bucket.
    pub fn heteroscedasticity(&self) -> f64 {
        let mean = self.bucketing.mean_variance();
        if !self.initialized() || mean <= 0.0 {
            return 1.0;
        }
        self.bucketing
            .buckets()
            .iter()
            .filter(|bucket| bucket.count() > 0.0)
            .map(|bucket| bucket.variance() / mean)
            .fold(1.0, f64::max)
    }

    /// The variance added to a prediction at `time` by drift in the owning
    /// bucket's regression parameters since its last update.
    pub fn variance_due_to_parameter_drift(&self, time: Time) -> f64 {
        let Some(bucket) = self.bucketing.bucket_at(self.phase(time)) else {
            return 0.0;
        };
        let Some(last_update) = bucket.last_update() else {
            return 0.0;
        };
        bucket.drift_variance(
            self.bucketing.regression_time(last_update),
            self.bucketing.regression_time(time),
        )
    }

    /// The covariance of the owning bucket's regression parameters at
    /// `time`, or `None` if the bucket has too little data.
    pub fn covariances(&self, time: Time) -> Option<CovarianceMatrix> {
        let bucket = self.bucketing.bucket_at(self.phase(time))?;
        bucket.covariance(self.bucketing.regression_time(time))
    }

    /// The common slope of the bucket regressions.
    pub fn slope(&self) -> f64 {
        self.bucketing.slope()
    }

    /// Whether the bucket owning `time` has enough data to predict.
    pub fn sufficient_history_to_predict(&self, time: Time) -> bool {
        self.bucketing.count_at(self.phase(time)) >= MINIMUM_SAMPLES_TO_PREDICT
    }

    /// A checksum of the persisted state, chained from `seed`.
    pub fn checksum(&self, seed: u64) -> u64 {
        let word_pos = self.rng.get_word_pos();
        let mut checksum = Checksum::new(seed);
        checksum
            .add_tag("rng")
            .add_u64(self.config.jitter_seed)
            .add_u64((word_pos >> 64) as u64)
            .add_u64(word_pos as u64);
        self.bucketing.checksum(&mut checksum);
        checksum.add_tag("value_spline");
        self.value_spline.checksum(&mut checksum);
        checksum.add_tag("variance_spline");
        self.variance_spline.checksum(&mut checksum);
        checksum.finish()
    }

    /// Approximate memory used by the component, in bytes.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.bucketing.memory_usage()
            + self.value_spline.memory_usage()
            + self.variance_spline.memory_usage()
    }

    /// The state needed to resume this component exactly.
    pub fn state(&self) -> Result<ComponentState> {
        let word_pos = u64::try_from(self.rng.get_word_pos()).map_err(|_| {
            SeasonalError::MalformedState("jitter generator position overflows".into())
        })?;
        Ok(ComponentState {
            rng: RngState {
                seed: self.config.jitter_seed,
                word_pos,
            },
            bucketing: self.bucketing.clone(),
            value_spline: SplineState::from_spline(&self.value_spline),
            variance_spline: SplineState::from_spline(&self.variance_spline),
        })
    }

    /// Write the state to a JSON document.
    pub fn persist(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.state()?)
            .map_err(|error| SeasonalError::MalformedState(error.to_string()))
    }

    /// Replace the state with one read from `document`.
    ///
    /// If the document is malformed the component is cleared and an error
    /// returned.
    pub fn restore(&mut self, document: &serde_json::Value) -> Result<()> {
        let result = parse_state(document).and_then(|state| self.apply(state));
        if let Err(error) = &result {
            warn!(%error, "failed to restore seasonal component");
            self.clear();
        }
        result
    }

    fn apply(&mut self, state: ComponentState) -> Result<()> {
        state.bucketing.validate()?;
        let period = self.time.period() as f64;
        if state.bucketing.period() != period {
            return Err(SeasonalError::MalformedState(format!(
                "state period {} does not match time provider period {period}",
                state.bucketing.period()
            )));
        }
        if state.bucketing.time_scale() != self.time.regression_time_scale() as f64 {
            return Err(SeasonalError::MalformedState(
                "state regression time scale does not match time provider".into(),
            ));
        }
        let value_spline = state.value_spline.to_spline(period)?;
        let variance_spline = state.variance_spline.to_spline(period)?;

        let mut rng = ChaCha8Rng::seed_from_u64(state.rng.seed);
        rng.set_word_pos(u128::from(state.rng.word_pos));

        self.config = SeasonalComponentConfig {
            max_size: state.bucketing.max_size(),
            decay_rate: state.bucketing.decay_rate(),
            minimum_bucket_length: state.bucketing.minimum_bucket_length(),
            value_interpolation: state.value_spline.kind,
            variance_interpolation: state.variance_spline.kind,
            jitter_seed: state.rng.seed,
        };
        self.rng = rng;
        self.bucketing = state.bucketing;
        self.value_spline = value_spline;
        self.variance_spline = variance_spline;
        Ok(())
    }
}

fn parse_state(document: &serde_json::Value) -> Result<ComponentState> {
    ComponentState::deserialize(document)
        .map_err(|error| SeasonalError::MalformedState(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PeriodicTime, DAY};
    use approx::assert_relative_eq;
    use rand::Rng;
    use rand_distr::Normal;
    use std::f64::consts::PI;

    const HOUR: Time = 3600;

    fn component(config: SeasonalComponentConfig) -> SeasonalComponent {
        SeasonalComponent::new(Arc::new(PeriodicTime::new(DAY)), config).unwrap()
    }

    fn daily_windows(f: impl Fn(Time) -> f64) -> Vec<WindowSummary> {
        (0..24)
            .map(|h| {
                let start = h * HOUR;
                let values: Vec<f64> = (0..6).map(|i| f(start + i * 600)).collect();
                WindowSummary::from_values(start, start + HOUR, &values)
            })
            .collect()
    }

    fn sine(t: Time) -> f64 {
        (2.0 * PI * t as f64 / DAY as f64).sin()
    }

    fn trained(config: SeasonalComponentConfig, days: i64, f: impl Fn(Time) -> f64) -> SeasonalComponent {
        let mut component = component(config);
        component.initialize(0, DAY, &daily_windows(&f)).unwrap();
        for day in 1..=days {
            for t in (day * DAY..(day + 1) * DAY).step_by(600) {
                component.add(t, f(t), 1.0);
            }
            component.interpolate((day + 1) * DAY, true);
        }
        component
    }

    #[test]
    fn rejects_invalid_config() {
        let time: Arc<dyn SeasonalTime> = Arc::new(PeriodicTime::new(DAY));
        let config = SeasonalComponentConfig::default().with_max_size(0);
        assert!(matches!(
            SeasonalComponent::new(time, config),
            Err(SeasonalError::InvalidParameter(_))
        ));
    }

    #[test]
    fn uninitialized_queries_are_neutral() {
        let mut component = component(SeasonalComponentConfig::default());
        component.add(100, 5.0, 1.0);
        component.interpolate(100, true);
        assert!(!component.initialized());
        assert_eq!(component.size(), 0);
        assert_eq!(component.value(100, 95.0), Estimate::default());
        assert_eq!(component.variance(100, 95.0), Estimate::default());
        assert_eq!(component.heteroscedasticity(), 1.0);
        assert_eq!(component.variance_due_to_parameter_drift(100), 0.0);
        assert!(component.covariances(100).is_none());
        assert!(!component.sufficient_history_to_predict(100));
        assert_eq!(component.difference_from_mean(100, DAY / 2), 0.0);
    }

    #[test]
    fn initialize_failure_leaves_component_uninitialized() {
        let mut component = component(SeasonalComponentConfig::default());
        assert_eq!(component.initialize(0, DAY, &[]), Err(SeasonalError::EmptyData));
        assert!(!component.initialized());
    }

    #[test]
    fn recovers_a_sine() {
        let config = SeasonalComponentConfig::default().with_max_size(24);
        let component = trained(config, 10, sine);
        assert!(component.initialized());
        assert!(component.size() <= 24);
        for h in 0..24 {
            let t = 11 * DAY + h * HOUR + 900;
            let estimate = component.value(t, 0.0);
            assert!(
                (estimate.mean - sine(t)).abs() < 0.05,
                "at {t}: {} vs {}",
                estimate.mean,
                sine(t)
            );
        }
        assert_relative_eq!(component.mean_value(), 0.0, epsilon = 0.05);
    }

    #[test]
    fn interpolate_is_idempotent() {
        let config = SeasonalComponentConfig::default().with_max_size(12);
        let mut component = trained(config, 3, sine);
        let time = 4 * DAY;
        component.interpolate(time, true);
        let checksum = component.checksum(0);
        let value = component.value(time + 5000, 90.0);

        component.interpolate(time, true);
        assert_eq!(component.checksum(0), checksum);
        assert_eq!(component.value(time + 5000, 90.0), value);
    }

    #[test]
    fn confidence_widens_intervals() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let config = SeasonalComponentConfig::default().with_max_size(12);
        let mut component = component(config);
        component
            .initialize(0, DAY, &daily_windows(|_| 0.0))
            .unwrap();
        for t in (DAY..5 * DAY).step_by(300) {
            component.add(t, noise.sample(&mut rng), 1.0);
        }
        component.interpolate(5 * DAY, true);

        let t = 5 * DAY + 7 * HOUR;
        assert_eq!(component.value(t, 0.0).half_width, 0.0);
        let narrow = component.value(t, 50.0);
        let wide = component.value(t, 99.0);
        assert!(narrow.half_width > 0.0);
        assert!(wide.half_width > narrow.half_width);
        assert!(wide.lower() < wide.mean && wide.mean < wide.upper());

        let variance = component.variance(t, 95.0);
        assert!(variance.mean > 0.1 && variance.mean < 0.5);
        assert!(variance.half_width > 0.0);
        assert_eq!(component.variance(t, 0.0).half_width, 0.0);
    }

    #[test]
    fn difference_from_mean_detects_sub_harmonics() {
        let half_day = |t: Time| (4.0 * PI * t as f64 / DAY as f64).sin();
        let component = trained(SeasonalComponentConfig::default().with_max_size(24), 6, half_day);
        let t = 7 * DAY + 3 * HOUR;
        assert_relative_eq!(
            component.difference_from_mean(t, DAY / 2),
            2.0 * half_day(t),
            epsilon = 0.15
        );
        assert_eq!(component.difference_from_mean(t, 7 * HOUR), 0.0);
        assert_eq!(component.difference_from_mean(t, 0), 0.0);

        let component = trained(SeasonalComponentConfig::default().with_max_size(24), 6, sine);
        assert_relative_eq!(component.difference_from_mean(t, DAY / 2), 0.0, epsilon = 0.15);
    }

    #[test]
    fn heteroscedasticity_reflects_uneven_noise() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = SeasonalComponentConfig::default().with_max_size(12);
        let mut component = component(config);
        component
            .initialize(0, DAY, &daily_windows(|_| 0.0))
            .unwrap();
        for t in (DAY..8 * DAY).step_by(300) {
            let scale = if t % DAY < DAY / 2 { 0.1 } else { 2.0 };
            let value = scale * (rng.gen::<f64>() - 0.5);
            component.add(t, value, 1.0);
        }
        component.interpolate(8 * DAY, true);
        assert!(component.heteroscedasticity() > 1.5);
    }

    #[test]
    fn forgetting_restores_uniformity() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let config = SeasonalComponentConfig::default()
            .with_max_size(12)
            .with_decay_rate(1e-4);
        let mut component = component(config);
        component
            .initialize(0, DAY, &daily_windows(|_| 0.0))
            .unwrap();
        for t in (DAY..6 * DAY).step_by(300) {
            let scale = if t % DAY < DAY / 2 { 0.1 } else { 2.0 };
            component.add(t, sine(t) + scale * (rng.gen::<f64>() - 0.5), 1.0);
        }
        component.interpolate(6 * DAY, true);

        component.propagate_forwards_by_time(2e5, true);
        assert_relative_eq!(component.heteroscedasticity(), 1.0, epsilon = 1e-6);
        let uniform = DAY as f64 / component.size() as f64;
        for bucket in component.bucketing().buckets() {
            assert_relative_eq!(bucket.length(), uniform, epsilon = 1e-3);
        }
    }

    #[test]
    fn drift_variance_grows_after_last_update() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let config = SeasonalComponentConfig::default().with_max_size(6);
        let mut component = component(config);
        component
            .initialize(0, DAY, &daily_windows(|_| 0.0))
            .unwrap();
        for t in (DAY..30 * DAY).step_by(900) {
            component.add(t, 0.001 * t as f64 / HOUR as f64 + rng.gen::<f64>(), 1.0);
        }
        component.interpolate(30 * DAY, true);

        let last = 30 * DAY - 900;
        assert!(component.covariances(last).is_some());
        let mut previous = component.variance_due_to_parameter_drift(last);
        assert!(previous > 0.0);
        for k in 1..20 {
            let current = component.variance_due_to_parameter_drift(last + k * DAY);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn ignores_bad_samples() {
        let mut component = trained(SeasonalComponentConfig::default().with_max_size(6), 1, sine);
        let checksum = component.checksum(0);
        component.add(3 * DAY, f64::NAN, 1.0);
        component.add(3 * DAY, f64::INFINITY, 1.0);
        component.add(3 * DAY, 1.0, 0.0);
        component.add(3 * DAY, 1.0, -1.0);
        assert_eq!(component.checksum(0), checksum);
    }

    #[test]
    fn jitter_is_deterministic_per_seed() {
        let build = |seed: u64| {
            let config = SeasonalComponentConfig::default()
                .with_max_size(12)
                .with_minimum_bucket_length(1800.0)
                .with_jitter_seed(seed);
            trained(config, 2, sine)
        };
        assert_eq!(build(1).checksum(0), build(1).checksum(0));
        assert_ne!(build(1).checksum(0), build(2).checksum(0));
    }

    #[test]
    fn persist_restore_round_trip() {
        let config = SeasonalComponentConfig::default()
            .with_max_size(12)
            .with_minimum_bucket_length(1800.0);
        let mut component = trained(config, 3, sine);
        let document = component.persist().unwrap();

        let time: Arc<dyn SeasonalTime> = Arc::new(PeriodicTime::new(DAY));
        let mut restored = SeasonalComponent::from_state(time, &document).unwrap();
        assert_eq!(restored.checksum(17), component.checksum(17));
        let t = 4 * DAY + 1234;
        assert_eq!(restored.value(t, 95.0), component.value(t, 95.0));

        for t in (4 * DAY..5 * DAY).step_by(600) {
            component.add(t, sine(t), 1.0);
            restored.add(t, sine(t), 1.0);
        }
        component.interpolate(5 * DAY, true);
        restored.interpolate(5 * DAY, true);
        assert_eq!(restored.checksum(0), component.checksum(0));
    }

    #[test]
    fn uninitialized_round_trip() {
        let component = component(SeasonalComponentConfig::default());
        let mut restored = trained(SeasonalComponentConfig::default(), 1, sine);
        restored.restore(&component.persist().unwrap()).unwrap();
        assert!(!restored.initialized());
        assert_eq!(restored.checksum(0), component.checksum(0));
    }

    #[test]
    fn malformed_restore_clears() {
        let mut component = trained(SeasonalComponentConfig::default().with_max_size(6), 1, sine);
        let mut document = component.persist().unwrap();
        document["bucketing"]["buckets"][0]["end"] = serde_json::json!(1.0e9);
        assert!(matches!(
            component.restore(&document),
            Err(SeasonalError::MalformedState(_))
        ));
        assert!(!component.initialized());

        let mut component = trained(SeasonalComponentConfig::default().with_max_size(6), 1, sine);
        let mut document = component.persist().unwrap();
        if let Some(map) = document.as_object_mut() {
            map.remove("rng");
        }
        assert!(component.restore(&document).is_err());
        assert!(!component.initialized());
    }

    #[test]
    fn failed_restore_matches_new_component() {
        let config = SeasonalComponentConfig::default()
            .with_max_size(6)
            .with_minimum_bucket_length(600.0);
        let fresh = component(config.clone());
        let mut component = trained(config, 1, sine);
        assert_ne!(component.checksum(3), fresh.checksum(3));

        let mut document = component.persist().unwrap();
        document["bucketing"]["buckets"][0]["end"] = serde_json::json!(1.0e9);
        assert!(component.restore(&document).is_err());
        assert_eq!(component.checksum(3), fresh.checksum(3));
    }

    #[test]
    fn restore_skips_unknown_fields() {
        let component = trained(SeasonalComponentConfig::default().with_max_size(6), 1, sine);
        let mut document = component.persist().unwrap();
        document["bucketing"]["buckets"][0]["annotation"] = serde_json::json!("extra");
        document["bucketing"]["annotation"] = serde_json::json!([1, 2, 3]);
        document["annotation"] = serde_json::json!(7);

        let time: Arc<dyn SeasonalTime> = Arc::new(PeriodicTime::new(DAY));
        let restored = SeasonalComponent::from_state(time, &document).unwrap();
        assert_eq!(restored.checksum(1), component.checksum(1));
    }

    #[test]
    fn overflowing_value_keeps_state_restorable() {
        let mut component = trained(SeasonalComponentConfig::default().with_max_size(12), 1, sine);
        let before = component.checksum(0);
        component.add(2 * DAY + 100, 1.0e200, 1.0);
        assert_eq!(component.checksum(0), before);

        component.interpolate(2 * DAY + 200, true);
        assert!(component.mean_variance().is_finite());
        assert!(component.heteroscedasticity().is_finite());

        let time: Arc<dyn SeasonalTime> = Arc::new(PeriodicTime::new(DAY));
        let restored = SeasonalComponent::from_state(time, &component.persist().unwrap()).unwrap();
        assert_eq!(restored.checksum(0), component.checksum(0));
        assert!(restored.mean_variance().is_finite());
    }

    #[test]
    fn single_bucket_is_homoscedastic() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut component = component(SeasonalComponentConfig::default().with_max_size(1));
        component
            .initialize(0, DAY, &daily_windows(|_| 0.0))
            .unwrap();
        for t in (DAY..3 * DAY).step_by(300) {
            let scale = if t % DAY < DAY / 2 { 0.1 } else { 2.0 };
            component.add(t, scale * (rng.gen::<f64>() - 0.5), 1.0);
        }
        component.interpolate(3 * DAY, true);
        assert_eq!(component.size(), 1);
        assert!(component.mean_variance() > 0.0);
        assert_relative_eq!(component.heteroscedasticity(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn memory_grows_with_buckets() {
        let small = trained(SeasonalComponentConfig::default().with_max_size(4), 1, sine);
        let large = trained(SeasonalComponentConfig::default().with_max_size(32), 1, sine);
        assert!(large.memory_usage() > small.memory_usage());
    }
}
