//! Adaptive bucketing of one period of a seasonal component.
//!
//! The period is tiled by a bounded number of contiguous buckets. Refining
//! moves bucket boundaries so that the error from averaging the function over
//! each bucket is equalized, which minimizes the maximum averaging error: no
//! single bucket is allowed to dominate the prediction error. Buckets whose
//! error is far above the mean are split and adjacent quiet buckets merged,
//! subject to the size and length limits.
//!
//! Raw samples are never retained. When boundaries move, each bucket's
//! statistics are redistributed to the new intervals in proportion to the
//! overlap.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::bucket::BucketModel;
use crate::core::{SeasonalTime, Time, WindowSummary};
use crate::error::{Result, SeasonalError};
use crate::utils::Checksum;

/// Fraction of the way boundaries move toward their target on each refine.
const BOUNDARY_DAMPING: f64 = 0.25;

/// Periodic kernel used to smooth the per-bucket errors.
const SMOOTHING_KERNEL: [f64; 3] = [0.25, 0.5, 0.25];

/// Weight of a uniform error density added to the measured one, which caps
/// bucket growth where the function is flat.
const UNIFORM_DENSITY_WEIGHT: f64 = 1.0;

/// Multiple of the mean error above which a bucket is split.
const SPLIT_ERROR_MULTIPLIER: f64 = 4.0;

/// Multiple of the mean error below which adjacent buckets may merge.
const MERGE_ERROR_MULTIPLIER: f64 = 0.25;

/// Multiple of the uniform bucket length a merged bucket may reach.
const MERGE_LENGTH_MULTIPLIER: f64 = 2.0;

/// Boundary moves smaller than this fraction of the period are ignored.
const MOVE_TOLERANCE: f64 = 1e-9;

/// An ordered, period-covering collection of [`BucketModel`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveBucketing {
    period: f64,
    max_size: usize,
    decay_rate: f64,
    minimum_bucket_length: f64,
    time_scale: f64,
    origin: Time,
    buckets: Vec<BucketModel>,
}

impl AdaptiveBucketing {
    /// Create an uninitialized bucketing.
    ///
    /// # Arguments
    /// * `period` - Length of the period the buckets tile
    /// * `max_size` - Maximum number of buckets
    /// * `decay_rate` - Rate at which bucket statistics are forgotten
    /// * `minimum_bucket_length` - Smallest permitted bucket length
    /// * `time_scale` - Seconds per unit of regression time
    pub fn new(
        period: f64,
        max_size: usize,
        decay_rate: f64,
        minimum_bucket_length: f64,
        time_scale: f64,
    ) -> Result<Self> {
        let bucketing = Self {
            period,
            max_size,
            decay_rate,
            minimum_bucket_length,
            time_scale,
            origin: 0,
            buckets: Vec::new(),
        };
        bucketing.validate_parameters()?;
        Ok(bucketing)
    }

    fn validate_parameters(&self) -> Result<()> {
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(SeasonalError::InvalidParameter(format!(
                "period must be positive, got {}",
                self.period
            )));
        }
        if self.max_size == 0 {
            return Err(SeasonalError::InvalidParameter(
                "max_size must be at least 1".into(),
            ));
        }
        if !(self.decay_rate.is_finite() && self.decay_rate >= 0.0) {
            return Err(SeasonalError::InvalidParameter(format!(
                "decay_rate must be non-negative, got {}",
                self.decay_rate
            )));
        }
        if !(self.minimum_bucket_length.is_finite()
            && self.minimum_bucket_length >= 0.0
            && self.minimum_bucket_length <= self.period)
        {
            return Err(SeasonalError::InvalidParameter(format!(
                "minimum_bucket_length must be in [0, {}], got {}",
                self.period, self.minimum_bucket_length
            )));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(SeasonalError::InvalidParameter(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        Ok(())
    }

    /// Check a restored bucketing is internally consistent.
    pub(crate) fn validate(&self) -> Result<()> {
        self.validate_parameters()
            .map_err(|e| SeasonalError::MalformedState(e.to_string()))?;
        if self.buckets.len() > self.max_size {
            return Err(SeasonalError::MalformedState(format!(
                "{} buckets exceeds max_size {}",
                self.buckets.len(),
                self.max_size
            )));
        }
        if let (Some(first), Some(last)) = (self.buckets.first(), self.buckets.last()) {
            if first.start() != 0.0 || last.end() != self.period {
                return Err(SeasonalError::MalformedState(
                    "buckets do not cover the period".into(),
                ));
            }
        }
        if self
            .buckets
            .windows(2)
            .any(|pair| pair[0].end() != pair[1].start())
        {
            return Err(SeasonalError::MalformedState(
                "buckets are not contiguous".into(),
            ));
        }
        if !self.buckets.iter().all(BucketModel::is_valid) {
            return Err(SeasonalError::MalformedState(
                "bucket contains invalid statistics".into(),
            ));
        }
        Ok(())
    }

    /// Whether the buckets have been created.
    pub fn initialized(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// The period the buckets tile.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// The maximum number of buckets.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The rate at which bucket statistics are forgotten.
    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    /// Change the rate at which bucket statistics are forgotten.
    pub fn set_decay_rate(&mut self, decay_rate: f64) {
        self.decay_rate = decay_rate.max(0.0);
    }

    /// The smallest permitted bucket length.
    pub fn minimum_bucket_length(&self) -> f64 {
        self.minimum_bucket_length
    }

    /// Seconds per unit of regression time.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// The time at which the regression abscissa is zero.
    pub fn origin(&self) -> Time {
        self.origin
    }

    /// The number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The buckets in phase order.
    pub fn buckets(&self) -> &[BucketModel] {
        &self.buckets
    }

    /// The bucket boundaries, from zero to the period.
    pub fn endpoints(&self) -> Vec<f64> {
        let mut endpoints: Vec<f64> = self.buckets.iter().map(BucketModel::start).collect();
        if let Some(last) = self.buckets.last() {
            endpoints.push(last.end());
        }
        endpoints
    }

    /// The bucket centres.
    pub fn centres(&self) -> Vec<f64> {
        self.buckets.iter().map(BucketModel::centre).collect()
    }

    /// Drop all buckets and the regression time origin.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.origin = 0;
    }

    /// Create a uniform partition of the period.
    ///
    /// This uses `max_size` buckets unless that would violate the minimum
    /// bucket length.
    pub fn initialize_buckets(&mut self) {
        let mut n = self.max_size;
        if self.minimum_bucket_length > 0.0 {
            let fit = (self.period / self.minimum_bucket_length).floor() as usize;
            n = n.min(fit).max(1);
        }
        self.buckets = uniform_endpoints(self.period, n)
            .windows(2)
            .map(|pair| BucketModel::new(pair[0], pair[1]))
            .collect();
    }

    /// Create the buckets and seed them from windowed summaries of values
    /// observed in `[start_time, end_time)`.
    pub fn initialize(
        &mut self,
        start_time: Time,
        end_time: Time,
        summaries: &[WindowSummary],
        time: &dyn SeasonalTime,
    ) -> Result<()> {
        if summaries.is_empty() {
            return Err(SeasonalError::EmptyData);
        }
        let first = summaries.iter().map(|s| s.start).min().unwrap_or(start_time);
        let last = summaries.iter().map(|s| s.end).max().unwrap_or(start_time);
        if end_time <= start_time {
            return Err(SeasonalError::InvalidTimeRange {
                start: start_time,
                end: end_time,
            });
        }
        if last <= first {
            return Err(SeasonalError::InvalidTimeRange {
                start: first,
                end: last,
            });
        }

        self.clear();
        self.origin = start_time;
        self.initialize_buckets();

        let mut seeded = 0usize;
        for summary in summaries {
            let midpoint = summary.midpoint();
            if summary.moments.count() <= 0.0
                || midpoint < start_time
                || midpoint >= end_time
                || !time.in_window(midpoint)
            {
                continue;
            }
            let phase = time.phase(midpoint).value;
            let x = self.regression_time(midpoint);
            let index = self.bucket_index(phase);
            self.buckets[index].seed(phase, x, midpoint, &summary.moments);
            seeded += 1;
        }
        debug!(
            buckets = self.buckets.len(),
            seeded,
            windows = summaries.len(),
            "initialized adaptive bucketing"
        );
        Ok(())
    }

    /// The regression abscissa of `time`.
    pub fn regression_time(&self, time: Time) -> f64 {
        (time - self.origin) as f64 / self.time_scale
    }

    /// The index of the bucket containing `phase`.
    ///
    /// The phase is wrapped into the period. Requires at least one bucket.
    pub fn bucket_index(&self, phase: f64) -> usize {
        let phase = wrap(phase, self.period);
        self.buckets
            .partition_point(|bucket| bucket.end() <= phase)
            .min(self.buckets.len().saturating_sub(1))
    }

    /// The bucket containing `phase`, if initialized.
    pub fn bucket_at(&self, phase: f64) -> Option<&BucketModel> {
        if self.buckets.is_empty() {
            return None;
        }
        self.buckets.get(self.bucket_index(phase))
    }

    /// The effective number of samples in the bucket containing `phase`.
    pub fn count_at(&self, phase: f64) -> f64 {
        self.bucket_at(phase).map_or(0.0, BucketModel::count)
    }

    /// Add `value` observed at `time` with (jittered) `phase`.
    pub fn add(&mut self, phase: f64, time: Time, value: f64, weight: f64) {
        if self.buckets.is_empty() {
            return;
        }
        let index = self.bucket_index(phase);
        let x = self.regression_time(time);
        let period = self.period;
        self.buckets[index].update(wrap(phase, period), x, time, value, weight, period);
    }

    /// The predicted `(value, variance)` at `phase` for `time`.
    pub fn predict(&self, phase: f64, time: Time) -> Option<(f64, f64)> {
        let x = self.regression_time(time);
        self.bucket_at(phase)
            .map(|bucket| bucket.predict(x, time, self.period))
    }

    /// The spline knots: centres, values and variances of the populated
    /// buckets at `time`, with strictly increasing centres.
    pub fn knots(&self, time: Time) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x = self.regression_time(time);
        let mut centres = Vec::with_capacity(self.buckets.len());
        let mut values = Vec::with_capacity(self.buckets.len());
        let mut variances = Vec::with_capacity(self.buckets.len());
        for bucket in self.buckets.iter().filter(|b| b.count() > 0.0) {
            let centre = bucket.centre();
            if centres.last().is_some_and(|&previous| centre <= previous) {
                continue;
            }
            let (value, variance) = bucket.predict(x, time, self.period);
            centres.push(centre);
            values.push(value);
            variances.push(variance);
        }
        (centres, values, variances)
    }

    /// Length weighted mean of the bucket values.
    pub fn mean_value(&self) -> f64 {
        self.length_weighted_mean(|bucket| bucket.regression().mean())
    }

    /// Length weighted mean of the bucket residual variances.
    pub fn mean_variance(&self) -> f64 {
        self.length_weighted_mean(BucketModel::variance)
    }

    fn length_weighted_mean(&self, f: impl Fn(&BucketModel) -> f64) -> f64 {
        let (total, length) = self
            .buckets
            .iter()
            .filter(|bucket| bucket.count() > 0.0)
            .fold((0.0, 0.0), |(total, length), bucket| {
                (total + bucket.length() * f(bucket), length + bucket.length())
            });
        if length > 0.0 {
            total / length
        } else {
            0.0
        }
    }

    /// Count weighted mean of the bucket regression slopes.
    pub fn slope(&self) -> f64 {
        let (total, count) = self
            .buckets
            .iter()
            .fold((0.0, 0.0), |(total, count), bucket| {
                let weight = bucket.count();
                (total + weight * bucket.regression().slope(), count + weight)
            });
        if count > 0.0 {
            total / count
        } else {
            0.0
        }
    }

    /// Re-anchor the regression abscissa at `time` without changing any
    /// prediction.
    pub fn shift_origin(&mut self, time: Time) {
        let dx = (self.origin - time) as f64 / self.time_scale;
        for bucket in &mut self.buckets {
            bucket.shift_abscissa(dx);
        }
        self.origin = time;
    }

    /// Add `shift` to every bucket value.
    pub fn shift_level(&mut self, shift: f64) {
        for bucket in &mut self.buckets {
            bucket.shift_level(shift);
        }
    }

    /// Add `shift` to every bucket slope.
    pub fn shift_slope(&mut self, shift: f64) {
        for bucket in &mut self.buckets {
            bucket.shift_slope(shift);
        }
    }

    /// Age the buckets to account for `elapsed` time.
    ///
    /// With `mean_revert` the bucket values and variances also relax toward
    /// their population means, and the boundaries toward a uniform
    /// partition, by the fraction of information lost.
    pub fn propagate_forwards_by_time(&mut self, elapsed: f64, mean_revert: bool) {
        if elapsed < 0.0 {
            warn!(elapsed, "can't propagate bucketing backwards in time");
            return;
        }
        if self.buckets.is_empty() {
            return;
        }
        let factor = (-self.decay_rate * elapsed).exp();
        let alpha = 1.0 - factor;
        if !mean_revert || alpha <= 0.0 {
            for bucket in &mut self.buckets {
                bucket.age(factor);
            }
            return;
        }

        let mean = self.mean_value();
        let variance = self.mean_variance();
        for bucket in &mut self.buckets {
            bucket.mean_revert(mean, variance, alpha);
            bucket.age(factor);
        }

        let uniform = uniform_endpoints(self.period, self.buckets.len());
        let mut endpoints = self.endpoints();
        for (endpoint, target) in endpoints.iter_mut().zip(&uniform) {
            *endpoint += alpha * (target - *endpoint);
        }
        self.pin_ends(&mut endpoints);
        if self.moved(&endpoints) {
            self.refresh(&endpoints);
        }
        trace!(alpha, mean, variance, "mean reverted bucketing");
    }

    /// Refine the bucketing using the errors observed since the last refine.
    ///
    /// Returns whether any boundary changed. Without intervening adds this
    /// is a no-op.
    pub fn refine(&mut self, time: Time) -> bool {
        let n = self.buckets.len();
        if n == 0 {
            return false;
        }
        let observed: Vec<Option<f64>> = self
            .buckets
            .iter()
            .map(|bucket| {
                let error = bucket.refine_error();
                (error.count() > 0.0).then(|| error.mean().max(0.0))
            })
            .collect();
        let known: Vec<f64> = observed.iter().flatten().copied().collect();
        if known.is_empty() {
            return false;
        }
        let fill = known.iter().sum::<f64>() / known.len() as f64;

        let mut changed = false;
        let errors: Vec<f64> = observed.iter().map(|e| e.unwrap_or(fill)).collect();
        if let Some(mut endpoints) = self.equalized_endpoints(&errors) {
            let previous = self.endpoints();
            for (endpoint, old) in endpoints.iter_mut().zip(&previous) {
                *endpoint = old + BOUNDARY_DAMPING * (*endpoint - old);
            }
            self.spread(&mut endpoints);
            self.pin_ends(&mut endpoints);
            if self.moved(&endpoints) {
                self.refresh(&endpoints);
                changed = true;
            }
        }

        changed |= self.merge_quiet_buckets();
        changed |= self.split_noisy_bucket();

        for bucket in &mut self.buckets {
            bucket.reset_refine_error();
        }
        debug!(time, buckets = self.buckets.len(), changed, "refined bucketing");
        changed
    }

    /// Target boundaries which put an equal share of the smoothed error in
    /// each bucket, or `None` if there is no error to share.
    fn equalized_endpoints(&self, errors: &[f64]) -> Option<Vec<f64>> {
        let n = self.buckets.len();
        let ranges: Vec<f64> = errors.iter().map(|e| e.sqrt()).collect();
        let mut mass: Vec<f64> = if n >= 3 {
            (0..n)
                .map(|i| {
                    SMOOTHING_KERNEL[0] * ranges[(i + n - 1) % n]
                        + SMOOTHING_KERNEL[1] * ranges[i]
                        + SMOOTHING_KERNEL[2] * ranges[(i + 1) % n]
                })
                .collect()
        } else {
            ranges
        };
        let measured: f64 = mass.iter().sum();
        if !(measured.is_finite() && measured > 0.0) {
            return None;
        }
        for (mass, bucket) in mass.iter_mut().zip(&self.buckets) {
            *mass += UNIFORM_DENSITY_WEIGHT * measured * bucket.length() / self.period;
        }
        let total = (1.0 + UNIFORM_DENSITY_WEIGHT) * measured;

        let step = total / n as f64;
        let mut endpoints = Vec::with_capacity(n + 1);
        endpoints.push(0.0);
        let mut cumulative = 0.0;
        let mut i = 0;
        for k in 1..n {
            let target = k as f64 * step;
            while i + 1 < n && cumulative + mass[i] < target {
                cumulative += mass[i];
                i += 1;
            }
            let bucket = &self.buckets[i];
            let fraction = if mass[i] > 0.0 {
                ((target - cumulative) / mass[i]).clamp(0.0, 1.0)
            } else {
                0.0
            };
            endpoints.push(bucket.start() + fraction * bucket.length());
        }
        endpoints.push(self.period);
        Some(endpoints)
    }

    /// Enforce the minimum bucket length with the ends fixed.
    fn spread(&self, endpoints: &mut [f64]) {
        let n = endpoints.len() - 1;
        let separation = self.minimum_bucket_length.min(self.period / n as f64);
        if separation <= 0.0 {
            return;
        }
        for i in 1..n {
            endpoints[i] = endpoints[i].max(endpoints[i - 1] + separation);
        }
        for i in (1..n).rev() {
            endpoints[i] = endpoints[i].min(endpoints[i + 1] - separation);
        }
    }

    fn pin_ends(&self, endpoints: &mut [f64]) {
        if let Some(first) = endpoints.first_mut() {
            *first = 0.0;
        }
        if let Some(last) = endpoints.last_mut() {
            *last = self.period;
        }
    }

    fn moved(&self, endpoints: &[f64]) -> bool {
        let tolerance = MOVE_TOLERANCE * self.period;
        self.endpoints()
            .iter()
            .zip(endpoints)
            .any(|(old, new)| (old - new).abs() > tolerance)
    }

    /// The slope of the bucket values with respect to phase at each bucket,
    /// from the values of its neighbours.
    fn gradients(&self) -> Vec<f64> {
        let n = self.buckets.len();
        if n < 3 {
            return vec![0.0; n];
        }
        (0..n)
            .map(|i| {
                let previous = &self.buckets[(i + n - 1) % n];
                let next = &self.buckets[(i + 1) % n];
                if previous.count() <= 0.0 || next.count() <= 0.0 {
                    return 0.0;
                }
                let mut left = previous.centre();
                let mut right = next.centre();
                if i == 0 {
                    left -= self.period;
                }
                if i == n - 1 {
                    right += self.period;
                }
                if right > left {
                    (next.regression().mean() - previous.regression().mean()) / (right - left)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Redistribute the bucket statistics onto new boundaries.
    fn refresh(&mut self, endpoints: &[f64]) {
        let gradients = self.gradients();
        let old = std::mem::take(&mut self.buckets);
        let mut first = 0;
        for pair in endpoints.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            while first < old.len() && old[first].end() <= lo {
                first += 1;
            }
            let mut bucket: Option<BucketModel> = None;
            for (source, gradient) in old[first..]
                .iter()
                .zip(&gradients[first..])
                .take_while(|(b, _)| b.start() < hi)
            {
                let (a, b) = (lo.max(source.start()), hi.min(source.end()));
                if b <= a {
                    continue;
                }
                let piece = source.restricted(a, b, *gradient);
                match bucket.as_mut() {
                    Some(bucket) => bucket.absorb(&piece),
                    None => bucket = Some(piece),
                }
            }
            let mut bucket = bucket.unwrap_or_else(|| BucketModel::new(lo, hi));
            bucket.set_interval(lo, hi);
            self.buckets.push(bucket);
        }
    }

    /// Mean of the observed refine errors, if any bucket saw data.
    fn mean_observed_error(&self) -> Option<f64> {
        let (total, count) = self
            .buckets
            .iter()
            .map(BucketModel::refine_error)
            .filter(|error| error.count() > 0.0)
            .fold((0.0, 0usize), |(total, count), error| {
                (total + error.mean(), count + 1)
            });
        (count > 0).then(|| total / count as f64)
    }

    /// Merge the quietest adjacent pair of buckets whose errors are both far
    /// below the mean.
    fn merge_quiet_buckets(&mut self) -> bool {
        let n = self.buckets.len();
        if n < 2 || n <= (self.max_size / 2).max(1) {
            return false;
        }
        let Some(mean) = self.mean_observed_error() else {
            return false;
        };
        let threshold = MERGE_ERROR_MULTIPLIER * mean;
        let max_length = MERGE_LENGTH_MULTIPLIER * self.period / self.max_size as f64;
        let quiet = |bucket: &BucketModel| {
            let error = bucket.refine_error();
            error.count() > 0.0 && error.mean() < threshold
        };

        let candidate = self
            .buckets
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| {
                quiet(&pair[0])
                    && quiet(&pair[1])
                    && pair[0].length() + pair[1].length() <= max_length
            })
            .map(|(i, pair)| {
                (i, pair[0].refine_error().mean() + pair[1].refine_error().mean())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match candidate {
            Some((i, _)) => {
                self.merge_at(i);
                debug!(index = i, buckets = self.buckets.len(), "merged quiet buckets");
                true
            }
            None => false,
        }
    }

    /// Split the bucket with the largest error if it is far above the mean
    /// and there is room for another bucket.
    fn split_noisy_bucket(&mut self) -> bool {
        if self.buckets.len() >= self.max_size {
            return false;
        }
        let Some(mean) = self.mean_observed_error() else {
            return false;
        };
        let minimum = self.minimum_bucket_length;
        let candidate = self
            .buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| {
                let error = bucket.refine_error();
                error.count() > 0.0
                    && error.mean() > SPLIT_ERROR_MULTIPLIER * mean
                    && bucket.length() >= 2.0 * minimum
            })
            .max_by(|a, b| {
                a.1.refine_error()
                    .mean()
                    .total_cmp(&b.1.refine_error().mean())
            })
            .map(|(i, _)| i);

        match candidate {
            Some(i) => {
                let bucket = &self.buckets[i];
                let margin = minimum.max(0.25 * bucket.length());
                let at = bucket
                    .centre()
                    .clamp(bucket.start() + margin, bucket.end() - margin);
                self.split_at(i, at);
                debug!(index = i, at, buckets = self.buckets.len(), "split noisy bucket");
                true
            }
            None => false,
        }
    }

    /// Replace bucket `i` by two buckets meeting at `at`.
    fn split_at(&mut self, i: usize, at: f64) {
        let gradient = self.gradients()[i];
        let bucket = &self.buckets[i];
        let left = bucket.restricted(bucket.start(), at, gradient);
        let right = bucket.restricted(at, bucket.end(), gradient);
        self.buckets[i] = left;
        self.buckets.insert(i + 1, right);
    }

    /// Replace buckets `i` and `i + 1` by their union.
    fn merge_at(&mut self, i: usize) {
        let right = self.buckets.remove(i + 1);
        self.buckets[i].absorb(&right);
    }

    /// Approximate heap memory used by the buckets.
    pub fn memory_usage(&self) -> usize {
        self.buckets.capacity() * std::mem::size_of::<BucketModel>()
    }

    pub(crate) fn checksum(&self, checksum: &mut Checksum) {
        checksum
            .add_tag("bucketing")
            .add_f64(self.period)
            .add_u64(self.max_size as u64)
            .add_f64(self.decay_rate)
            .add_f64(self.minimum_bucket_length)
            .add_f64(self.time_scale)
            .add_i64(self.origin)
            .add_u64(self.buckets.len() as u64);
        for bucket in &self.buckets {
            bucket.checksum(checksum);
        }
    }
}

fn uniform_endpoints(period: f64, n: usize) -> Vec<f64> {
    let mut endpoints: Vec<f64> = (0..=n).map(|i| period * i as f64 / n as f64).collect();
    if let Some(last) = endpoints.last_mut() {
        *last = period;
    }
    endpoints
}

fn wrap(phase: f64, period: f64) -> f64 {
    let wrapped = phase.rem_euclid(period);
    if wrapped >= period {
        0.0
    } else {
        wrapped
    }
}
