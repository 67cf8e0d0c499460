//! Periodic interpolating splines over the bucket centres.
//!
//! The spline wraps around the period: the segment after the last knot runs
//! into the first knot of the next repeat, so a cubic spline has continuous
//! first and second derivatives at phase zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::Checksum;

/// The style of interpolation between knots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplineKind {
    /// Piecewise linear.
    Linear,
    /// Periodic natural cubic.
    #[default]
    Cubic,
}

/// A spline interpolating values at knots on `[0, period)`.
///
/// # Example
/// ```
/// use anofox_seasonal::seasonality::{PeriodicSpline, SplineKind};
///
/// let spline = PeriodicSpline::fit(4.0, &[0.5, 1.5, 2.5, 3.5], &[1.0, 2.0, 1.0, 0.0], SplineKind::Linear);
/// assert!((spline.evaluate(1.0) - 1.5).abs() < 1e-12);
/// // Wraps around the period.
/// assert!((spline.evaluate(4.0) - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeriodicSpline {
    period: f64,
    kind: SplineKind,
    knots: Vec<f64>,
    values: Vec<f64>,
    curvatures: Vec<f64>,
}

impl PeriodicSpline {
    /// Fit a spline through `(knots[i], values[i])`.
    ///
    /// `knots` must be strictly increasing and lie in `[0, period)`. A cubic
    /// spline with fewer than three knots, or whose system cannot be solved,
    /// degrades to linear interpolation.
    pub fn fit(period: f64, knots: &[f64], values: &[f64], kind: SplineKind) -> Self {
        let n = knots.len().min(values.len());
        let mut spline = Self {
            period,
            kind,
            knots: knots[..n].to_vec(),
            values: values[..n].to_vec(),
            curvatures: vec![0.0; n],
        };
        if kind == SplineKind::Cubic {
            if n < 3 {
                debug!(knots = n, "too few knots for a cubic spline, using linear");
            } else {
                match spline.solve_curvatures() {
                    Some(curvatures) => spline.curvatures = curvatures,
                    None => warn!(knots = n, "periodic spline system is singular, using linear"),
                }
            }
        }
        spline
    }

    /// Whether the spline has any knots.
    pub fn is_fitted(&self) -> bool {
        !self.knots.is_empty()
    }

    /// Drop all knots.
    pub fn clear(&mut self) {
        self.knots.clear();
        self.values.clear();
        self.curvatures.clear();
    }

    /// The requested interpolation style.
    pub fn kind(&self) -> SplineKind {
        self.kind
    }

    /// The period the spline wraps around.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// The knot phases.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// The knot values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The interpolated value at `phase`, which is first wrapped into
    /// `[0, period)`. An unfitted spline evaluates to zero.
    pub fn evaluate(&self, phase: f64) -> f64 {
        let n = self.knots.len();
        match n {
            0 => return 0.0,
            1 => return self.values[0],
            _ => {}
        }
        let phase = self.wrap(phase);
        let k = self.knots.partition_point(|&knot| knot <= phase);
        let (left, right, xl, xr) = if k == 0 {
            (n - 1, 0, self.knots[n - 1] - self.period, self.knots[0])
        } else if k == n {
            (n - 1, 0, self.knots[n - 1], self.knots[0] + self.period)
        } else {
            (k - 1, k, self.knots[k - 1], self.knots[k])
        };
        self.segment(left, right, xl, xr, phase)
    }

    /// The average of the spline over one period.
    pub fn mean(&self) -> f64 {
        let n = self.knots.len();
        match n {
            0 => return 0.0,
            1 => return self.values[0],
            _ => {}
        }
        let mut integral = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            let h = self.step(i);
            integral += 0.5 * h * (self.values[i] + self.values[j])
                - h * h * h * (self.curvatures[i] + self.curvatures[j]) / 24.0;
        }
        integral / self.period
    }

    /// Approximate heap memory used by the knots.
    pub fn memory_usage(&self) -> usize {
        (self.knots.capacity() + self.values.capacity() + self.curvatures.capacity())
            * std::mem::size_of::<f64>()
    }

    pub(crate) fn checksum(&self, checksum: &mut Checksum) {
        checksum
            .add_f64(self.period)
            .add_u64(self.kind as u64)
            .add_f64s(&self.knots)
            .add_f64s(&self.values);
    }

    fn wrap(&self, phase: f64) -> f64 {
        let wrapped = phase.rem_euclid(self.period);
        if wrapped >= self.period {
            0.0
        } else {
            wrapped
        }
    }

    /// Distance from knot `i` to the next knot, wrapping at the period.
    fn step(&self, i: usize) -> f64 {
        let n = self.knots.len();
        if i + 1 < n {
            self.knots[i + 1] - self.knots[i]
        } else {
            self.knots[0] + self.period - self.knots[n - 1]
        }
    }

    fn segment(&self, left: usize, right: usize, xl: f64, xr: f64, x: f64) -> f64 {
        let h = xr - xl;
        if h <= 0.0 {
            return self.values[left];
        }
        let (yl, yr) = (self.values[left], self.values[right]);
        let (ml, mr) = (self.curvatures[left], self.curvatures[right]);
        let a = xr - x;
        let b = x - xl;
        ml * a * a * a / (6.0 * h)
            + mr * b * b * b / (6.0 * h)
            + (yl / h - ml * h / 6.0) * a
            + (yr / h - mr * h / 6.0) * b
    }

    /// Solve the cyclic tridiagonal system for the second derivatives at
    /// the knots.
    fn solve_curvatures(&self) -> Option<Vec<f64>> {
        let n = self.knots.len();
        let h: Vec<f64> = (0..n).map(|i| self.step(i)).collect();
        if h.iter().any(|&step| step.is_nan() || step <= 0.0) {
            return None;
        }
        let mut sub = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut sup = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            sub[i] = h[prev];
            diag[i] = 2.0 * (h[prev] + h[i]);
            sup[i] = h[i];
            rhs[i] = 6.0
                * ((self.values[next] - self.values[i]) / h[i]
                    - (self.values[i] - self.values[prev]) / h[prev]);
        }
        solve_cyclic_tridiagonal(&sub, &diag, &sup, &rhs)
    }
}

/// Solve a tridiagonal system with sub-diagonal `sub[1..]`, diagonal `diag`
/// and super-diagonal `sup[..n-1]`.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Option<Vec<f64>> {
    let n = diag.len();
    let mut gamma = vec![0.0; n];
    let mut x = vec![0.0; n];
    let mut beta = diag[0];
    if beta == 0.0 {
        return None;
    }
    x[0] = rhs[0] / beta;
    for j in 1..n {
        gamma[j] = sup[j - 1] / beta;
        beta = diag[j] - sub[j] * gamma[j];
        if beta == 0.0 {
            return None;
        }
        x[j] = (rhs[j] - sub[j] * x[j - 1]) / beta;
    }
    for j in (0..n - 1).rev() {
        x[j] -= gamma[j + 1] * x[j + 1];
    }
    Some(x)
}

/// Solve a cyclic tridiagonal system via Sherman-Morrison, where `sub[0]`
/// couples the first row to the last unknown and `sup[n-1]` the last row
/// to the first unknown.
fn solve_cyclic_tridiagonal(
    sub: &[f64],
    diag: &[f64],
    sup: &[f64],
    rhs: &[f64],
) -> Option<Vec<f64>> {
    let n = diag.len();
    let corner_top = sub[0];
    let corner_bottom = sup[n - 1];
    let gamma = -diag[0];
    if gamma == 0.0 {
        return None;
    }
    let mut modified = diag.to_vec();
    modified[0] = diag[0] - gamma;
    modified[n - 1] = diag[n - 1] - corner_bottom * corner_top / gamma;

    let mut x = solve_tridiagonal(sub, &modified, sup, rhs)?;
    let mut u = vec![0.0; n];
    u[0] = gamma;
    u[n - 1] = corner_bottom;
    let z = solve_tridiagonal(sub, &modified, sup, &u)?;

    let denominator = 1.0 + z[0] + corner_top * z[n - 1] / gamma;
    if denominator == 0.0 {
        return None;
    }
    let factor = (x[0] + corner_top * x[n - 1] / gamma) / denominator;
    for (xi, zi) in x.iter_mut().zip(&z) {
        *xi -= factor * zi;
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
