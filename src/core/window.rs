//! Pre-aggregated windows of raw observations used to seed a component.

use super::time::Time;
use crate::utils::stats::MeanVarAccumulator;

/// Summary statistics of the values observed in `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    /// Start of the window (inclusive).
    pub start: Time,
    /// End of the window (exclusive).
    pub end: Time,
    /// Weighted count, mean and variance of the values in the window.
    pub moments: MeanVarAccumulator,
}

impl WindowSummary {
    /// Create a window summary.
    pub fn new(start: Time, end: Time, moments: MeanVarAccumulator) -> Self {
        Self { start, end, moments }
    }

    /// Summarize `values` observed in `[start, end)` with unit weights.
    pub fn from_values(start: Time, end: Time, values: &[f64]) -> Self {
        let mut moments = MeanVarAccumulator::default();
        for &value in values {
            moments.add(value, 1.0);
        }
        Self::new(start, end, moments)
    }

    /// The time used to place this window in the period.
    pub fn midpoint(&self) -> Time {
        self.start + (self.end - self.start) / 2
    }

    /// The window length.
    pub fn duration(&self) -> Time {
        self.end - self.start
    }
}
