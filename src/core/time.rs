//! Time-to-phase mapping for seasonal components.
//!
//! A seasonal component never decides which period it models. It is handed a
//! [`SeasonalTime`] which maps absolute times onto a position within one
//! repeat of the period.

use std::fmt::Debug;

/// Absolute time in seconds.
pub type Time = i64;

/// Seconds in one day.
pub const DAY: Time = 86_400;

/// Seconds in one week.
pub const WEEK: Time = 7 * DAY;

/// Position of a time within one repeat of a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    /// Offset into the period, in `[0, period)`.
    pub value: f64,
    /// Length of the period.
    pub period: f64,
}

/// Maps absolute times onto phases of a fixed period.
///
/// Implementations must be pure: the same time always maps to the same
/// phase for a fixed configuration. Components share a provider read-only.
pub trait SeasonalTime: Debug + Send + Sync {
    /// The period length in seconds.
    fn period(&self) -> Time;

    /// The phase of `time`.
    fn phase(&self, time: Time) -> Phase;

    /// Whether values at `time` belong to this component.
    fn in_window(&self, time: Time) -> bool {
        let _ = time;
        true
    }

    /// The unit of time used for the bucket regressions.
    ///
    /// Slopes are expressed per this many seconds.
    fn regression_time_scale(&self) -> Time {
        WEEK
    }
}

/// A plain repeating period anchored at `origin`.
///
/// # Example
/// ```
/// use anofox_seasonal::core::{PeriodicTime, SeasonalTime, DAY};
///
/// let time = PeriodicTime::new(DAY);
/// let phase = time.phase(DAY + 3600);
/// assert_eq!(phase.value, 3600.0);
/// assert_eq!(phase.period, 86400.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTime {
    period: Time,
    origin: Time,
}

impl PeriodicTime {
    /// Create a provider for `period` seconds starting at time zero.
    pub fn new(period: Time) -> Self {
        Self { period, origin: 0 }
    }

    /// Anchor phase zero at `origin`.
    pub fn with_origin(mut self, origin: Time) -> Self {
        self.origin = origin;
        self
    }

    /// The time at which phase zero occurs.
    pub fn origin(&self) -> Time {
        self.origin
    }
}

impl SeasonalTime for PeriodicTime {
    fn period(&self) -> Time {
        self.period
    }

    fn phase(&self, time: Time) -> Phase {
        let period = self.period.max(1);
        Phase {
            value: (time - self.origin).rem_euclid(period) as f64,
            period: period as f64,
        }
    }
}
