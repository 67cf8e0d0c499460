//! Core types shared by the seasonal estimators.

mod time;
mod window;

pub use time::{Phase, PeriodicTime, SeasonalTime, Time, DAY, WEEK};
pub use window::WindowSummary;
