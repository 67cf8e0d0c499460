//! Error types for the anofox-seasonal library.

use thiserror::Error;

/// Result type alias for seasonal component operations.
pub type Result<T> = std::result::Result<T, SeasonalError>;

/// Errors that can occur while building, initializing or restoring a
/// seasonal component.
///
/// Under-populated buckets are not errors: queries on them return `None`,
/// `false` or a neutral value instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeasonalError {
    /// Invalid configuration value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No windowed summaries were supplied.
    #[error("empty input data")]
    EmptyData,

    /// The initialization range covers no time.
    #[error("invalid time range: [{start}, {end})")]
    InvalidTimeRange { start: i64, end: i64 },

    /// A persisted state document could not be restored.
    #[error("malformed state: {0}")]
    MalformedState(String),
}
