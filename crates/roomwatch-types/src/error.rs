//! Error types for roomwatch-types.

use thiserror::Error;

/// Errors that can occur when parsing room telemetry values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Trigger flag was something other than 0 or 1.
    #[error("Invalid trigger value {0}: must be 0 or 1")]
    InvalidTrigger(u8),

    /// Room identifier could not be parsed.
    #[error("Invalid room id '{0}': expected a positive integer")]
    InvalidRoomId(String),
}

/// Result type alias using roomwatch-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// A timer transition that was rejected because its precondition did not hold.
///
/// These originate from admin actions and are reported back to the caller;
/// they are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer is already running")]
    StopwatchRunning,

    #[error("timer is not running")]
    StopwatchStopped,

    #[error("countdown timer is already running")]
    CountdownRunning,

    #[error("countdown timer is not running")]
    CountdownStopped,

    #[error("countdown timer has no target time set")]
    CountdownTargetUnset,

    /// The requested duration or adjustment does not fit in a timestamp.
    #[error("countdown duration of {minutes} minute(s) is out of range")]
    DurationOutOfRange { minutes: i64 },
}
