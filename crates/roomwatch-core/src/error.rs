//! Error types for roomwatch-core.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::VersionConflict`] | Re-read and retry | Another writer saved the row first |
//! | [`Error::Timeout`] | Retry | Store was slow or briefly unavailable |
//! | [`Error::Store`] | Retry | Usually transient connectivity |
//! | [`Error::LiveStateNotFound`] | Do not retry | Room is not provisioned |
//! | [`Error::TelemetryNotFound`] | Do not retry | Room is not provisioned |
//! | [`Error::Timer`] | Do not retry | Admin action rejected by the timer state |
//! | [`Error::InvalidTelemetry`] | Do not retry | Device sent out-of-range data |
//!
//! The reconciliation worker never retries inside a tick: a failed room is
//! simply picked up again on the next tick because its last-processed mark
//! was not advanced. Admin timer control retries with
//! [`crate::with_retry`].

use std::time::Duration;

use thiserror::Error;

use roomwatch_types::{RoomId, TimerError};

use crate::validation::TelemetryViolation;

/// Errors that can occur in roomwatch-core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No live-state row exists for the room.
    #[error("Live state not found for room {0}")]
    LiveStateNotFound(RoomId),

    /// No raw telemetry row exists for the room.
    #[error("Telemetry not found for room {0}")]
    TelemetryNotFound(RoomId),

    /// The live-state row was saved by another writer since it was read.
    #[error("Version conflict on room {room}: expected version {expected}, found {found}")]
    VersionConflict {
        room: RoomId,
        expected: u64,
        found: u64,
    },

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A store call did not complete in time.
    #[error("Store operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// An admin timer action was rejected.
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// A device write failed validation.
    #[error("Invalid telemetry: {}", format_violations(.0))]
    InvalidTelemetry(Vec<TelemetryViolation>),
}

impl Error {
    /// Create a store error from anything displayable.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::Store(err.to_string())
    }

    /// Whether retrying the same operation can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::VersionConflict { .. } | Error::Timeout { .. } | Error::Store(_)
        )
    }
}

fn format_violations(violations: &[TelemetryViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using roomwatch-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
