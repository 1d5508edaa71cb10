//! Admin control of the per-room stopwatch and countdown.
//!
//! Every action is a read-apply-save against the live-state repository.
//! The reconciliation worker saves the same rows, so a save can lose the
//! version race; the whole sequence is then retried with a fresh read.
//!
//! Each applied action is appended to the audit log once its save has
//! succeeded. Rejected actions leave no entry.

use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use roomwatch_types::{AuditEntry, RoomId, RoomLiveState, TimerError};

use crate::error::Result;
use crate::retry::{RetryConfig, with_retry};
use crate::traits::{AuditLog, LiveStateRepository};

/// An admin stopwatch action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchAction {
    Start,
    Stop,
    Reset,
}

impl StopwatchAction {
    /// Audit action name.
    pub fn audit_action(self) -> &'static str {
        "timer_operation"
    }
}

impl fmt::Display for StopwatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopwatchAction::Start => "start",
            StopwatchAction::Stop => "stop",
            StopwatchAction::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// An admin countdown action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownAction {
    /// Start a countdown; `None` or a non-positive value means 60 minutes.
    Start { minutes: Option<i64> },
    Stop,
    Reset,
    /// Move the running countdown's target by a signed number of minutes.
    Adjust { minutes: i64 },
}

impl CountdownAction {
    /// Audit action name; adjustments are recorded separately.
    pub fn audit_action(self) -> &'static str {
        match self {
            CountdownAction::Adjust { .. } => "countdown_timer_adjustment",
            _ => "countdown_timer_operation",
        }
    }
}

impl fmt::Display for CountdownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownAction::Start { minutes: Some(m) } => write!(f, "start ({m} min)"),
            CountdownAction::Start { minutes: None } => f.write_str("start"),
            CountdownAction::Stop => f.write_str("stop"),
            CountdownAction::Reset => f.write_str("reset"),
            CountdownAction::Adjust { minutes } => write!(f, "adjust ({minutes:+} min)"),
        }
    }
}

/// Applies admin timer actions to live-state rows.
#[derive(Clone)]
pub struct TimerControl {
    live_states: Arc<dyn LiveStateRepository>,
    audit: Arc<dyn AuditLog>,
    retry: RetryConfig,
}

impl TimerControl {
    /// Create a timer control with [`RetryConfig::for_timer_control`].
    pub fn new(live_states: Arc<dyn LiveStateRepository>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            live_states,
            audit,
            retry: RetryConfig::for_timer_control(),
        }
    }

    /// Use a custom retry policy for version conflicts.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Apply a stopwatch action and return the saved state.
    pub async fn stopwatch(&self, room: RoomId, action: StopwatchAction) -> Result<RoomLiveState> {
        let state = self
            .apply(room, "stopwatch", |state, now| match action {
                StopwatchAction::Start => state.stopwatch.start(now),
                StopwatchAction::Stop => state.stopwatch.stop(now),
                StopwatchAction::Reset => {
                    state.stopwatch.reset();
                    Ok(())
                }
            })
            .await?;
        info!("Room {}: stopwatch {}", room, action);
        self.record(room, action.audit_action(), format!("stopwatch {action}")).await;
        Ok(state)
    }

    /// Apply a countdown action and return the saved state.
    pub async fn countdown(&self, room: RoomId, action: CountdownAction) -> Result<RoomLiveState> {
        let state = self
            .apply(room, "countdown", |state, now| match action {
                CountdownAction::Start { minutes } => state.countdown.start(now, minutes),
                CountdownAction::Stop => state.countdown.stop(),
                CountdownAction::Reset => {
                    state.countdown.reset();
                    Ok(())
                }
                CountdownAction::Adjust { minutes } => state.countdown.adjust(now, minutes),
            })
            .await?;
        info!("Room {}: countdown {}", room, action);
        self.record(room, action.audit_action(), format!("countdown {action}")).await;
        Ok(state)
    }

    /// Append an audit entry. Failures are logged, not returned.
    async fn record(&self, room: RoomId, action: &str, details: String) {
        let entry = AuditEntry {
            room_id: room,
            action: action.to_string(),
            details,
            recorded_at: OffsetDateTime::now_utc(),
        };
        if let Err(e) = self.audit.append_audit(&entry).await {
            warn!("Room {}: failed to record audit entry: {}", room, e);
        }
    }

    async fn apply<F>(&self, room: RoomId, operation: &str, transition: F) -> Result<RoomLiveState>
    where
        F: Fn(&mut RoomLiveState, OffsetDateTime) -> std::result::Result<(), TimerError>
            + Send
            + Sync,
    {
        let live_states = &self.live_states;
        let transition = &transition;
        with_retry(&self.retry, operation, || async move {
            let mut state = live_states.get_live_state(room).await?;
            transition(&mut state, OffsetDateTime::now_utc())?;
            live_states.save_live_state(&state).await?;
            state.version += 1;
            Ok(state)
        })
        .await
    }
}
