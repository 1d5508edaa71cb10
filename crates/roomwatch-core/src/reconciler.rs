//! Tick dispatch: one full pass over every room.

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use roomwatch_types::{RoomId, RoomLiveState, RoomTelemetrySnapshot};

use crate::error::{Error, Result};
use crate::reconcile::{CycleEvent, ReconcileOutcome, needs_reconcile, reconcile};
use crate::traits::{LiveStateRepository, TelemetryRepository};

/// A room whose live state was reconciled and saved during a tick.
#[derive(Debug, Clone)]
pub struct RoomUpdate {
    /// The state as stored, version included.
    pub state: RoomLiveState,
    pub outcome: ReconcileOutcome,
}

/// A room abandoned for this tick.
#[derive(Debug)]
pub struct RoomFailure {
    pub room: RoomId,
    pub error: Error,
}

/// Summary of a single tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Rooms reconciled and saved.
    pub updated: Vec<RoomUpdate>,
    /// Rooms with nothing new since they were last processed.
    pub skipped: usize,
    /// Rooms whose missing live state was created during this tick.
    pub provisioned: usize,
    pub failed: Vec<RoomFailure>,
    /// The tick stopped early because shutdown was requested.
    pub cancelled: bool,
}

impl TickReport {
    /// Number of rooms this tick looked at.
    #[must_use]
    pub fn rooms_seen(&self) -> usize {
        self.updated.len() + self.skipped + self.failed.len()
    }
}

enum RoomStep {
    Skipped,
    Updated(RoomUpdate),
}

/// Runs reconciliation ticks against a pair of repositories.
///
/// Holds no state between ticks; every tick re-reads both stores.
#[derive(Clone)]
pub struct Reconciler {
    telemetry: Arc<dyn TelemetryRepository>,
    live_states: Arc<dyn LiveStateRepository>,
}

impl Reconciler {
    pub fn new(
        telemetry: Arc<dyn TelemetryRepository>,
        live_states: Arc<dyn LiveStateRepository>,
    ) -> Self {
        Self {
            telemetry,
            live_states,
        }
    }

    /// Run one tick at the current wall-clock time.
    pub async fn run_tick(&self, cancel: &CancellationToken) -> Result<TickReport> {
        self.run_tick_at(cancel, OffsetDateTime::now_utc()).await
    }

    /// Run one tick, evaluating countdown expiry at `now`.
    ///
    /// Fails only if either full listing fails. Errors on a single room are
    /// logged and collected in [`TickReport::failed`]; that room is retried
    /// on the next tick because its last-processed mark did not advance.
    pub async fn run_tick_at(
        &self,
        cancel: &CancellationToken,
        now: OffsetDateTime,
    ) -> Result<TickReport> {
        let snapshots = self.telemetry.list_all_room_telemetry().await?;
        let mut live_by_room: HashMap<RoomId, RoomLiveState> = self
            .live_states
            .list_all_live_states()
            .await?
            .into_iter()
            .map(|state| (state.room_id, state))
            .collect();

        let mut report = TickReport::default();

        for raw in &snapshots {
            if cancel.is_cancelled() {
                debug!("Tick cancelled before room {}", raw.room_id);
                report.cancelled = true;
                break;
            }

            let existing = live_by_room.remove(&raw.room_id);
            match self
                .process_room(raw, existing, now, &mut report.provisioned)
                .await
            {
                Ok(RoomStep::Skipped) => report.skipped += 1,
                Ok(RoomStep::Updated(update)) => {
                    log_outcome(&update);
                    report.updated.push(update);
                }
                Err(error) => {
                    warn!("Failed to reconcile room {}: {}", raw.room_id, error);
                    report.failed.push(RoomFailure {
                        room: raw.room_id,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn process_room(
        &self,
        raw: &RoomTelemetrySnapshot,
        existing: Option<RoomLiveState>,
        now: OffsetDateTime,
        provisioned: &mut usize,
    ) -> Result<RoomStep> {
        let room = raw.room_id;
        let mut live = match existing {
            Some(live) => live,
            None => {
                info!("Creating missing live state for room {}", room);
                self.live_states.ensure_live_state_exists(room).await?;
                // Counted once the row exists, even if a later step fails
                *provisioned += 1;
                self.live_states.get_live_state(room).await?
            }
        };

        if !needs_reconcile(raw, &live) {
            return Ok(RoomStep::Skipped);
        }

        let outcome = reconcile(raw, &mut live, now);
        self.live_states.save_live_state(&live).await?;
        live.version += 1;

        Ok(RoomStep::Updated(RoomUpdate {
            state: live,
            outcome,
        }))
    }
}

fn log_outcome(update: &RoomUpdate) {
    let room = update.state.room_id;
    match update.outcome.cycle {
        Some(CycleEvent::Started) => debug!("Room {}: ventilation cycle started", room),
        Some(CycleEvent::Completed { duration, ach }) => info!(
            "Room {}: cycle completed in {:.1}s, empirical ACH {:.2}",
            room,
            duration.as_seconds_f64(),
            ach
        ),
        Some(CycleEvent::Discarded) => {
            debug!("Room {}: trigger fell without a timed cycle", room)
        }
        None => {}
    }
    if update.outcome.countdown_expired {
        info!("Room {}: countdown expired", room);
    }
    debug!(
        "Room {} reconciled (theoretical ACH {:.2}, version {})",
        room, update.state.ach_theoretical, update.state.version
    );
}
