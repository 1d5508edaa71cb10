//! The per-room reconciliation step.
//!
//! [`reconcile`] folds one raw telemetry snapshot into a room's live state.
//! It performs no I/O, so the same transition serves the polling worker and
//! any future change-feed consumer.

use time::{Duration, OffsetDateTime};

use roomwatch_types::{RoomLiveState, RoomTelemetrySnapshot, Trigger};

/// What happened to the empirical ACH measurement during one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleEvent {
    /// The trigger rose; a measurement cycle began at the snapshot time.
    Started,
    /// The trigger fell after a timed cycle; `ach_empirical` was updated.
    Completed { duration: Duration, ach: f64 },
    /// The trigger fell but no usable cycle was open (missing start or a
    /// non-positive duration). The cycle start was cleared.
    Discarded,
}

/// Summary of a single reconciliation step, for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReconcileOutcome {
    /// `ach_theoretical` was recomputed.
    pub theoretical_updated: bool,
    pub cycle: Option<CycleEvent>,
    /// The countdown was running and reached its target.
    pub countdown_expired: bool,
}

/// Whether `raw` carries anything `live` has not yet absorbed.
///
/// A room that has never been processed always needs reconciling.
#[must_use]
pub fn needs_reconcile(raw: &RoomTelemetrySnapshot, live: &RoomLiveState) -> bool {
    match live.last_processed_at {
        Some(processed) => raw.last_modified > processed,
        None => true,
    }
}

/// Air changes per hour from a flow rate and a room volume.
///
/// Returns `None` unless both are positive.
#[must_use]
pub fn theoretical_ach(flow_rate: u32, volume: u32) -> Option<f64> {
    (flow_rate > 0 && volume > 0).then(|| f64::from(flow_rate) * 3600.0 / f64::from(volume))
}

/// Air changes per hour implied by one full trigger cycle.
///
/// Returns `None` unless the cycle is positive. Fractional seconds count.
#[must_use]
pub fn empirical_ach(cycle: Duration) -> Option<f64> {
    let secs = cycle.as_seconds_f64();
    (secs > 0.0).then(|| 3600.0 / secs)
}

/// Fold `raw` into `live`.
///
/// Steps run in a fixed order: theoretical ACH, trigger edge detection,
/// mirroring of sensor values, countdown expiry at `now`, and finally the
/// last-processed mark. The caller decides whether to call this at all
/// (see [`needs_reconcile`]); the step itself is unconditional.
pub fn reconcile(
    raw: &RoomTelemetrySnapshot,
    live: &mut RoomLiveState,
    now: OffsetDateTime,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    if let Some(ach) = theoretical_ach(raw.flow_rate, raw.volume) {
        live.ach_theoretical = ach;
        outcome.theoretical_updated = true;
    }

    outcome.cycle = match (live.trigger, raw.trigger) {
        (Trigger::Off, Trigger::On) => {
            live.cycle_started_at = Some(raw.last_modified);
            Some(CycleEvent::Started)
        }
        (Trigger::On, Trigger::Off) => {
            let event = live
                .cycle_started_at
                .take()
                .map(|start| raw.last_modified - start)
                .and_then(|duration| empirical_ach(duration).map(|ach| (duration, ach)));
            Some(match event {
                Some((duration, ach)) => {
                    live.ach_empirical = ach;
                    CycleEvent::Completed { duration, ach }
                }
                None => CycleEvent::Discarded,
            })
        }
        _ => None,
    };

    if let Some(temperature) = raw.temperature {
        live.temperature = temperature;
    }
    if let Some(pressure) = raw.pressure {
        live.pressure = pressure;
    }
    live.gases = raw.gases;
    live.trigger = raw.trigger;

    outcome.countdown_expired = live.countdown.expire_if_due(now);

    live.last_processed_at = Some(raw.last_modified);

    outcome
}
