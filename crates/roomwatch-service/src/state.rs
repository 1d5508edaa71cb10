//! Application state shared by the worker and the admin commands.
//!
//! # Broadcast Channel Behavior
//!
//! Every live state saved by the worker is published on `events_tx`.
//!
//! - **Buffer size**: Configurable via `server.broadcast_buffer` (default: 100)
//! - **Message loss**: A subscriber that falls behind loses the oldest events
//! - **No blocking**: Sending never waits on subscribers; with no subscribers
//!   the event is dropped

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use roomwatch_core::{ReconcileOutcome, RoomUpdate};
use roomwatch_store::Store;
use roomwatch_types::{RoomId, RoomLiveState};

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The data store, shared with the repository adapter.
    pub store: Arc<Mutex<Store>>,
    /// Configuration (RwLock for runtime updates).
    pub config: RwLock<Config>,
    /// Broadcast channel for saved live states.
    pub events_tx: broadcast::Sender<LiveStateEvent>,
    /// Worker control state.
    pub worker: WorkerState,
}

impl AppState {
    /// Create new application state.
    ///
    /// The broadcast channel buffer size is determined by `config.server.broadcast_buffer`.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        let buffer_size = config.server.broadcast_buffer.max(1);
        let (events_tx, _) = broadcast::channel(buffer_size);
        Arc::new(Self {
            store: Arc::new(Mutex::new(store)),
            config: RwLock::new(config),
            events_tx,
            worker: WorkerState::new(),
        })
    }

    /// Subscribe to live-state events.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveStateEvent> {
        self.events_tx.subscribe()
    }
}

/// State for tracking and controlling the worker.
pub struct WorkerState {
    /// Whether the worker loop is currently running.
    running: AtomicBool,
    /// When the worker was started (Unix timestamp).
    started_at: AtomicU64,
    /// Cancellation token observed by the running loop.
    cancel: std::sync::Mutex<CancellationToken>,
    /// Cumulative tick statistics.
    pub stats: RwLock<WorkerStats>,
}

impl WorkerState {
    /// Create a new worker state.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            stats: RwLock::new(WorkerStats::default()),
        }
    }

    /// Check if the worker is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the worker as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the worker start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// The token the next worker loop will observe.
    pub fn cancel_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Signal the worker to stop.
    ///
    /// A tick in progress finishes its current room and stops there.
    pub fn signal_stop(&self) {
        self.cancel_token().cancel();
        self.running.store(false, Ordering::SeqCst);
    }

    /// Replace a cancelled token (for restarting).
    pub fn reset_stop(&self) {
        let mut guard = match self.cancel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_cancelled() {
            *guard = CancellationToken::new();
        }
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative worker statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerStats {
    /// Ticks that listed both stores.
    pub ticks: u64,
    /// Ticks aborted because a listing failed.
    pub failed_ticks: u64,
    /// Live states saved across all ticks.
    pub rooms_updated: u64,
    /// Per-room failures across all ticks.
    pub room_failures: u64,
    /// Time of the last completed tick.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_tick_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// A saved live state, broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct LiveStateEvent {
    pub room_id: RoomId,
    /// The state as stored.
    pub state: RoomLiveState,
    /// The theoretical ACH was recomputed.
    pub theoretical_updated: bool,
    /// An empirical cycle completed and the metric was updated.
    pub cycle_completed: bool,
    /// The countdown reached its target during this tick.
    pub countdown_expired: bool,
}

impl From<&RoomUpdate> for LiveStateEvent {
    fn from(update: &RoomUpdate) -> Self {
        let ReconcileOutcome {
            theoretical_updated,
            cycle,
            countdown_expired,
        } = &update.outcome;

        Self {
            room_id: update.state.room_id,
            state: update.state.clone(),
            theoretical_updated: *theoretical_updated,
            cycle_completed: matches!(cycle, Some(roomwatch_core::CycleEvent::Completed { .. })),
            countdown_expired: *countdown_expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use roomwatch_core::CycleEvent;

    #[tokio::test]
    async fn test_app_state_new() {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default());

        assert!(!state.worker.is_running());
        assert!(state.worker.started_at().is_none());
        assert_eq!(state.config.read().await.server.broadcast_buffer, 100);
        assert_eq!(state.worker.stats.read().await.ticks, 0);
    }

    #[test]
    fn test_worker_state_running() {
        let worker = WorkerState::new();
        assert!(!worker.is_running());

        worker.set_running(true);
        assert!(worker.is_running());
        assert!(worker.started_at().is_some());

        worker.set_running(false);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_worker_state_stop_and_reset() {
        let worker = WorkerState::new();
        worker.set_running(true);

        let token = worker.cancel_token();
        assert!(!token.is_cancelled());

        worker.signal_stop();
        assert!(token.is_cancelled());
        assert!(!worker.is_running());
        assert!(worker.cancel_token().is_cancelled());

        worker.reset_stop();
        assert!(!worker.cancel_token().is_cancelled());
        // Handed-out tokens stay cancelled
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_reset_stop_keeps_live_token() {
        let worker = WorkerState::new();
        let before = worker.cancel_token();
        worker.reset_stop();

        worker.signal_stop();
        assert!(before.is_cancelled());
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default());

        let event = LiveStateEvent {
            room_id: RoomId::new(1),
            state: RoomLiveState::new(RoomId::new(1)),
            theoretical_updated: false,
            cycle_completed: false,
            countdown_expired: false,
        };
        assert!(state.events_tx.send(event).is_err());
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let store = Store::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default());
        let mut rx = state.subscribe();

        let update = RoomUpdate {
            state: RoomLiveState::new(RoomId::new(4)),
            outcome: ReconcileOutcome {
                theoretical_updated: true,
                cycle: Some(CycleEvent::Completed {
                    duration: time::Duration::seconds(60),
                    ach: 60.0,
                }),
                countdown_expired: false,
            },
        };
        state.events_tx.send(LiveStateEvent::from(&update)).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.room_id, RoomId::new(4));
        assert!(event.theoretical_updated);
        assert!(event.cycle_completed);
        assert!(!event.countdown_expired);
    }

    #[test]
    fn test_started_cycle_is_not_completed() {
        let update = RoomUpdate {
            state: RoomLiveState::new(RoomId::new(2)),
            outcome: ReconcileOutcome {
                theoretical_updated: false,
                cycle: Some(CycleEvent::Started),
                countdown_expired: true,
            },
        };
        let event = LiveStateEvent::from(&update);
        assert!(!event.cycle_completed);
        assert!(event.countdown_expired);
    }

    #[test]
    fn test_event_serializes() {
        let event = LiveStateEvent {
            room_id: RoomId::new(3),
            state: RoomLiveState::new(RoomId::new(3)),
            theoretical_updated: false,
            cycle_completed: false,
            countdown_expired: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["room_id"], 3);
        assert_eq!(json["state"]["version"], 0);
    }
}
