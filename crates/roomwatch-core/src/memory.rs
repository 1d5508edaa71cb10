//! In-memory repository for testing.
//!
//! [`InMemoryStore`] implements every store contract with the same
//! semantics as the SQLite store (versioned saves, strictly increasing
//! `last_modified`), so the worker and timer control can be exercised
//! without a database.
//!
//! # Features
//!
//! - **Failure injection**: fail listings, fail one room, fail audit writes,
//!   or inject version conflicts
//! - **Latency simulation**: delay every call to exercise timeouts
//! - **Direct row access**: overwrite snapshots with explicit timestamps

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use roomwatch_types::{AuditEntry, RoomId, RoomLiveState, RoomTelemetrySnapshot, TelemetryUpdate};

use crate::error::{Error, Result};
use crate::traits::{AuditLog, LiveStateRepository, TelemetryRepository, TelemetrySink};
use crate::validation::TelemetryValidator;

/// An in-memory telemetry and live-state store.
///
/// ```
/// use roomwatch_core::{InMemoryStore, LiveStateRepository};
/// use roomwatch_types::RoomId;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::new();
///     store.provision_room(RoomId::new(1), 100).await;
///
///     let live = store.get_live_state(RoomId::new(1)).await.unwrap();
///     assert_eq!(live.version, 0);
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    telemetry: RwLock<BTreeMap<RoomId, RoomTelemetrySnapshot>>,
    live_states: RwLock<BTreeMap<RoomId, RoomLiveState>>,
    audit: RwLock<Vec<AuditEntry>>,
    validator: TelemetryValidator,
    fail_listing: AtomicBool,
    fail_audit: AtomicBool,
    failing_rooms: RwLock<HashSet<RoomId>>,
    /// Number of upcoming saves to reject with a version conflict.
    pending_conflicts: AtomicU32,
    save_count: AtomicU32,
    /// Simulated latency per call in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("save_count", &self.save_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create both rows for `room`, or update the volume of an existing room.
    pub async fn provision_room(&self, room: RoomId, volume: u32) {
        let now = OffsetDateTime::now_utc();
        self.telemetry
            .write()
            .await
            .entry(room)
            .and_modify(|snapshot| {
                if snapshot.volume != volume {
                    snapshot.volume = volume;
                    let floor = snapshot.last_modified + time::Duration::milliseconds(1);
                    snapshot.last_modified = now.max(floor);
                }
            })
            .or_insert_with(|| RoomTelemetrySnapshot::provisioned(room, volume, now));
        self.live_states
            .write()
            .await
            .entry(room)
            .or_insert_with(|| RoomLiveState::new(room));
    }

    // --- Test control methods ---

    /// Overwrite a raw snapshot as-is, including its `last_modified`.
    pub async fn put_snapshot(&self, snapshot: RoomTelemetrySnapshot) {
        self.telemetry
            .write()
            .await
            .insert(snapshot.room_id, snapshot);
    }

    /// Overwrite a live state as-is, including its version.
    pub async fn put_live_state(&self, state: RoomLiveState) {
        self.live_states.write().await.insert(state.room_id, state);
    }

    /// Remove a room's live state, leaving its raw snapshot in place.
    pub async fn remove_live_state(&self, room: RoomId) {
        self.live_states.write().await.remove(&room);
    }

    /// Peek at a live state without going through failure injection.
    pub async fn live_state(&self, room: RoomId) -> Option<RoomLiveState> {
        self.live_states.read().await.get(&room).cloned()
    }

    /// Make both list calls fail.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::Relaxed);
    }

    /// Make audit appends fail.
    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::Relaxed);
    }

    /// Audit entries appended so far, oldest first.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().await.clone()
    }

    /// Make every per-room call for `room` fail.
    pub async fn set_room_failing(&self, room: RoomId, fail: bool) {
        let mut rooms = self.failing_rooms.write().await;
        if fail {
            rooms.insert(room);
        } else {
            rooms.remove(&room);
        }
    }

    /// Reject the next `count` saves with a version conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::Relaxed);
    }

    /// Number of successful live-state saves.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::Relaxed)
    }

    /// Set simulated latency for every call.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    async fn simulate_latency(&self) {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }

    async fn check_listing(&self) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_listing.load(Ordering::Relaxed) {
            Err(Error::store("listing unavailable"))
        } else {
            Ok(())
        }
    }

    async fn check_room(&self, room: RoomId) -> Result<()> {
        self.simulate_latency().await;
        if self.failing_rooms.read().await.contains(&room) {
            Err(Error::store(format!("room {room} unavailable")))
        } else {
            Ok(())
        }
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TelemetryRepository for InMemoryStore {
    async fn list_all_room_telemetry(&self) -> Result<Vec<RoomTelemetrySnapshot>> {
        self.check_listing().await?;
        Ok(self.telemetry.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl TelemetrySink for InMemoryStore {
    async fn record_telemetry(
        &self,
        room: RoomId,
        update: &TelemetryUpdate,
    ) -> Result<RoomTelemetrySnapshot> {
        self.check_room(room).await?;
        self.validator.validate(update)?;

        let mut telemetry = self.telemetry.write().await;
        let snapshot = telemetry
            .get_mut(&room)
            .ok_or(Error::TelemetryNotFound(room))?;

        snapshot.apply_update(update);
        let now = OffsetDateTime::now_utc();
        let floor = snapshot.last_modified + time::Duration::milliseconds(1);
        snapshot.last_modified = now.max(floor);
        Ok(snapshot.clone())
    }
}

#[async_trait]
impl LiveStateRepository for InMemoryStore {
    async fn list_all_live_states(&self) -> Result<Vec<RoomLiveState>> {
        self.check_listing().await?;
        Ok(self.live_states.read().await.values().cloned().collect())
    }

    async fn ensure_live_state_exists(&self, room: RoomId) -> Result<()> {
        self.check_room(room).await?;
        self.live_states
            .write()
            .await
            .entry(room)
            .or_insert_with(|| RoomLiveState::new(room));
        Ok(())
    }

    async fn get_live_state(&self, room: RoomId) -> Result<RoomLiveState> {
        self.check_room(room).await?;
        self.live_states
            .read()
            .await
            .get(&room)
            .cloned()
            .ok_or(Error::LiveStateNotFound(room))
    }

    async fn save_live_state(&self, state: &RoomLiveState) -> Result<()> {
        let room = state.room_id;
        self.check_room(room).await?;

        if self.take_conflict() {
            return Err(Error::VersionConflict {
                room,
                expected: state.version,
                found: state.version + 1,
            });
        }

        let mut live_states = self.live_states.write().await;
        let found = live_states.get(&room).map_or(0, |stored| stored.version);
        if live_states.contains_key(&room) && found != state.version {
            return Err(Error::VersionConflict {
                room,
                expected: state.version,
                found,
            });
        }

        let mut saved = state.clone();
        saved.version = state.version + 1;
        live_states.insert(room, saved);
        self.save_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl AuditLog for InMemoryStore {
    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.check_room(entry.room_id).await?;
        if self.fail_audit.load(Ordering::Relaxed) {
            return Err(Error::store("audit log unavailable"));
        }
        self.audit.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomwatch_types::Trigger;

    const ROOM: RoomId = RoomId::new(3);

    #[tokio::test]
    async fn test_provision_creates_both_rows() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;

        let raw = store.list_all_room_telemetry().await.unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].volume, 80);
        assert_eq!(raw[0].trigger, Trigger::Off);

        let live = store.get_live_state(ROOM).await.unwrap();
        assert_eq!(live, RoomLiveState::new(ROOM));
    }

    #[tokio::test]
    async fn test_provision_is_idempotent_and_updates_volume() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;
        store
            .record_telemetry(
                ROOM,
                &TelemetryUpdate {
                    flow_rate: 400,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        store.provision_room(ROOM, 120).await;

        let raw = store.list_all_room_telemetry().await.unwrap();
        assert_eq!(raw[0].volume, 120);
        assert_eq!(raw[0].flow_rate, 400);
    }

    #[tokio::test]
    async fn test_record_telemetry_bumps_last_modified() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;

        let first = store
            .record_telemetry(ROOM, &TelemetryUpdate::default())
            .await
            .unwrap();
        let second = store
            .record_telemetry(ROOM, &TelemetryUpdate::default())
            .await
            .unwrap();

        assert!(second.last_modified > first.last_modified);
        assert_eq!(second.volume, 80);
    }

    #[tokio::test]
    async fn test_record_telemetry_unknown_room() {
        let store = InMemoryStore::new();
        let result = store
            .record_telemetry(ROOM, &TelemetryUpdate::default())
            .await;
        assert!(matches!(result, Err(Error::TelemetryNotFound(room)) if room == ROOM));
    }

    #[tokio::test]
    async fn test_record_telemetry_rejects_invalid() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;

        let update = TelemetryUpdate {
            humidity: Some(101),
            ..Default::default()
        };
        let result = store.record_telemetry(ROOM, &update).await;

        assert!(matches!(result, Err(Error::InvalidTelemetry(_))));
        let raw = store.list_all_room_telemetry().await.unwrap();
        assert_eq!(raw[0].humidity, None);
    }

    #[tokio::test]
    async fn test_ensure_live_state_is_idempotent() {
        let store = InMemoryStore::new();
        store.ensure_live_state_exists(ROOM).await.unwrap();

        let mut state = store.get_live_state(ROOM).await.unwrap();
        state.ach_theoretical = 12.0;
        store.save_live_state(&state).await.unwrap();

        store.ensure_live_state_exists(ROOM).await.unwrap();
        let state = store.get_live_state(ROOM).await.unwrap();
        assert_eq!(state.ach_theoretical, 12.0);
        assert_eq!(state.version, 1);
    }

    #[tokio::test]
    async fn test_get_missing_live_state() {
        let store = InMemoryStore::new();
        let result = store.get_live_state(ROOM).await;
        assert!(matches!(result, Err(Error::LiveStateNotFound(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_stale_version() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;

        let stale = store.get_live_state(ROOM).await.unwrap();
        let mut fresh = stale.clone();
        fresh.countdown.running = true;
        store.save_live_state(&fresh).await.unwrap();

        let result = store.save_live_state(&stale).await;
        assert!(matches!(
            result,
            Err(Error::VersionConflict {
                expected: 0,
                found: 1,
                ..
            })
        ));

        let stored = store.live_state(ROOM).await.unwrap();
        assert!(stored.countdown.running);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_conflicts_write_nothing() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;
        store.inject_conflicts(1);

        let mut state = store.get_live_state(ROOM).await.unwrap();
        state.ach_empirical = 9.0;

        assert!(store.save_live_state(&state).await.is_err());
        assert_eq!(store.live_state(ROOM).await.unwrap().ach_empirical, 0.0);

        store.save_live_state(&state).await.unwrap();
        assert_eq!(store.live_state(ROOM).await.unwrap().ach_empirical, 9.0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryStore::new();
        store.provision_room(ROOM, 80).await;

        store.set_fail_listing(true);
        assert!(store.list_all_live_states().await.is_err());
        assert!(store.list_all_room_telemetry().await.is_err());
        store.set_fail_listing(false);

        store.set_room_failing(ROOM, true).await;
        assert!(matches!(
            store.get_live_state(ROOM).await,
            Err(Error::Store(_))
        ));
        store.set_room_failing(ROOM, false).await;
        assert!(store.get_live_state(ROOM).await.is_ok());
    }
}
