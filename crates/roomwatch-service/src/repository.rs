//! SQLite-backed implementation of the core store contracts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use roomwatch_core::{
    AuditLog, Error, LiveStateRepository, Result, TelemetryRepository, TelemetrySink,
    TelemetryValidator,
};
use roomwatch_store::Store;
use roomwatch_types::{AuditEntry, RoomId, RoomLiveState, RoomTelemetrySnapshot, TelemetryUpdate};

/// Adapts the shared [`Store`] to the async repository traits.
///
/// Every call must acquire the store within `timeout`, otherwise it fails
/// with [`Error::Timeout`].
#[derive(Clone)]
pub struct StoreRepository {
    store: Arc<Mutex<Store>>,
    timeout: Duration,
    validator: TelemetryValidator,
}

impl StoreRepository {
    pub fn new(store: Arc<Mutex<Store>>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            validator: TelemetryValidator::default(),
        }
    }

    async fn lock(&self, operation: &str) -> Result<MutexGuard<'_, Store>> {
        tokio::time::timeout(self.timeout, self.store.lock())
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
                duration: self.timeout,
            })
    }
}

impl std::fmt::Debug for StoreRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRepository")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Map a store error, naming which row was missing.
fn map_store_error(err: roomwatch_store::Error, missing: fn(RoomId) -> Error) -> Error {
    match err {
        roomwatch_store::Error::RoomNotFound(room) => missing(room),
        roomwatch_store::Error::VersionConflict {
            room,
            expected,
            found,
        } => Error::VersionConflict {
            room,
            expected,
            found,
        },
        other => Error::store(other),
    }
}

#[async_trait]
impl TelemetryRepository for StoreRepository {
    async fn list_all_room_telemetry(&self) -> Result<Vec<RoomTelemetrySnapshot>> {
        let store = self.lock("list_all_room_telemetry").await?;
        store
            .list_telemetry()
            .map_err(|e| map_store_error(e, Error::TelemetryNotFound))
    }
}

#[async_trait]
impl TelemetrySink for StoreRepository {
    async fn record_telemetry(
        &self,
        room: RoomId,
        update: &TelemetryUpdate,
    ) -> Result<RoomTelemetrySnapshot> {
        self.validator.validate(update)?;
        let store = self.lock("record_telemetry").await?;
        store
            .record_telemetry(room, update)
            .map_err(|e| map_store_error(e, Error::TelemetryNotFound))
    }
}

#[async_trait]
impl LiveStateRepository for StoreRepository {
    async fn list_all_live_states(&self) -> Result<Vec<RoomLiveState>> {
        let store = self.lock("list_all_live_states").await?;
        store
            .list_live_states()
            .map_err(|e| map_store_error(e, Error::LiveStateNotFound))
    }

    async fn ensure_live_state_exists(&self, room: RoomId) -> Result<()> {
        let store = self.lock("ensure_live_state_exists").await?;
        store
            .ensure_live_state(room)
            .map(|_| ())
            .map_err(|e| map_store_error(e, Error::LiveStateNotFound))
    }

    async fn get_live_state(&self, room: RoomId) -> Result<RoomLiveState> {
        let store = self.lock("get_live_state").await?;
        store
            .get_live_state(room)
            .map_err(|e| map_store_error(e, Error::LiveStateNotFound))?
            .ok_or(Error::LiveStateNotFound(room))
    }

    async fn save_live_state(&self, state: &RoomLiveState) -> Result<()> {
        let store = self.lock("save_live_state").await?;
        store
            .save_live_state(state)
            .map(|_| ())
            .map_err(|e| map_store_error(e, Error::LiveStateNotFound))
    }
}

#[async_trait]
impl AuditLog for StoreRepository {
    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        let store = self.lock("append_audit").await?;
        store
            .append_audit(entry)
            .map(|_| ())
            .map_err(|e| map_store_error(e, Error::LiveStateNotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> StoreRepository {
        let store = Store::open_in_memory().unwrap();
        StoreRepository::new(Arc::new(Mutex::new(store)), Duration::from_secs(1))
    }

    async fn provision(repo: &StoreRepository, id: u32, volume: u32) {
        let store = repo.store.lock().await;
        store.provision_room(RoomId::new(id), None, volume).unwrap();
    }

    #[tokio::test]
    async fn test_list_after_provision() {
        let repo = repository();
        provision(&repo, 1, 100).await;
        provision(&repo, 2, 80).await;

        let snapshots = repo.list_all_room_telemetry().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].volume, 100);

        let states = repo.list_all_live_states().await.unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|s| s.version == 0));
    }

    #[tokio::test]
    async fn test_get_live_state_missing_room() {
        let repo = repository();
        let err = repo.get_live_state(RoomId::new(9)).await.unwrap_err();
        assert!(matches!(err, Error::LiveStateNotFound(room) if room == RoomId::new(9)));
    }

    #[tokio::test]
    async fn test_ensure_live_state_unprovisioned() {
        let repo = repository();
        let err = repo
            .ensure_live_state_exists(RoomId::new(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LiveStateNotFound(_)));
    }

    #[tokio::test]
    async fn test_record_telemetry_unprovisioned() {
        let repo = repository();
        let update = TelemetryUpdate {
            flow_rate: 100,
            ..Default::default()
        };
        let err = repo
            .record_telemetry(RoomId::new(5), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TelemetryNotFound(_)));
    }

    #[tokio::test]
    async fn test_record_telemetry_validates_first() {
        let repo = repository();
        provision(&repo, 1, 100).await;

        let update = TelemetryUpdate {
            temperature: Some(250.0),
            ..Default::default()
        };
        let err = repo
            .record_telemetry(RoomId::new(1), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTelemetry(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_save_conflict_maps_to_core_error() {
        let repo = repository();
        provision(&repo, 1, 100).await;

        let state = repo.get_live_state(RoomId::new(1)).await.unwrap();
        repo.save_live_state(&state).await.unwrap();

        let err = repo.save_live_state(&state).await.unwrap_err();
        match err {
            Error::VersionConflict {
                room,
                expected,
                found,
            } => {
                assert_eq!(room, RoomId::new(1));
                assert_eq!(expected, 0);
                assert_eq!(found, 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let stored = repo.get_live_state(RoomId::new(1)).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_append_audit() {
        let repo = repository();
        provision(&repo, 1, 100).await;

        let entry = AuditEntry {
            room_id: RoomId::new(1),
            action: "countdown_timer_adjustment".to_string(),
            details: "countdown adjust (+10 min)".to_string(),
            recorded_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        repo.append_audit(&entry).await.unwrap();

        let stored = repo.store.lock().await.list_audit(None).unwrap();
        assert_eq!(stored, vec![entry.clone()]);

        let orphan = AuditEntry {
            room_id: RoomId::new(8),
            ..entry
        };
        let err = repo.append_audit(&orphan).await.unwrap_err();
        assert!(matches!(err, Error::LiveStateNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_timeout() {
        let repo = StoreRepository::new(
            Arc::new(Mutex::new(Store::open_in_memory().unwrap())),
            Duration::from_millis(50),
        );
        let _held = repo.store.lock().await;

        let err = repo.list_all_live_states().await.unwrap_err();
        match err {
            Error::Timeout {
                operation,
                duration,
            } => {
                assert_eq!(operation, "list_all_live_states");
                assert_eq!(duration, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
