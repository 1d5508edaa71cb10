//! Store contracts consumed by the reconciliation worker.
//!
//! The worker only ever talks to the stores through these traits, so the
//! same dispatch code runs against SQLite in production and against
//! [`crate::InMemoryStore`] in tests.

use async_trait::async_trait;

use roomwatch_types::{AuditEntry, RoomId, RoomLiveState, RoomTelemetrySnapshot, TelemetryUpdate};

use crate::error::Result;

/// Read access to the raw telemetry rows.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Every room's latest raw snapshot.
    async fn list_all_room_telemetry(&self) -> Result<Vec<RoomTelemetrySnapshot>>;
}

/// Device-side writes to the raw telemetry rows.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Overwrite a provisioned room's snapshot with a device reading.
    ///
    /// The store keeps the room's volume and advances `last_modified` past
    /// its previous value. Fails with
    /// [`Error::TelemetryNotFound`](crate::Error::TelemetryNotFound) for an
    /// unprovisioned room.
    async fn record_telemetry(
        &self,
        room: RoomId,
        update: &TelemetryUpdate,
    ) -> Result<RoomTelemetrySnapshot>;
}

/// Access to the derived live-state rows.
#[async_trait]
pub trait LiveStateRepository: Send + Sync {
    /// Every room's live state.
    async fn list_all_live_states(&self) -> Result<Vec<RoomLiveState>>;

    /// Create a default live state for `room` unless one already exists.
    async fn ensure_live_state_exists(&self, room: RoomId) -> Result<()>;

    /// Fetch one room's live state.
    ///
    /// Fails with [`Error::LiveStateNotFound`](crate::Error::LiveStateNotFound)
    /// if the row does not exist.
    async fn get_live_state(&self, room: RoomId) -> Result<RoomLiveState>;

    /// Overwrite the full row.
    ///
    /// The save only succeeds if the stored row still carries
    /// `state.version`; the stored version is then incremented. Otherwise
    /// nothing is written and
    /// [`Error::VersionConflict`](crate::Error::VersionConflict) is returned.
    async fn save_live_state(&self, state: &RoomLiveState) -> Result<()>;
}

/// Append-only record of admin timer actions.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append_audit(&self, entry: &AuditEntry) -> Result<()>;
}
