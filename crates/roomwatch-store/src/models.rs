//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use roomwatch_types::RoomId;

/// A provisioned room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRoom {
    pub id: RoomId,
    /// Display name.
    pub name: Option<String>,
    /// Room volume, mirrored into the room's telemetry row.
    pub volume: u32,
    /// When the room was first provisioned.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
