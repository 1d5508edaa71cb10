//! Local persistence for room telemetry and derived live state.
//!
//! This crate provides SQLite-based storage for the two per-room rows the
//! reconciliation worker joins: the raw telemetry snapshot written by
//! devices and the live state written by the worker and admin timer
//! control.
//!
//! # Features
//!
//! - Room provisioning (room, telemetry and live-state rows in one step)
//! - Device writes with a strictly increasing `last_modified`
//! - Versioned live-state saves for optimistic concurrency
//! - An append-only audit trail of admin timer actions
//! - Schema versioning and WAL mode so the CLI can share the file with a
//!   running worker
//!
//! # Example
//!
//! ```no_run
//! use roomwatch_store::{Store, default_db_path};
//! use roomwatch_types::{RoomId, TelemetryUpdate};
//!
//! let store = Store::open(default_db_path())?;
//! store.provision_room(RoomId::new(1), Some("OR 1"), 120)?;
//!
//! let update = TelemetryUpdate { flow_rate: 600, ..Default::default() };
//! let snapshot = store.record_telemetry(RoomId::new(1), &update)?;
//! println!("recorded at {}", snapshot.last_modified);
//! # Ok::<(), roomwatch_store::Error>(())
//! ```

mod error;
mod models;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredRoom;
pub use schema::SCHEMA_VERSION;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/roomwatch/data.db`
/// - macOS: `~/Library/Application Support/roomwatch/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\roomwatch\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("roomwatch")
        .join("data.db")
}
