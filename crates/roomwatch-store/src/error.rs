//! Error types for roomwatch-store.

use std::path::PathBuf;

use roomwatch_types::RoomId;

/// Result type for roomwatch-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in roomwatch-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Room not provisioned.
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Live state was saved by another writer since it was read.
    #[error("Live state for room {room} is at version {found}, expected {expected}")]
    VersionConflict {
        room: RoomId,
        expected: u64,
        found: u64,
    },
}
