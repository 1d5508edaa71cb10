//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        // Fresh database - create all tables
        create_schema_v1(conn)?;
        migrate_to_v2(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// All timestamps are unix milliseconds.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rooms (
            id INTEGER PRIMARY KEY CHECK (id > 0),
            name TEXT,
            created_at INTEGER NOT NULL
        );

        -- Latest raw snapshot, one row per room, overwritten by devices
        CREATE TABLE IF NOT EXISTS room_telemetry (
            room_id INTEGER PRIMARY KEY REFERENCES rooms(id),
            temperature REAL,
            humidity INTEGER,
            pressure REAL,
            room_on INTEGER,
            flow_rate INTEGER NOT NULL DEFAULT 0 CHECK (flow_rate >= 0),
            volume INTEGER NOT NULL DEFAULT 0 CHECK (volume >= 0),
            trigger_level INTEGER NOT NULL DEFAULT 0 CHECK (trigger_level IN (0, 1)),
            oxygen REAL,
            nitrous_oxide REAL,
            air REAL,
            vacuum_level INTEGER,
            instrument REAL,
            carbon REAL,
            last_modified INTEGER NOT NULL
        );

        -- Derived state, one row per room
        CREATE TABLE IF NOT EXISTS live_state (
            room_id INTEGER PRIMARY KEY REFERENCES rooms(id),
            ach_theoretical REAL NOT NULL DEFAULT 0,
            ach_empirical REAL NOT NULL DEFAULT 0,
            temperature REAL NOT NULL DEFAULT 0,
            pressure REAL NOT NULL DEFAULT 0,
            trigger_level INTEGER NOT NULL DEFAULT 0 CHECK (trigger_level IN (0, 1)),
            oxygen REAL,
            nitrous_oxide REAL,
            air REAL,
            vacuum_level INTEGER,
            instrument REAL,
            carbon REAL,
            stopwatch_started_at INTEGER,
            stopwatch_accumulated_secs INTEGER NOT NULL DEFAULT 0,
            stopwatch_running INTEGER NOT NULL DEFAULT 0,
            countdown_target INTEGER,
            countdown_duration_secs INTEGER NOT NULL DEFAULT 3600 CHECK (countdown_duration_secs > 0),
            countdown_running INTEGER NOT NULL DEFAULT 0,
            cycle_started_at INTEGER,
            last_processed_at INTEGER,
            version INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    if old_version < 2 {
        migrate_to_v2(conn)?;
    }
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Version 2: append-only audit trail of admin timer actions.
fn migrate_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id INTEGER NOT NULL REFERENCES rooms(id),
            action TEXT NOT NULL,
            details TEXT NOT NULL,
            recorded_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_room ON audit_log(room_id, id);
        "#,
    )?;
    Ok(())
}
