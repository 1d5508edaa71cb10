//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, info};

use roomwatch_types::{
    AuditEntry, Countdown, GasReadings, RoomId, RoomLiveState, RoomTelemetrySnapshot, Stopwatch,
    TelemetryUpdate, Trigger,
};

use crate::error::{Error, Result};
use crate::models::StoredRoom;
use crate::schema;

const TELEMETRY_COLUMNS: &str = "room_id, temperature, humidity, pressure, room_on, flow_rate, \
     volume, trigger_level, oxygen, nitrous_oxide, air, vacuum_level, instrument, carbon, \
     last_modified";

const LIVE_STATE_COLUMNS: &str = "room_id, ach_theoretical, ach_empirical, temperature, \
     pressure, trigger_level, oxygen, nitrous_oxide, air, vacuum_level, instrument, carbon, \
     stopwatch_started_at, stopwatch_accumulated_secs, stopwatch_running, countdown_target, \
     countdown_duration_secs, countdown_running, cycle_started_at, last_processed_at, version";

/// SQLite-based store for room telemetry and live state.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // The CLI and the worker may hold the file at the same time
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // === Room operations ===

    /// Provision a room: create its room, telemetry and live-state rows.
    ///
    /// Idempotent. For an existing room the name is updated when given,
    /// and a changed volume is written to the telemetry row with a bumped
    /// `last_modified` so the worker picks it up.
    pub fn provision_room(
        &self,
        room: RoomId,
        name: Option<&str>,
        volume: u32,
    ) -> Result<StoredRoom> {
        let now = to_millis(OffsetDateTime::now_utc());
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO rooms (id, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = COALESCE(?2, name)",
            rusqlite::params![room.get(), name, now],
        )?;
        tx.execute(
            "INSERT INTO room_telemetry (room_id, volume, last_modified) VALUES (?1, ?2, ?3)
             ON CONFLICT(room_id) DO UPDATE SET
                volume = ?2,
                last_modified = MAX(?3, last_modified + 1)
             WHERE volume != ?2",
            rusqlite::params![room.get(), volume, now],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO live_state (room_id) VALUES (?1)",
            [room.get()],
        )?;
        tx.commit()?;

        debug!("Provisioned room {} (volume {})", room, volume);
        self.get_room(room)?.ok_or(Error::RoomNotFound(room))
    }

    /// Get a room by id.
    pub fn get_room(&self, room: RoomId) -> Result<Option<StoredRoom>> {
        let stored = self
            .conn
            .query_row(
                "SELECT r.id, r.name, t.volume, r.created_at
                 FROM rooms r JOIN room_telemetry t ON t.room_id = r.id
                 WHERE r.id = ?",
                [room.get()],
                room_from_row,
            )
            .optional()?;
        Ok(stored)
    }

    /// List all rooms ordered by id.
    pub fn list_rooms(&self) -> Result<Vec<StoredRoom>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.name, t.volume, r.created_at
             FROM rooms r JOIN room_telemetry t ON t.room_id = r.id
             ORDER BY r.id",
        )?;
        let rooms = stmt
            .query_map([], room_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    fn room_exists(&self, room: RoomId) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM rooms WHERE id = ?",
            [room.get()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // === Telemetry operations ===

    /// Overwrite a room's raw snapshot with a device reading.
    ///
    /// The volume is kept. `last_modified` becomes the current time, or one
    /// millisecond past its previous value if the clock has not moved on.
    pub fn record_telemetry(
        &self,
        room: RoomId,
        update: &TelemetryUpdate,
    ) -> Result<RoomTelemetrySnapshot> {
        let now = to_millis(OffsetDateTime::now_utc());
        let gases = &update.gases;

        let changed = self.conn.execute(
            "UPDATE room_telemetry SET
                temperature = ?2, humidity = ?3, pressure = ?4, room_on = ?5,
                flow_rate = ?6, trigger_level = ?7,
                oxygen = ?8, nitrous_oxide = ?9, air = ?10, vacuum_level = ?11,
                instrument = ?12, carbon = ?13,
                last_modified = MAX(?14, last_modified + 1)
             WHERE room_id = ?1",
            rusqlite::params![
                room.get(),
                update.temperature,
                update.humidity,
                update.pressure,
                update.room_on,
                update.flow_rate,
                u8::from(update.trigger),
                gases.oxygen,
                gases.nitrous_oxide,
                gases.air,
                gases.vacuum,
                gases.instrument,
                gases.carbon,
                now,
            ],
        )?;

        if changed == 0 {
            return Err(Error::RoomNotFound(room));
        }

        self.get_telemetry(room)?.ok_or(Error::RoomNotFound(room))
    }

    /// Get a room's raw snapshot.
    pub fn get_telemetry(&self, room: RoomId) -> Result<Option<RoomTelemetrySnapshot>> {
        let snapshot = self
            .conn
            .query_row(
                &format!("SELECT {TELEMETRY_COLUMNS} FROM room_telemetry WHERE room_id = ?"),
                [room.get()],
                telemetry_from_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    /// Every room's raw snapshot, ordered by room id.
    pub fn list_telemetry(&self) -> Result<Vec<RoomTelemetrySnapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TELEMETRY_COLUMNS} FROM room_telemetry ORDER BY room_id"
        ))?;
        let snapshots = stmt
            .query_map([], telemetry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    // === Live state operations ===

    /// Get a room's live state.
    pub fn get_live_state(&self, room: RoomId) -> Result<Option<RoomLiveState>> {
        let state = self
            .conn
            .query_row(
                &format!("SELECT {LIVE_STATE_COLUMNS} FROM live_state WHERE room_id = ?"),
                [room.get()],
                live_state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    /// Every room's live state, ordered by room id.
    pub fn list_live_states(&self) -> Result<Vec<RoomLiveState>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LIVE_STATE_COLUMNS} FROM live_state ORDER BY room_id"
        ))?;
        let states = stmt
            .query_map([], live_state_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(states)
    }

    /// Create a default live state for a provisioned room.
    ///
    /// Returns `true` if a row was created.
    pub fn ensure_live_state(&self, room: RoomId) -> Result<bool> {
        if !self.room_exists(room)? {
            return Err(Error::RoomNotFound(room));
        }
        let created = self.conn.execute(
            "INSERT OR IGNORE INTO live_state (room_id) VALUES (?1)",
            [room.get()],
        )?;
        if created > 0 {
            debug!("Created live state for room {}", room);
        }
        Ok(created > 0)
    }

    /// Save the full row if the stored version still equals `state.version`.
    ///
    /// Returns the new version. A missing row is inserted as long as the
    /// room is provisioned.
    pub fn save_live_state(&self, state: &RoomLiveState) -> Result<u64> {
        let room = state.room_id;
        let next_version = state.version + 1;
        let gases = &state.gases;
        let stopwatch = &state.stopwatch;
        let countdown = &state.countdown;
        let trigger_level = u8::from(state.trigger);
        let stopwatch_started_at = stopwatch.started_at.map(to_millis);
        let countdown_target = countdown.target.map(to_millis);
        let cycle_started_at = state.cycle_started_at.map(to_millis);
        let last_processed_at = state.last_processed_at.map(to_millis);

        let params = rusqlite::params![
            room.get(),
            state.ach_theoretical,
            state.ach_empirical,
            state.temperature,
            state.pressure,
            trigger_level,
            gases.oxygen,
            gases.nitrous_oxide,
            gases.air,
            gases.vacuum,
            gases.instrument,
            gases.carbon,
            stopwatch_started_at,
            stopwatch.accumulated_secs,
            stopwatch.running,
            countdown_target,
            countdown.duration_secs,
            countdown.running,
            cycle_started_at,
            last_processed_at,
            next_version,
            state.version,
        ];

        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE live_state SET
                ach_theoretical = ?2, ach_empirical = ?3, temperature = ?4, pressure = ?5,
                trigger_level = ?6, oxygen = ?7, nitrous_oxide = ?8, air = ?9, vacuum_level = ?10,
                instrument = ?11, carbon = ?12,
                stopwatch_started_at = ?13, stopwatch_accumulated_secs = ?14,
                stopwatch_running = ?15, countdown_target = ?16,
                countdown_duration_secs = ?17, countdown_running = ?18,
                cycle_started_at = ?19, last_processed_at = ?20, version = ?21
             WHERE room_id = ?1 AND version = ?22",
            params,
        )?;

        if updated == 0 {
            let found: Option<u64> = tx
                .query_row(
                    "SELECT version FROM live_state WHERE room_id = ?",
                    [room.get()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(found) = found {
                return Err(Error::VersionConflict {
                    room,
                    expected: state.version,
                    found,
                });
            }
            if !self.room_exists(room)? {
                return Err(Error::RoomNotFound(room));
            }
            tx.execute(
                &format!(
                    "INSERT INTO live_state ({LIVE_STATE_COLUMNS}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21)"
                ),
                &params[..21],
            )?;
        }

        tx.commit()?;
        Ok(next_version)
    }

    // === Audit operations ===

    /// Append an admin action to the audit trail.
    ///
    /// Returns the entry's row id.
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<i64> {
        let room = entry.room_id;
        if !self.room_exists(room)? {
            return Err(Error::RoomNotFound(room));
        }
        self.conn.execute(
            "INSERT INTO audit_log (room_id, action, details, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                room.get(),
                entry.action,
                entry.details,
                to_millis(entry.recorded_at)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Audit entries in the order they were recorded, optionally for one room.
    pub fn list_audit(&self, room: Option<RoomId>) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT room_id, action, details, recorded_at FROM audit_log
             WHERE ?1 IS NULL OR room_id = ?1
             ORDER BY id",
        )?;
        let entries = stmt
            .query_map([room.map(RoomId::get)], |row| {
                Ok(AuditEntry {
                    room_id: RoomId::new(row.get(0)?),
                    action: row.get(1)?,
                    details: row.get(2)?,
                    recorded_at: timestamp(row, 3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    from_millis(idx, row.get(idx)?)
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|millis| from_millis(idx, millis))
        .transpose()
}

fn trigger(row: &Row<'_>, idx: usize) -> rusqlite::Result<Trigger> {
    Trigger::try_from(row.get::<_, u8>(idx)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// Six gas columns starting at `start`.
fn gases(row: &Row<'_>, start: usize) -> rusqlite::Result<GasReadings> {
    Ok(GasReadings {
        oxygen: row.get(start)?,
        nitrous_oxide: row.get(start + 1)?,
        air: row.get(start + 2)?,
        vacuum: row.get(start + 3)?,
        instrument: row.get(start + 4)?,
        carbon: row.get(start + 5)?,
    })
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRoom> {
    Ok(StoredRoom {
        id: RoomId::new(row.get(0)?),
        name: row.get(1)?,
        volume: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

fn telemetry_from_row(row: &Row<'_>) -> rusqlite::Result<RoomTelemetrySnapshot> {
    Ok(RoomTelemetrySnapshot {
        room_id: RoomId::new(row.get(0)?),
        temperature: row.get(1)?,
        humidity: row.get(2)?,
        pressure: row.get(3)?,
        room_on: row.get(4)?,
        flow_rate: row.get(5)?,
        volume: row.get(6)?,
        trigger: trigger(row, 7)?,
        gases: gases(row, 8)?,
        last_modified: timestamp(row, 14)?,
    })
}

fn live_state_from_row(row: &Row<'_>) -> rusqlite::Result<RoomLiveState> {
    Ok(RoomLiveState {
        room_id: RoomId::new(row.get(0)?),
        ach_theoretical: row.get(1)?,
        ach_empirical: row.get(2)?,
        temperature: row.get(3)?,
        pressure: row.get(4)?,
        trigger: trigger(row, 5)?,
        gases: gases(row, 6)?,
        stopwatch: Stopwatch {
            started_at: optional_timestamp(row, 12)?,
            accumulated_secs: row.get(13)?,
            running: row.get(14)?,
        },
        countdown: Countdown {
            target: optional_timestamp(row, 15)?,
            duration_secs: row.get(16)?,
            running: row.get(17)?,
        },
        cycle_started_at: optional_timestamp(row, 18)?,
        last_processed_at: optional_timestamp(row, 19)?,
        version: row.get(20)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    const ROOM: RoomId = RoomId::new(4);

    fn at_millis(millis: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(1_700_000_000_000 + millis)
    }

    fn provisioned() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.provision_room(ROOM, Some("OR 4"), 100).unwrap();
        store
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.list_rooms().unwrap().is_empty());
        assert!(store.list_telemetry().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");

        let store = Store::open(&path).unwrap();
        store.provision_room(ROOM, None, 50).unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.list_rooms().unwrap().len(), 1);
    }

    #[test]
    fn test_provision_room_creates_rows() {
        let store = provisioned();

        let room = store.get_room(ROOM).unwrap().unwrap();
        assert_eq!(room.name.as_deref(), Some("OR 4"));
        assert_eq!(room.volume, 100);

        let snapshot = store.get_telemetry(ROOM).unwrap().unwrap();
        assert_eq!(snapshot.volume, 100);
        assert_eq!(snapshot.trigger, Trigger::Off);
        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.gases, GasReadings::default());

        let live = store.get_live_state(ROOM).unwrap().unwrap();
        assert_eq!(live, RoomLiveState::new(ROOM));
    }

    #[test]
    fn test_provision_room_is_idempotent() {
        let store = provisioned();
        let before = store.get_telemetry(ROOM).unwrap().unwrap();

        let room = store.provision_room(ROOM, None, 100).unwrap();
        assert_eq!(room.name.as_deref(), Some("OR 4"));
        let after = store.get_telemetry(ROOM).unwrap().unwrap();
        assert_eq!(after.last_modified, before.last_modified);

        store.provision_room(ROOM, None, 140).unwrap();
        let resized = store.get_telemetry(ROOM).unwrap().unwrap();
        assert_eq!(resized.volume, 140);
        assert!(resized.last_modified > before.last_modified);
        assert_eq!(store.list_rooms().unwrap().len(), 1);
    }

    #[test]
    fn test_record_telemetry() {
        let store = provisioned();
        let update = TelemetryUpdate {
            temperature: Some(21.5),
            humidity: Some(48),
            room_on: Some(true),
            flow_rate: 500,
            trigger: Trigger::On,
            gases: GasReadings {
                oxygen: Some(4.2),
                vacuum: Some(-60),
                ..Default::default()
            },
            ..Default::default()
        };

        let snapshot = store.record_telemetry(ROOM, &update).unwrap();

        assert_eq!(snapshot.volume, 100);
        assert_eq!(snapshot.flow_rate, 500);
        assert_eq!(snapshot.temperature, Some(21.5));
        assert_eq!(snapshot.humidity, Some(48));
        assert_eq!(snapshot.room_on, Some(true));
        assert_eq!(snapshot.trigger, Trigger::On);
        assert_eq!(snapshot.gases.oxygen, Some(4.2));
        assert_eq!(snapshot.gases.vacuum, Some(-60));
        assert_eq!(store.get_telemetry(ROOM).unwrap().unwrap(), snapshot);
    }

    #[test]
    fn test_record_telemetry_last_modified_strictly_increases() {
        let store = provisioned();
        let mut previous = store.get_telemetry(ROOM).unwrap().unwrap().last_modified;

        for _ in 0..5 {
            let snapshot = store
                .record_telemetry(ROOM, &TelemetryUpdate::default())
                .unwrap();
            assert!(snapshot.last_modified > previous);
            previous = snapshot.last_modified;
        }
    }

    #[test]
    fn test_record_telemetry_unknown_room() {
        let store = Store::open_in_memory().unwrap();
        let result = store.record_telemetry(ROOM, &TelemetryUpdate::default());
        assert!(matches!(result, Err(Error::RoomNotFound(room)) if room == ROOM));
    }

    #[test]
    fn test_ensure_live_state() {
        let store = provisioned();
        assert!(!store.ensure_live_state(ROOM).unwrap());

        store
            .conn
            .execute("DELETE FROM live_state WHERE room_id = ?", [ROOM.get()])
            .unwrap();
        assert!(store.ensure_live_state(ROOM).unwrap());
        assert!(store.get_live_state(ROOM).unwrap().is_some());

        let result = store.ensure_live_state(RoomId::new(99));
        assert!(matches!(result, Err(Error::RoomNotFound(_))));
    }

    #[test]
    fn test_save_live_state_round_trip() {
        let store = provisioned();
        let mut state = store.get_live_state(ROOM).unwrap().unwrap();
        state.ach_theoretical = 18000.0;
        state.ach_empirical = 60.0;
        state.temperature = 21.5;
        state.pressure = 12.0;
        state.trigger = Trigger::On;
        state.gases.air = Some(5.0);
        state.stopwatch = Stopwatch {
            started_at: Some(at_millis(10)),
            accumulated_secs: 90,
            running: true,
        };
        state.countdown = Countdown {
            target: Some(at_millis(600_000)),
            duration_secs: 600,
            running: true,
        };
        state.cycle_started_at = Some(at_millis(20));
        state.last_processed_at = Some(at_millis(30));

        let version = store.save_live_state(&state).unwrap();
        assert_eq!(version, 1);

        state.version = 1;
        assert_eq!(store.get_live_state(ROOM).unwrap().unwrap(), state);
        assert_eq!(store.list_live_states().unwrap(), vec![state]);
    }

    #[test]
    fn test_save_live_state_rejects_stale_version() {
        let store = provisioned();
        let stale = store.get_live_state(ROOM).unwrap().unwrap();

        let mut admin = stale.clone();
        admin.countdown.running = true;
        admin.countdown.target = Some(at_millis(0));
        store.save_live_state(&admin).unwrap();

        let mut worker = stale;
        worker.ach_theoretical = 5.0;
        let result = store.save_live_state(&worker);
        assert!(matches!(
            result,
            Err(Error::VersionConflict {
                expected: 0,
                found: 1,
                ..
            })
        ));

        let stored = store.get_live_state(ROOM).unwrap().unwrap();
        assert!(stored.countdown.running);
        assert_eq!(stored.ach_theoretical, 0.0);
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_save_live_state_inserts_missing_row() {
        let store = provisioned();
        store
            .conn
            .execute("DELETE FROM live_state WHERE room_id = ?", [ROOM.get()])
            .unwrap();

        let mut state = RoomLiveState::new(ROOM);
        state.ach_empirical = 3.0;
        assert_eq!(store.save_live_state(&state).unwrap(), 1);
        assert_eq!(
            store.get_live_state(ROOM).unwrap().unwrap().ach_empirical,
            3.0
        );

        let orphan = RoomLiveState::new(RoomId::new(99));
        assert!(matches!(
            store.save_live_state(&orphan),
            Err(Error::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_list_ordered_by_room() {
        let store = Store::open_in_memory().unwrap();
        for id in [3, 1, 2] {
            store.provision_room(RoomId::new(id), None, 10).unwrap();
        }

        let ids: Vec<u32> = store
            .list_telemetry()
            .unwrap()
            .iter()
            .map(|s| s.room_id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ids: Vec<u32> = store
            .list_live_states()
            .unwrap()
            .iter()
            .map(|s| s.room_id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_audit_trail() {
        let store = provisioned();
        let other = RoomId::new(5);
        store.provision_room(other, None, 60).unwrap();

        let entry = |room, action: &str, details: &str, millis| AuditEntry {
            room_id: room,
            action: action.to_string(),
            details: details.to_string(),
            recorded_at: at_millis(millis),
        };
        let first = store
            .append_audit(&entry(ROOM, "timer_operation", "stopwatch start", 0))
            .unwrap();
        let second = store
            .append_audit(&entry(other, "countdown_timer_operation", "countdown stop", 5))
            .unwrap();
        store
            .append_audit(&entry(
                ROOM,
                "countdown_timer_adjustment",
                "countdown adjust (-5 min)",
                10,
            ))
            .unwrap();
        assert!(second > first);

        let all = store.list_audit(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].room_id, other);

        let for_room = store.list_audit(Some(ROOM)).unwrap();
        assert_eq!(for_room.len(), 2);
        assert_eq!(for_room[1].action, "countdown_timer_adjustment");
        assert_eq!(for_room[1].details, "countdown adjust (-5 min)");
        assert_eq!(for_room[1].recorded_at, at_millis(10));

        let orphan = entry(RoomId::new(99), "timer_operation", "stopwatch start", 0);
        assert!(matches!(
            store.append_audit(&orphan),
            Err(Error::RoomNotFound(_))
        ));
    }
}
