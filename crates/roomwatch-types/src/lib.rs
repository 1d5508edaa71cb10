//! Shared data types for room telemetry and derived live state.
//!
//! This crate provides the types exchanged between device ingestion, the
//! reconciliation worker and the stores:
//!
//! - [`RoomTelemetrySnapshot`]: the latest raw sensor row for a room
//! - [`TelemetryUpdate`]: a single device write
//! - [`RoomLiveState`]: derived metrics, mirrored readings and admin timers
//! - [`Stopwatch`] / [`Countdown`]: the admin timer state machines
//! - [`AuditEntry`]: one recorded admin timer action
//!
//! # Example
//!
//! ```
//! use roomwatch_types::{RoomId, RoomLiveState, Trigger};
//!
//! let state = RoomLiveState::new(RoomId::new(3));
//! assert_eq!(state.trigger, Trigger::Off);
//! assert!(!state.countdown.running);
//! ```

pub mod error;
pub mod timer;
pub mod types;

pub use error::{ParseError, ParseResult, TimerError};
pub use timer::{Countdown, DEFAULT_COUNTDOWN_MINUTES, DEFAULT_COUNTDOWN_SECS, Stopwatch};
pub use types::{
    AuditEntry, GasReadings, RoomId, RoomLiveState, RoomTelemetrySnapshot,
    TelemetrySnapshotBuilder, TelemetryUpdate, Trigger,
};

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn test_telemetry_update_from_device_json() {
        let json = r#"{
            "temperature": 22.4,
            "humidity": 51,
            "pressure": 1013.2,
            "room_on": true,
            "flow_rate": 750,
            "trigger": 1,
            "oxygen": 4.2,
            "vacuum": -60
        }"#;

        let update: TelemetryUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.temperature, Some(22.4));
        assert_eq!(update.humidity, Some(51));
        assert_eq!(update.flow_rate, 750);
        assert_eq!(update.trigger, Trigger::On);
        assert_eq!(update.gases.oxygen, Some(4.2));
        assert_eq!(update.gases.vacuum, Some(-60));
        assert_eq!(update.gases.carbon, None);
    }

    #[test]
    fn test_telemetry_update_missing_fields_default() {
        let update: TelemetryUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(update, TelemetryUpdate::default());
    }

    #[test]
    fn test_invalid_trigger_rejected() {
        let result: Result<TelemetryUpdate, _> = serde_json::from_str(r#"{"trigger": 2}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_live_state_serialization() {
        let mut state = RoomLiveState::new(RoomId::new(5));
        state.ach_theoretical = 18000.0;
        state.last_processed_at = Some(OffsetDateTime::UNIX_EPOCH);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"room_id\":5"));
        assert!(json.contains("18000"));
        assert!(json.contains("1970-01-01T00:00:00Z"));

        let back: RoomLiveState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
