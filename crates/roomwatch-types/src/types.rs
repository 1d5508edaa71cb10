//! Core types for room telemetry and derived live state.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseError;
use crate::timer::{Countdown, Stopwatch};

/// Stable identifier of a provisioned room.
///
/// A room has exactly one identifier; both the raw telemetry row and the
/// live state row are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct RoomId(pub u32);

impl RoomId {
    /// Create a room id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for RoomId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ParseError;

    /// Parse a room id from its decimal form.
    ///
    /// ```
    /// use roomwatch_types::RoomId;
    ///
    /// assert_eq!("12".parse::<RoomId>(), Ok(RoomId::new(12)));
    /// assert!("OT-01".parse::<RoomId>().is_err());
    /// assert!("0".parse::<RoomId>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(ParseError::InvalidRoomId(s.to_string())),
            Ok(id) => Ok(Self(id)),
        }
    }
}

/// Binary ventilation trigger signal reported by the room's air handler.
///
/// Serialized as the integer `0` or `1`, which is what devices send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "u8", into = "u8")
)]
#[repr(u8)]
pub enum Trigger {
    /// No ventilation cycle active.
    #[default]
    Off = 0,
    /// A ventilation cycle is active.
    On = 1,
}

impl Trigger {
    /// Whether the signal is high.
    #[must_use]
    pub fn is_on(self) -> bool {
        self == Trigger::On
    }
}

impl TryFrom<u8> for Trigger {
    type Error = ParseError;

    /// ```
    /// use roomwatch_types::Trigger;
    ///
    /// assert_eq!(Trigger::try_from(1), Ok(Trigger::On));
    /// assert!(Trigger::try_from(2).is_err());
    /// ```
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Trigger::Off),
            1 => Ok(Trigger::On),
            _ => Err(ParseError::InvalidTrigger(value)),
        }
    }
}

impl From<Trigger> for u8 {
    fn from(trigger: Trigger) -> Self {
        trigger as u8
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Medical gas pipeline readings.
///
/// Every field is optional; a device that does not monitor a gas omits it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GasReadings {
    pub oxygen: Option<f64>,
    pub nitrous_oxide: Option<f64>,
    pub air: Option<f64>,
    pub vacuum: Option<i32>,
    pub instrument: Option<f64>,
    pub carbon: Option<f64>,
}

/// Latest raw sensor snapshot for one room.
///
/// There is exactly one snapshot per room. Devices overwrite it in place and
/// the store bumps `last_modified` on every write.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomTelemetrySnapshot {
    pub room_id: RoomId,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity percentage (0-100).
    pub humidity: Option<i32>,
    /// Absolute room pressure in hPa.
    pub pressure: Option<f64>,
    /// Room on/off status.
    pub room_on: Option<bool>,
    /// Air handler flow rate.
    pub flow_rate: u32,
    /// Room volume, copied from provisioning.
    pub volume: u32,
    pub trigger: Trigger,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub gases: GasReadings,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub last_modified: OffsetDateTime,
}

impl RoomTelemetrySnapshot {
    /// The snapshot a freshly provisioned room starts with: no sensor
    /// values, trigger low.
    #[must_use]
    pub fn provisioned(room_id: RoomId, volume: u32, at: OffsetDateTime) -> Self {
        Self {
            room_id,
            temperature: None,
            humidity: None,
            pressure: None,
            room_on: None,
            flow_rate: 0,
            volume,
            trigger: Trigger::Off,
            gases: GasReadings::default(),
            last_modified: at,
        }
    }

    /// Create a builder for test and simulation snapshots.
    pub fn builder(room_id: RoomId) -> TelemetrySnapshotBuilder {
        TelemetrySnapshotBuilder {
            snapshot: Self::provisioned(room_id, 0, OffsetDateTime::UNIX_EPOCH),
        }
    }

    /// Overwrite the device-supplied fields with `update`.
    ///
    /// The volume is a property of the room and is kept. The caller is
    /// responsible for advancing `last_modified`.
    pub fn apply_update(&mut self, update: &TelemetryUpdate) {
        self.temperature = update.temperature;
        self.humidity = update.humidity;
        self.pressure = update.pressure;
        self.room_on = update.room_on;
        self.flow_rate = update.flow_rate;
        self.trigger = update.trigger;
        self.gases = update.gases;
    }
}

/// Builder for constructing [`RoomTelemetrySnapshot`] values.
#[derive(Debug)]
#[must_use]
pub struct TelemetrySnapshotBuilder {
    snapshot: RoomTelemetrySnapshot,
}

impl TelemetrySnapshotBuilder {
    pub fn temperature(mut self, value: f64) -> Self {
        self.snapshot.temperature = Some(value);
        self
    }

    pub fn humidity(mut self, value: i32) -> Self {
        self.snapshot.humidity = Some(value);
        self
    }

    pub fn pressure(mut self, value: f64) -> Self {
        self.snapshot.pressure = Some(value);
        self
    }

    pub fn flow_rate(mut self, value: u32) -> Self {
        self.snapshot.flow_rate = value;
        self
    }

    pub fn volume(mut self, value: u32) -> Self {
        self.snapshot.volume = value;
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.snapshot.trigger = trigger;
        self
    }

    pub fn gases(mut self, gases: GasReadings) -> Self {
        self.snapshot.gases = gases;
        self
    }

    pub fn last_modified(mut self, at: OffsetDateTime) -> Self {
        self.snapshot.last_modified = at;
        self
    }

    /// Build the snapshot.
    #[must_use]
    pub fn build(self) -> RoomTelemetrySnapshot {
        self.snapshot
    }
}

/// A telemetry write as sent by a room device.
///
/// Room volume is deliberately absent: it is a property of the room, not of
/// the reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryUpdate {
    #[cfg_attr(feature = "serde", serde(default))]
    pub temperature: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub humidity: Option<i32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pressure: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub room_on: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub flow_rate: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trigger: Trigger,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub gases: GasReadings,
}

/// Derived, worker-maintained state for one room.
///
/// The reconciliation worker owns the metric, mirrored and bookkeeping
/// fields; admin timer control owns `stopwatch` and `countdown`. Both save
/// the full row, guarded by `version`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomLiveState {
    pub room_id: RoomId,
    /// Air changes per hour from flow rate and volume.
    pub ach_theoretical: f64,
    /// Air changes per hour from the last complete trigger cycle.
    pub ach_empirical: f64,
    pub temperature: f64,
    pub pressure: f64,
    /// Trigger value as of the last reconciliation; the baseline for edge
    /// detection.
    pub trigger: Trigger,
    pub gases: GasReadings,
    pub stopwatch: Stopwatch,
    pub countdown: Countdown,
    /// Set while an empirical measurement cycle is in progress.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub cycle_started_at: Option<OffsetDateTime>,
    /// High-water mark of raw telemetry already folded into this state.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub last_processed_at: Option<OffsetDateTime>,
    /// Row version, bumped by every successful save.
    pub version: u64,
}

impl RoomLiveState {
    /// Default state for a newly provisioned room: metrics zeroed, timers
    /// inactive, nothing processed yet.
    #[must_use]
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            ach_theoretical: 0.0,
            ach_empirical: 0.0,
            temperature: 0.0,
            pressure: 0.0,
            trigger: Trigger::Off,
            gases: GasReadings::default(),
            stopwatch: Stopwatch::default(),
            countdown: Countdown::default(),
            cycle_started_at: None,
            last_processed_at: None,
            version: 0,
        }
    }

    /// Whether an empirical ACH cycle is currently being measured.
    #[must_use]
    pub fn cycle_in_progress(&self) -> bool {
        self.cycle_started_at.is_some()
    }
}

/// One admin timer action, as kept in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuditEntry {
    pub room_id: RoomId,
    /// Action name, e.g. `timer_operation` or `countdown_timer_adjustment`.
    pub action: String,
    pub details: String,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub recorded_at: OffsetDateTime,
}
