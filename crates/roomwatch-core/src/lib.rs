//! Reconciliation core for room telemetry.
//!
//! This crate turns the latest raw sensor snapshot of each room into its
//! derived live state: theoretical and empirical air changes per hour,
//! mirrored sensor values and countdown expiry. It also applies admin
//! timer actions to the same rows.
//!
//! # Features
//!
//! - **Pure reconciliation**: [`reconcile`] folds one snapshot into one live
//!   state without I/O
//! - **Tick dispatch**: [`Reconciler`] runs a full pass over every room with
//!   per-room isolation and cooperative cancellation
//! - **Timer control**: [`TimerControl`] applies stopwatch and countdown
//!   actions, retrying on version conflicts and recording each applied
//!   action in an [`AuditLog`]
//! - **Validation**: [`TelemetryValidator`] range-checks device writes
//! - **Testing**: [`InMemoryStore`] implements every store contract with
//!   failure injection
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use roomwatch_core::{InMemoryStore, Reconciler, TelemetrySink};
//! use roomwatch_types::{RoomId, TelemetryUpdate};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), roomwatch_core::Error> {
//!     let store = Arc::new(InMemoryStore::new());
//!     store.provision_room(RoomId::new(1), 100).await;
//!
//!     let update = TelemetryUpdate { flow_rate: 500, ..Default::default() };
//!     store.record_telemetry(RoomId::new(1), &update).await?;
//!
//!     let reconciler = Reconciler::new(store.clone(), store.clone());
//!     let report = reconciler.run_tick(&CancellationToken::new()).await?;
//!     assert_eq!(report.updated[0].state.ach_theoretical, 18000.0);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod reconcile;
pub mod reconciler;
pub mod retry;
pub mod timer_control;
pub mod traits;
pub mod validation;

pub use error::{Error, Result};
pub use memory::InMemoryStore;
pub use reconcile::{
    CycleEvent, ReconcileOutcome, empirical_ach, needs_reconcile, reconcile, theoretical_ach,
};
pub use reconciler::{Reconciler, RoomFailure, RoomUpdate, TickReport};
pub use retry::{RetryConfig, with_retry};
pub use timer_control::{CountdownAction, StopwatchAction, TimerControl};
pub use traits::{AuditLog, LiveStateRepository, TelemetryRepository, TelemetrySink};
pub use validation::{TelemetryValidator, TelemetryViolation};

// Re-export from roomwatch-types
pub use roomwatch_types::{
    AuditEntry, GasReadings, RoomId, RoomLiveState, RoomTelemetrySnapshot, TelemetryUpdate,
    TimerError, Trigger,
};
