//! Background reconciliation worker for room telemetry.
//!
//! This crate provides a service that:
//! - Provisions the rooms listed in its configuration
//! - Reconciles every room's raw telemetry into its live state on a fixed tick
//! - Publishes each saved live state on a broadcast channel
//! - Applies admin stopwatch and countdown actions from the command line
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/roomwatch/server.toml`:
//!
//! ```toml
//! [worker]
//! tick_interval_ms = 500
//! store_timeout_ms = 2000
//!
//! [storage]
//! path = "~/.local/share/roomwatch/data.db"
//!
//! [[rooms]]
//! id = 1
//! name = "OR 1"
//! volume = 120
//! ```

pub mod config;
pub mod repository;
pub mod state;
pub mod worker;

pub use config::{
    Config, ConfigError, RoomConfig, ServerConfig, StorageConfig, ValidationError, WorkerConfig,
    default_config_path,
};
pub use repository::StoreRepository;
pub use state::{AppState, LiveStateEvent, WorkerState, WorkerStats};
pub use worker::Worker;
