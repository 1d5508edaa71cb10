//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use roomwatch_types::RoomId;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reconciliation worker settings.
    pub worker: WorkerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Event channel settings.
    pub server: ServerConfig,
    /// Rooms provisioned at startup.
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Tick interval is within bounds (100 ms - 60 s)
    /// - Store timeout is non-zero
    /// - Storage path is not empty
    /// - Room ids are non-zero and unique
    ///
    /// # Example
    ///
    /// ```
    /// use roomwatch_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.worker.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.server.validate());

        let mut seen = std::collections::HashSet::new();
        for (i, room) in self.rooms.iter().enumerate() {
            let prefix = format!("rooms[{}]", i);
            errors.extend(room.validate(&prefix));

            if !seen.insert(room.id) {
                errors.push(ValidationError {
                    field: format!("{}.id", prefix),
                    message: format!("duplicate room id {}", room.id),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Minimum tick interval in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;
/// Maximum tick interval in milliseconds (1 minute).
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;

/// Reconciliation worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Time between ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Deadline for a single store call in milliseconds.
    pub store_timeout_ms: u64,
    /// Retries for admin timer actions that lose a version race.
    pub timer_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            store_timeout_ms: 2000,
            timer_retries: 3,
        }
    }
}

impl WorkerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Validate worker configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            errors.push(ValidationError {
                field: "worker.tick_interval_ms".to_string(),
                message: format!(
                    "tick interval {} ms is too short (minimum {} ms)",
                    self.tick_interval_ms, MIN_TICK_INTERVAL_MS
                ),
            });
        } else if self.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            errors.push(ValidationError {
                field: "worker.tick_interval_ms".to_string(),
                message: format!(
                    "tick interval {} ms is too long (maximum {} ms)",
                    self.tick_interval_ms, MAX_TICK_INTERVAL_MS
                ),
            });
        }

        if self.store_timeout_ms == 0 {
            errors.push(ValidationError {
                field: "worker.store_timeout_ms".to_string(),
                message: "store timeout cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: roomwatch_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Live-state event channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Capacity of the live-state broadcast channel.
    pub broadcast_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            broadcast_buffer: 100,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.broadcast_buffer == 0 {
            errors.push(ValidationError {
                field: "server.broadcast_buffer".to_string(),
                message: "broadcast buffer cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// A room to provision at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Room volume, the denominator of the theoretical ACH.
    pub volume: u32,
}

impl RoomConfig {
    /// Validate room configuration.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.id.get() == 0 {
            errors.push(ValidationError {
                field: format!("{}.id", prefix),
                message: "room id must be greater than 0".to_string(),
            });
        }

        if let Some(name) = &self.name
            && name.is_empty()
        {
            errors.push(ValidationError {
                field: format!("{}.name", prefix),
                message: "name cannot be empty string (use null/omit instead)".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `worker.tick_interval_ms` or `rooms[0].id`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roomwatch")
        .join("server.toml")
}
