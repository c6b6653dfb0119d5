//! Configuration management with validation and defaults
//!
//! Every section defaults to the live game's constants, so an empty TOML
//! file yields a valid configuration.

use crate::games::multiplier::{DEFAULT_HOUSE_EDGE, DEFAULT_MAX_MULTIPLIER, DEFAULT_MIN_STEP};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the engine and its HTTP surface
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game: GameConfig,
    pub termination: TerminationConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
}

/// Multiplier curve parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub house_edge: f64,
    pub min_step: f64,
    pub max_multiplier: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            house_edge: DEFAULT_HOUSE_EDGE,
            min_step: DEFAULT_MIN_STEP,
            max_multiplier: DEFAULT_MAX_MULTIPLIER,
        }
    }
}

/// Forced-loss and reshuffle rules. Disabling either is for simulation only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub forced_loss_enabled: bool,
    pub forced_loss_min_turn: u8,
    pub forced_loss_max_turn: u8,
    pub reshuffle_enabled: bool,
    pub reshuffle_min_passes: u8,
    pub reshuffle_max_passes: u8,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            forced_loss_enabled: true,
            forced_loss_min_turn: 2,
            forced_loss_max_turn: 4,
            reshuffle_enabled: true,
            reshuffle_min_passes: 2,
            reshuffle_max_passes: 4,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty allows any origin
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocksdb,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    /// Whether to clear the database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rocksdb,
            data_directory: "./DB/mines_data".to_string(),
            clear_on_start: false,
        }
    }
}

/// Opening balances credited at startup to players with no ledger history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Player id to decimal balance
    pub seed_balances: BTreeMap<String, f64>,
}

impl EngineConfig {
    /// Persistent storage, CSPRNG-backed rules, default curve
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Rocksdb,
                data_directory: "./DB/mines_data".to_string(),
                clear_on_start: false,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// In-memory storage with a funded demo player
    pub fn testing() -> Self {
        let mut seed_balances = BTreeMap::new();
        seed_balances.insert("demo".to_string(), 1_000.0);
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            ledger: LedgerConfig { seed_balances },
            ..Default::default()
        }
    }

    /// Read a TOML file; missing sections take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigValidationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigValidationError::MissingRequired(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = toml::from_str(&raw)
            .map_err(|e| ConfigValidationError::InvalidValue(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let game = &self.game;
        if !(game.house_edge > 0.0 && game.house_edge <= 1.0) {
            return Err(ConfigValidationError::InvalidValue(
                "house_edge must be in (0, 1]".to_string(),
            ));
        }
        if !(game.min_step >= 1.0) {
            return Err(ConfigValidationError::InvalidValue(
                "min_step must be >= 1.0".to_string(),
            ));
        }
        if !(game.max_multiplier >= 1.0) {
            return Err(ConfigValidationError::InvalidValue(
                "max_multiplier must be >= 1.0".to_string(),
            ));
        }

        let term = &self.termination;
        if term.forced_loss_enabled {
            if term.forced_loss_min_turn == 0 {
                return Err(ConfigValidationError::InvalidValue(
                    "forced_loss_min_turn must be > 0".to_string(),
                ));
            }
            if term.forced_loss_min_turn > term.forced_loss_max_turn {
                return Err(ConfigValidationError::LogicalInconsistency(
                    "forced_loss_min_turn exceeds forced_loss_max_turn".to_string(),
                ));
            }
        }
        if term.reshuffle_enabled && term.reshuffle_min_passes > term.reshuffle_max_passes {
            return Err(ConfigValidationError::LogicalInconsistency(
                "reshuffle_min_passes exceeds reshuffle_max_passes".to_string(),
            ));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Rocksdb && self.storage.data_directory.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "storage.data_directory".to_string(),
            ));
        }

        for (player, balance) in &self.ledger.seed_balances {
            if crate::games::types::Amount::from_decimal(*balance).is_none() {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "seed balance for {} must be a non-negative amount with at most two decimals",
                    player
                )));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
    MissingRequired(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigValidationError::LogicalInconsistency(msg) => {
                write!(f, "Configuration logical inconsistency: {}", msg)
            }
            ConfigValidationError::MissingRequired(msg) => write!(f, "Missing required configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigValidationError {}
