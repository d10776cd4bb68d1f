//! # Server Configuration
//!
//! TOML-backed settings, one section per subsystem. Every field has a
//! default so an empty file (or no file at all) yields a working server.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration load failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has a bad field.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level server settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Tick loop settings.
    pub simulation: SimulationConfig,
    /// Spatial visibility settings.
    pub interest: InterestConfig,
    /// Durable storage settings.
    pub persistence: PersistenceConfig,
    /// Client prediction settings, forwarded to connecting clients.
    pub prediction: PredictionConfig,
    /// Client interpolation settings, forwarded to connecting clients.
    pub interpolation: InterpolationConfig,
}

/// `[simulation]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Fixed ticks per second.
    pub tick_rate: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: vela_sim::tick::DEFAULT_TICK_RATE,
        }
    }
}

/// `[interest]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterestConfig {
    /// Edge length of one visibility cell, world units.
    pub cell_size: f64,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self { cell_size: 1000.0 }
    }
}

/// `[persistence]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Directory holding the LMDB environment.
    pub data_dir: PathBuf,
    /// Milliseconds between write-back flushes.
    pub write_back_interval_ms: u64,
    /// Milliseconds before a clean cache entry is reloaded on read.
    pub max_entry_age_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/world"),
            write_back_interval_ms: 5_000,
            max_entry_age_ms: 300_000,
        }
    }
}

/// `[prediction]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictionConfig {
    /// Milliseconds before an unconfirmed command is abandoned.
    pub command_max_age_ms: f64,
    /// Position error, world units, below which no correction is issued.
    pub deviation_threshold: f64,
    /// Milliseconds over which a correction is blended in.
    pub correction_blend_ms: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            command_max_age_ms: 30_000.0,
            deviation_threshold: 0.1,
            correction_blend_ms: 500.0,
        }
    }
}

/// `[interpolation]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpolationConfig {
    /// Render delay behind the newest snapshot, milliseconds.
    pub delay_ms: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self { delay_ms: 100.0 }
    }
}

impl ServerConfig {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Loads settings from `path` when the file exists, defaults
    /// otherwise. A present-but-broken file is still an error.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}
