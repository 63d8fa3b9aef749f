//! Configuration loading using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (`config/default.toml` unless another path is given)
//! 2. Environment variables (prefixed with `SHM_DAQ_`)
//!
//! Every section has defaults matching the deployed sensors, so an empty file is a
//! valid configuration.
//!
//! # Example
//! ```no_run
//! use shm_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Application: {}", settings.application.name);
//! # Ok::<(), shm_daq::error::DaqError>(())
//! ```

use crate::data::intensity::reference_rank;
use crate::data::window::Orientation;
use crate::error::{AppResult, DaqError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Name and log level
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Message bus connection, consumed by the bus client
    #[serde(default)]
    pub bus: BusConfig,
    /// Record log layout, rotation and retention
    #[serde(default)]
    pub storage: StorageConfig,
    /// Window and orientation of the accelerometer analysis
    #[serde(default)]
    pub acceleration: AccelerationConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Message bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker address, e.g. `tcp://localhost:1883`
    #[serde(default = "default_server")]
    pub server: String,
    /// Topic filters to subscribe to
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Record storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-device record logs
    #[serde(default = "default_record_dir")]
    pub record_dir: PathBuf,
    /// Where closed logs are copied after rotation (disabled when unset)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    /// Rotation interval in seconds
    #[serde(default = "default_rotation_interval")]
    pub rotation_interval_secs: u64,
    /// Delete logs older than this many hours (0 = keep forever)
    #[serde(default)]
    pub retention_hours: u64,
}

/// Accelerometer analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerationConfig {
    /// Sensor output rate per axis
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,
    /// Samples per axis in one analysis window
    #[serde(default = "default_window_len")]
    pub window_len: usize,
    /// Raw axis index mounted north-south
    #[serde(default = "default_ns")]
    pub ns: usize,
    /// Raw axis index mounted east-west
    #[serde(default = "default_ew")]
    pub ew: usize,
    /// Raw axis index mounted up-down
    #[serde(default = "default_ud")]
    pub ud: usize,
    /// Cepstral lifter width for smoothed spectra
    #[serde(default = "default_cepstrum_coeff")]
    pub cepstrum_coeff: usize,
}

// Default value functions
fn default_name() -> String {
    "shm-daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_server() -> String {
    "tcp://localhost:1883".to_string()
}

fn default_record_dir() -> PathBuf {
    PathBuf::from("data/recorder")
}

fn default_rotation_interval() -> u64 {
    3600
}

fn default_sample_rate() -> f64 {
    62.5
}

fn default_window_len() -> usize {
    256
}

fn default_ns() -> usize {
    0
}

fn default_ew() -> usize {
    1
}

fn default_ud() -> usize {
    2
}

fn default_cepstrum_coeff() -> usize {
    128
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            topics: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            record_dir: default_record_dir(),
            backup_dir: None,
            rotation_interval_secs: default_rotation_interval(),
            retention_hours: 0,
        }
    }
}

impl Default for AccelerationConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate(),
            window_len: default_window_len(),
            ns: default_ns(),
            ew: default_ew(),
            ud: default_ud(),
            cepstrum_coeff: default_cepstrum_coeff(),
        }
    }
}

impl AccelerationConfig {
    /// Axis mapping described by `ns`, `ew` and `ud`.
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        Orientation {
            ns: self.ns,
            ew: self.ew,
            ud: self.ud,
        }
    }
}

impl StorageConfig {
    /// Period between rotations of every device log.
    #[must_use]
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    /// Retention period, or `None` when logs are kept forever.
    ///
    /// Hour counts too large to express in seconds saturate rather than wrap.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_hours > 0)
            .then(|| Duration::from_secs(self.retention_hours.saturating_mul(3600)))
    }
}

impl Settings {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables override the file with prefix `SHM_DAQ_`.
    /// Nested keys are separated by a double underscore.
    /// Example: `SHM_DAQ_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path, then validate it.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Self::figment(path).extract()?;
        settings.validate().map_err(DaqError::Configuration)?;
        Ok(settings)
    }

    /// The layered provider used by [`Settings::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SHM_DAQ_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let acc = &self.acceleration;
        if !(acc.sample_rate_hz > 0.0 && acc.sample_rate_hz.is_finite()) {
            return Err(format!(
                "Invalid sample_rate_hz {}. Must be positive",
                acc.sample_rate_hz
            ));
        }

        let required = reference_rank(acc.sample_rate_hz);
        if acc.window_len <= required {
            return Err(format!(
                "window_len {} too short: intensity needs more than {} samples at {} Hz",
                acc.window_len, required, acc.sample_rate_hz
            ));
        }

        acc.orientation().validate()?;

        if self.storage.rotation_interval_secs == 0 {
            return Err("rotation_interval_secs must be positive".to_string());
        }

        Ok(())
    }
}
