//! Configuration for the acquisition engine
//!
//! [`EngineConfig`] is fixed at engine construction. It can be built in code,
//! or loaded from a TOML file in which every key is optional:
//!
//! ```toml
//! sample_rate_hz = 250
//! baud = 921600
//! metrics_window_seconds = 8.0
//! psd_method = "welch"
//! ```
//!
//! # App Data Location
//!
//! Exports default to a directory under the platform data location:
//! - **Linux**: `~/.local/share/dev.pendulum.eeg/exports/`
//! - **macOS**: `~/Library/Application Support/dev.pendulum.eeg/exports/`
//! - **Windows**: `%APPDATA%\dev.pendulum.eeg\exports\`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::PsdMethod;
use crate::error::{EegError, Result};
use crate::protocol::{GAIN_DEFAULT, VREF_UV_DEFAULT};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.pendulum.eeg";

/// Name of the export directory inside the app data directory
pub const EXPORTS_DIR_NAME: &str = "exports";

/// Default board sample rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 250;

/// Default serial baud rate
pub const DEFAULT_BAUD: u32 = 921_600;

/// Default rolling history length (20 minutes)
pub const DEFAULT_HISTORY_SECONDS: u32 = 1_200;

/// Default analysis window
pub const DEFAULT_METRICS_WINDOW_SECONDS: f64 = 8.0;

/// Default metrics refresh cadence
pub const DEFAULT_METRICS_UPDATE_PERIOD_SECONDS: f64 = 0.5;

/// Default Welch segment length upper bound
pub const DEFAULT_WELCH_SEGMENT_LEN: usize = 512;

/// Default event log capacity
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 2_000;

/// Default parse-error log capacity
pub const DEFAULT_PARSE_ERROR_CAPACITY: usize = 300;

/// Default serial read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;

/// Default bound on waiting for the worker in `stop()`
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 2_000;

/// Default reassembly buffer limit when no delimiter is seen
pub const DEFAULT_RX_BUFFER_LIMIT: usize = 8 * 1024;

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Default export directory, falling back to the working directory
pub fn default_export_dir() -> PathBuf {
    app_data_dir()
        .map(|p| p.join(EXPORTS_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(EXPORTS_DIR_NAME))
}

/// Engine construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nominal board sample rate (Hz)
    pub sample_rate_hz: u32,
    /// ADC reference voltage (uV)
    pub vref_uv: u32,
    /// PGA gain
    pub gain: u32,
    /// Serial baud rate
    pub baud: u32,
    /// Length of the rolling history
    pub history_seconds: u32,
    /// Trailing window handed to the analyzer
    pub metrics_window_seconds: f64,
    /// Wall-clock period of the metrics refresh
    pub metrics_update_period_seconds: f64,
    /// PSD estimator used for band powers
    pub psd_method: PsdMethod,
    /// Upper bound on the Welch segment length
    pub welch_segment_len: usize,
    pub event_log_capacity: usize,
    pub parse_error_capacity: usize,
    /// Serial read timeout per loop iteration
    pub read_timeout_ms: u64,
    /// How long `stop()` waits for the worker before detaching it
    pub stop_timeout_ms: u64,
    /// Reassembly buffer size at which undelimited bytes are discarded
    pub rx_buffer_limit: usize,
    /// Where exports go when no path is given
    pub export_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            vref_uv: VREF_UV_DEFAULT,
            gain: GAIN_DEFAULT,
            baud: DEFAULT_BAUD,
            history_seconds: DEFAULT_HISTORY_SECONDS,
            metrics_window_seconds: DEFAULT_METRICS_WINDOW_SECONDS,
            metrics_update_period_seconds: DEFAULT_METRICS_UPDATE_PERIOD_SECONDS,
            psd_method: PsdMethod::default(),
            welch_segment_len: DEFAULT_WELCH_SEGMENT_LEN,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            parse_error_capacity: DEFAULT_PARSE_ERROR_CAPACITY,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            rx_buffer_limit: DEFAULT_RX_BUFFER_LIMIT,
            export_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EegError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            EegError::Config(format!(
                "Failed to write {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(EegError::Config("sample_rate_hz must be positive".into()));
        }
        if self.history_seconds == 0 {
            return Err(EegError::Config("history_seconds must be positive".into()));
        }
        if !(self.metrics_window_seconds > 0.0) {
            return Err(EegError::Config(
                "metrics_window_seconds must be positive".into(),
            ));
        }
        if !(self.metrics_update_period_seconds > 0.0) {
            return Err(EegError::Config(
                "metrics_update_period_seconds must be positive".into(),
            ));
        }
        if self.welch_segment_len == 0 {
            return Err(EegError::Config("welch_segment_len must be positive".into()));
        }
        Ok(())
    }

    /// History capacity in samples
    pub fn history_capacity(&self) -> usize {
        self.history_seconds as usize * self.sample_rate_hz as usize
    }

    /// Analysis window length in samples
    pub fn metrics_window_samples(&self) -> usize {
        (self.metrics_window_seconds * f64::from(self.sample_rate_hz)).round() as usize
    }

    /// Interval between synthetic samples
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sample_rate_hz.max(1)))
    }

    pub fn metrics_period(&self) -> Duration {
        Duration::from_secs_f64(self.metrics_update_period_seconds.max(0.001))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Configured export directory, or the app data default
    pub fn resolved_export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(default_export_dir)
    }
}
