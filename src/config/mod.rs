//! Configuration module for datalog-rs
//!
//! This module handles the session configuration:
//! - Channel descriptors (see [`channel`])
//! - Acquisition timing and log placement
//! - Live display and playback rendering options
//!
//! Configuration is a TOML file passed explicitly to the scheduler and the
//! loader. There is no process-wide mutable config.
//!
//! # Config Location
//!
//! When no path is given on the command line the platform config directory
//! is used:
//! - **Linux**: `~/.config/dev.hxyulin.datalog-rs/datalog.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.datalog-rs/datalog.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.datalog-rs\datalog.toml`
//!
//! # Example
//!
//! ```ignore
//! use datalog_rs::config::AppConfig;
//!
//! let config = AppConfig::load("datalog.toml")?;
//! println!("{} channels at {} Hz", config.channels.len(), config.acquisition.sample_rate_hz);
//! ```

pub mod channel;

pub use channel::*;

use crate::error::{DataLogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.datalog-rs";

/// Default config filename
pub const CONFIG_FILE: &str = "datalog.toml";

/// Default sampling rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 30.0;

/// Default interval between log flushes in seconds
pub const DEFAULT_FLUSH_INTERVAL_S: f64 = 1.0;

/// Default rolling display capacity per channel
pub const DEFAULT_DISPLAY_CAPACITY: usize = 200;

/// Default depth of the scheduler → display queue
pub const DEFAULT_DISPLAY_QUEUE: usize = 256;

/// Default playback window in seconds
pub const DEFAULT_WINDOW_S: f64 = 3.0;

/// Default playback frame rate
pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Default header suffix identifying value columns in a log
pub const DEFAULT_COLUMN_SUFFIX: &str = "(mm)";

/// Maximum number of channel panels drawn during playback
pub const DEFAULT_MAX_PANELS: usize = 4;

/// Get the platform config directory for this application
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    app_config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Acquisition Config ====================

/// Sampling and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Target sampling rate in Hz
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: f64,

    /// Seconds between batched log flushes
    #[serde(default = "default_flush_interval_s")]
    pub flush_interval_s: f64,

    /// Directory receiving `sensor_data_<stamp>.csv` logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Depth of the queue feeding the live display
    #[serde(default = "default_display_queue")]
    pub display_queue: usize,
}

fn default_sample_rate_hz() -> f64 {
    DEFAULT_SAMPLE_RATE_HZ
}

fn default_flush_interval_s() -> f64 {
    DEFAULT_FLUSH_INTERVAL_S
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_display_queue() -> usize {
    DEFAULT_DISPLAY_QUEUE
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            flush_interval_s: DEFAULT_FLUSH_INTERVAL_S,
            log_dir: default_log_dir(),
            display_queue: DEFAULT_DISPLAY_QUEUE,
        }
    }
}

impl AcquisitionConfig {
    /// Target duration of one sampling round
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sample_rate_hz)
    }

    /// Interval between flushes
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs_f64(self.flush_interval_s)
    }

    /// Log path for a session starting at `started`
    pub fn session_log_path(&self, started: chrono::DateTime<chrono::Local>) -> PathBuf {
        self.log_dir
            .join(format!("sensor_data_{}.csv", started.format("%Y%m%d_%H%M%S")))
    }
}

// ==================== Display Config ====================

/// Live display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Samples kept per channel in the rolling plot
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_DISPLAY_CAPACITY
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_DISPLAY_CAPACITY,
        }
    }
}

// ==================== Playback Config ====================

/// Playback rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Trailing window shown per frame, in seconds
    #[serde(default = "default_window_s")]
    pub window_s: f64,

    /// Animation frame rate
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,

    /// Horizontal reference lines drawn on every panel
    #[serde(default)]
    pub reference_lines: Vec<f64>,

    /// Header suffix that marks a value column
    #[serde(default = "default_column_suffix")]
    pub column_suffix: String,

    /// Maximum number of panels drawn
    #[serde(default = "default_max_panels")]
    pub max_panels: usize,

    /// Fixed lower Y bound (auto-scaled when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_min: Option<f64>,

    /// Fixed upper Y bound (auto-scaled when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_max: Option<f64>,
}

fn default_window_s() -> f64 {
    DEFAULT_WINDOW_S
}

fn default_target_fps() -> f64 {
    DEFAULT_TARGET_FPS
}

fn default_column_suffix() -> String {
    DEFAULT_COLUMN_SUFFIX.to_string()
}

fn default_max_panels() -> usize {
    DEFAULT_MAX_PANELS
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            window_s: DEFAULT_WINDOW_S,
            target_fps: DEFAULT_TARGET_FPS,
            reference_lines: Vec::new(),
            column_suffix: default_column_suffix(),
            max_panels: DEFAULT_MAX_PANELS,
            y_min: None,
            y_max: None,
        }
    }
}

impl PlaybackConfig {
    /// Validate playback settings
    pub fn validate(&self) -> Result<()> {
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(DataLogError::Config(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if !(self.window_s.is_finite() && self.window_s >= 0.0) {
            return Err(DataLogError::Config(format!(
                "window_s must be non-negative, got {}",
                self.window_s
            )));
        }
        if self.max_panels == 0 {
            return Err(DataLogError::Config("max_panels must be at least 1".into()));
        }
        Ok(())
    }
}

// ==================== App Config ====================

/// Complete session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Sampling and persistence
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Live display
    #[serde(default)]
    pub display: DisplayConfig,

    /// Playback rendering
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Ordered channel list; order fixes the log column order
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl AppConfig {
    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DataLogError::Config(format!("Failed to parse config: {}", e)))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataLogError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::read(path)
            .and_then(|config| config.validate().map(|_| config))
            .map_err(|e| e.with_context(format!("Invalid config {:?}", path)))
    }

    /// Load only the `[playback]` section of a config file
    ///
    /// Channels and acquisition settings may be absent or incomplete.
    pub fn load_playback(path: impl AsRef<Path>) -> Result<PlaybackConfig> {
        let path = path.as_ref();
        Self::read(path)
            .and_then(|config| config.playback.validate().map(|_| config.playback))
            .map_err(|e| e.with_context(format!("Invalid playback config {:?}", path)))
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DataLogError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DataLogError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            DataLogError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Validate everything the acquisition side depends on
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(DataLogError::Config(
                "at least one channel must be configured".to_string(),
            ));
        }
        for channel in &self.channels {
            channel.validate().map_err(DataLogError::Config)?;
        }

        let acq = &self.acquisition;
        if !(acq.sample_rate_hz.is_finite() && acq.sample_rate_hz > 0.0) {
            return Err(DataLogError::Config(format!(
                "sample_rate_hz must be positive, got {}",
                acq.sample_rate_hz
            )));
        }
        if !(acq.flush_interval_s.is_finite() && acq.flush_interval_s > 0.0) {
            return Err(DataLogError::Config(format!(
                "flush_interval_s must be positive, got {}",
                acq.flush_interval_s
            )));
        }
        if acq.display_queue == 0 {
            return Err(DataLogError::Config("display_queue must be at least 1".into()));
        }
        if self.display.buffer_capacity == 0 {
            return Err(DataLogError::Config(
                "display buffer_capacity must be at least 1".into(),
            ));
        }

        self.playback.validate()
    }

    /// Header record for the durable log
    pub fn log_header(&self) -> Vec<String> {
        std::iter::once(crate::session::TIMESTAMP_COLUMN.to_string())
            .chain(self.channels.iter().map(ChannelConfig::column_label))
            .collect()
    }

    /// Two ride-height sensors sharing one RS-485 port
    pub fn sample() -> Self {
        let mut config = Self::default();
        config.playback.reference_lines = vec![175.0, 150.0, 200.0];

        config.channels.push(
            ChannelConfig::new("Sensor 1", default_port(), 1)
                .with_unit("mm")
                .with_registers(512, 3, 0),
        );
        config.channels.push(
            ChannelConfig::new("Sensor 2", default_port(), 2)
                .with_unit("mm")
                .with_registers(0, 2, 1)
                .with_scale(ScaleRule::Transform(TransformId::EncoderOffset4096)),
        );

        config
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM12"
    } else {
        "/dev/ttyUSB0"
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_is_valid() {
        let config = AppConfig::sample();
        assert_eq!(config.channels.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_channels_rejected() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one channel"));
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let mut config = AppConfig::sample();
        config.acquisition.sample_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::sample();
        config.acquisition.flush_interval_s = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::sample();
        config.playback.target_fps = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [[channels]]
            name = "Front Left"
            unit = "mm"
            port = "/dev/ttyUSB1"
            unit_address = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition.sample_rate_hz, DEFAULT_SAMPLE_RATE_HZ);
        assert_eq!(config.display.buffer_capacity, DEFAULT_DISPLAY_CAPACITY);
        assert_eq!(config.playback.column_suffix, "(mm)");

        let channel = &config.channels[0];
        assert_eq!(channel.serial.baud_rate, 115_200);
        assert_eq!(channel.function_code, FN_READ_HOLDING_REGISTERS);
        assert_eq!(channel.scale, ScaleRule::Linear(1.0));
        assert_eq!(channel.transport, TransportKind::Serial);
    }

    #[test]
    fn test_toml_roundtrip_keeps_channel_order() {
        let config = AppConfig::sample();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::from_toml_str(&text).unwrap();
        let names: Vec<_> = parsed.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Sensor 1", "Sensor 2"]);
        assert_eq!(parsed.channels[1].scale, config.channels[1].scale);
    }

    #[test]
    fn test_log_header() {
        let config = AppConfig::sample();
        assert_eq!(
            config.log_header(),
            vec!["Timestamp", "Sensor 1 (mm)", "Sensor 2 (mm)"]
        );
    }

    #[test]
    fn test_session_log_path() {
        use chrono::TimeZone;
        let acq = AcquisitionConfig {
            log_dir: PathBuf::from("logs"),
            ..Default::default()
        };
        let started = chrono::Local.with_ymd_and_hms(2024, 5, 17, 9, 3, 4).unwrap();
        assert_eq!(
            acq.session_log_path(started),
            PathBuf::from("logs").join("sensor_data_20240517_090304.csv")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = AppConfig::sample();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.channels, config.channels);
    }

    #[test]
    fn test_playback_only_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playback.toml");
        std::fs::write(&path, "[playback]\nwindow_s = 5.0\ntarget_fps = 24.0\n").unwrap();

        let playback = AppConfig::load_playback(&path).unwrap();
        assert_eq!(playback.window_s, 5.0);
        assert_eq!(playback.target_fps, 24.0);
        assert!(AppConfig::load(&path).is_err());

        std::fs::write(&path, "[playback]\ntarget_fps = 0.0\n").unwrap();
        assert!(AppConfig::load_playback(&path).is_err());
    }
}
