//! # datalog-rs: Multi-Instrument Serial Data Logger
//!
//! Polls a set of serial instruments at a fixed rate, appends every round to
//! a CSV log in batches, shows the last few hundred samples live, and replays
//! finished logs through a trailing time window at a target frame rate.
//!
//! ## Architecture
//!
//! Two pipelines share only the log file:
//!
//! - **Acquisition**: `backend` owns the links and runs the sampling loop on
//!   its own thread; rounds flow one way to the live view over a bounded
//!   crossbeam channel and are persisted by `session::persister`
//! - **Playback**: `session::loader` parses a log, `session::player` maps
//!   frames onto rows and extracts windows, `frontend` draws them
//!
//! ## Example
//!
//! ```ignore
//! use datalog_rs::{
//!     backend::{AcquisitionBackend, DefaultTransportFactory},
//!     config::AppConfig,
//!     session::{load_series, PlaybackTimeline},
//! };
//!
//! let config = AppConfig::load("datalog.toml")?;
//! let (mut handle, display) =
//!     AcquisitionBackend::new(config.clone()).spawn(&DefaultTransportFactory, "run.csv")?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! handle.stop()?;
//!
//! let series = load_series("run.csv", &config.playback.column_suffix)?;
//! let timeline = PlaybackTimeline::new(series, config.playback.target_fps)?;
//! let window = timeline.frame_window(30, config.playback.window_s);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backend::{AcquisitionBackend, AcquisitionHandle, DisplayReceiver};
pub use config::{AppConfig, ChannelConfig, ScaleRule, TransformId};
pub use error::{DataLogError, Result};
pub use session::{LoadedSeries, PlaybackTimeline, PlaybackWindow};
pub use types::{AcquisitionStats, RollingBuffer, SampleRound};
