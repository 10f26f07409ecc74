//! Session logs: persistence and playback
//!
//! The acquisition side appends sample rounds to a CSV log; the playback side
//! loads that log back and replays it through a trailing time window.
//!
//! # Features
//!
//! - Batched, append-only persistence with a header written once per log
//! - Rows kept in memory until the log accepts them
//! - Log loading by column suffix, tolerant of bad rows and cells
//! - Frame-to-row mapping by wall-clock time at a target frame rate
//! - Trailing window extraction ending at any row

pub mod loader;
pub mod persister;
pub mod player;
pub mod types;

pub use loader::{column_label, load_series, read_series};
pub use persister::{BatchPersister, FlushOutcome, LogSink, PendingRows, TIMESTAMP_COLUMN};
pub use player::{PlaybackClock, PlaybackTimeline};
pub use types::{LoadedSeries, PlaybackState, PlaybackWindow};
