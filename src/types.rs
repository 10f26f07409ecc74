//! Core data types for datalog-rs
//!
//! # Main Types
//!
//! - [`SampleRound`] - One timestamped reading of every channel
//! - [`RollingBuffer`] - Fixed-capacity ring buffer backing the live plots
//! - [`AcquisitionStats`] - Counters kept by the sampling worker
//!
//! # Timestamps
//!
//! Rounds are stamped with the local wall clock truncated to milliseconds and
//! rendered in the log as `YYYY-MM-DD HH:MM:SS.mmm` ([`TIMESTAMP_FORMAT`]).

use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// Format used when writing round timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format accepted when parsing timestamps (any fractional precision)
pub const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Current local wall clock with millisecond resolution
pub fn wall_clock_ms() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(3)
}

/// Render a timestamp the way the log stores it
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a log timestamp, `None` when it does not match the log format
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_PARSE_FORMAT).ok()
}

/// One sampling round: a timestamp and exactly one slot per channel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRound {
    /// Wall clock time the round started (millisecond precision)
    pub timestamp: NaiveDateTime,
    /// Scaled value per channel, `None` when that channel's read failed
    pub values: Vec<Option<f64>>,
}

impl SampleRound {
    /// Create a round from already-read values
    pub fn new(timestamp: NaiveDateTime, values: Vec<Option<f64>>) -> Self {
        Self { timestamp, values }
    }

    /// Number of channel slots
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }

    /// Number of channels that produced a value
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Values with absent readings mapped to NaN (plot gap)
    pub fn values_or_nan(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN))
    }
}

/// Fixed-capacity FIFO ring buffer
///
/// Storage is allocated once; when full, each push overwrites the oldest
/// entry at `write_pos` and advances it modulo the capacity.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T: Copy> RollingBuffer<T> {
    /// Create an empty buffer. A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
        }
    }

    /// Append a value, evicting the oldest when full
    pub fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.write_pos] = value;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of stored values
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next push evicts
    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (head, tail) = if self.is_full() {
            (&self.data[self.write_pos..], &self.data[..self.write_pos])
        } else {
            (&self.data[..], &self.data[..0])
        };
        head.iter().chain(tail.iter())
    }

    /// Most recent value
    pub fn latest(&self) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let idx = (self.write_pos + self.capacity - 1) % self.capacity;
        self.data.get(idx).copied()
    }

    /// Drop all values, keeping the allocation
    pub fn clear(&mut self) {
        self.data.clear();
        self.write_pos = 0;
    }
}

impl RollingBuffer<f64> {
    /// `[index, value]` pairs oldest first, for plotting against sample index
    pub fn as_plot_points(&self) -> Vec<[f64; 2]> {
        self.iter()
            .enumerate()
            .map(|(i, v)| [i as f64, *v])
            .collect()
    }
}

/// Counters kept by the sampling worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    /// Completed sampling rounds
    pub rounds: u64,
    /// Failed reads per channel
    pub failed_reads: Vec<u64>,
    /// Successful flushes that wrote at least one row
    pub flushes: u64,
    /// Rows appended to the log
    pub rows_persisted: u64,
    /// Flush attempts that failed with an I/O error
    pub failed_flushes: u64,
    /// Rounds the display queue had no room for
    pub display_dropped: u64,
    /// Rounds that took longer than the sampling period
    pub overruns: u64,
}

impl AcquisitionStats {
    /// Stats for `channels` channels
    pub fn new(channels: usize) -> Self {
        Self {
            failed_reads: vec![0; channels],
            ..Default::default()
        }
    }

    /// Record the outcome of one round
    pub fn record_round(&mut self, round: &SampleRound) {
        self.rounds += 1;
        if self.failed_reads.len() < round.values.len() {
            self.failed_reads.resize(round.values.len(), 0);
        }
        for (count, value) in self.failed_reads.iter_mut().zip(&round.values) {
            if value.is_none() {
                *count += 1;
            }
        }
    }

    /// Fraction of reads that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.rounds * self.failed_reads.len() as u64;
        if total == 0 {
            return 100.0;
        }
        let failed: u64 = self.failed_reads.iter().sum();
        (total.saturating_sub(failed) as f64 / total as f64) * 100.0
    }
}
