//! RegisterTransport trait for unified instrument links
//!
//! This module provides a common trait for everything that can answer a
//! register read: Modbus RTU over a serial port, the simulator, and test
//! fakes. Implementations must be `Send` so the sampling worker can own them.

use crate::config::{ChannelConfig, TransportKind};
use crate::error::Result;
use std::collections::VecDeque;
use std::time::Duration;

/// Size of the rolling window for recent read times
const RECENT_WINDOW_SIZE: usize = 100;

/// One register block request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Slave/unit address
    pub unit_address: u8,
    /// Function code (3 or 4)
    pub function_code: u8,
    /// First register (0-based)
    pub register_address: u16,
    /// Number of registers
    pub register_count: u16,
}

impl From<&ChannelConfig> for RegisterRequest {
    fn from(channel: &ChannelConfig) -> Self {
        Self {
            unit_address: channel.unit_address,
            function_code: channel.function_code,
            register_address: channel.register_address,
            register_count: channel.register_count,
        }
    }
}

/// Unified interface for instrument links
///
/// One transport may serve several channels (different unit addresses on a
/// shared bus). Each call is exactly one request/response exchange.
pub trait RegisterTransport: Send {
    /// Perform one read of a register block
    fn read_registers(&mut self, request: &RegisterRequest) -> Result<Vec<u16>>;

    /// Release the underlying connection. Further reads fail.
    fn close(&mut self);

    /// Whether the link is still open
    fn is_open(&self) -> bool;
}

/// Opens transports for channels
///
/// Closures `Fn(&ChannelConfig) -> Result<Box<dyn RegisterTransport>>` implement
/// this, which is how tests inject fakes.
pub trait TransportFactory {
    /// Open the transport a channel lives on
    fn open(&self, channel: &ChannelConfig) -> Result<Box<dyn RegisterTransport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ChannelConfig) -> Result<Box<dyn RegisterTransport>>,
{
    fn open(&self, channel: &ChannelConfig) -> Result<Box<dyn RegisterTransport>> {
        self(channel)
    }
}

/// Factory picking Modbus RTU or the simulator from the channel config
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn open(&self, channel: &ChannelConfig) -> Result<Box<dyn RegisterTransport>> {
        match channel.transport {
            TransportKind::Serial => Ok(Box::new(super::modbus::SerialTransport::open(
                &channel.port,
                &channel.serial,
            )?)),
            TransportKind::Simulated => Ok(Box::new(super::simulator::SimulatedTransport::new(
                channel.port.clone(),
            ))),
        }
    }
}

/// Read statistics for one channel
///
/// Tracks success rates and latency over a rolling window.
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// Total number of successful reads
    pub successful_reads: u64,
    /// Total number of failed reads
    pub failed_reads: u64,
    /// Failed reads that were timeouts
    pub timeouts: u64,
    /// Consecutive failures since the last success
    pub consecutive_failures: u64,
    /// Total read time in microseconds
    pub total_read_time_us: u64,
    /// Minimum read time observed (microseconds)
    pub min_read_time_us: u64,
    /// Maximum read time observed (microseconds)
    pub max_read_time_us: u64,
    /// Rolling window of recent read times for jitter calculation
    pub recent_read_times: VecDeque<u64>,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self {
            successful_reads: 0,
            failed_reads: 0,
            timeouts: 0,
            consecutive_failures: 0,
            total_read_time_us: 0,
            min_read_time_us: u64::MAX,
            max_read_time_us: 0,
            recent_read_times: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl LinkStats {
    /// Record a successful read and its latency
    pub fn record_success(&mut self, elapsed: Duration) {
        let time_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.successful_reads += 1;
        self.consecutive_failures = 0;
        self.total_read_time_us += time_us;
        self.min_read_time_us = self.min_read_time_us.min(time_us);
        self.max_read_time_us = self.max_read_time_us.max(time_us);

        self.recent_read_times.push_back(time_us);
        if self.recent_read_times.len() > RECENT_WINDOW_SIZE {
            self.recent_read_times.pop_front();
        }
    }

    /// Record a failed read
    pub fn record_failure(&mut self, timed_out: bool) {
        self.failed_reads += 1;
        self.consecutive_failures += 1;
        if timed_out {
            self.timeouts += 1;
        }
    }

    /// Average successful read time in microseconds
    pub fn avg_read_time_us(&self) -> f64 {
        if self.successful_reads == 0 {
            0.0
        } else {
            self.total_read_time_us as f64 / self.successful_reads as f64
        }
    }

    /// Success rate as percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.successful_reads + self.failed_reads;
        if total == 0 {
            100.0
        } else {
            (self.successful_reads as f64 / total as f64) * 100.0
        }
    }

    /// Max - min over the recent window, in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_read_times.iter().min().copied().unwrap_or(0);
        let max = self.recent_read_times.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }
}
