//! Backend module for instrument acquisition
//!
//! This module runs the sampling loop in a separate thread to keep the UI
//! responsive. Completed rounds reach the UI through a bounded crossbeam
//! channel that the worker feeds with `try_send`, so a slow UI can never
//! stall acquisition.
//!
//! # Architecture
//!
//! - [`AcquisitionBackend`] - Opens the channel links and spawns the worker
//! - [`AcquisitionHandle`] - Owner-side handle; `stop()` is a blocking join
//! - [`DisplayReceiver`] - UI-side end of the display queue
//!
//! # Components
//!
//! - [`ChannelReader`] - Shared transports and per-channel reads
//! - [`SamplingWorker`] - The fixed-rate loop with batched persistence
//! - [`SerialTransport`] - Modbus RTU over a serial port
//! - [`SimulatedTransport`] - Generated data without hardware
//!
//! # Example
//!
//! ```ignore
//! use datalog_rs::backend::{AcquisitionBackend, DefaultTransportFactory};
//! use datalog_rs::config::AppConfig;
//!
//! let config = AppConfig::sample();
//! let (mut handle, display) =
//!     AcquisitionBackend::new(config).spawn(&DefaultTransportFactory, "log.csv")?;
//!
//! for round in display.drain() {
//!     // update plots
//! }
//!
//! let stats = handle.stop()?;
//! ```

pub mod modbus;
pub mod reader;
pub mod simulator;
pub mod transport;
pub mod worker;

pub use modbus::SerialTransport;
pub use reader::{read_channel, ChannelReader};
pub use simulator::{SimPattern, SimulatedTransport};
pub use transport::{
    DefaultTransportFactory, LinkStats, RegisterRequest, RegisterTransport, TransportFactory,
};
pub use worker::SamplingWorker;

use crate::config::AppConfig;
use crate::error::{DataLogError, Result};
use crate::session::{BatchPersister, LogSink};
use crate::types::{AcquisitionStats, SampleRound};
use crossbeam_channel::{bounded, Receiver};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// UI-side receiver for sample rounds
pub struct DisplayReceiver {
    /// Receiver for completed rounds
    pub receiver: Receiver<SampleRound>,
}

impl DisplayReceiver {
    /// Try to receive a round without blocking
    pub fn try_recv(&self) -> Option<SampleRound> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending rounds
    pub fn drain(&self) -> Vec<SampleRound> {
        let mut rounds = Vec::new();
        while let Ok(round) = self.receiver.try_recv() {
            rounds.push(round);
        }
        rounds
    }
}

/// Handle to a running sampling worker
///
/// Dropping the handle stops the worker the same way `stop()` does.
pub struct AcquisitionHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<AcquisitionStats>>,
    final_stats: Option<AcquisitionStats>,
}

impl AcquisitionHandle {
    /// Whether the worker thread is still going
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Request a stop and wait until the final flush and link close are done
    pub fn stop(&mut self) -> Result<AcquisitionStats> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let stats = thread
                .join()
                .map_err(|_| DataLogError::Channel("sampling worker panicked".to_string()))?;
            self.final_stats = Some(stats);
        }
        self.final_stats
            .clone()
            .ok_or_else(|| DataLogError::Channel("sampling worker did not report".to_string()))
    }

    /// Stats reported by a stopped worker
    pub fn final_stats(&self) -> Option<&AcquisitionStats> {
        self.final_stats.as_ref()
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("Error stopping acquisition: {}", e);
            }
        }
    }
}

/// Entry point for live acquisition
#[derive(Debug, Clone)]
pub struct AcquisitionBackend {
    config: AppConfig,
}

impl AcquisitionBackend {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Open the links and start logging to a CSV file at `log_path`
    pub fn spawn(
        &self,
        factory: &dyn TransportFactory,
        log_path: impl Into<PathBuf>,
    ) -> Result<(AcquisitionHandle, DisplayReceiver)> {
        let log_path = log_path.into();
        tracing::info!("Logging to {}", log_path.display());
        let sink = BatchPersister::new(log_path, self.config.log_header());
        self.spawn_with_sink(factory, Box::new(sink))
    }

    /// Open the links and start the worker with any sink
    ///
    /// Fails before any thread starts when the config is invalid or no link
    /// opens.
    pub fn spawn_with_sink(
        &self,
        factory: &dyn TransportFactory,
        sink: Box<dyn LogSink>,
    ) -> Result<(AcquisitionHandle, DisplayReceiver)> {
        self.config.validate()?;
        let reader = ChannelReader::open(self.config.channels.clone(), factory)?;

        let (tx, rx) = bounded(self.config.acquisition.display_queue.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let worker = SamplingWorker::new(
            reader,
            sink,
            tx,
            running.clone(),
            &self.config.acquisition,
        );

        let thread = std::thread::Builder::new()
            .name("sampling-worker".to_string())
            .spawn(move || worker.run())?;

        Ok((
            AcquisitionHandle {
                running,
                thread: Some(thread),
                final_stats: None,
            },
            DisplayReceiver { receiver: rx },
        ))
    }
}
