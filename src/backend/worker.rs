//! Sampling worker
//!
//! Runs the fixed-rate acquisition loop on its own thread. Each iteration:
//!
//! 1. Stamps the round with the wall clock (millisecond resolution)
//! 2. Reads every channel in order; failures become `None`
//! 3. Offers the round to the display queue without blocking
//! 4. Appends it to the pending rows
//! 5. Flushes the pending rows when the flush interval has elapsed
//! 6. Sleeps out the rest of the sampling period, or counts an overrun
//!
//! # Shutdown
//!
//! The running flag is checked at the top of every iteration. Once it clears,
//! the worker flushes whatever is pending, closes the channel links and
//! returns its statistics, in that order.

use super::reader::ChannelReader;
use crate::config::AcquisitionConfig;
use crate::session::{FlushOutcome, LogSink, PendingRows};
use crate::types::{wall_clock_ms, AcquisitionStats, SampleRound};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The worker that owns the reader, the pending rows and the log sink
pub struct SamplingWorker {
    reader: ChannelReader,
    sink: Box<dyn LogSink>,
    /// Rounds for the live display
    display_tx: Sender<SampleRound>,
    /// Running flag
    running: Arc<AtomicBool>,
    pending: PendingRows,
    stats: AcquisitionStats,
    period: Duration,
    flush_interval: Duration,
    last_flush: Instant,
}

impl SamplingWorker {
    /// Create a worker; the flush timer starts now
    pub fn new(
        reader: ChannelReader,
        sink: Box<dyn LogSink>,
        display_tx: Sender<SampleRound>,
        running: Arc<AtomicBool>,
        config: &AcquisitionConfig,
    ) -> Self {
        let stats = AcquisitionStats::new(reader.channel_count());
        Self {
            reader,
            sink,
            display_tx,
            running,
            pending: PendingRows::new(),
            stats,
            period: config.sample_period(),
            flush_interval: config.flush_interval(),
            last_flush: Instant::now(),
        }
    }

    /// Restart the flush timer at `now`
    pub fn reset_flush_timer(&mut self, now: Instant) {
        self.last_flush = now;
    }

    /// Counters so far
    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    /// Rows not yet persisted
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Run until the running flag clears, then shut down
    pub fn run(mut self) -> AcquisitionStats {
        tracing::info!(
            "Sampling worker started: {} channels, period {:?}, flush every {:?}",
            self.reader.channel_count(),
            self.period,
            self.flush_interval
        );
        self.last_flush = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick_at(started);
            self.rate_limit(started);
        }

        self.shutdown()
    }

    /// One sampling round as of `now`; returns the round produced
    pub fn tick_at(&mut self, now: Instant) -> SampleRound {
        let timestamp = wall_clock_ms();
        let values = self.reader.read_round();
        let round = SampleRound::new(timestamp, values);
        self.stats.record_round(&round);

        self.try_send_display(round.clone());
        self.pending.push(round.clone());

        if now.saturating_duration_since(self.last_flush) >= self.flush_interval {
            self.flush();
            self.last_flush = now;
        }
        round
    }

    /// Offer a round to the display, counting it when the queue is full
    ///
    /// A disconnected display is not a drop; headless runs have none.
    fn try_send_display(&mut self, round: SampleRound) {
        if let Err(TrySendError::Full(_)) = self.display_tx.try_send(round) {
            self.stats.display_dropped += 1;
        }
    }

    /// Persist pending rows; they stay pending when the sink fails
    pub fn flush(&mut self) -> bool {
        match self.pending.flush_into(self.sink.as_mut()) {
            Ok(FlushOutcome::Written(n)) => {
                self.stats.flushes += 1;
                self.stats.rows_persisted += n as u64;
                true
            }
            Ok(FlushOutcome::Empty) => true,
            Err(e) => {
                self.stats.failed_flushes += 1;
                tracing::warn!(
                    "Flush failed, keeping {} rows for retry: {}",
                    self.pending.len(),
                    e
                );
                false
            }
        }
    }

    /// Sleep out the remainder of the sampling period
    fn rate_limit(&mut self, round_started: Instant) {
        let elapsed = round_started.elapsed();
        if elapsed < self.period {
            std::thread::sleep(self.period - elapsed);
        } else {
            self.stats.overruns += 1;
        }
    }

    /// Final flush, then close links. Returns the final counters.
    pub fn shutdown(&mut self) -> AcquisitionStats {
        if !self.pending.is_empty() && !self.flush() {
            tracing::error!(
                "Final flush failed, {} rows were not persisted",
                self.pending.len()
            );
        }
        self.reader.close();
        self.reader.log_link_stats();

        if self.stats.overruns > 0 {
            tracing::warn!(
                "{} of {} rounds overran the sampling period",
                self.stats.overruns,
                self.stats.rounds
            );
        }
        tracing::info!(
            "Sampling worker stopped: {} rounds, {} rows in {} flushes, {:.1}% reads ok, {} display drops",
            self.stats.rounds,
            self.stats.rows_persisted,
            self.stats.flushes,
            self.stats.success_rate(),
            self.stats.display_dropped
        );
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::simulator::{SimPattern, SimulatedTransport};
    use crate::backend::transport::RegisterTransport;
    use crate::config::ChannelConfig;
    use crate::error::{DataLogError, Result};
    use crossbeam_channel::bounded;
    use std::sync::Mutex;

    /// Sink that records every flush, optionally failing
    #[derive(Clone, Default)]
    struct RecordingSink {
        batches: Arc<Mutex<Vec<usize>>>,
        fail: Arc<AtomicBool>,
    }

    impl LogSink for RecordingSink {
        fn flush(&mut self, rows: &[SampleRound]) -> Result<FlushOutcome> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DataLogError::Persist {
                    path: "memory".into(),
                    message: "disk full".into(),
                });
            }
            self.batches.lock().unwrap().push(rows.len());
            Ok(FlushOutcome::Written(rows.len()))
        }
    }

    fn create_test_worker(
        sink: RecordingSink,
        queue: usize,
    ) -> (SamplingWorker, crossbeam_channel::Receiver<SampleRound>) {
        let factory = |channel: &ChannelConfig| {
            Ok(Box::new(
                SimulatedTransport::new(channel.port.clone())
                    .with_pattern(SimPattern::Constant(175.0)),
            ) as Box<dyn RegisterTransport>)
        };
        let reader = ChannelReader::open(
            vec![ChannelConfig::new("A", "sim0", 1), ChannelConfig::new("B", "sim1", 1)],
            &factory,
        )
        .unwrap();
        let (tx, rx) = bounded(queue);
        let config = AcquisitionConfig::default();
        let worker = SamplingWorker::new(
            reader,
            Box::new(sink),
            tx,
            Arc::new(AtomicBool::new(true)),
            &config,
        );
        (worker, rx)
    }

    #[test]
    fn test_interval_flush() {
        let sink = RecordingSink::default();
        let (mut worker, _rx) = create_test_worker(sink.clone(), 64);
        let t0 = Instant::now();
        worker.reset_flush_timer(t0);

        let period = Duration::from_secs(1).div_f64(30.0);
        for i in 0..35u32 {
            let round = worker.tick_at(t0 + period * i);
            assert_eq!(round.values.len(), 2);
        }

        let batches = sink.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert!((31..=35).contains(&batches[0]));
        assert_eq!(worker.pending_len(), 35 - batches[0]);
        assert_eq!(worker.stats().rounds, 35);
    }

    #[test]
    fn test_failed_flush_keeps_rows() {
        let sink = RecordingSink::default();
        sink.fail.store(true, Ordering::SeqCst);
        let (mut worker, _rx) = create_test_worker(sink.clone(), 64);
        let t0 = Instant::now();
        worker.reset_flush_timer(t0);

        worker.tick_at(t0);
        worker.tick_at(t0 + Duration::from_secs(1));
        assert_eq!(worker.pending_len(), 2);
        assert_eq!(worker.stats().failed_flushes, 1);

        sink.fail.store(false, Ordering::SeqCst);
        let stats = worker.shutdown();
        assert_eq!(*sink.batches.lock().unwrap(), vec![2]);
        assert_eq!(stats.rows_persisted, 2);
        assert_eq!(worker.pending_len(), 0);
    }

    #[test]
    fn test_full_display_queue_never_blocks() {
        let (mut worker, rx) = create_test_worker(RecordingSink::default(), 1);
        let t0 = Instant::now();
        worker.reset_flush_timer(t0);
        for _ in 0..3 {
            worker.tick_at(t0);
        }
        assert_eq!(worker.stats().display_dropped, 2);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(worker.pending_len(), 3);
    }

    #[test]
    fn test_closed_display_is_not_counted_as_dropped() {
        let (mut worker, rx) = create_test_worker(RecordingSink::default(), 1);
        drop(rx);
        let t0 = Instant::now();
        worker.reset_flush_timer(t0);
        for _ in 0..3 {
            worker.tick_at(t0);
        }
        assert_eq!(worker.stats().display_dropped, 0);
        assert_eq!(worker.pending_len(), 3);
    }

    #[test]
    fn test_run_exits_when_flag_cleared() {
        let sink = RecordingSink::default();
        let (worker, rx) = create_test_worker(sink.clone(), 8);
        worker.running.store(false, Ordering::SeqCst);
        let stats = worker.run();
        assert_eq!(stats.rounds, 0);
        assert!(sink.batches.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
