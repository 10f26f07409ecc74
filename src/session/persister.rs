//! Batched persistence of sample rounds
//!
//! The sampling worker accumulates rounds in [`PendingRows`] and hands them to
//! a [`LogSink`] on its flush interval. The buffer is cleared only when the
//! sink reports success, so an I/O failure keeps the rows for the next attempt.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::{DataLogError, Result};
use crate::types::{format_timestamp, SampleRound};

/// Header of the timestamp column
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Result of a flush that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// This many rows were appended
    Written(usize),
    /// Nothing was pending
    Empty,
}

/// Append-only destination for sample rounds
pub trait LogSink: Send {
    /// Append `rows` in order. `Err` means nothing may be considered persisted.
    fn flush(&mut self, rows: &[SampleRound]) -> Result<FlushOutcome>;
}

/// Rounds waiting to be persisted
#[derive(Debug, Default)]
pub struct PendingRows {
    rows: Vec<SampleRound>,
}

impl PendingRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, round: SampleRound) {
        self.rows.push(round);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hand the rows to `sink`, clearing them only on success
    pub fn flush_into(&mut self, sink: &mut dyn LogSink) -> Result<FlushOutcome> {
        if self.rows.is_empty() {
            return Ok(FlushOutcome::Empty);
        }
        let outcome = sink.flush(&self.rows)?;
        self.rows.clear();
        Ok(outcome)
    }
}

/// CSV log writer
///
/// The file is opened in append mode for every flush; the header goes in
/// first when the file is missing or empty.
#[derive(Debug, Clone)]
pub struct BatchPersister {
    path: PathBuf,
    header: Vec<String>,
}

impl BatchPersister {
    /// `header` is the full first record, timestamp column included
    pub fn new(path: impl Into<PathBuf>, header: Vec<String>) -> Self {
        Self {
            path: path.into(),
            header,
        }
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header record
    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn persist_error(&self, err: impl ToString) -> DataLogError {
        DataLogError::Persist {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }

    fn needs_header(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true)
    }

    fn record(round: &SampleRound) -> Vec<String> {
        std::iter::once(format_timestamp(&round.timestamp))
            .chain(
                round
                    .values
                    .iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            )
            .collect()
    }
}

impl LogSink for BatchPersister {
    fn flush(&mut self, rows: &[SampleRound]) -> Result<FlushOutcome> {
        if rows.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let write_header = self.needs_header();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.persist_error(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        if write_header {
            writer
                .write_record(&self.header)
                .map_err(|e| self.persist_error(e))?;
        }
        for round in rows {
            writer
                .write_record(Self::record(round))
                .map_err(|e| self.persist_error(e))?;
        }
        writer.flush().map_err(|e| self.persist_error(e))?;

        tracing::debug!("Flushed {} rows to {}", rows.len(), self.path.display());
        Ok(FlushOutcome::Written(rows.len()))
    }
}
