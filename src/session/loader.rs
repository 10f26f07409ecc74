//! Log loader for playback
//!
//! Reads a CSV log, keeps the `Timestamp` column and every column whose header
//! ends with the configured suffix. Rows with an unparseable timestamp are
//! dropped; unparseable or empty value cells become `NaN`.

use std::io::Read;
use std::path::Path;

use super::persister::TIMESTAMP_COLUMN;
use super::types::LoadedSeries;
use crate::error::{DataLogError, Result, ResultExt};
use crate::types::parse_timestamp;

/// Load a log file
pub fn load_series(path: impl AsRef<Path>, column_suffix: &str) -> Result<LoadedSeries> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(DataLogError::from)
        .with_context(|| format!("Failed to open log {}", path.display()))?;
    let series = read_series(file, column_suffix)
        .with_context(|| format!("Failed to load log {}", path.display()))?;
    tracing::info!(
        "Loaded {} rows x {} columns from {} ({:.2}s)",
        series.len(),
        series.channel_count(),
        path.display(),
        series.duration_s()
    );
    Ok(series)
}

/// Parse a log from any reader
pub fn read_series<R: Read>(reader: R, column_suffix: &str) -> Result<LoadedSeries> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let ts_col = headers
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
        .ok_or_else(|| DataLogError::Load(format!("no '{}' column", TIMESTAMP_COLUMN)))?;

    let value_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != ts_col && h.ends_with(column_suffix))
        .map(|(i, h)| (i, h.to_string()))
        .collect();
    if value_cols.is_empty() {
        return Err(DataLogError::Load(format!(
            "no columns ending with '{}'",
            column_suffix
        )));
    }

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                tracing::debug!("Skipping unreadable row: {}", e);
                dropped += 1;
                continue;
            }
        };
        let Some(ts) = record.get(ts_col).and_then(parse_timestamp) else {
            dropped += 1;
            continue;
        };
        let values = value_cols
            .iter()
            .map(|(i, _)| {
                record
                    .get(*i)
                    .and_then(|cell| cell.parse::<f64>().ok())
                    .unwrap_or(f64::NAN)
            })
            .collect();
        rows.push((ts, values));
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} unreadable rows or rows with an unparseable timestamp", dropped);
    }

    let columns = value_cols.into_iter().map(|(_, h)| h).collect();
    LoadedSeries::from_rows(columns, rows)
}

/// Column header without its unit suffix, e.g. `"Sensor 1 (mm)"` -> `"Sensor 1"`
pub fn column_label<'a>(header: &'a str, column_suffix: &str) -> &'a str {
    header
        .strip_suffix(column_suffix)
        .unwrap_or(header)
        .trim_end()
}
