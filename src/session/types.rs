//! Playback data types

use chrono::NaiveDateTime;

use crate::error::{DataLogError, Result};

/// State of the playback clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Frames advance with wall time
    #[default]
    Playing,
    /// Frame counter frozen
    Paused,
    /// Last frame reached without looping
    Finished,
}

impl PlaybackState {
    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Finished => "Finished",
        }
    }
}

/// A log loaded for playback
///
/// Timestamps are kept as microsecond offsets from the first row so frame
/// mapping and window selection compare integers. Rows are sorted by time;
/// `offsets_us.len() == values.len()` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSeries {
    columns: Vec<String>,
    start: NaiveDateTime,
    offsets_us: Vec<i64>,
    /// Row-major, one entry per matched column
    values: Vec<Vec<f64>>,
}

impl LoadedSeries {
    /// Build a series from parsed rows
    ///
    /// Rows are stably sorted by timestamp. Fails when there are no columns
    /// or no rows, or when a row's width does not match the columns.
    pub fn from_rows(columns: Vec<String>, mut rows: Vec<(NaiveDateTime, Vec<f64>)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(DataLogError::Load("no value columns".to_string()));
        }
        if rows.is_empty() {
            return Err(DataLogError::Load("no rows with a valid timestamp".to_string()));
        }
        if let Some((ts, row)) = rows.iter().find(|(_, row)| row.len() != columns.len()) {
            return Err(DataLogError::Load(format!(
                "row at {} has {} values for {} columns",
                ts,
                row.len(),
                columns.len()
            )));
        }

        if rows.windows(2).any(|pair| pair[1].0 < pair[0].0) {
            tracing::warn!("Log rows are out of time order; sorting by timestamp");
            rows.sort_by_key(|(ts, _)| *ts);
        }

        let start = rows[0].0;
        let mut offsets_us = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for (ts, row) in rows {
            offsets_us.push((ts - start).num_microseconds().unwrap_or(i64::MAX));
            values.push(row);
        }

        Ok(Self {
            columns,
            start,
            offsets_us,
            values,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.offsets_us.len()
    }

    /// Always false for a constructed series
    pub fn is_empty(&self) -> bool {
        self.offsets_us.is_empty()
    }

    /// Number of value columns
    pub fn channel_count(&self) -> usize {
        self.columns.len()
    }

    /// Matched column headers, in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Timestamp of the first row
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Microsecond offsets from the first row
    pub fn offsets_us(&self) -> &[i64] {
        &self.offsets_us
    }

    /// Offset of row `index` in seconds
    pub fn time_s(&self, index: usize) -> f64 {
        self.offsets_us[index] as f64 / 1e6
    }

    /// All offsets in seconds
    pub fn times_s(&self) -> Vec<f64> {
        self.offsets_us.iter().map(|us| *us as f64 / 1e6).collect()
    }

    /// Absolute timestamp of row `index`
    pub fn timestamp(&self, index: usize) -> NaiveDateTime {
        self.start + chrono::Duration::microseconds(self.offsets_us[index])
    }

    /// Span from first to last row in seconds
    pub fn duration_s(&self) -> f64 {
        self.offsets_us.last().map(|us| *us as f64 / 1e6).unwrap_or(0.0)
    }

    /// Values of one row
    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index]
    }

    /// Values of one column across all rows
    pub fn column(&self, channel: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[channel]).collect()
    }
}

/// Trailing slice of a series ending at one row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackWindow {
    /// Offset of the anchor row, seconds
    pub end_s: f64,
    /// `end_s - window_s`
    pub start_s: f64,
    /// Offsets of the selected rows, seconds
    pub times_s: Vec<f64>,
    /// Selected values, one vector per channel
    pub values: Vec<Vec<f64>>,
}

impl PlaybackWindow {
    /// A window with no rows, anchored at `end_s`
    pub fn empty(end_s: f64, window_s: f64, channels: usize) -> Self {
        Self {
            end_s,
            start_s: end_s - window_s,
            times_s: Vec::new(),
            values: vec![Vec::new(); channels],
        }
    }

    /// Whether no rows were selected
    pub fn is_empty(&self) -> bool {
        self.times_s.is_empty()
    }

    /// Number of selected rows
    pub fn len(&self) -> usize {
        self.times_s.len()
    }

    /// X extent to show: first and last selected time, or the anchor twice
    /// when empty
    pub fn x_extent(&self) -> (f64, f64) {
        match (self.times_s.first(), self.times_s.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => (self.end_s, self.end_s),
        }
    }

    /// `[time, value]` pairs for one channel
    pub fn points(&self, channel: usize) -> Vec<[f64; 2]> {
        match self.values.get(channel) {
            Some(values) => self
                .times_s
                .iter()
                .zip(values)
                .map(|(t, v)| [*t, *v])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Min and max of the finite values of one channel
    pub fn value_range(&self, channel: usize) -> Option<(f64, f64)> {
        self.values
            .get(channel)?
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((*v, *v)),
                Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_milli_opt(10, 0, 0, ms)
            .unwrap()
    }

    #[test]
    fn test_series_from_rows() {
        let series = LoadedSeries::from_rows(
            vec!["A (mm)".into(), "B (mm)".into()],
            vec![(ts(0), vec![5.0, f64::NAN]), (ts(100), vec![6.0, 7.0])],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.times_s(), vec![0.0, 0.1]);
        assert_eq!(series.column(0), vec![5.0, 6.0]);
        assert!(series.row(0)[1].is_nan());
        assert_eq!(series.timestamp(1), ts(100));
        assert!((series.duration_s() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_series_sorts_rows() {
        let series = LoadedSeries::from_rows(
            vec!["A (mm)".into()],
            vec![(ts(200), vec![2.0]), (ts(100), vec![1.0])],
        )
        .unwrap();
        assert_eq!(series.start(), ts(100));
        assert_eq!(series.column(0), vec![1.0, 2.0]);
    }

    #[test]
    fn test_series_rejects_empty() {
        assert!(LoadedSeries::from_rows(vec!["A (mm)".into()], Vec::new()).is_err());
        assert!(LoadedSeries::from_rows(Vec::new(), vec![(ts(0), vec![])]).is_err());
        assert!(LoadedSeries::from_rows(vec!["A (mm)".into()], vec![(ts(0), vec![1.0, 2.0])]).is_err());
    }

    #[test]
    fn test_window_extent_and_range() {
        let empty = PlaybackWindow {
            end_s: 4.0,
            start_s: 1.0,
            ..Default::default()
        };
        assert!(empty.is_empty());
        assert_eq!(empty.x_extent(), (4.0, 4.0));
        assert_eq!(empty.value_range(0), None);

        let window = PlaybackWindow {
            end_s: 2.0,
            start_s: -1.0,
            times_s: vec![1.0, 2.0],
            values: vec![vec![f64::NAN, 3.0]],
        };
        assert_eq!(window.x_extent(), (1.0, 2.0));
        assert_eq!(window.value_range(0), Some((3.0, 3.0)));
        assert_eq!(window.points(0).len(), 2);
        assert!(window.points(3).is_empty());
    }
}
