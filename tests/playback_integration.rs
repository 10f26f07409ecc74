//! Integration tests for log playback
//!
//! These tests validate the playback workflow:
//! - Loading logs written by the persister
//! - Dropping bad rows and blank cells
//! - Frame mapping and window extraction over a loaded file

mod common;

use chrono::NaiveDate;
use common::assert_float_eq;
use common::builders::LogBuilder;
use common::write_file;
use datalog_rs::session::{
    load_series, BatchPersister, LogSink, PlaybackTimeline, TIMESTAMP_COLUMN,
};
use datalog_rs::types::SampleRound;
use tempfile::TempDir;

#[test]
fn test_two_channel_example() {
    let dir = TempDir::new().unwrap();
    let log = LogBuilder::new(&["Sensor 1 (mm)", "Sensor 2 (mm)"])
        .row("2024-05-17 10:00:00.000", &[Some(5.0), None])
        .row("2024-05-17 10:00:00.100", &[Some(6.0), Some(7.0)])
        .build();
    let path = write_file(dir.path(), "log.csv", &log);

    let series = load_series(&path, "(mm)").unwrap();
    assert_eq!(series.times_s(), vec![0.0, 0.1]);
    assert_eq!(series.row(0)[0], 5.0);
    assert!(series.row(0)[1].is_nan());
    assert_eq!(series.row(1), &[6.0, 7.0]);

    let timeline = PlaybackTimeline::new(series, 30.0).unwrap();
    assert_eq!(timeline.frame_to_index(0), 0);

    let window = timeline.window(1, 3.0);
    assert_eq!(window.len(), 2);
    assert_eq!(window.values[0], vec![5.0, 6.0]);
    assert!(window.values[1][0].is_nan());
    assert_eq!(window.values[1][1], 7.0);
}

#[test]
fn test_persisted_log_replays() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.csv");
    let header = vec![
        TIMESTAMP_COLUMN.to_string(),
        "Front (mm)".to_string(),
        "Rear (mm)".to_string(),
    ];
    let base = NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let rounds: Vec<SampleRound> = (0..150)
        .map(|i| {
            let ts = base + chrono::Duration::milliseconds(i * 33 + (i % 3));
            let rear = if i % 10 == 0 { None } else { Some(150.0 + i as f64) };
            SampleRound::new(ts, vec![Some(175.0), rear])
        })
        .collect();

    let mut persister = BatchPersister::new(&path, header);
    for chunk in rounds.chunks(31) {
        persister.flush(chunk).unwrap();
    }

    let series = load_series(&path, "(mm)").unwrap();
    assert_eq!(series.len(), 150);
    assert_eq!(series.columns(), &["Front (mm)".to_string(), "Rear (mm)".to_string()]);
    assert_eq!(series.start(), base);
    assert!(series.row(10)[1].is_nan());
    assert_eq!(series.row(11)[1], 161.0);

    let timeline = PlaybackTimeline::new(series, 30.0).unwrap();
    let total = timeline.total_frames();
    assert_float_eq(total as f64, (timeline.duration_s() * 30.0).ceil(), 1e-9);

    let mut previous = 0;
    for frame in 0..total {
        let index = timeline.frame_to_index(frame);
        assert!(index >= previous);
        previous = index;

        let window = timeline.window(index, 3.0);
        let end = timeline.series().time_s(index);
        assert!(window.times_s.iter().all(|t| *t <= end && *t >= end - 3.0 - 1e-9));
    }
    assert_eq!(previous, 148);
}

#[test]
fn test_bad_rows_dropped_and_columns_filtered() {
    let dir = TempDir::new().unwrap();
    let log = LogBuilder::new(&["Sensor 1 (mm)", "Temp (C)", "Sensor 2 (mm)"])
        .row("2024-05-17 10:00:00.000", &[Some(1.0), Some(20.0), Some(2.0)])
        .raw("not a time,3,21,4")
        .raw("2024-05-17 10:00:00.500,abc,22,")
        .build();
    let path = write_file(dir.path(), "log.csv", &log);

    let series = load_series(&path, "(mm)").unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series.channel_count(), 2);
    assert!(series.row(1)[0].is_nan());
    assert!(series.row(1)[1].is_nan());
    assert_float_eq(series.duration_s(), 0.5, 1e-12);
}

#[test]
fn test_unloadable_logs() {
    let dir = TempDir::new().unwrap();

    let no_match = write_file(
        dir.path(),
        "temps.csv",
        &LogBuilder::new(&["Temp (C)"])
            .row("2024-05-17 10:00:00.000", &[Some(20.0)])
            .build(),
    );
    assert!(load_series(&no_match, "(mm)").is_err());

    let all_bad = write_file(
        dir.path(),
        "bad.csv",
        &LogBuilder::new(&["Sensor 1 (mm)"]).raw("yesterday,1").build(),
    );
    assert!(load_series(&all_bad, "(mm)").is_err());

    assert!(load_series(dir.path().join("missing.csv"), "(mm)").is_err());
}
