//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long acquisition tests let the worker run
pub fn test_run_time() -> Duration {
    Duration::from_millis(300)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Write `content` to `name` inside `dir`
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

/// Log file split into lines, each split into fields
pub fn read_log(path: &Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .expect("read log")
        .lines()
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}
