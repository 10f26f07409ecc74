//! Plot helpers shared by the live and playback views
//!
//! # Main Items
//!
//! - [`y_bounds`] - Padded Y range of the finite values on screen
//! - [`reference_line`] - Horizontal guide at a configured Y value
//! - [`clock_label`] - `HH:MM:SS` label for an offset from the log start
//! - [`panel_grid`] - Row/column layout for the playback panels

use chrono::NaiveDateTime;
use egui::Color32;
use egui_plot::{GridMark, HLine, LineStyle};

/// Line colour of the channel traces
pub const TRACE_COLOR: Color32 = Color32::from_rgb(70, 130, 230);

/// Padded min/max of the finite values, `None` when there are none
pub fn y_bounds<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if lo > hi {
        return None;
    }
    let range = hi - lo;
    let padding = if range > 0.0 { range * 0.1 } else { 1.0 };
    Some((lo - padding, hi + padding))
}

/// Dashed red guide, or solid grey for the zero line
pub fn reference_line(y: f64, unit: &str) -> HLine {
    let name = if unit.is_empty() {
        format!("Y={}", y)
    } else {
        format!("Y={} {}", y, unit)
    };
    let line = HLine::new(name, y).width(1.0);
    if y == 0.0 {
        line.color(Color32::GRAY).style(LineStyle::Solid)
    } else {
        line.color(Color32::RED).style(LineStyle::dashed_loose())
    }
}

/// Wall-clock label for an offset in seconds from `start`
pub fn clock_label(start: NaiveDateTime, offset_s: f64) -> String {
    if !offset_s.is_finite() {
        return String::new();
    }
    let t = start + chrono::Duration::microseconds((offset_s * 1e6).round() as i64);
    t.format("%H:%M:%S").to_string()
}

/// Rows and columns for `panels` plots: a single row up to three, then 2x2
pub fn panel_grid(panels: usize) -> (usize, usize) {
    match panels {
        0 | 1 => (1, 1),
        2 => (1, 2),
        3 => (1, 3),
        _ => (2, 2),
    }
}

/// Whole-second grid marks for a clock axis, coarser as the range grows
pub fn second_grid_marks(bounds: (f64, f64)) -> Vec<GridMark> {
    let (min, max) = bounds;
    let range = max - min;
    let step = if range < 5.0 {
        1.0
    } else if range < 30.0 {
        5.0
    } else if range < 120.0 {
        15.0
    } else {
        60.0
    };

    let mut marks = Vec::new();
    let mut current = (min / step).ceil() * step;
    while current <= max {
        marks.push(GridMark {
            value: current,
            step_size: step,
        });
        current += step;
    }
    marks
}
