//! Playback view
//!
//! Replays a loaded log at the target frame rate. Each frame maps to a row
//! by wall-clock time and every panel shows the trailing window ending there.
//! When a window comes back empty the panels keep their previous X extent.

use super::plot::{clock_label, panel_grid, reference_line, second_grid_marks, y_bounds, TRACE_COLOR};
use crate::config::PlaybackConfig;
use crate::session::{column_label, PlaybackClock, PlaybackTimeline, PlaybackWindow};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use std::time::Instant;

/// Panel titles and layout derived once from the log
#[derive(Debug, Clone)]
pub struct PlaybackLayout {
    pub titles: Vec<String>,
    pub rows: usize,
    pub cols: usize,
}

impl PlaybackLayout {
    /// At most `max_panels` panels, titled `<label> (Last <w>s)`
    pub fn new(columns: &[String], config: &PlaybackConfig) -> Self {
        let panels = columns.len().min(config.max_panels.max(1));
        if columns.len() > panels {
            tracing::warn!(
                "Log has {} value columns, showing the first {}",
                columns.len(),
                panels
            );
        }
        let titles = columns[..panels]
            .iter()
            .map(|c| {
                format!(
                    "{} (Last {}s)",
                    column_label(c, &config.column_suffix),
                    config.window_s
                )
            })
            .collect();
        let (rows, cols) = panel_grid(panels);
        Self { titles, rows, cols }
    }

    pub fn panels(&self) -> usize {
        self.titles.len()
    }
}

/// X extent to draw: the window's own, or the previous one when empty
pub fn hold_extent(window: &PlaybackWindow, previous: Option<(f64, f64)>) -> (f64, f64) {
    match previous {
        Some(extent) if window.is_empty() => extent,
        _ => window.x_extent(),
    }
}

/// eframe app for playback
pub struct PlaybackApp {
    timeline: PlaybackTimeline,
    clock: PlaybackClock,
    config: PlaybackConfig,
    layout: PlaybackLayout,
    unit: String,
    x_extent: Option<(f64, f64)>,
}

impl PlaybackApp {
    pub fn new(timeline: PlaybackTimeline, config: PlaybackConfig) -> Self {
        let clock = PlaybackClock::new(timeline.fps(), timeline.total_frames(), Instant::now());
        let layout = PlaybackLayout::new(timeline.series().columns(), &config);
        let unit = config
            .column_suffix
            .trim_matches(|c| c == '(' || c == ')')
            .to_string();
        tracing::info!(
            "Playback: {} frames at {} fps, {} panels",
            timeline.total_frames(),
            timeline.fps(),
            layout.panels()
        );
        Self {
            timeline,
            clock,
            config,
            layout,
            unit,
            x_extent: None,
        }
    }

    fn render_panel(
        &self,
        ui: &mut egui::Ui,
        index: usize,
        window: &PlaybackWindow,
        extent: (f64, f64),
        size: egui::Vec2,
    ) {
        let start = self.timeline.series().start();
        let y = match (self.config.y_min, self.config.y_max) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => window
                .value_range(index)
                .and_then(|(lo, hi)| y_bounds(&[lo, hi])),
        };

        ui.vertical(|ui| {
            ui.set_width(size.x);
            ui.label(egui::RichText::new(&self.layout.titles[index]).strong());
            Plot::new(("playback_plot", index))
                .height(size.y)
                .show_grid(true)
                .allow_zoom(false)
                .allow_drag(false)
                .allow_scroll(false)
                .x_axis_label("Time (HH:MM:SS)")
                .y_axis_label(format!("Height ({})", self.unit))
                .x_grid_spacer(|input| second_grid_marks(input.bounds))
                .x_axis_formatter(move |mark, _range| clock_label(start, mark.value))
                .show(ui, |plot_ui| {
                    let (x_min, x_max) = if extent.0 < extent.1 {
                        extent
                    } else {
                        (extent.0 - 0.5, extent.1 + 0.5)
                    };
                    let (y_min, y_max) = y.unwrap_or((-1.0, 1.0));
                    plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                        [x_min, y_min],
                        [x_max, y_max],
                    ));
                    let points: PlotPoints = window.points(index).into();
                    plot_ui.line(Line::new("Ride Height", points).color(TRACE_COLOR).width(1.5));
                    for y in &self.config.reference_lines {
                        plot_ui.hline(reference_line(*y, &self.unit));
                    }
                });
        });
    }
}

impl eframe::App for PlaybackApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let frame = self.clock.update(now);
        let window = self.timeline.frame_window(frame, self.config.window_s);
        let extent = hold_extent(&window, self.x_extent);
        self.x_extent = Some(extent);

        egui::TopBottomPanel::top("playback_header").show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(format!(
                    "Start Time: {}",
                    self.timeline.series().start().format("%Y-%m-%d %H:%M:%S%.3f")
                ));
            });
        });

        egui::TopBottomPanel::bottom("playback_controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.clock.state().is_playing() {
                    if ui.button("Pause").clicked() {
                        self.clock.pause();
                    }
                } else if ui.button("Play").clicked() {
                    self.clock.play(now);
                }
                if ui.button("<").clicked() {
                    self.clock.step_backward(now);
                }
                if ui.button(">").clicked() {
                    self.clock.step_forward(now);
                }
                let mut looping = self.clock.loop_playback();
                if ui.checkbox(&mut looping, "Loop").changed() {
                    self.clock.set_loop_playback(looping);
                }
                ui.separator();
                ui.label(format!(
                    "Frame {}/{}  {}",
                    self.clock.current_frame() + 1,
                    self.clock.total_frames(),
                    self.clock.state().display_name()
                ));
                ui.add(egui::ProgressBar::new(self.clock.progress() as f32));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let rows = self.layout.rows as f32;
            let cols = self.layout.cols as f32;
            let size = egui::vec2(
                (available.x / cols - 8.0).max(120.0),
                (available.y / rows - 40.0).max(80.0),
            );
            for row in 0..self.layout.rows {
                ui.horizontal(|ui| {
                    for col in 0..self.layout.cols {
                        let index = row * self.layout.cols + col;
                        if index < self.layout.panels() {
                            self.render_panel(ui, index, &window, extent, size);
                        }
                    }
                });
            }
        });

        if self.clock.state().is_playing() {
            ctx.request_repaint_after(self.clock.frame_interval());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_titles_and_cap() {
        let config = PlaybackConfig::default();
        let columns: Vec<String> = (1..=5).map(|i| format!("Sensor {} (mm)", i)).collect();
        let layout = PlaybackLayout::new(&columns, &config);
        assert_eq!(layout.panels(), 4);
        assert_eq!((layout.rows, layout.cols), (2, 2));
        assert_eq!(layout.titles[0], "Sensor 1 (Last 3s)");

        let layout = PlaybackLayout::new(&columns[..2], &config);
        assert_eq!((layout.rows, layout.cols), (1, 2));
    }

    #[test]
    fn test_hold_extent_on_empty_window() {
        let empty = PlaybackWindow {
            end_s: 9.0,
            start_s: 6.0,
            ..Default::default()
        };
        assert_eq!(hold_extent(&empty, Some((1.0, 4.0))), (1.0, 4.0));
        assert_eq!(hold_extent(&empty, None), (9.0, 9.0));

        let window = PlaybackWindow {
            end_s: 2.0,
            start_s: -1.0,
            times_s: vec![0.5, 2.0],
            values: vec![vec![1.0, 2.0]],
        };
        assert_eq!(hold_extent(&window, Some((1.0, 4.0))), (0.5, 2.0));
    }
}
