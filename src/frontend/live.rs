//! Live acquisition view
//!
//! Drains the display queue every frame into one rolling buffer per channel
//! and draws one plot per channel against sample index. Closing the window
//! stops acquisition and waits for the final flush.

use super::plot::{reference_line, y_bounds, TRACE_COLOR};
use crate::backend::{AcquisitionHandle, DisplayReceiver};
use crate::config::{AppConfig, ChannelConfig};
use crate::types::{RollingBuffer, SampleRound};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use std::path::PathBuf;
use std::time::Duration;

/// Rolling per-channel state behind the live plots
#[derive(Debug, Clone)]
pub struct LiveState {
    buffers: Vec<RollingBuffer<f64>>,
    rounds_received: u64,
}

impl LiveState {
    /// One buffer of `capacity` per channel
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            buffers: (0..channels).map(|_| RollingBuffer::new(capacity)).collect(),
            rounds_received: 0,
        }
    }

    /// Append one round; absent values become NaN gaps
    pub fn ingest(&mut self, round: &SampleRound) {
        for (buffer, value) in self.buffers.iter_mut().zip(round.values_or_nan()) {
            buffer.push(value);
        }
        self.rounds_received += 1;
    }

    pub fn buffer(&self, channel: usize) -> Option<&RollingBuffer<f64>> {
        self.buffers.get(channel)
    }

    pub fn rounds_received(&self) -> u64 {
        self.rounds_received
    }
}

/// eframe app for live acquisition
pub struct LiveApp {
    channels: Vec<ChannelConfig>,
    reference_lines: Vec<f64>,
    state: LiveState,
    display: DisplayReceiver,
    handle: Option<AcquisitionHandle>,
    log_path: PathBuf,
}

impl LiveApp {
    pub fn new(
        config: &AppConfig,
        handle: AcquisitionHandle,
        display: DisplayReceiver,
        log_path: PathBuf,
    ) -> Self {
        Self {
            channels: config.channels.clone(),
            reference_lines: config.playback.reference_lines.clone(),
            state: LiveState::new(config.channels.len(), config.display.buffer_capacity),
            display,
            handle: Some(handle),
            log_path,
        }
    }

    fn process_rounds(&mut self) -> bool {
        let rounds = self.display.drain();
        for round in &rounds {
            self.state.ingest(round);
        }
        !rounds.is_empty()
    }

    fn render_channel(&self, ui: &mut egui::Ui, index: usize, height: f32) {
        let channel = &self.channels[index];
        let Some(buffer) = self.state.buffer(index) else {
            return;
        };

        ui.label(egui::RichText::new(format!("{} Live Data", channel.name)).strong());
        let capacity = buffer.capacity() as f64;
        let bounds = y_bounds(buffer.iter());
        let unit = channel.unit.clone();

        Plot::new(("live_plot", index))
            .height(height)
            .show_grid(true)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .x_axis_label("Sample")
            .y_axis_label(format!("{} ({})", channel.name, unit))
            .show(ui, |plot_ui| {
                let (y_min, y_max) = bounds.unwrap_or((-1.0, 1.0));
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [0.0, y_min],
                    [capacity, y_max],
                ));
                let points: PlotPoints = buffer.as_plot_points().into();
                plot_ui.line(Line::new(channel.name.clone(), points).color(TRACE_COLOR).width(1.5));
                for y in &self.reference_lines {
                    plot_ui.hline(reference_line(*y, &unit));
                }
            });
    }

    /// Stop acquisition, blocking until the final flush is done
    pub fn shutdown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            match handle.stop() {
                Ok(stats) => tracing::info!(
                    "Acquisition stopped after {} rounds ({} rows persisted)",
                    stats.rounds,
                    stats.rows_persisted
                ),
                Err(e) => tracing::error!("Failed to stop acquisition: {}", e),
            }
        }
    }
}

impl eframe::App for LiveApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_rounds();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let running = self.handle.as_ref().map(|h| h.is_running()).unwrap_or(false);
                ui.label(if running { "Recording" } else { "Stopped" });
                ui.separator();
                ui.label(format!("{} rounds", self.state.rounds_received()));
                ui.separator();
                ui.label(self.log_path.display().to_string());
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let count = self.channels.len().max(1);
            let spacing = 28.0;
            let height = ((ui.available_height() / count as f32) - spacing).max(80.0);
            egui::ScrollArea::vertical().show(ui, |ui| {
                for index in 0..self.channels.len() {
                    self.render_channel(ui, index, height);
                }
            });
        });

        ctx.request_repaint_after(Duration::from_millis(16));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_live_state_ingest() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut state = LiveState::new(2, 3);
        for i in 0..5 {
            let second = if i % 2 == 0 { None } else { Some(i as f64) };
            state.ingest(&SampleRound::new(ts, vec![Some(i as f64), second]));
        }

        assert_eq!(state.rounds_received(), 5);
        let first: Vec<f64> = state.buffer(0).unwrap().iter().copied().collect();
        assert_eq!(first, vec![2.0, 3.0, 4.0]);
        let second: Vec<f64> = state.buffer(1).unwrap().iter().copied().collect();
        assert!(second[0].is_nan());
        assert_eq!(second[1], 3.0);
        assert!(second[2].is_nan());
        assert!(state.buffer(2).is_none());
    }
}
