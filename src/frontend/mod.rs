//! Frontend module for egui UI
//!
//! This module provides the two viewer windows using eframe/egui. The live
//! view receives rounds from the backend through a crossbeam channel and
//! renders them in real time; the playback view animates a loaded log.
//!
//! # Main Types
//!
//! - [`LiveApp`] - Rolling per-channel plots during acquisition
//! - [`PlaybackApp`] - Windowed, frame-timed replay of a log
//!
//! # Submodules
//!
//! - `plot` - Shared plot helpers (bounds, reference lines, clock axis)

pub mod live;
pub mod playback;
mod plot;

pub use live::{LiveApp, LiveState};
pub use playback::{hold_extent, PlaybackApp, PlaybackLayout};

fn native_options(title: &str) -> eframe::NativeOptions {
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title(title),
        ..Default::default()
    }
}

/// Open the live window and block until it closes
pub fn run_live(app: LiveApp) -> eframe::Result<()> {
    eframe::run_native(
        "Sensor Live Data",
        native_options("Sensor Live Data"),
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(app))
        }),
    )
}

/// Open the playback window and block until it closes
pub fn run_playback(app: PlaybackApp) -> eframe::Result<()> {
    eframe::run_native(
        "Ride Height Playback",
        native_options("Ride Height Playback"),
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Ok(Box::new(app))
        }),
    )
}
