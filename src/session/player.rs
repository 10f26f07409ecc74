//! Windowed playback of a loaded log
//!
//! [`PlaybackTimeline`] maps animation frames onto rows by wall-clock time and
//! extracts the trailing window ending at a row. [`PlaybackClock`] advances
//! the frame counter at the target frame rate for the viewer.

use std::time::{Duration, Instant};

use super::types::{LoadedSeries, PlaybackState, PlaybackWindow};
use crate::error::{DataLogError, Result};

/// Frame mapping and window extraction over a loaded series
#[derive(Debug, Clone)]
pub struct PlaybackTimeline {
    series: LoadedSeries,
    fps: f64,
}

impl PlaybackTimeline {
    /// Create a timeline. `fps` must be positive and finite.
    pub fn new(series: LoadedSeries, fps: f64) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(DataLogError::Config(format!(
                "target fps must be positive, got {}",
                fps
            )));
        }
        Ok(Self { series, fps })
    }

    /// The loaded series
    pub fn series(&self) -> &LoadedSeries {
        &self.series
    }

    /// Target frame rate
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Span of the series in seconds
    pub fn duration_s(&self) -> f64 {
        self.series.duration_s()
    }

    /// Frames needed to cover the series: `ceil(duration * fps)`, or one
    /// frame per row when the series spans no time
    pub fn total_frames(&self) -> u64 {
        let duration_us = self.series.offsets_us().last().copied().unwrap_or(0);
        if duration_us > 0 {
            (duration_us as f64 * self.fps / 1e6).ceil() as u64
        } else {
            self.series.len() as u64
        }
    }

    /// Row shown at `frame`: the last row at or before
    /// `start + trunc(frame * 1000 / fps)` ms
    pub fn frame_to_index(&self, frame: u64) -> usize {
        let offsets = self.series.offsets_us();
        let last = offsets.len().saturating_sub(1);
        if offsets.len() <= 1 || offsets[last] == 0 {
            return 0;
        }

        let target_ms = (frame as f64 * 1000.0 / self.fps) as i64;
        let target_us = target_ms.saturating_mul(1000);
        offsets
            .partition_point(|t| *t <= target_us)
            .saturating_sub(1)
            .min(last)
    }

    /// Rows with `T[index] - window_s <= t <= T[index]`
    ///
    /// An out-of-range index gives an empty window anchored at the last row.
    /// A negative or NaN `window_s` selects nothing.
    pub fn window(&self, index: usize, window_s: f64) -> PlaybackWindow {
        let offsets = self.series.offsets_us();
        let channels = self.series.channel_count();
        let Some(&end_us) = offsets.get(index) else {
            return PlaybackWindow::empty(self.duration_s(), window_s, channels);
        };
        if !(window_s >= 0.0) {
            return PlaybackWindow::empty(end_us as f64 / 1e6, window_s, channels);
        }

        // Never widen the window past `window_s`
        let window_us = (window_s * 1e6).floor() as i64;
        let start_us = end_us.saturating_sub(window_us);

        let lo = offsets.partition_point(|t| *t < start_us);
        let hi = offsets.partition_point(|t| *t <= end_us);
        let range = lo..hi.max(lo);

        let times_s = offsets[range.clone()]
            .iter()
            .map(|us| *us as f64 / 1e6)
            .collect();
        let values = (0..channels)
            .map(|c| range.clone().map(|i| self.series.row(i)[c]).collect())
            .collect();

        PlaybackWindow {
            end_s: end_us as f64 / 1e6,
            start_s: start_us as f64 / 1e6,
            times_s,
            values,
        }
    }

    /// Window for an animation frame
    pub fn frame_window(&self, frame: u64, window_s: f64) -> PlaybackWindow {
        self.window(self.frame_to_index(frame), window_s)
    }
}

/// Frame counter driven by wall time
#[derive(Debug)]
pub struct PlaybackClock {
    state: PlaybackState,
    fps: f64,
    total_frames: u64,
    current_frame: u64,
    /// When the current frame started (real time)
    frame_started: Instant,
    loop_playback: bool,
}

impl PlaybackClock {
    /// Create a clock positioned at frame 0, playing
    pub fn new(fps: f64, total_frames: u64, now: Instant) -> Self {
        Self {
            state: PlaybackState::Playing,
            fps: fps.max(f64::MIN_POSITIVE),
            total_frames: total_frames.max(1),
            current_frame: 0,
            frame_started: now,
            loop_playback: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn loop_playback(&self) -> bool {
        self.loop_playback
    }

    pub fn set_loop_playback(&mut self, loop_enabled: bool) {
        self.loop_playback = loop_enabled;
    }

    /// Real time per frame
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Fraction of the frames shown
    pub fn progress(&self) -> f64 {
        if self.total_frames <= 1 {
            return 1.0;
        }
        self.current_frame as f64 / (self.total_frames - 1) as f64
    }

    /// Advance by however many whole frames fit in the time since the last
    /// advance. Returns the current frame.
    pub fn update(&mut self, now: Instant) -> u64 {
        if !self.state.is_playing() {
            return self.current_frame;
        }
        let interval = self.frame_interval();
        let elapsed = now.saturating_duration_since(self.frame_started);
        let steps = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor() as u64;
        if steps == 0 {
            return self.current_frame;
        }
        self.frame_started += interval.mul_f64(steps as f64);

        let last = self.total_frames - 1;
        let next = self.current_frame.saturating_add(steps);
        if next > last {
            if self.loop_playback {
                self.current_frame = next % self.total_frames;
            } else {
                self.current_frame = last;
                self.state = PlaybackState::Finished;
            }
        } else {
            self.current_frame = next;
        }
        self.current_frame
    }

    /// Play from the current frame; restarts when finished
    pub fn play(&mut self, now: Instant) {
        if self.state == PlaybackState::Finished {
            self.current_frame = 0;
        }
        self.state = PlaybackState::Playing;
        self.frame_started = now;
    }

    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.state = PlaybackState::Paused;
        }
    }

    /// Jump to a frame, clamped to the valid range
    pub fn seek(&mut self, frame: u64, now: Instant) {
        self.current_frame = frame.min(self.total_frames - 1);
        self.frame_started = now;
        if self.state == PlaybackState::Finished {
            self.state = PlaybackState::Paused;
        }
    }

    /// Move one frame forward and pause
    pub fn step_forward(&mut self, now: Instant) {
        self.pause();
        self.seek(self.current_frame.saturating_add(1), now);
    }

    /// Move one frame back and pause
    pub fn step_backward(&mut self, now: Instant) {
        self.pause();
        self.seek(self.current_frame.saturating_sub(1), now);
    }
}
