//! Vsync-paced frame consumption.
//!
//! One [`Presenter::tick`] per display refresh: mirror the transport's
//! rolling state into play/pause, slave the cursor to the clock, fetch the
//! frame and hand it to the texture-upload collaborator when its index
//! changed. The presenter never sleeps on its own; pacing comes from the
//! caller's buffer swap.

use std::sync::Arc;

use crate::clock::{ClockAdapter, TransportClock};
use crate::frame::Frame;
use crate::metrics::PresentMetrics;
use crate::playback::PlaybackController;

/// The texture-upload collaborator. Implementations receive a frame only
/// when the presented index changes.
pub trait FrameSink {
    fn present(&mut self, index: u32, frame: Arc<Frame>);
}

/// Drives one playback session against a clock and a sink.
pub struct Presenter<C> {
    controller: PlaybackController,
    clock: ClockAdapter<C>,
    metrics: PresentMetrics,
    duration_seconds: f64,
    last_uploaded: Option<u32>,
}

impl<C: TransportClock> Presenter<C> {
    pub fn new(
        controller: PlaybackController,
        clock: ClockAdapter<C>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            controller,
            clock,
            metrics: PresentMetrics::new(),
            duration_seconds,
            last_uploaded: None,
        }
    }

    /// One presenter iteration.
    ///
    /// A tick with nothing to show counts as a drop; a tick bridged by the
    /// held last frame does not.
    pub fn tick(&mut self, sink: &mut impl FrameSink) {
        let rolling = self.clock.is_rolling();
        if rolling && !self.controller.is_playing() {
            self.controller.play();
        } else if !rolling && self.controller.is_playing() {
            self.controller.pause();
        }

        // fallback timer first (a fresh sync below keeps it silent), then
        // slave to the transport; the counter is applied even when stopped
        // so scrubbing-while-paused tracks it
        self.controller.update();
        let video_seconds = self.clock.video_seconds(self.duration_seconds);
        self.controller.sync_to_time(video_seconds);

        self.metrics.record_present();
        match self.controller.get_current_frame() {
            Some((index, frame)) => {
                if index != self.controller.current_index() {
                    self.metrics.record_hold();
                }
                if self.last_uploaded != Some(index) {
                    sink.present(index, frame);
                    self.last_uploaded = Some(index);
                    self.metrics.record_upload();
                }
            }
            None => self.metrics.record_drop(),
        }
    }

    /// Forces the next tick to re-upload even if the index is unchanged
    /// (scale-mode change, surface resize).
    pub fn invalidate(&mut self) {
        self.last_uploaded = None;
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn clock(&self) -> &ClockAdapter<C> {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut ClockAdapter<C> {
        &mut self.clock
    }

    pub fn metrics(&self) -> &PresentMetrics {
        &self.metrics
    }

    pub fn last_uploaded(&self) -> Option<u32> {
        self.last_uploaded
    }

    /// Telemetry for the overlay. `decode_ahead` is the window the buffer
    /// bar is measured against.
    pub fn status(&self, decode_ahead: usize) -> PresenterStatus {
        let store = self.controller.store();
        let current = self.controller.current_index();
        PresenterStatus {
            current_frame: current,
            total_frames: self.controller.timeline().total_frames(),
            buffered_run: store.buffered_run(current, decode_ahead),
            decode_ahead,
            cached_frames: store.len(),
            cache_capacity: store.capacity(),
            dropped_frames: self.metrics.dropped_frames(),
        }
    }
}

/// Overlay-facing playback telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenterStatus {
    pub current_frame: u32,
    pub total_frames: u32,
    pub buffered_run: usize,
    pub decode_ahead: usize,
    pub cached_frames: usize,
    pub cache_capacity: usize,
    pub dropped_frames: u64,
}

impl PresenterStatus {
    /// Buffer health in `[0, 1]`.
    pub fn buffer_fill(&self) -> f32 {
        self.buffered_run as f32 / self.decode_ahead.max(1) as f32
    }
}
