//! Playback cursor ownership and clock-to-frame translation.
//!
//! [`PlaybackShared`] is the cross-thread slice of playback state: three
//! atomic scalars, written by the presenter and read by the decode worker.
//! Relaxed ordering is sufficient: a stale cursor read only delays the
//! worker by one iteration, and the frame data itself travels through the
//! store's lock.
//!
//! [`PlaybackController`] owns everything else (held-frame bookkeeping, the
//! internal fallback timer) and is confined to the presenter thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::store::FrameStore;
use crate::timeline::Timeline;

/// How long after the last external sync the internal timer stays silent.
pub const EXTERNAL_SYNC_HOLD: Duration = Duration::from_millis(100);

/// Atomic playback state shared between the presenter and the decode worker.
#[derive(Debug, Default)]
pub struct PlaybackShared {
    current_frame: AtomicU32,
    is_playing: AtomicBool,
    external_sync_active: AtomicBool,
}

impl PlaybackShared {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    pub fn external_sync_active(&self) -> bool {
        self.external_sync_active.load(Ordering::Relaxed)
    }

    fn set_current_frame(&self, index: u32) {
        self.current_frame.store(index, Ordering::Relaxed);
    }

    fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    fn set_external_sync(&self, active: bool) {
        self.external_sync_active.store(active, Ordering::Relaxed);
    }
}

/// Owns the playback cursor and serves frames to the presenter.
pub struct PlaybackController {
    shared: Arc<PlaybackShared>,
    store: Arc<FrameStore>,
    timeline: Timeline,
    fps: f64,
    /// Last index successfully served; the hold target when the requested
    /// frame is missing. Presenter-thread local.
    last_valid_frame: Option<u32>,
    last_sync_instant: Option<Instant>,
    /// Reference point for the internal fallback timer.
    last_tick: Instant,
}

impl PlaybackController {
    pub fn new(store: Arc<FrameStore>, shared: Arc<PlaybackShared>, fps: f64) -> Self {
        let timeline = store.timeline();
        Self {
            shared,
            store,
            timeline,
            fps,
            last_valid_frame: None,
            last_sync_instant: None,
            last_tick: Instant::now(),
        }
    }

    pub fn shared(&self) -> &Arc<PlaybackShared> {
        &self.shared
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn current_index(&self) -> u32 {
        self.shared.current_frame()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn last_valid_frame(&self) -> Option<u32> {
        self.last_valid_frame
    }

    /// Slaves the cursor to the external clock. Non-blocking; called once
    /// per presenter tick while the transport is reachable.
    pub fn sync_to_time(&mut self, seconds: f64) {
        let index = self.timeline.index_at(seconds, self.fps);
        self.shared.set_current_frame(index);
        self.shared.set_external_sync(true);
        self.last_sync_instant = Some(Instant::now());
    }

    /// Repositions the cursor without claiming external sync.
    pub fn seek(&mut self, seconds: f64) {
        let index = self.timeline.index_at(seconds, self.fps);
        self.shared.set_current_frame(index);
        self.last_tick = Instant::now();
    }

    pub fn play(&mut self) {
        if !self.shared.is_playing() {
            self.shared.set_playing(true);
            self.last_tick = Instant::now();
            tracing::debug!("playing");
        }
    }

    pub fn pause(&mut self) {
        if self.shared.is_playing() {
            self.shared.set_playing(false);
            tracing::debug!("paused");
        }
    }

    /// Internal-timer fallback for clock loss.
    ///
    /// While external sync is fresh (under [`EXTERNAL_SYNC_HOLD`]) this is a
    /// no-op; the clock drives the cursor. Once syncs stop arriving the
    /// timer takes over and advances the cursor by whole frame durations.
    pub fn update(&mut self) {
        if self.shared.external_sync_active() {
            let fresh = self
                .last_sync_instant
                .is_some_and(|at| at.elapsed() < EXTERNAL_SYNC_HOLD);
            if fresh {
                self.last_tick = Instant::now();
                return;
            }
            self.shared.set_external_sync(false);
            tracing::debug!("external sync lost, falling back to internal timer");
        }

        if !self.shared.is_playing() {
            self.last_tick = Instant::now();
            return;
        }

        let elapsed = self.last_tick.elapsed().as_secs_f64();
        let whole_frames = (elapsed * self.fps) as i64;
        if whole_frames > 0 {
            let current = self.shared.current_frame();
            let next = self.timeline.wrap(i64::from(current) + whole_frames);
            self.shared.set_current_frame(next);
            // keep the fractional remainder so cadence doesn't drift
            self.last_tick += Duration::from_secs_f64(whole_frames as f64 / self.fps);
        }
    }

    /// Fetches the frame for the current cursor, falling back to the last
    /// frame successfully served. `None` means the presenter has nothing to
    /// show at all and counts a drop.
    pub fn get_current_frame(&mut self) -> Option<(u32, Arc<Frame>)> {
        let index = self.shared.current_frame();
        if let Some(frame) = self.store.get(index) {
            self.last_valid_frame = Some(index);
            return Some((index, frame));
        }
        if let Some(held) = self.last_valid_frame {
            if let Some(frame) = self.store.get(held) {
                return Some((held, frame));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(tag: u8) -> Frame {
        Frame::new(2, 2, 6, vec![tag; 12])
    }

    fn controller(total: u32) -> PlaybackController {
        let store = Arc::new(FrameStore::new(Timeline::new(total), 300));
        let shared = Arc::new(PlaybackShared::new());
        PlaybackController::new(store, shared, 24.0)
    }

    #[test]
    fn test_sync_to_time_is_idempotent() {
        let mut c = controller(240);
        c.sync_to_time(2.5);
        let first = c.current_index();
        c.sync_to_time(2.5);
        assert_eq!(c.current_index(), first);
        assert_eq!(first, 60);
    }

    #[test]
    fn test_sync_sets_external_flag_and_seek_does_not() {
        let mut c = controller(240);
        c.seek(1.0);
        assert!(!c.shared().external_sync_active());
        assert_eq!(c.current_index(), 24);
        c.sync_to_time(1.0);
        assert!(c.shared().external_sync_active());
    }

    #[test]
    fn test_get_current_frame_hit_updates_last_valid() {
        let mut c = controller(240);
        c.store().insert(24, test_frame(1));
        c.sync_to_time(1.0);
        let Some((index, _)) = c.get_current_frame() else {
            panic!("expected a frame");
        };
        assert_eq!(index, 24);
        assert_eq!(c.last_valid_frame(), Some(24));
    }

    #[test]
    fn test_missing_frame_holds_last_valid() {
        let mut c = controller(240);
        c.store().insert(24, test_frame(1));
        c.sync_to_time(1.0);
        assert!(c.get_current_frame().is_some());

        // jump to an uncached index: the held frame is served instead
        c.sync_to_time(5.0);
        let Some((index, frame)) = c.get_current_frame() else {
            panic!("expected held frame");
        };
        assert_eq!(index, 24);
        assert_eq!(frame.data()[0], 1);
    }

    #[test]
    fn test_nothing_cached_yields_none() {
        let mut c = controller(240);
        c.sync_to_time(1.0);
        assert!(c.get_current_frame().is_none());
    }

    #[test]
    fn test_update_holds_while_sync_is_fresh() {
        let mut c = controller(240);
        c.play();
        c.sync_to_time(1.0);
        let before = c.current_index();
        c.update();
        assert_eq!(c.current_index(), before);
        assert!(c.shared().external_sync_active());
    }

    #[test]
    fn test_update_advances_after_sync_goes_stale() {
        let mut c = controller(240);
        c.play();
        c.sync_to_time(1.0);
        // age the sync past the hold window without real sleep
        c.last_sync_instant = Some(Instant::now() - Duration::from_millis(250));
        c.last_tick = Instant::now() - Duration::from_millis(500);
        c.update();
        assert!(!c.shared().external_sync_active());
        // 500 ms at 24 fps is 12 whole frames
        assert_eq!(c.current_index(), 24 + 12);
    }

    #[test]
    fn test_update_does_not_advance_while_paused() {
        let mut c = controller(240);
        c.seek(1.0);
        c.last_tick = Instant::now() - Duration::from_secs(1);
        c.update();
        assert_eq!(c.current_index(), 24);
    }

    #[test]
    fn test_fallback_timer_wraps_at_loop_boundary() {
        let mut c = controller(48);
        c.play();
        c.seek(1.9); // frame 45 of 48
        c.last_tick = Instant::now() - Duration::from_millis(250); // 6 frames
        c.update();
        assert_eq!(c.current_index(), (45 + 6) % 48);
    }
}
