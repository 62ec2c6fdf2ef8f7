//! Transport clock shim and sync-offset arithmetic.
//!
//! The player slaves to an external transport exposing a monotonically
//! increasing sample counter and a rolling flag. [`TransportClock`] is the
//! narrow view of that transport; [`ClockAdapter`] turns its counter into
//! the video timeline position, applying the user-configured sync offset.

/// The external transport, reduced to the three values the player consumes.
/// The sample rate is read once at startup and assumed stable.
pub trait TransportClock {
    /// Current sample position of the transport.
    fn frame_counter(&self) -> u64;
    /// Whether the transport is rolling (as opposed to stopped or starting).
    fn is_rolling(&self) -> bool;
    /// Samples per second of the transport's counter.
    fn sample_rate(&self) -> u32;
}

/// Derives video time from the transport counter.
pub struct ClockAdapter<C> {
    clock: C,
    sample_rate: u32,
    offset_ms: f64,
}

impl<C: TransportClock> ClockAdapter<C> {
    pub fn new(clock: C) -> Self {
        let sample_rate = clock.sample_rate().max(1);
        Self {
            clock,
            sample_rate,
            offset_ms: 0.0,
        }
    }

    pub fn with_offset_ms(mut self, offset_ms: f64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    /// Sync offset in milliseconds. Positive delays the video relative to
    /// the transport, negative advances it.
    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn set_offset_ms(&mut self, offset_ms: f64) {
        self.offset_ms = offset_ms;
    }

    pub fn nudge_offset_ms(&mut self, delta_ms: f64) {
        self.offset_ms += delta_ms;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_rolling(&self) -> bool {
        self.clock.is_rolling()
    }

    /// Transport position in seconds.
    pub fn audio_seconds(&self) -> f64 {
        self.clock.frame_counter() as f64 / f64::from(self.sample_rate)
    }

    /// Video timeline position for the current transport position.
    ///
    /// Negative values (the offset reaching before file start) wrap
    /// positively into the clip so the tail of the file is shown, matching
    /// musical loop behavior; positive overrun clamps to the clip end.
    pub fn video_seconds(&self, duration_seconds: f64) -> f64 {
        let video = self.audio_seconds() - self.offset_ms / 1000.0;
        if duration_seconds <= 0.0 {
            return 0.0;
        }
        if video < 0.0 {
            video.rem_euclid(duration_seconds)
        } else {
            video.min(duration_seconds)
        }
    }
}
