//! framelock-core: clock-slaved playback engine.
//!
//! This crate is the headless heart of the player: a bounded, indexable ring
//! cache of decoded frames kept ahead of a playback cursor that is driven by
//! an external transport clock. It contains no I/O: the decoder and the
//! clock are trait parameters, the render target is a [`FrameSink`].
//!
//! - [`store`]: the bounded frame cache with behind-cursor eviction
//! - [`decode`]: the background decode worker and its backend trait
//! - [`playback`]: the playback cursor, sync and held-frame logic
//! - [`clock`]: the transport clock shim and sync-offset arithmetic
//! - [`presenter`]: the per-vsync consume loop
//! - [`metrics`]: drop/hold counters for telemetry
//!
//! This crate has **zero windowing or codec dependency**. It is consumed by
//! the `framelock` binary, which supplies the FFmpeg decoder, the JACK
//! transport shim, and the window surface.

pub mod clock;
pub mod decode;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod playback;
pub mod presenter;
pub mod store;
pub mod timeline;

pub use clock::{ClockAdapter, TransportClock};
pub use decode::{
    preload, DecodeBackend, DecodeConfig, DecodeStep, DecodeWorker, DECODE_AHEAD_FRAMES_PAUSED,
    DECODE_AHEAD_FRAMES_PLAYING, PRELOAD_FRAMES, SEEK_THRESHOLD,
};
pub use error::PlayerError;
pub use frame::{Frame, MediaMetadata, RGB_PIXEL_STRIDE};
pub use metrics::{MetricsSnapshot, PresentMetrics};
pub use playback::{PlaybackController, PlaybackShared, EXTERNAL_SYNC_HOLD};
pub use presenter::{FrameSink, Presenter, PresenterStatus};
pub use store::{FrameStore, MAX_CACHED_FRAMES};
pub use timeline::Timeline;
