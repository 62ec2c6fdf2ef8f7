//! Presentation counters for telemetry.
//!
//! Lock-free, shared by handle; the presenter records, the overlay reads a
//! snapshot. A held frame is not a drop; drops count only the
//! ticks on which nothing at all could be shown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Presentation metrics tracker. Clone shares the underlying counters.
#[derive(Clone, Default)]
pub struct PresentMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    presented: AtomicU64,
    uploaded: AtomicU64,
    held: AtomicU64,
    dropped: AtomicU64,
}

impl PresentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_present(&self) {
        self.inner.presented.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upload(&self) {
        self.inner.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hold(&self) {
        self.inner.held.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            presented_frames: self.inner.presented.load(Ordering::Relaxed),
            uploaded_frames: self.inner.uploaded.load(Ordering::Relaxed),
            held_frames: self.inner.held.load(Ordering::Relaxed),
            dropped_frames: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the presentation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Presenter ticks processed
    pub presented_frames: u64,
    /// Ticks that handed a new frame to the texture upload collaborator
    pub uploaded_frames: u64,
    /// Ticks served by re-showing the last valid frame
    pub held_frames: u64,
    /// Ticks with nothing to show
    pub dropped_frames: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_through_clones() {
        let metrics = PresentMetrics::new();
        let view = metrics.clone();
        metrics.record_present();
        metrics.record_upload();
        metrics.record_present();
        metrics.record_drop();

        let snap = view.snapshot();
        assert_eq!(snap.presented_frames, 2);
        assert_eq!(snap.uploaded_frames, 1);
        assert_eq!(snap.held_frames, 0);
        assert_eq!(snap.dropped_frames, 1);
        assert_eq!(view.dropped_frames(), 1);
    }
}
