//! Bounded ring cache of decoded frames.
//!
//! The store is the only large-data hand-off between the decode worker and
//! the presenter. Both containers live behind a single mutex; the critical
//! section is always O(1)-per-entry pointer work (lookups, list pushes,
//! circular-distance arithmetic), never decoding.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::frame::Frame;
use crate::timeline::Timeline;

/// Default cache bound. At 1080p RGB24 this is roughly 1.7 GiB, sized so a
/// full decode-ahead window plus a wrap margin stays resident.
pub const MAX_CACHED_FRAMES: usize = 300;

struct StoreInner {
    entries: HashMap<u32, Arc<Frame>>,
    /// Indices in the order they were (re-)inserted; the eviction tail.
    insertion_order: VecDeque<u32>,
}

/// A bounded mapping from frame index to decoded frame.
///
/// Eviction is deliberately asymmetric: entries strictly behind the playback
/// cursor are dropped eagerly (the decoder reproduces them on the next loop),
/// while the insertion-order tail is trimmed only to enforce the size cap.
/// A symmetric LRU would evict just-decoded lookahead while the presenter is
/// still reading slightly behind, thrashing at the loop boundary.
pub struct FrameStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
    timeline: Timeline,
}

impl FrameStore {
    pub fn new(timeline: Timeline, capacity: usize) -> Self {
        assert!(capacity > 0, "frame store requires a nonzero capacity");
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::with_capacity(capacity),
                insertion_order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            timeline,
        }
    }

    pub fn with_default_capacity(timeline: Timeline) -> Self {
        Self::new(timeline, MAX_CACHED_FRAMES)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    /// Inserts or replaces the frame at `index`.
    ///
    /// A replacement moves the index to the back of the insertion order. The
    /// size cap is re-established before the lock is released, so the bound
    /// holds after every operation regardless of caller discipline.
    pub fn insert(&self, index: u32, frame: Frame) {
        let mut inner = self.inner.lock();
        if inner.entries.insert(index, Arc::new(frame)).is_some() {
            inner.insertion_order.retain(|&i| i != index);
        }
        inner.insertion_order.push_back(index);
        Self::trim_to_capacity(&mut inner, self.capacity);
    }

    /// Read-only lookup. Does not promote or reorder.
    pub fn get(&self, index: u32) -> Option<Arc<Frame>> {
        self.inner.lock().entries.get(&index).cloned()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.inner.lock().entries.contains_key(&index)
    }

    /// Length of the contiguous cached run starting at `start`, checking at
    /// most `max_check` indices and wrapping at the loop boundary.
    pub fn buffered_run(&self, start: u32, max_check: usize) -> usize {
        let inner = self.inner.lock();
        (0..max_check)
            .take_while(|&i| {
                let index = self.timeline.wrap(i64::from(start) + i as i64);
                inner.entries.contains_key(&index)
            })
            .count()
    }

    /// Applies the eviction policy for the given playback position:
    /// every entry strictly behind the cursor on the shortest circular path
    /// is removed, then the insertion-order tail is trimmed to the cap.
    pub fn evict(&self, playback: u32) {
        let mut inner = self.inner.lock();
        let StoreInner {
            entries,
            insertion_order,
        } = &mut *inner;

        let before = entries.len();
        let timeline = self.timeline;
        entries.retain(|&index, _| timeline.circular_distance(playback, index) >= 0);
        if entries.len() != before {
            insertion_order.retain(|index| entries.contains_key(index));
            tracing::trace!(
                playback,
                removed = before - entries.len(),
                remaining = entries.len(),
                "evicted behind-cursor frames"
            );
        }

        Self::trim_to_capacity(&mut inner, self.capacity);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn trim_to_capacity(inner: &mut StoreInner, capacity: usize) {
        while inner.entries.len() > capacity {
            let Some(oldest) = inner.insertion_order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(tag: u8) -> Frame {
        Frame::new(4, 2, 12, vec![tag; 24])
    }

    fn store(total: u32, capacity: usize) -> FrameStore {
        FrameStore::new(Timeline::new(total), capacity)
    }

    #[test]
    fn test_insert_get_roundtrip_is_bit_identical() {
        let s = store(100, 10);
        let frame = test_frame(42);
        s.insert(7, frame.clone());
        let Some(got) = s.get(7) else {
            panic!("expected frame at index 7");
        };
        assert_eq!(*got, frame);
    }

    #[test]
    fn test_capacity_holds_after_every_insert() {
        let s = store(1000, 5);
        for i in 0..50 {
            s.insert(i, test_frame(i as u8));
            assert!(s.len() <= 5);
        }
        // FIFO tail: the five most recent survive
        for i in 45..50 {
            assert!(s.contains(i));
        }
        assert!(!s.contains(44));
    }

    #[test]
    fn test_duplicate_insert_replaces_and_moves_to_back() {
        let s = store(100, 3);
        s.insert(0, test_frame(0));
        s.insert(1, test_frame(1));
        s.insert(0, test_frame(9)); // re-insert moves 0 to the back
        s.insert(2, test_frame(2));
        s.insert(3, test_frame(3)); // trims the front: index 1
        assert!(!s.contains(1));
        assert!(s.contains(0));
        let Some(got) = s.get(0) else {
            panic!("expected replaced frame");
        };
        assert_eq!(got.data()[0], 9);
    }

    #[test]
    fn test_evict_removes_everything_strictly_behind() {
        let s = store(240, 300);
        for i in 0..20 {
            s.insert(i, test_frame(i as u8));
        }
        s.evict(10);
        let timeline = Timeline::new(240);
        for i in 0..20 {
            let behind = timeline.circular_distance(10, i) < 0;
            assert_eq!(s.contains(i), !behind, "index {i}");
        }
    }

    #[test]
    fn test_evict_keeps_lookahead_across_wrap() {
        let s = store(240, 300);
        // playback near the end of the loop: indices 0..10 are lookahead
        for i in [235, 236, 237, 238, 239, 0, 1, 2, 3] {
            s.insert(i, test_frame(0));
        }
        s.insert(200, test_frame(0)); // far behind
        s.evict(236);
        assert!(!s.contains(235));
        assert!(!s.contains(200));
        for i in [236, 237, 238, 239, 0, 1, 2, 3] {
            assert!(s.contains(i), "index {i} should survive");
        }
    }

    #[test]
    fn test_buffered_run_wraps() {
        let s = store(10, 20);
        for i in [8, 9, 0, 1] {
            s.insert(i, test_frame(0));
        }
        assert_eq!(s.buffered_run(8, 10), 4);
        assert_eq!(s.buffered_run(9, 2), 2);
        assert_eq!(s.buffered_run(2, 5), 0);
    }

    #[test]
    fn test_buffered_run_caps_at_max_check() {
        let s = store(4, 10);
        for i in 0..4 {
            s.insert(i, test_frame(0));
        }
        // every index is cached; the run keeps wrapping until max_check
        assert_eq!(s.buffered_run(0, 3), 3);
        assert_eq!(s.buffered_run(0, 100), 100);
    }

    #[test]
    fn test_cap_below_preload_trims_earliest_first() {
        let s = store(1000, 50);
        for i in 0..150 {
            s.insert(i, test_frame(0));
        }
        assert_eq!(s.len(), 50);
        for i in 100..150 {
            assert!(s.contains(i));
        }
        assert!(!s.contains(99));
    }

    #[test]
    fn test_single_frame_clip_survives_every_operation() {
        let s = store(1, 300);
        s.insert(0, test_frame(7));

        // nothing is ever behind the cursor on a one-frame loop
        s.evict(0);
        assert_eq!(s.len(), 1);
        assert!(s.contains(0));

        // buffered_run keeps wrapping over the same frame
        assert_eq!(s.buffered_run(0, 20), 20);

        let Some(frame) = s.get(0) else {
            panic!("expected the single frame");
        };
        assert_eq!(frame.data()[0], 7);

        // replacement keeps the invariants intact
        s.insert(0, test_frame(9));
        s.evict(0);
        assert_eq!(s.len(), 1);
        let Some(frame) = s.get(0) else {
            panic!("expected the replaced frame");
        };
        assert_eq!(frame.data()[0], 9);
    }

    #[test]
    fn test_frames_do_not_alias() {
        let s = store(100, 10);
        s.insert(0, test_frame(1));
        s.insert(1, test_frame(1));
        let (Some(a), Some(b)) = (s.get(0), s.get(1)) else {
            panic!("expected both frames");
        };
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
