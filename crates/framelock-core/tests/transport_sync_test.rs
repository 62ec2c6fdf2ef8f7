//! Transport-slaved playback integration tests.
//!
//! These drive the full pipeline (preload, decode worker, playback
//! controller, presenter) against an in-memory decoder and a hand-cranked
//! transport, and assert the end-to-end behaviors: steady playback without
//! drops, loop wrap, and backward scrubs recovering within their budget.
//!
//! ```bash
//! cargo test --package framelock-core --test transport_sync_test
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use framelock_core::{
    preload, ClockAdapter, DecodeBackend, DecodeConfig, DecodeStep, DecodeWorker, Frame,
    FrameSink, FrameStore, PlaybackController, PlaybackShared, PlayerError, Presenter, Timeline,
    TransportClock,
};

const FPS: f64 = 24.0;
const SAMPLE_RATE: f64 = 48_000.0;

/// Instant in-memory decoder; each frame's first byte encodes its index.
struct ScriptedBackend {
    total_frames: u32,
    position: u32,
}

impl ScriptedBackend {
    fn new(total_frames: u32) -> Self {
        Self {
            total_frames,
            position: 0,
        }
    }
}

impl DecodeBackend for ScriptedBackend {
    fn seek_to_seconds(&mut self, seconds: f64) -> Result<(), PlayerError> {
        self.position = ((seconds * FPS).round() as u32).min(self.total_frames);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DecodeStep, PlayerError> {
        if self.position >= self.total_frames {
            return Ok(DecodeStep::EndOfStream);
        }
        let tag = (self.position % 251) as u8;
        let frame = Frame::new(4, 4, 12, vec![tag; 48]);
        self.position += 1;
        Ok(DecodeStep::Frame(frame))
    }
}

/// Hand-cranked transport clock.
#[derive(Clone, Default)]
struct ManualClock {
    counter: Arc<AtomicU64>,
    rolling: Arc<AtomicBool>,
}

impl ManualClock {
    fn set_seconds(&self, seconds: f64) {
        self.counter
            .store((seconds * SAMPLE_RATE) as u64, Ordering::Relaxed);
    }

    fn set_rolling(&self, rolling: bool) {
        self.rolling.store(rolling, Ordering::Relaxed);
    }
}

impl TransportClock for ManualClock {
    fn frame_counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    fn is_rolling(&self) -> bool {
        self.rolling.load(Ordering::Relaxed)
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE as u32
    }
}

#[derive(Default)]
struct RecordingSink {
    uploads: Vec<(u32, u8)>,
}

impl FrameSink for RecordingSink {
    fn present(&mut self, index: u32, frame: Arc<Frame>) {
        self.uploads.push((index, frame.data()[0]));
    }
}

struct Player {
    presenter: Presenter<ManualClock>,
    clock: ManualClock,
    store: Arc<FrameStore>,
    _worker: DecodeWorker,
}

/// Builds the full stack the way the binary wires it.
fn player(total_frames: u32, duration: f64, config: DecodeConfig) -> Player {
    let mut backend = ScriptedBackend::new(total_frames);
    let store = Arc::new(FrameStore::with_default_capacity(Timeline::new(
        total_frames,
    )));
    preload(&mut backend, &store, &config).expect("preload");

    let shared = Arc::new(PlaybackShared::new());
    let worker = DecodeWorker::spawn(
        backend,
        Arc::clone(&store),
        Arc::clone(&shared),
        FPS,
        config,
    );

    let clock = ManualClock::default();
    let controller = PlaybackController::new(Arc::clone(&store), shared, FPS);
    let presenter = Presenter::new(controller, ClockAdapter::new(clock.clone()), duration);

    Player {
        presenter,
        clock,
        store,
        _worker: worker,
    }
}

fn wait_until(deadline_ms: u64, mut probe: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(deadline_ms);
    while Instant::now() < deadline {
        if probe() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_steady_state_playback_has_no_drops() {
    let mut p = player(240, 10.0, DecodeConfig::default());
    let mut sink = RecordingSink::default();
    p.clock.set_rolling(true);

    // simulated 60 Hz vsync over the whole 10 s clip; give the worker a
    // moment whenever the next frame isn't resident yet
    for tick in 0..600u32 {
        let seconds = f64::from(tick) / 60.0;
        p.clock.set_seconds(seconds);
        let target = Timeline::new(240).index_at(seconds, FPS);
        assert!(
            wait_until(2_000, || p.store.contains(target)),
            "frame {target} never became resident"
        );
        p.presenter.tick(&mut sink);
    }

    let snap = p.presenter.metrics().snapshot();
    assert_eq!(snap.dropped_frames, 0);
    // every upload carried the frame decoded for exactly that index
    assert!(sink.uploads.iter().all(|&(i, tag)| tag == (i % 251) as u8));
    // indices increase monotonically (no wrap in this scenario)
    assert!(sink.uploads.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(sink.uploads.last().map(|&(i, _)| i), Some(239));
}

#[test]
fn test_loop_wrap_shows_frame_zero_again() {
    let mut p = player(240, 10.0, DecodeConfig::default());
    let mut sink = RecordingSink::default();
    p.clock.set_rolling(true);

    // point the cursor at 9 s so the worker chases that neighborhood before
    // the measured run starts
    p.presenter.controller_mut().sync_to_time(9.0);
    assert!(wait_until(2_000, || p.store.contains(216)));

    // run the last second of the clip, then let the transport wrap and run
    // two more seconds
    for tick in 0..180u32 {
        let seconds = (9.0 + f64::from(tick) / 60.0) % 10.0;
        p.clock.set_seconds(seconds);
        let target = Timeline::new(240).index_at(seconds, FPS);
        assert!(
            wait_until(2_000, || p.store.contains(target)),
            "frame {target} never became resident across the wrap"
        );
        p.presenter.tick(&mut sink);
    }

    assert_eq!(p.presenter.metrics().snapshot().dropped_frames, 0);
    let wrap_pos = sink
        .uploads
        .iter()
        .position(|&(i, _)| i == 0)
        .expect("frame 0 after the wrap");
    assert!(wrap_pos > 0);
    assert_eq!(sink.uploads[wrap_pos - 1].0, 239);
    assert_eq!(sink.uploads[wrap_pos].1, 0);
}

#[test]
fn test_backward_scrub_recovers_within_budget() {
    let mut p = player(1000, 1000.0 / FPS, DecodeConfig::default());
    let mut sink = RecordingSink::default();
    p.clock.set_rolling(true);

    // settle at 20 s
    p.clock.set_seconds(20.0);
    p.presenter.controller_mut().sync_to_time(20.0);
    assert!(wait_until(2_000, || p.store.contains(480)));
    p.presenter.tick(&mut sink);
    assert_eq!(p.presenter.last_uploaded(), Some(480));

    // jump back to 1 s between two ticks; interim ticks must hold the last
    // valid frame rather than going blank
    p.clock.set_seconds(1.0);
    let scrub_started = Instant::now();
    let mut recovered = false;
    while scrub_started.elapsed() < Duration::from_millis(200) {
        p.presenter.tick(&mut sink);
        if p.presenter.last_uploaded() == Some(24) {
            recovered = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert!(recovered, "scrub target not presented within 200 ms");
    assert_eq!(p.presenter.metrics().snapshot().dropped_frames, 0);
}

#[test]
fn test_transport_stop_pauses_and_resume_continues_from_counter() {
    let mut p = player(240, 10.0, DecodeConfig::default());
    let mut sink = RecordingSink::default();

    p.clock.set_rolling(true);
    p.clock.set_seconds(2.0);
    p.presenter.controller_mut().sync_to_time(2.0);
    assert!(wait_until(2_000, || p.store.contains(48)));
    p.presenter.tick(&mut sink);
    assert!(p.presenter.controller().is_playing());

    p.clock.set_rolling(false);
    p.presenter.tick(&mut sink);
    assert!(!p.presenter.controller().is_playing());

    // the counter jumps while stopped; resuming picks up from there, not
    // from the pre-pause position
    p.clock.set_seconds(6.0);
    p.presenter.controller_mut().sync_to_time(6.0);
    assert!(wait_until(2_000, || p.store.contains(144)));
    p.presenter.tick(&mut sink);
    assert_eq!(p.presenter.last_uploaded(), Some(144));

    p.clock.set_rolling(true);
    p.presenter.tick(&mut sink);
    assert!(p.presenter.controller().is_playing());
    assert_eq!(p.presenter.last_uploaded(), Some(144));
}
