//! Background decode worker.
//!
//! A single long-lived thread owns the decoder exclusively and keeps the
//! frame store populated in the forward window ahead of the playback cursor.
//! Sequential decoding is 10–100× cheaper than per-frame seeking (codec cost
//! is dominated by keyframe dependencies), so the worker only seeks when its
//! cursor has strayed past [`SEEK_THRESHOLD`], and at the mandatory wrap
//! seek when the cursor passes the end of the file.
//!
//! The worker's cursor, not decoder-reported timestamps, assigns frame
//! indices. Seeks grant only approximate positioning; the backend discards
//! warmup frames that precede the requested time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PlayerError;
use crate::frame::Frame;
use crate::playback::PlaybackShared;
use crate::store::FrameStore;

/// Frames decoded synchronously before playback starts.
pub const PRELOAD_FRAMES: usize = 150;
/// Forward window kept resident while the transport rolls.
pub const DECODE_AHEAD_FRAMES_PLAYING: usize = 150;
/// Forward window kept resident while paused.
pub const DECODE_AHEAD_FRAMES_PAUSED: usize = 20;
/// Cursor strays beyond this many frames from playback before a seek.
pub const SEEK_THRESHOLD: i64 = 50;

/// One step of demuxer + decoder progress.
#[derive(Debug)]
pub enum DecodeStep {
    /// A decoded RGB24 frame.
    Frame(Frame),
    /// The packet produced no frame yet; try again.
    Again,
    /// The stream is exhausted.
    EndOfStream,
}

/// The opaque decoded-frame producer the worker drives.
///
/// Implementations own the demuxer and codec handles exclusively; the worker
/// is their only caller for the lifetime of the session.
pub trait DecodeBackend: Send {
    /// Repositions the stream near `seconds` and flushes codec state. The
    /// demuxer may land on the closest preceding keyframe; frames decoded
    /// before the target must be discarded internally.
    fn seek_to_seconds(&mut self, seconds: f64) -> Result<(), PlayerError>;

    /// Advances demuxing/decoding by one step.
    fn read_frame(&mut self) -> Result<DecodeStep, PlayerError>;
}

/// Tuning knobs for the worker, defaulting to the named constants.
#[derive(Debug, Clone, Copy)]
pub struct DecodeConfig {
    pub preload_frames: usize,
    pub ahead_playing: usize,
    pub ahead_paused: usize,
    pub seek_threshold: i64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            preload_frames: PRELOAD_FRAMES,
            ahead_playing: DECODE_AHEAD_FRAMES_PLAYING,
            ahead_paused: DECODE_AHEAD_FRAMES_PAUSED,
            seek_threshold: SEEK_THRESHOLD,
        }
    }
}

/// Synchronous preload of the first frames, run during load before the
/// worker starts. Indices are assigned sequentially from 0. Ensures instant
/// startup and a clean loop boundary.
pub fn preload<B: DecodeBackend>(
    backend: &mut B,
    store: &FrameStore,
    config: &DecodeConfig,
) -> Result<usize, PlayerError> {
    let target = config
        .preload_frames
        .min(store.timeline().total_frames() as usize);
    backend.seek_to_seconds(0.0)?;

    let mut index = 0usize;
    while index < target {
        match backend.read_frame() {
            Ok(DecodeStep::Frame(frame)) => {
                store.insert(index as u32, frame);
                index += 1;
            }
            Ok(DecodeStep::Again) => continue,
            Ok(DecodeStep::EndOfStream) => break,
            Err(err) => {
                tracing::warn!(%err, preloaded = index, "preload stopped early");
                break;
            }
        }
    }
    tracing::info!(preloaded = index, target, "preload complete");
    Ok(index)
}

/// Handle to the background decode thread. Dropping it stops the thread and
/// joins; the worker wakes from its longest sleep within 10 ms.
pub struct DecodeWorker {
    handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

impl DecodeWorker {
    /// Spawns the worker. It reads the playback cursor and play state from
    /// `shared` and writes decoded frames into `store`; nothing else touches
    /// the backend from here on.
    pub fn spawn<B: DecodeBackend + 'static>(
        backend: B,
        store: Arc<FrameStore>,
        shared: Arc<PlaybackShared>,
        fps: f64,
        config: DecodeConfig,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);
        let handle = thread::spawn(move || {
            decode_loop(backend, &store, &shared, fps, &config, &stop);
        });
        Self {
            handle: Some(handle),
            stop_flag,
        }
    }

    /// Requests the worker to exit; it observes the flag within 10 ms.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn decode_loop<B: DecodeBackend>(
    mut backend: B,
    store: &FrameStore,
    shared: &PlaybackShared,
    fps: f64,
    config: &DecodeConfig,
    stop: &AtomicBool,
) {
    let timeline = store.timeline();
    let mut cursor: u32 = 0;
    let mut needs_seek = true;
    // index of the last failed seek target, for the skip-on-second-failure rule
    let mut seek_failed_at: Option<u32> = None;

    while !stop.load(Ordering::Acquire) {
        let playback = shared.current_frame();
        let ahead = if shared.is_playing() {
            config.ahead_playing
        } else {
            config.ahead_paused
        };

        let distance = timeline.circular_distance(cursor, playback);
        if distance > config.seek_threshold || distance < -(ahead as i64 + config.seek_threshold) {
            tracing::debug!(cursor, playback, distance, "cursor strayed, rebasing on playback");
            cursor = playback;
            needs_seek = true;
        }

        if store.buffered_run(playback, ahead) >= ahead {
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        if store.contains(cursor) {
            cursor = timeline.wrap(i64::from(cursor) + 1);
            // skipping a cached frame leaves the stream positioned behind
            // the cursor; the next decode must reposition first
            needs_seek = true;
            continue;
        }

        if needs_seek {
            match backend.seek_to_seconds(f64::from(cursor) / fps) {
                Ok(()) => {
                    needs_seek = false;
                    seek_failed_at = None;
                }
                Err(err) => {
                    if seek_failed_at == Some(cursor) {
                        // second consecutive failure: the index is
                        // un-decodable, move past it and let the presenter
                        // hold the last valid frame over the gap
                        tracing::warn!(index = cursor, %err, "seek failed twice, skipping index");
                        cursor = timeline.wrap(i64::from(cursor) + 1);
                        seek_failed_at = None;
                    } else {
                        tracing::debug!(index = cursor, %err, "seek failed, retrying");
                        seek_failed_at = Some(cursor);
                        thread::sleep(Duration::from_millis(5));
                    }
                    continue;
                }
            }
        }

        match backend.read_frame() {
            Ok(DecodeStep::Frame(frame)) => {
                store.insert(cursor, frame);
                store.evict(playback);
                cursor = timeline.wrap(i64::from(cursor) + 1);
                if cursor == 0 {
                    needs_seek = true;
                }
            }
            Ok(DecodeStep::Again) => {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(DecodeStep::EndOfStream) => {
                cursor = 0;
                needs_seek = true;
                thread::sleep(Duration::from_millis(5));
            }
            Err(err) => {
                tracing::debug!(%err, "decode failed, treating as end of stream");
                cursor = 0;
                needs_seek = true;
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
    tracing::debug!("decode worker exiting");
}
