//! FFmpeg-backed media source.
//!
//! Owns the demuxer, codec and scaler handles exclusively; the decode worker
//! is the only caller after startup. Output is packed RGB24 with row stride
//! `width * 3`, regardless of the container's native format.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use framelock_core::{DecodeBackend, DecodeStep, Frame, MediaMetadata, PlayerError, RGB_PIXEL_STRIDE};

/// Containers report nonsense frame rates often enough that a fallback is
/// required for the timeline to exist at all.
const FALLBACK_FPS: f64 = 25.0;

pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    video_stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<ffmpeg::software::scaling::Context>,
    metadata: MediaMetadata,
    /// Stream time base (numerator, denominator)
    time_base: (i32, i32),
    eof_reached: bool,
    packets_exhausted: bool,
    /// Seek warmup boundary in seconds; decoded frames with earlier
    /// timestamps are discarded until one crosses it.
    discard_before: Option<f64>,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, PlayerError> {
        // init() is safe to call multiple times (just registers codecs)
        ffmpeg::init()
            .map_err(|e| PlayerError::DecoderOpenFailed(format!("FFmpeg init failed: {e}")))?;

        let input = ffmpeg::format::input(&path).map_err(|e| {
            PlayerError::DecoderOpenFailed(format!("failed to open {}: {e}", path.display()))
        })?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| PlayerError::DecoderOpenFailed("no video stream found".to_string()))?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let avg = stream.avg_frame_rate();
        let reported_fps = f64::from(avg.0) / f64::from(avg.1.max(1));
        let fps = if reported_fps.is_finite() && reported_fps > 0.0 {
            reported_fps
        } else {
            tracing::warn!(reported_fps, "container reports no usable frame rate, assuming 25");
            FALLBACK_FPS
        };

        let duration_seconds = if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| {
                PlayerError::DecoderOpenFailed(format!("failed to create codec context: {e}"))
            })?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PlayerError::DecoderOpenFailed(format!("failed to open decoder: {e}")))?;

        let metadata = MediaMetadata::new(decoder.width(), decoder.height(), fps, duration_seconds);
        tracing::info!(
            width = metadata.width,
            height = metadata.height,
            fps = metadata.fps,
            duration = metadata.duration_seconds,
            total_frames = metadata.total_frames,
            "opened video stream"
        );

        Ok(Self {
            input,
            video_stream_index,
            decoder,
            scaler: None,
            metadata,
            time_base: (time_base.0, time_base.1),
            eof_reached: false,
            packets_exhausted: false,
            discard_before: None,
        })
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    fn pts_to_seconds(&self, pts: i64) -> f64 {
        if pts < 0 || self.time_base.1 == 0 {
            return 0.0;
        }
        pts as f64 * f64::from(self.time_base.0) / f64::from(self.time_base.1)
    }

    fn ensure_scaler(
        &mut self,
        width: u32,
        height: u32,
        src_format: ffmpeg::format::Pixel,
    ) -> Result<(), PlayerError> {
        let needs_recreate = self.scaler.as_ref().is_none_or(|s| {
            let input = s.input();
            input.format != src_format || input.width != width || input.height != height
        });

        if needs_recreate {
            let scaler = ffmpeg::software::scaling::Context::get(
                src_format,
                width,
                height,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| {
                PlayerError::DecodeTransientFailure(format!("failed to create scaler: {e}"))
            })?;
            self.scaler = Some(scaler);
        }
        Ok(())
    }

    fn frame_to_rgb(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame, PlayerError> {
        let width = decoded.width();
        let height = decoded.height();
        self.ensure_scaler(width, height, decoded.format())?;
        let Some(scaler) = self.scaler.as_mut() else {
            return Err(PlayerError::DecodeTransientFailure(
                "scaler not initialized".to_string(),
            ));
        };

        let mut rgb = ffmpeg::frame::Video::empty();
        scaler
            .run(decoded, &mut rgb)
            .map_err(|e| PlayerError::DecodeTransientFailure(format!("scaling failed: {e}")))?;

        // compact to stride == width * 3 (FFmpeg pads rows for alignment)
        let out_width = rgb.width();
        let out_height = rgb.height();
        let src_stride = rgb.stride(0);
        let data = rgb.data(0);
        let row_bytes = out_width as usize * RGB_PIXEL_STRIDE;

        let mut pixels = Vec::with_capacity(row_bytes * out_height as usize);
        for y in 0..out_height as usize {
            let start = y * src_stride;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }

        Ok(Frame::new(out_width, out_height, row_bytes, pixels))
    }
}

// SAFETY: FfmpegSource is only ever driven by a single thread: preload on
// the main thread strictly before the decode worker exists, then the worker
// exclusively. The raw FFmpeg handles are never aliased across threads.
unsafe impl Send for FfmpegSource {}

impl DecodeBackend for FfmpegSource {
    fn seek_to_seconds(&mut self, seconds: f64) -> Result<(), PlayerError> {
        // input.seek() takes AV_TIME_BASE (microsecond) timestamps and lands
        // on the nearest preceding keyframe
        let timestamp = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(timestamp, ..)
            .map_err(|e| PlayerError::SeekFailure(format!("seek to {seconds:.3}s failed: {e}")))?;

        self.decoder.flush();
        self.eof_reached = false;
        self.packets_exhausted = false;

        // everything before the target is keyframe warmup; half a frame of
        // slack absorbs container timestamp jitter
        let slack = 0.5 / self.metadata.fps;
        self.discard_before = (seconds > 0.0).then_some(seconds - slack);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DecodeStep, PlayerError> {
        if self.eof_reached {
            return Ok(DecodeStep::EndOfStream);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    if let Some(limit) = self.discard_before {
                        let pts = decoded.pts().unwrap_or(0);
                        if self.pts_to_seconds(pts) < limit {
                            tracing::trace!(pts, "discarding seek warmup frame");
                            continue;
                        }
                        self.discard_before = None;
                    }
                    let frame = self.frame_to_rgb(&decoded)?;
                    return Ok(DecodeStep::Frame(frame));
                }
                Err(ffmpeg::Error::Eof) => {
                    self.eof_reached = true;
                    return Ok(DecodeStep::EndOfStream);
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    // decoder wants input: feed the next video packet
                    if self.packets_exhausted {
                        self.decoder.send_eof().ok();
                        self.packets_exhausted = false;
                        continue;
                    }

                    let mut found_packet = false;
                    for (stream, packet) in self.input.packets() {
                        if stream.index() != self.video_stream_index {
                            continue;
                        }
                        self.decoder.send_packet(&packet).map_err(|e| {
                            PlayerError::DecodeTransientFailure(format!("send packet failed: {e}"))
                        })?;
                        found_packet = true;
                        break;
                    }
                    if !found_packet {
                        self.packets_exhausted = true;
                    }
                }
                Err(e) => {
                    return Err(PlayerError::DecodeTransientFailure(format!(
                        "decode error: {e}"
                    )))
                }
            }
        }
    }
}
