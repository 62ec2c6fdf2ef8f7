//! Software presentation surface.
//!
//! The core engine hands frames to a [`FrameSink`]; this one scales them
//! into an RGBA buffer sized to the window, which the render loop copies
//! into the `pixels` framebuffer each redraw. Geometry is resolved by a
//! pure layout function so the three aspect policies are testable without a
//! window.

use std::sync::Arc;

use clap::ValueEnum;

use framelock_core::{Frame, FrameSink, PresenterStatus};

/// Aspect policy for fitting the video into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScaleMode {
    /// Fit inside the window, preserve aspect, bar the remainder
    Letterbox,
    /// Fill the window, ignore aspect
    Stretch,
    /// Fill the window, preserve aspect, clip the overflow
    Crop,
}

impl ScaleMode {
    /// Cycle order used by the `S` key.
    pub fn cycle(self) -> Self {
        match self {
            ScaleMode::Letterbox => ScaleMode::Stretch,
            ScaleMode::Stretch => ScaleMode::Crop,
            ScaleMode::Crop => ScaleMode::Letterbox,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScaleMode::Letterbox => "letterbox",
            ScaleMode::Stretch => "stretch",
            ScaleMode::Crop => "crop",
        }
    }
}

/// Destination rectangle in window coordinates. Crop mode produces negative
/// origins (the video extends past the window edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Computes where the video lands in the window for a scale mode.
pub fn layout(
    video_w: u32,
    video_h: u32,
    window_w: u32,
    window_h: u32,
    mode: ScaleMode,
) -> LayoutRect {
    if video_w == 0 || video_h == 0 || window_w == 0 || window_h == 0 {
        return LayoutRect {
            x: 0,
            y: 0,
            width: window_w,
            height: window_h,
        };
    }

    let video_aspect = video_w as f32 / video_h as f32;
    let window_aspect = window_w as f32 / window_h as f32;

    match mode {
        ScaleMode::Stretch => LayoutRect {
            x: 0,
            y: 0,
            width: window_w,
            height: window_h,
        },
        ScaleMode::Crop => {
            // fit the smaller dimension, clip the other
            if window_aspect > video_aspect {
                let height = (window_w as f32 / video_aspect).round() as u32;
                LayoutRect {
                    x: 0,
                    y: (window_h as i32 - height as i32) / 2,
                    width: window_w,
                    height,
                }
            } else {
                let width = (window_h as f32 * video_aspect).round() as u32;
                LayoutRect {
                    x: (window_w as i32 - width as i32) / 2,
                    y: 0,
                    width,
                    height: window_h,
                }
            }
        }
        ScaleMode::Letterbox => {
            // fit the larger dimension, bar the other
            if window_aspect > video_aspect {
                let width = (window_h as f32 * video_aspect).round() as u32;
                LayoutRect {
                    x: (window_w as i32 - width as i32) / 2,
                    y: 0,
                    width,
                    height: window_h,
                }
            } else {
                let height = (window_w as f32 / video_aspect).round() as u32;
                LayoutRect {
                    x: 0,
                    y: (window_h as i32 - height as i32) / 2,
                    width: window_w,
                    height,
                }
            }
        }
    }
}

/// Window-sized RGBA canvas the presenter draws into.
///
/// Keeps the most recent frame so a resize or scale-mode change can redraw
/// without waiting for the next index change.
pub struct Canvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    mode: ScaleMode,
    frame: Option<Arc<Frame>>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, mode: ScaleMode) -> Self {
        Self {
            buffer: vec![0; width as usize * height as usize * 4],
            width,
            height,
            mode,
            frame: None,
        }
    }

    pub fn rgba(&self) -> &[u8] {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mode(&self) -> ScaleMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ScaleMode) {
        self.mode = mode;
        self.redraw();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.buffer = vec![0; width as usize * height as usize * 4];
        self.redraw();
    }

    fn redraw(&mut self) {
        for px in self.buffer.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
        let Some(frame) = self.frame.clone() else {
            return;
        };
        let rect = layout(frame.width(), frame.height(), self.width, self.height, self.mode);
        self.blit(&frame, rect);
    }

    /// Nearest-neighbor scale of the RGB24 frame into `rect`, clipped to the
    /// canvas.
    fn blit(&mut self, frame: &Frame, rect: LayoutRect) {
        if rect.width == 0 || rect.height == 0 {
            return;
        }
        let y0 = rect.y.max(0);
        let y1 = (rect.y + rect.height as i32).min(self.height as i32);
        let x0 = rect.x.max(0);
        let x1 = (rect.x + rect.width as i32).min(self.width as i32);

        for out_y in y0..y1 {
            let src_y = ((out_y - rect.y) as u64 * u64::from(frame.height())
                / u64::from(rect.height)) as u32;
            let src_row = frame.row(src_y.min(frame.height() - 1));
            let dst_row_start = out_y as usize * self.width as usize * 4;
            for out_x in x0..x1 {
                let src_x = ((out_x - rect.x) as u64 * u64::from(frame.width())
                    / u64::from(rect.width)) as usize;
                let src = &src_row[src_x * 3..src_x * 3 + 3];
                let dst = dst_row_start + out_x as usize * 4;
                self.buffer[dst] = src[0];
                self.buffer[dst + 1] = src[1];
                self.buffer[dst + 2] = src[2];
                self.buffer[dst + 3] = 255;
            }
        }
    }
}

impl FrameSink for Canvas {
    fn present(&mut self, _index: u32, frame: Arc<Frame>) {
        self.frame = Some(frame);
        self.redraw();
    }
}

// Overlay bar geometry, in window pixels
const BAR_X: usize = 16;
const BAR_Y: usize = 16;
const BAR_WIDTH: usize = 200;
const BAR_HEIGHT: usize = 10;

/// Draws the buffer-health bar and drop indicator over an RGBA buffer.
///
/// Green above two thirds of the decode-ahead window, amber above one third,
/// red below. Each drop extends a red strip under the bar, capped at the bar
/// width.
pub fn draw_overlay(rgba: &mut [u8], width: u32, height: u32, status: &PresenterStatus) {
    let fill = status.buffer_fill().clamp(0.0, 1.0);
    let color = if fill > 2.0 / 3.0 {
        [60, 200, 80]
    } else if fill > 1.0 / 3.0 {
        [230, 180, 40]
    } else {
        [220, 50, 50]
    };

    fill_rect(rgba, width, height, BAR_X, BAR_Y, BAR_WIDTH, BAR_HEIGHT, [40, 40, 40]);
    let filled = (fill * BAR_WIDTH as f32) as usize;
    fill_rect(rgba, width, height, BAR_X, BAR_Y, filled, BAR_HEIGHT, color);

    let drops = (status.dropped_frames as usize).min(BAR_WIDTH);
    if drops > 0 {
        fill_rect(
            rgba,
            width,
            height,
            BAR_X,
            BAR_Y + BAR_HEIGHT + 4,
            drops,
            4,
            [220, 50, 50],
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_rect(
    rgba: &mut [u8],
    width: u32,
    height: u32,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    color: [u8; 3],
) {
    let width = width as usize;
    let height = height as usize;
    for row in y..(y + h).min(height) {
        for col in x..(x + w).min(width) {
            let i = (row * width + col) * 4;
            rgba[i] = color[0];
            rgba[i + 1] = color[1];
            rgba[i + 2] = color[2];
            rgba[i + 3] = 255;
        }
    }
}
