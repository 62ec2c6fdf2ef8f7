//! framelock: a clock-slaved looping video player.
//!
//! The picture is slaved to an external JACK transport: a background worker
//! keeps a ring cache of decoded frames ahead of the transport position, and
//! the render loop presents whichever frame the clock asks for, holding the
//! last valid frame when decoding falls behind.

mod cli;
mod media;
mod surface;
mod transport;

use std::process;
use std::sync::Arc;

use anyhow::Result;
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyboardInput, ModifiersState, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, WindowBuilder};

use framelock_core::{
    preload, ClockAdapter, DecodeConfig, DecodeWorker, FrameStore, PlaybackController,
    PlaybackShared, PlayerError, Presenter, DECODE_AHEAD_FRAMES_PLAYING,
};

use cli::RuntimeSettings;
use media::FfmpegSource;
use surface::Canvas;
use transport::JackTransport;

const WINDOW_TITLE: &str = "framelock";
const JACK_CLIENT_NAME: &str = "framelock";

/// Offset nudge per arrow key press, in milliseconds.
const OFFSET_STEP_MS: f64 = 1.0;
const OFFSET_STEP_LARGE_MS: f64 = 10.0;

fn main() {
    let cli = cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run(cli) {
        eprintln!("framelock: {err}");
        process::exit(1);
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    if !cli.video_file.exists() {
        return Err(PlayerError::FileNotFound(cli.video_file.display().to_string()).into());
    }

    // decoder first: its metadata sizes everything downstream
    let mut source = FfmpegSource::open(&cli.video_file)?;
    let metadata = source.metadata().clone();
    tracing::info!(
        "video: {}x{} @ {:.3} fps, {:.2}s ({} frames)",
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.duration_seconds,
        metadata.total_frames
    );

    let store = Arc::new(FrameStore::with_default_capacity(metadata.timeline()));
    let config = DecodeConfig::default();
    preload(&mut source, &store, &config)?;

    let shared = Arc::new(PlaybackShared::new());
    let worker = DecodeWorker::spawn(
        source,
        Arc::clone(&store),
        Arc::clone(&shared),
        metadata.fps,
        config,
    );

    let clock = JackTransport::open(JACK_CLIENT_NAME)?;
    let controller = PlaybackController::new(store, shared, metadata.fps);
    let adapter = ClockAdapter::new(clock).with_offset_ms(cli.offset);
    let presenter = Presenter::new(controller, adapter, metadata.duration_seconds);

    let settings = RuntimeSettings::from_cli(&cli);
    run_event_loop(presenter, worker, settings)
}

/// The vsync-paced presenter thread: winit event loop plus the `pixels`
/// framebuffer. Never returns on the happy path; winit exits the process
/// with code 0 on a clean quit.
fn run_event_loop(
    mut presenter: Presenter<JackTransport>,
    worker: DecodeWorker,
    mut settings: RuntimeSettings,
) -> Result<()> {
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(LogicalSize::new(1280.0, 720.0))
        .with_fullscreen(settings.fullscreen.then(|| Fullscreen::Borderless(None)))
        .build(&event_loop)
        .map_err(|e| PlayerError::GraphicsInitFailed(format!("window creation failed: {e}")))?;

    let size = window.inner_size();
    let surface_texture = SurfaceTexture::new(size.width, size.height, &window);
    let mut pixels = Pixels::new(size.width, size.height, surface_texture)
        .map_err(|e| PlayerError::GraphicsInitFailed(format!("framebuffer creation failed: {e}")))?;
    let mut canvas = Canvas::new(size.width, size.height, settings.scale);

    let mut worker = Some(worker);
    let mut overlay_enabled = true;
    let mut modifiers = ModifiersState::empty();

    tracing::info!("ready: Esc/Q quit, I overlay, F fullscreen, S scale, arrows nudge offset");

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => control_flow.set_exit(),
                WindowEvent::Resized(new_size) => {
                    if new_size.width > 0 && new_size.height > 0 {
                        if pixels.resize_surface(new_size.width, new_size.height).is_err()
                            || pixels.resize_buffer(new_size.width, new_size.height).is_err()
                        {
                            tracing::error!("surface resize failed");
                            control_flow.set_exit();
                            return;
                        }
                        canvas.resize(new_size.width, new_size.height);
                    }
                }
                WindowEvent::ModifiersChanged(state) => modifiers = state,
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => {
                    handle_key(
                        key,
                        modifiers.shift(),
                        &mut presenter,
                        &mut canvas,
                        &mut settings,
                        &mut overlay_enabled,
                        &window,
                        control_flow,
                    );
                }
                _ => {}
            },
            Event::MainEventsCleared => window.request_redraw(),
            Event::RedrawRequested(_) => {
                presenter.tick(&mut canvas);

                let frame_buffer = pixels.frame_mut();
                if frame_buffer.len() == canvas.rgba().len() {
                    frame_buffer.copy_from_slice(canvas.rgba());
                    if overlay_enabled {
                        let status = presenter.status(DECODE_AHEAD_FRAMES_PLAYING);
                        surface::draw_overlay(frame_buffer, canvas.width(), canvas.height(), &status);
                    }
                }

                if pixels.render().is_err() {
                    tracing::error!("render failed");
                    control_flow.set_exit();
                }
            }
            Event::LoopDestroyed => {
                // dropping the worker joins the decode thread
                drop(worker.take());
            }
            _ => {}
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn handle_key(
    key: VirtualKeyCode,
    shift: bool,
    presenter: &mut Presenter<JackTransport>,
    canvas: &mut Canvas,
    settings: &mut RuntimeSettings,
    overlay_enabled: &mut bool,
    window: &winit::window::Window,
    control_flow: &mut ControlFlow,
) {
    match key {
        VirtualKeyCode::Escape | VirtualKeyCode::Q => control_flow.set_exit(),
        VirtualKeyCode::I => {
            *overlay_enabled = !*overlay_enabled;
            tracing::info!("overlay {}", if *overlay_enabled { "on" } else { "off" });
        }
        VirtualKeyCode::F => {
            settings.fullscreen = !settings.fullscreen;
            window.set_fullscreen(settings.fullscreen.then(|| Fullscreen::Borderless(None)));
            tracing::info!("fullscreen {}", if settings.fullscreen { "on" } else { "off" });
        }
        VirtualKeyCode::S => {
            settings.scale = settings.scale.cycle();
            canvas.set_mode(settings.scale);
            presenter.invalidate();
            tracing::info!("scale mode: {}", settings.scale.as_str());
        }
        VirtualKeyCode::Up | VirtualKeyCode::Right => {
            let step = if shift { OFFSET_STEP_LARGE_MS } else { OFFSET_STEP_MS };
            presenter.clock_mut().nudge_offset_ms(step);
            settings.offset_ms = presenter.clock().offset_ms();
            tracing::info!("sync offset: {:.1} ms", settings.offset_ms);
        }
        VirtualKeyCode::Down | VirtualKeyCode::Left => {
            let step = if shift { OFFSET_STEP_LARGE_MS } else { OFFSET_STEP_MS };
            presenter.clock_mut().nudge_offset_ms(-step);
            settings.offset_ms = presenter.clock().offset_ms();
            tracing::info!("sync offset: {:.1} ms", settings.offset_ms);
        }
        VirtualKeyCode::Key0 => {
            presenter.clock_mut().set_offset_ms(0.0);
            settings.offset_ms = 0.0;
            tracing::info!("sync offset reset to 0.0 ms");
        }
        VirtualKeyCode::C => {
            println!("{}", settings.reproduce_command());
        }
        _ => {}
    }
}
