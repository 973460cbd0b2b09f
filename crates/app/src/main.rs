//! Vulkan technique showcase - main entry point.
//!
//! Runs one technique either in a window on a real device or, with
//! `--headless`, against the in-memory backend for a fixed number of frames.

mod cli;
mod headless;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use showcase_core::{CameraConfig, Config, FrameClock};
use showcase_platform::Window;
use showcase_renderer::vulkan::{VulkanFrameLoop, VulkanSettings};
use showcase_renderer::{Extent, FrameCycle, SetupOptions, StatsOverlay, Technique};
use showcase_scene::Camera;
use showcase_techniques::TechniqueKind;

use crate::cli::Cli;

pub(crate) fn camera_from_config(config: &CameraConfig, extent: Extent) -> Camera {
    let mut camera = Camera::new(Vec3::from(config.position), Vec3::from(config.rotation));
    camera.update_aspect_ratio(extent.aspect_ratio());
    camera
}

pub(crate) fn setup_options(config: &Config) -> SetupOptions {
    SetupOptions {
        seed: config.run.seed,
        assets: config.paths.assets.clone(),
    }
}

fn print_techniques() {
    for kind in TechniqueKind::all() {
        let required = kind.required_capabilities();
        if required.is_empty() {
            println!("{:<16} (no optional capabilities)", kind);
        } else {
            let names: Vec<&str> = required.iter().map(|c| c.name()).collect();
            println!("{:<16} requires {}", kind, names.join(", "));
        }
    }
}

/// Windowed run. Field order is drop order: the frame loop (and the GPU
/// objects it owns) goes before the window its surface belongs to.
struct App {
    config: Config,
    cycle: FrameCycle<Box<dyn Technique>>,
    frame_loop: Option<VulkanFrameLoop>,
    window: Option<Window>,
    camera: Camera,
    clock: FrameClock,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(kind: TechniqueKind, config: Config) -> Self {
        let extent = Extent::new(config.window.width, config.window.height);
        let camera = camera_from_config(&config.camera, extent);
        Self {
            cycle: FrameCycle::with_overlay(kind.build(), Box::new(StatsOverlay::new())),
            frame_loop: None,
            window: None,
            camera,
            clock: FrameClock::new(),
            error: None,
            config,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, &self.config.window)?;
        let settings = VulkanSettings {
            validation: self.config.run.validation,
            shaders: self.config.paths.shaders.clone(),
        };
        let mut frame_loop = VulkanFrameLoop::new(&window, &settings)?;

        self.cycle
            .prepare(frame_loop.context_mut(), &setup_options(&self.config))
            .with_context(|| format!("preparing '{}'", self.cycle.technique().name()))?;
        self.camera
            .update_aspect_ratio(frame_loop.extent().aspect_ratio());

        self.frame_loop = Some(frame_loop);
        self.window = Some(window);
        self.clock.reset();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match self.init(event_loop) {
                Ok(()) => info!("Initialization complete, entering main loop"),
                Err(e) => self.fail(event_loop, e),
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let Some(window) = self.window.as_mut() else {
                    return;
                };
                let extent = if window.resize(size) {
                    Extent::new(window.width(), window.height())
                } else {
                    Extent::default()
                };
                if !extent.is_empty() {
                    self.camera.update_aspect_ratio(extent.aspect_ratio());
                }
                if let Some(frame_loop) = self.frame_loop.as_mut() {
                    frame_loop.resize(extent);
                }
            }
            WindowEvent::RedrawRequested => {
                let timing = self.clock.tick();
                if let Some(frame_loop) = self.frame_loop.as_mut()
                    && let Err(e) = frame_loop.draw_frame(&mut self.cycle, &self.camera, timing)
                {
                    self.fail(event_loop, anyhow::Error::new(e).context("rendering frame"));
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn run_windowed(kind: TechniqueKind, config: Config) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(kind, config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() -> Result<()> {
    showcase_core::init_logging();
    let cli = Cli::parse();

    if cli.list {
        print_techniques();
        return Ok(());
    }

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    cli.apply(&mut config);
    let kind: TechniqueKind = config.run.technique.parse()?;

    match cli.headless_frames(&config) {
        Some(frames) => {
            info!("Running '{}' headless for {} frame(s)", kind, frames);
            let report = headless::run(kind, &config, frames)?;
            info!(
                "Headless run finished: {} frame(s), {} draw(s), {} uniform write(s)",
                report.frames, report.draws, report.buffer_writes
            );
            Ok(())
        }
        None => {
            info!("Starting '{}' (seed {})", kind, config.run.seed);
            run_windowed(kind, config)
        }
    }
}
