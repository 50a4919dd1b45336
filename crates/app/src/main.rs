//! meshview - Vulkan OBJ model viewer.
//!
//! Opens a window, loads the model given on the command line and spins it
//! about +Z until the window is closed or Escape is pressed.

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use meshview_core::{EngineConfig, FrameClock};
use meshview_platform::Window;
use meshview_renderer::{FrameOutcome, Renderer};

use crate::args::Args;

struct App {
    config: EngineConfig,
    max_frames: Option<u64>,
    // Dropped before the window.
    renderer: Option<Renderer>,
    window: Option<Window>,
    clock: FrameClock,
    failed: bool,
}

impl App {
    fn new(config: EngineConfig, max_frames: Option<u64>) -> Self {
        Self {
            config,
            max_frames,
            renderer: None,
            window: None,
            clock: FrameClock::new(),
            failed: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop) {
        self.failed = true;
        self.renderer = None;
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match renderer.render_frame() {
            Ok(FrameOutcome::Presented | FrameOutcome::PresentedAndRecreated) => {
                if let Some(fps) = self.clock.tick() {
                    debug!("{:.1} fps", fps);
                }
            }
            Ok(outcome) => debug!("Frame skipped: {:?}", outcome),
            Err(e) => {
                error!("Render error: {}", e);
                self.fail(event_loop);
                return;
            }
        }

        if let Some(max) = self.max_frames
            && self.clock.total_frames() >= max
        {
            info!("Rendered {} frames, exiting", max);
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(
            event_loop,
            self.config.width,
            self.config.height,
            &self.config.title,
        ) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.fail(event_loop);
                return;
            }
        };

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to create renderer: {}", e);
                self.fail(event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                info!("Escape pressed, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize();
                }
                // A zero-sized window has stopped redrawing; wake it up.
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let suspended = self.renderer.as_ref().is_some_and(Renderer::is_suspended);
        if suspended {
            // Block until the next window event instead of spinning.
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Renderer waits for the device in its Drop.
        self.renderer = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    meshview_core::init_logging();

    let config = args.to_config();
    config.validate()?;
    info!("Starting meshview with {}", config.model_path.display());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, args.max_frames);
    event_loop.run_app(&mut app)?;

    if app.failed {
        anyhow::bail!("meshview exited after a fatal error");
    }
    Ok(())
}
