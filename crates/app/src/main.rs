//! facet - Main Entry Point
//!
//! A small Vulkan model viewer. It draws a spinning, Blinn-Phong shaded
//! mesh (an OBJ file or a built-in cube) and exposes vsync, fullscreen,
//! and resize handling through the window.

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::window::WindowId;

use facet_core::Timer;
use facet_platform::Window;
use facet_render::Renderer;
use facet_resources::Model;

mod cli;

use cli::Args;

/// Edge length of the fallback cube when no model is given.
const CUBE_EDGE: f32 = 2.0;

struct App {
    args: Args,
    window: Option<Window>,
    renderer: Option<Renderer>,
    timer: Timer,
    modifiers: ModifiersState,
}

impl App {
    fn new(args: Args) -> Self {
        Self {
            args,
            window: None,
            renderer: None,
            timer: Timer::new(),
            modifiers: ModifiersState::empty(),
        }
    }

    fn load_model(&self) -> facet_resources::ResourceResult<Model> {
        match self.args.model.as_deref() {
            Some(path) => Model::load(path),
            None => Ok(Model::cube(CUBE_EDGE)),
        }
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref mut window) = self.window {
            window.toggle_fullscreen();
        }
    }

    fn on_key_pressed(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        match key {
            KeyCode::Escape => {
                info!("Escape pressed, shutting down");
                event_loop.exit();
            }
            KeyCode::KeyV => {
                if let Some(ref mut renderer) = self.renderer {
                    let enabled = renderer.toggle_vsync();
                    info!("Vsync {}", if enabled { "on" } else { "off" });
                }
            }
            KeyCode::F11 => self.toggle_fullscreen(),
            KeyCode::Enter if self.modifiers.alt_key() => self.toggle_fullscreen(),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match Window::new(event_loop, self.args.width, self.args.height, "facet") {
                Ok(window) => window,
                Err(e) => {
                    error!("Failed to create window: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            let model = match self.load_model() {
                Ok(model) => model,
                Err(e) => {
                    error!("Failed to load model: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            // Create renderer after window is created
            match Renderer::new(&window, &model, true, self.args.warp) {
                Ok(renderer) => {
                    info!("Initialization complete, entering main loop");
                    self.renderer = Some(renderer);
                    self.window = Some(window);
                    self.timer.reset();
                }
                Err(e) => {
                    error!("Failed to create renderer: {:?}", e);
                    event_loop.exit();
                }
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
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let delta = self.timer.tick();

                if let Some(ref mut renderer) = self.renderer {
                    if let Some(fps) = renderer.update(delta)
                        && let Some(ref window) = self.window
                    {
                        window.set_title(&format!("facet - FPS: {:.1}", fps));
                    }

                    if let Err(e) = renderer.render_frame() {
                        error!("Render error: {:?}", e);
                    }
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && !event.repeat
                    && let PhysicalKey::Code(key) = event.physical_key
                {
                    self.on_key_pressed(event_loop, key);
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

fn main() -> Result<()> {
    // Initialize logging
    facet_core::init_logging();

    let args = Args::parse()?;
    info!("Starting facet");

    // Create event loop
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    // Create app and run
    let mut app = App::new(args);
    event_loop.run_app(&mut app)?;

    Ok(())
}
