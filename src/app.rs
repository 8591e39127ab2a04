use crate::input::events::{InputEvent, InputHub};
use crate::input::pointer::MOUSE_POINTER_ID;
use crate::rendering::wgpu_device::WgpuDevice;
use crate::simulation::config::SimulationConfig;
use crate::simulation::fluid::FluidSimulation;
use crate::simulation::resolution::SurfaceSize;
use std::path::PathBuf;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalPosition, PhysicalPosition, PhysicalSize},
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// Environment variable naming a RON config file.
pub const CONFIG_ENV: &str = "RAINBOW_FLUID_CONFIG";

fn surface_size(size: PhysicalSize<u32>, scale_factor: f64) -> SurfaceSize {
    let logical = size.to_logical::<f32>(scale_factor);
    SurfaceSize::new(logical.width, logical.height, scale_factor as f32)
}

pub struct App {
    window: Arc<Window>,
    hub: InputHub,
    simulation: FluidSimulation<WgpuDevice>,
    cursor: LogicalPosition<f32>,
    frame_count: u32,
    fps_timer: std::time::Instant,
}

impl App {
    pub fn new(window: Arc<Window>, config: SimulationConfig) -> Result<Self, crate::simulation::fluid::SimulationError> {
        let device = WgpuDevice::new(window.clone(), config.transparent)?;
        let surface = surface_size(window.inner_size(), window.scale_factor());
        let mut simulation = FluidSimulation::new(device, surface, config)?;

        let mut hub = InputHub::new();
        simulation.mount_input_events(&mut hub)?;

        Ok(Self {
            window,
            hub,
            simulation,
            cursor: LogicalPosition::new(0.0, 0.0),
            frame_count: 0,
            fps_timer: std::time::Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn logical(&self, position: PhysicalPosition<f64>) -> LogicalPosition<f32> {
        position.to_logical(self.window.scale_factor())
    }

    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.simulation.unmount_input_events(&mut self.hub);
                if let Err(err) = self.simulation.destroy() {
                    log::warn!("Destroy failed: {}", err);
                }
                return false;
            }
            WindowEvent::Resized(physical_size) => {
                self.simulation
                    .resize(surface_size(*physical_size, self.window.scale_factor()));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.simulation
                    .resize(surface_size(self.window.inner_size(), *scale_factor));
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = self.logical(*position);
                self.hub.publish(InputEvent::PointerMove {
                    id: MOUSE_POINTER_ID,
                    x: self.cursor.x,
                    y: self.cursor.y,
                });
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                let event = match state {
                    ElementState::Pressed => InputEvent::PointerDown {
                        id: MOUSE_POINTER_ID,
                        x: self.cursor.x,
                        y: self.cursor.y,
                    },
                    ElementState::Released => InputEvent::PointerUp { id: MOUSE_POINTER_ID },
                };
                self.hub.publish(event);
            }
            WindowEvent::Touch(touch) => {
                let id = touch.id as i64;
                let location = self.logical(touch.location);
                let event = match touch.phase {
                    TouchPhase::Started => InputEvent::PointerDown {
                        id,
                        x: location.x,
                        y: location.y,
                    },
                    TouchPhase::Moved => InputEvent::PointerMove {
                        id,
                        x: location.x,
                        y: location.y,
                    },
                    TouchPhase::Ended | TouchPhase::Cancelled => InputEvent::PointerUp { id },
                };
                self.hub.publish(event);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event);
            }
            WindowEvent::RedrawRequested => {
                self.render();
            }
            _ => {}
        }
        true
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        use winit::keyboard::{Key, NamedKey};

        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let result = match &event.logical_key {
            Key::Named(NamedKey::Space) => match self.simulation.state() {
                crate::simulation::fluid::SimulationState::Running => self.simulation.stop(),
                _ => self.simulation.start(),
            },
            Key::Character(c) if c.as_str() == "s" => {
                let shading = !self.simulation.config().shading;
                self.simulation.set_shading(shading);
                log::info!("Shading {}", if shading { "on" } else { "off" });
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("{}", err);
        }
    }

    fn render(&mut self) {
        if let Err(err) = self.simulation.frame(std::time::Instant::now()) {
            log::error!("Frame failed: {}", err);
            return;
        }

        // FPS counter
        self.frame_count += 1;
        if self.fps_timer.elapsed().as_secs_f32() >= 1.0 {
            log::debug!("FPS: {}", self.frame_count);
            self.frame_count = 0;
            self.fps_timer = std::time::Instant::now();
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

struct AppState {
    app: Option<App>,
    config: SimulationConfig,
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Rainbow Fluid")
            .with_transparent(self.config.transparent)
            .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        match App::new(window, self.config.clone()) {
            Ok(app) => self.app = Some(app),
            Err(err) => {
                log::error!("Failed to start simulation: {}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(app) = &mut self.app else { return };

        if window_id != app.window().id() {
            return;
        }

        if !app.handle_event(&event) {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(app) = &self.app {
            app.request_redraw();
        }
    }
}

pub fn run() -> Result<(), winit::error::EventLoopError> {
    env_logger::init();

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = SimulationConfig::load_or_default(config_path.as_deref());

    let event_loop = EventLoop::new()?;
    let mut state = AppState { app: None, config };

    event_loop.run_app(&mut state)
}
