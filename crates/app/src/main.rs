//! vkframe demo host.
//!
//! Owns the window and scene, feeds input into the camera, and calls
//! [`Renderer::draw_frame`] once per loop iteration.
//!
//! Controls: WASD/QE move, hold the right mouse button to look around,
//! 1/2/3 select the Lit/Wireframe/Unlit mode, Escape quits.

mod demo;

use anyhow::Result;
use ash::vk;
use glam::{Vec2, Vec3};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use vkframe_core::{FrameTimer, RenderMode, RendererConfig};
use vkframe_platform::{InputState, KeyCode, MouseButton, Window};
use vkframe_renderer::Renderer;
use vkframe_scene::{CameraController, Scene};

/// Mode hotkeys, in [`RenderMode::ALL`] order.
const MODE_KEYS: [KeyCode; 3] = [KeyCode::Digit1, KeyCode::Digit2, KeyCode::Digit3];

/// Everything created once the event loop is running. Field order is drop
/// order: the renderer goes before the window its surface was made from.
struct Running {
    renderer: Renderer,
    scene: Scene,
    window: Window,
}

struct App {
    config: RendererConfig,
    running: Option<Running>,
    input: InputState,
    controller: CameraController,
    timer: FrameTimer,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        let controller = CameraController::new(config.camera.move_speed, config.camera.look_sensitivity);
        Self {
            config,
            running: None,
            input: InputState::new(),
            controller,
            timer: FrameTimer::new(),
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let window = Window::new(
            event_loop,
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
        )?;
        let mut renderer = Renderer::new(&window, &self.config)?;

        let extent = vk::Extent2D {
            width: demo::CHECKER_SIZE,
            height: demo::CHECKER_SIZE,
        };
        let checker = renderer.register_texture(
            "checker",
            extent,
            &demo::checker_pixels(demo::CHECKER_SIZE),
        )?;

        let scene = demo::build(&self.config, Some(checker));
        renderer.upload_scene(&scene)?;

        Ok(Running {
            renderer,
            scene,
            window,
        })
    }

    /// Applies this iteration's input to the renderer and scene.
    fn update(&mut self, delta_time: f32) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        for (key, mode) in MODE_KEYS.iter().zip(RenderMode::ALL) {
            if self.input.is_key_just_pressed(*key) && running.renderer.render_mode() != mode {
                running.renderer.set_render_mode(mode);
                running
                    .window
                    .set_title(&format!("{} [{}]", self.config.window.title, mode.label()));
            }
        }

        let movement = Vec3::new(
            self.input.axis(KeyCode::KeyD, KeyCode::KeyA),
            self.input.axis(KeyCode::KeyE, KeyCode::KeyQ),
            self.input.axis(KeyCode::KeyW, KeyCode::KeyS),
        );
        let look = if self.input.is_mouse_pressed(MouseButton::Right) {
            let (dx, dy) = self.input.mouse_delta();
            Vec2::new(dx, dy)
        } else {
            Vec2::ZERO
        };
        self.controller
            .update(&mut running.scene.camera, movement, look, delta_time);

        demo::orbit_lights(&mut running.scene, delta_time);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let delta_time = self.timer.tick();
        self.update(delta_time);
        self.input.begin_frame();

        let Some(running) = self.running.as_mut() else {
            return;
        };
        if let Err(e) = running
            .renderer
            .draw_frame(&mut running.window, &running.scene, delta_time)
        {
            error!("Render error: {}", e);
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                info!(
                    "Initialization complete (validation: {}), entering main loop",
                    running.renderer.has_validation()
                );
                self.running = Some(running);
            }
            Err(e) => {
                error!("Failed to initialize: {:#}", e);
                event_loop.exit();
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
                if let Some(running) = self.running.as_mut() {
                    running.window.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        if key == KeyCode::Escape {
                            event_loop.exit();
                        }
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.input.on_mouse_pressed(button.into()),
                ElementState::Released => self.input.on_mouse_released(button.into()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.input.on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => self.input.on_mouse_left(),
            WindowEvent::Focused(false) => self.input.clear(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.as_ref() {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        info!(
            "{} frame(s) in {:.1}s, {:.1} fps average",
            self.timer.frames(),
            self.timer.elapsed().as_secs_f32(),
            self.timer.average_fps()
        );
        // Tear down GPU objects while the event loop still owns the display.
        self.running = None;
    }
}

fn main() -> Result<()> {
    vkframe_core::init_logging();
    info!("Starting vkframe");

    let config = RendererConfig::load()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
