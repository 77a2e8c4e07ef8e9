//! Dreams — a deferred-rendered sandbox.
//!
//! Assembles the demo scene, wires input into the world ticker, and drives
//! the renderer once per redraw.

mod ticker;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Vec3, Vec4};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use dreams_core::{FrameTimer, RenderConfig};
use dreams_platform::{InputEvent, InputQueue, Window};
use dreams_render::Renderer;
use dreams_resources::{LoadTracker, ModelData, TextureData};
use dreams_scene::{
    Light, Player, Position, Renderable, Rotation, Scene, TargetCamera, Velocity,
};

use ticker::WorldTicker;

/// Overlay line height used by the HUD text.
const HUD_SCALE: f32 = 0.05;

fn font_path() -> PathBuf {
    let candidates = [
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(candidates[0]))
}

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    scene: Scene,
    ticker: Option<WorldTicker>,
    input: InputQueue,
    timer: FrameTimer,
    config: RenderConfig,
}

impl App {
    fn new(config: RenderConfig) -> Self {
        Self {
            window: None,
            renderer: None,
            scene: Scene::new(),
            ticker: None,
            input: InputQueue::new(),
            timer: FrameTimer::new(),
            config,
        }
    }

    /// Loads the demo assets and spawns the scene from them.
    fn build_scene(&mut self, renderer: &mut Renderer) -> Result<WorldTicker> {
        let mut tracker = LoadTracker::new();

        let assets = Path::new("assets");
        let mut load_model = |renderer: &mut Renderer,
                              name: &str,
                              fallback: fn() -> ModelData|
         -> Result<dreams_scene::ModelRef> {
            let point = tracker.register(name.to_string());
            let data = ModelData::load_or(&assets.join(name), fallback);
            let reference = renderer.upload_model(&data)?;
            point.finish();
            Ok(reference)
        };

        let plane = load_model(renderer, "plane.obj", || ModelData::plane(10.0))?;
        let soraka = load_model(renderer, "soraka.obj", || ModelData::cube(0.5))?;
        let monkey = load_model(renderer, "monkey.obj", || ModelData::cube(0.5))?;
        let cube = load_model(renderer, "cube.obj", || ModelData::cube(0.25))?;

        let mut load_texture =
            |renderer: &mut Renderer, name: &str, fallback: [u8; 3]| -> Result<dreams_scene::TextureRef> {
                let point = tracker.register(name.to_string());
                let data = TextureData::load(&assets.join(name)).unwrap_or_else(|e| {
                    warn!("Falling back to solid texture for {name}: {e}");
                    TextureData::solid(fallback[0], fallback[1], fallback[2])
                });
                let reference = renderer.upload_texture(&data)?;
                point.finish();
                Ok(reference)
            };

        let soraka_tex = load_texture(renderer, "soraka.png", [200, 160, 255])?;
        let ground_tex = load_texture(renderer, "ground.png", [90, 140, 70])?;
        let gray_tex = load_texture(renderer, "gray.png", [128, 128, 128])?;

        info!(
            "Assets ready: {}/{} loading points complete",
            tracker.completed(),
            tracker.total()
        );
        debug_assert!(tracker.is_complete());

        // The light is drawn as a monkey head but casts no shadows itself.
        let light = self.scene.spawn();
        self.scene.set_position(light, Position::new(20.0, 35.0, 20.0));
        self.scene.set_light(
            light,
            Light::new(Vec3::ONE, Vec3::new(1.0, 0.5, 0.75), 1e-9, 50.0),
        );
        self.scene.set_renderable(
            light,
            Renderable::new(monkey, soraka_tex).with_shadow_caster(false),
        );

        let player = self.scene.spawn();
        self.scene.set_position(player, Position::new(0.0, 0.0, 0.0));
        self.scene.set_rotation(player, Rotation::default());
        self.scene.set_velocity(player, Velocity::default());
        self.scene.set_player(player, Player::default());
        self.scene
            .set_renderable(player, Renderable::new(soraka, soraka_tex));

        let ground = self.scene.spawn();
        self.scene.set_position(ground, Position::new(0.0, 0.0, 0.0));
        self.scene
            .set_renderable(ground, Renderable::new(plane, ground_tex));
        self.scene.set_collision(ground, Default::default());

        let crate_box = self.scene.spawn();
        self.scene
            .set_position(crate_box, Position::new(-1.0, 0.25, -0.5));
        self.scene
            .set_renderable(crate_box, Renderable::new(cube, gray_tex));
        self.scene.set_collision(crate_box, Default::default());

        let camera = self.scene.spawn();
        let mut orbit = TargetCamera::new(player, Vec3::new(0.0, 2.0, 0.0));
        orbit.yaw = 180f32.to_radians();
        orbit.pitch = 30f32.to_radians();
        self.scene.set_camera(camera, orbit);

        renderer.set_camera(camera);
        info!("Scene assembled: {} entities", self.scene.entity_count());

        Ok(WorldTicker::new(player, camera))
    }

    fn redraw(&mut self) {
        let dt = self.timer.delta_secs();
        let fps = self.timer.fps();

        if let (Some(ticker), Some(renderer)) = (self.ticker.as_mut(), self.renderer.as_mut()) {
            ticker.apply_events(&mut self.scene, &mut self.input);
            ticker.tick(&mut self.scene, dt);

            let memory = renderer.memory_usage();
            let result = renderer.render_frame(&mut self.scene, |overlay| {
                overlay.draw_text(
                    "Hello world!",
                    0.0,
                    0.0,
                    HUD_SCALE,
                    Vec4::ONE,
                );
                overlay.draw_text(
                    "Hello world!",
                    0.0,
                    2.0 - HUD_SCALE,
                    HUD_SCALE,
                    Vec4::ONE,
                );
                overlay.draw_text(
                    &format!("FPS: {fps:.1}"),
                    0.05,
                    0.05,
                    HUD_SCALE,
                    Vec4::ONE,
                );
                overlay.draw_text(
                    &format!("VRAM: {:.1}%", memory.fraction() * 100.0),
                    0.05,
                    0.05 + HUD_SCALE,
                    HUD_SCALE,
                    Vec4::ONE,
                );
            });

            if let Err(e) = result {
                error!("Render error: {e}");
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, 1280, 720, "Dreams") {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let mut renderer = match Renderer::new(
            &window,
            self.config.clone(),
            Path::new("shaders"),
            &font_path(),
        ) {
            Ok(renderer) => renderer,
            Err(e) => {
                error!("Failed to create renderer: {e:?}");
                event_loop.exit();
                return;
            }
        };

        match self.build_scene(&mut renderer) {
            Ok(mut ticker) => {
                ticker.set_viewport(window.width() as f64, window.height() as f64);
                window.capture_cursor();
                self.ticker = Some(ticker);
                self.renderer = Some(renderer);
                self.window = Some(window);
                info!("Welcome to your dream!");
            }
            Err(e) => {
                error!("Failed to build scene: {e:?}");
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
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
                if let Some(ref mut ticker) = self.ticker {
                    ticker.set_viewport(size.width as f64, size.height as f64);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.input.push(InputEvent::Key {
                        code,
                        pressed: event.state == ElementState::Pressed,
                    });
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.push(InputEvent::CursorMoved {
                    x: position.x,
                    y: position.y,
                });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y as f64,
                    MouseScrollDelta::PixelDelta(pos) => pos.y / 50.0,
                };
                self.input.push(InputEvent::Scroll { delta: scroll });
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
    dreams_core::init_logging();

    let config =
        RenderConfig::load(Path::new("dreams.toml")).context("failed to load render config")?;
    info!(
        "Config: {}x MSAA, {}^2 shadow maps, {:?} present mode",
        config.sample_count, config.shadow_resolution, config.present_mode
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
