//! World ticker: input-driven camera and player movement.
//!
//! The ticker drains the platform's input queue exactly once per frame and
//! applies the result to the scene, then integrates velocities. No window
//! callback touches scene or render state directly.

use dreams_platform::{InputEvent, InputQueue, KeyCode};
use dreams_scene::{EntityId, Scene};

/// Vertical nudge applied per space/shift press, in world units.
const VERTICAL_STEP: f64 = 0.1;
/// Per-tick velocity damping factor.
const DAMPING: f64 = 0.9;

/// Drives the player entity and the orbit camera from input events.
pub struct WorldTicker {
    player: EntityId,
    camera: EntityId,
    viewport: (f64, f64),
    last_cursor: Option<(f64, f64)>,
}

impl WorldTicker {
    pub fn new(player: EntityId, camera: EntityId) -> Self {
        Self {
            player,
            camera,
            viewport: (1.0, 1.0),
            last_cursor: None,
        }
    }

    /// Updates the viewport used to normalize cursor coordinates.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.viewport = (width, height);
        }
    }

    /// Drains the queue and applies every event to the scene. Called once
    /// per frame before [`tick`](Self::tick).
    pub fn apply_events(&mut self, scene: &mut Scene, queue: &mut InputQueue) {
        for event in queue.drain() {
            match event {
                InputEvent::Scroll { delta } => {
                    if let Some(camera) = scene.camera_mut(self.camera) {
                        if camera.input {
                            camera.distance -= delta as f32;
                            camera.clamp_distance();
                        }
                    }
                }
                InputEvent::CursorMoved { x, y } => {
                    let cx = 2.0 * (x / self.viewport.0) - 1.0;
                    let cy = 2.0 * (y / self.viewport.1) - 1.0;

                    if let Some((lx, ly)) = self.last_cursor {
                        let (dx, dy) = (cx - lx, cy - ly);
                        if let Some(camera) = scene.camera_mut(self.camera) {
                            if camera.input {
                                camera.yaw += dx as f32;
                                camera.pitch = (camera.pitch + dy as f32)
                                    .clamp(-90f32.to_radians(), 90f32.to_radians());
                            }
                        }
                    }
                    self.last_cursor = Some((cx, cy));
                }
                InputEvent::Key { code, pressed } => self.apply_key(scene, code, pressed),
            }
        }
    }

    fn apply_key(&mut self, scene: &mut Scene, code: KeyCode, pressed: bool) {
        match code {
            KeyCode::KeyW => {
                if let Some(player) = scene.player_mut(self.player) {
                    player.motion_forward = if pressed { 1.0 } else { 0.0 };
                }
            }
            KeyCode::KeyS => {
                if let Some(player) = scene.player_mut(self.player) {
                    player.motion_forward = if pressed { -1.0 } else { 0.0 };
                }
            }
            KeyCode::Space => {
                if pressed {
                    if let Some(position) = scene.position_mut(self.player) {
                        position.y += VERTICAL_STEP;
                    }
                }
            }
            KeyCode::ShiftLeft => {
                if pressed {
                    if let Some(position) = scene.position_mut(self.player) {
                        position.y -= VERTICAL_STEP;
                    }
                }
            }
            _ => {}
        }
    }

    /// Advances the world by `dt` seconds: player steering from the camera
    /// yaw, then velocity integration with damping. Collision response is
    /// not implemented; positions integrate freely.
    pub fn tick(&mut self, scene: &mut Scene, dt: f64) {
        let camera_yaw = scene
            .camera(self.camera)
            .map(|camera| camera.yaw as f64)
            .unwrap_or(0.0);

        if let Some(player) = scene.player(self.player) {
            if player.motion_forward != 0.0 {
                let yaw = if player.motion_forward > 0.0 {
                    std::f64::consts::PI - camera_yaw
                } else {
                    -camera_yaw
                };
                if let Some(rotation) = scene.rotation_mut(self.player) {
                    rotation.yaw = yaw;
                }
                if let Some(velocity) = scene.velocity_mut(self.player) {
                    velocity.x = yaw.sin() * player.walking_speed;
                    velocity.z = yaw.cos() * player.walking_speed;
                }
            }
        }

        for (_, position, velocity) in scene.moving_entities() {
            position.x += velocity.x * dt;
            position.y += velocity.y * dt;
            position.z += velocity.z * dt;

            velocity.x *= DAMPING;
            velocity.y *= DAMPING;
            velocity.z *= DAMPING;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreams_scene::{Player, Position, Rotation, TargetCamera, Velocity};
    use glam::Vec3;

    struct Fixture {
        scene: Scene,
        ticker: WorldTicker,
        player: EntityId,
        camera: EntityId,
    }

    fn world() -> Fixture {
        let mut scene = Scene::new();
        let player = scene.spawn();
        scene.set_position(player, Position::default());
        scene.set_rotation(player, Rotation::default());
        scene.set_velocity(player, Velocity::default());
        scene.set_player(player, Player::default());

        let camera = scene.spawn();
        scene.set_camera(camera, TargetCamera::new(player, Vec3::new(0.0, 2.0, 0.0)));

        let mut ticker = WorldTicker::new(player, camera);
        ticker.set_viewport(800.0, 600.0);
        Fixture {
            scene,
            ticker,
            player,
            camera,
        }
    }

    #[test]
    fn test_scroll_clamps_distance() {
        let Fixture {
            mut scene,
            mut ticker,
            camera,
            ..
        } = world();
        let mut queue = InputQueue::new();
        for _ in 0..100 {
            queue.push(InputEvent::Scroll { delta: 1.0 });
        }
        ticker.apply_events(&mut scene, &mut queue);

        let camera = scene.camera(camera).unwrap();
        assert_eq!(camera.distance, camera.min_distance);
    }

    #[test]
    fn test_pitch_is_clamped_to_vertical() {
        let Fixture {
            mut scene,
            mut ticker,
            camera,
            ..
        } = world();
        let mut queue = InputQueue::new();
        queue.push(InputEvent::CursorMoved { x: 400.0, y: 300.0 });
        queue.push(InputEvent::CursorMoved { x: 400.0, y: 60000.0 });
        ticker.apply_events(&mut scene, &mut queue);

        let camera = scene.camera(camera).unwrap();
        assert!(camera.pitch <= 90f32.to_radians() + 1e-6);
    }

    #[test]
    fn test_forward_motion_moves_player() {
        let Fixture {
            mut scene,
            mut ticker,
            player,
            ..
        } = world();

        let mut queue = InputQueue::new();
        queue.push(InputEvent::Key {
            code: KeyCode::KeyW,
            pressed: true,
        });
        ticker.apply_events(&mut scene, &mut queue);
        ticker.tick(&mut scene, 0.1);

        let position = scene.position(player).unwrap();
        let moved = (position.x.powi(2) + position.z.powi(2)).sqrt();
        assert!(moved > 0.0, "player should have moved horizontally");

        // Release stops further acceleration; damping bleeds velocity off.
        queue.push(InputEvent::Key {
            code: KeyCode::KeyW,
            pressed: false,
        });
        ticker.apply_events(&mut scene, &mut queue);
        for _ in 0..200 {
            ticker.tick(&mut scene, 0.016);
        }
        let velocity = scene.velocity_mut(player).unwrap();
        assert!(velocity.x.abs() < 1e-3 && velocity.z.abs() < 1e-3);
    }

    #[test]
    fn test_vertical_nudges() {
        let Fixture {
            mut scene,
            mut ticker,
            player,
            ..
        } = world();

        let mut queue = InputQueue::new();
        queue.push(InputEvent::Key {
            code: KeyCode::Space,
            pressed: true,
        });
        ticker.apply_events(&mut scene, &mut queue);
        assert!((scene.position(player).unwrap().y - VERTICAL_STEP).abs() < 1e-9);

        queue.push(InputEvent::Key {
            code: KeyCode::ShiftLeft,
            pressed: true,
        });
        ticker.apply_events(&mut scene, &mut queue);
        assert!(scene.position(player).unwrap().y.abs() < 1e-9);
    }
}
