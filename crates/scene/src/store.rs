//! The entity store.
//!
//! A deliberately small component store: entities are rows, components are
//! optional columns. Iteration follows insertion order, which satisfies the
//! renderer's only requirement of being stable within a frame.

use glam::Mat4;

use crate::aabb::Aabb;
use crate::camera::TargetCamera;
use crate::components::{Light, Player, Position, Renderable, Rotation, Velocity};

/// Opaque entity identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Builds an id from its raw value. Intended for tests and tooling.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct EntityRecord {
    position: Position,
    rotation: Option<Rotation>,
    velocity: Option<Velocity>,
    player: Option<Player>,
    renderable: Option<Renderable>,
    light: Option<Light>,
    collision: Option<Aabb>,
    camera: Option<TargetCamera>,
}

/// One renderable entity as seen by the renderer.
#[derive(Clone, Copy, Debug)]
pub struct RenderableView<'a> {
    pub entity: EntityId,
    pub position: Position,
    pub rotation: Option<Rotation>,
    pub renderable: &'a Renderable,
    /// Present when the entity carries a collision box.
    pub collision: Option<&'a Aabb>,
}

impl RenderableView<'_> {
    /// World matrix: translation then yaw rotation, matching the transform
    /// written into the object uniform record.
    pub fn world_matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.position.to_vec3());
        match self.rotation {
            Some(rotation) => translation * rotation.matrix(),
            None => translation,
        }
    }
}

/// One light entity as seen by the renderer.
#[derive(Clone, Copy, Debug)]
pub struct LightView<'a> {
    pub entity: EntityId,
    pub position: Position,
    pub light: &'a Light,
}

/// The queryable entity store.
///
/// Ids are never reused; entities cannot be despawned mid-frame, which keeps
/// every view valid for the frame it was taken in.
#[derive(Debug, Default)]
pub struct Scene {
    entities: Vec<EntityRecord>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns an empty entity at the origin.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.entities.len() as u64);
        self.entities.push(EntityRecord::default());
        id
    }

    fn record(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.entities.get(entity.0 as usize)
    }

    fn record_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(entity.0 as usize)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn set_position(&mut self, entity: EntityId, position: Position) {
        if let Some(record) = self.record_mut(entity) {
            record.position = position;
        }
    }

    pub fn position(&self, entity: EntityId) -> Option<Position> {
        self.record(entity).map(|r| r.position)
    }

    pub fn position_mut(&mut self, entity: EntityId) -> Option<&mut Position> {
        self.record_mut(entity).map(|r| &mut r.position)
    }

    pub fn set_rotation(&mut self, entity: EntityId, rotation: Rotation) {
        if let Some(record) = self.record_mut(entity) {
            record.rotation = Some(rotation);
        }
    }

    pub fn rotation_mut(&mut self, entity: EntityId) -> Option<&mut Rotation> {
        self.record_mut(entity).and_then(|r| r.rotation.as_mut())
    }

    pub fn set_velocity(&mut self, entity: EntityId, velocity: Velocity) {
        if let Some(record) = self.record_mut(entity) {
            record.velocity = Some(velocity);
        }
    }

    pub fn velocity_mut(&mut self, entity: EntityId) -> Option<&mut Velocity> {
        self.record_mut(entity).and_then(|r| r.velocity.as_mut())
    }

    pub fn set_player(&mut self, entity: EntityId, player: Player) {
        if let Some(record) = self.record_mut(entity) {
            record.player = Some(player);
        }
    }

    pub fn player(&self, entity: EntityId) -> Option<Player> {
        self.record(entity).and_then(|r| r.player)
    }

    pub fn player_mut(&mut self, entity: EntityId) -> Option<&mut Player> {
        self.record_mut(entity).and_then(|r| r.player.as_mut())
    }

    pub fn set_renderable(&mut self, entity: EntityId, renderable: Renderable) {
        if let Some(record) = self.record_mut(entity) {
            record.renderable = Some(renderable);
        }
    }

    pub fn set_light(&mut self, entity: EntityId, light: Light) {
        if let Some(record) = self.record_mut(entity) {
            record.light = Some(light);
        }
    }

    pub fn set_collision(&mut self, entity: EntityId, aabb: Aabb) {
        if let Some(record) = self.record_mut(entity) {
            record.collision = Some(aabb);
        }
    }

    pub fn collision(&self, entity: EntityId) -> Option<Aabb> {
        self.record(entity).and_then(|r| r.collision)
    }

    pub fn set_camera(&mut self, entity: EntityId, camera: TargetCamera) {
        if let Some(record) = self.record_mut(entity) {
            record.camera = Some(camera);
        }
    }

    pub fn camera(&self, entity: EntityId) -> Option<&TargetCamera> {
        self.record(entity).and_then(|r| r.camera.as_ref())
    }

    pub fn camera_mut(&mut self, entity: EntityId) -> Option<&mut TargetCamera> {
        self.record_mut(entity).and_then(|r| r.camera.as_mut())
    }

    /// Iterates every entity with a renderable component, insertion order.
    pub fn renderables(&self) -> impl Iterator<Item = RenderableView<'_>> {
        self.entities.iter().enumerate().filter_map(|(i, record)| {
            record.renderable.as_ref().map(|renderable| RenderableView {
                entity: EntityId(i as u64),
                position: record.position,
                rotation: record.rotation,
                renderable,
                collision: record.collision.as_ref(),
            })
        })
    }

    /// Iterates every entity with a light component, insertion order.
    pub fn lights(&self) -> impl Iterator<Item = LightView<'_>> {
        self.entities.iter().enumerate().filter_map(|(i, record)| {
            record.light.as_ref().map(|light| LightView {
                entity: EntityId(i as u64),
                position: record.position,
                light,
            })
        })
    }

    /// Iterates entities carrying both velocity and position, for the ticker.
    pub fn moving_entities(&mut self) -> impl Iterator<Item = (EntityId, &mut Position, &mut Velocity)> {
        self.entities.iter_mut().enumerate().filter_map(|(i, record)| {
            let position = &mut record.position;
            record
                .velocity
                .as_mut()
                .map(|velocity| (EntityId(i as u64), position, velocity))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ModelRef, TextureRef};
    use glam::Vec3;

    fn renderable() -> Renderable {
        Renderable::new(ModelRef(0), TextureRef(0))
    }

    #[test]
    fn test_spawn_assigns_unique_ids() {
        let mut scene = Scene::new();
        let a = scene.spawn();
        let b = scene.spawn();
        assert_ne!(a, b);
        assert_eq!(scene.entity_count(), 2);
    }

    #[test]
    fn test_renderables_follow_insertion_order() {
        let mut scene = Scene::new();
        let first = scene.spawn();
        scene.set_renderable(first, renderable());
        let plain = scene.spawn();
        scene.set_light(plain, Light::default());
        let second = scene.spawn();
        scene.set_renderable(second, renderable());

        let order: Vec<EntityId> = scene.renderables().map(|view| view.entity).collect();
        assert_eq!(order, vec![first, second]);

        let lights: Vec<EntityId> = scene.lights().map(|view| view.entity).collect();
        assert_eq!(lights, vec![plain]);
    }

    #[test]
    fn test_world_matrix_without_rotation_is_translation() {
        let mut scene = Scene::new();
        let id = scene.spawn();
        scene.set_position(id, Position::new(1.0, 2.0, 3.0));
        scene.set_renderable(id, renderable());

        let view = scene.renderables().next().unwrap();
        let m = view.world_matrix();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_collision_write_back() {
        let mut scene = Scene::new();
        let id = scene.spawn();
        scene.set_renderable(id, renderable());
        scene.set_collision(id, Aabb::zero());

        let updated = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        scene.set_collision(id, updated);
        assert_eq!(scene.collision(id), Some(updated));

        let view = scene.renderables().next().unwrap();
        assert_eq!(view.collision, Some(&updated));
    }

    #[test]
    fn test_camera_lookup() {
        let mut scene = Scene::new();
        let target = scene.spawn();
        let cam_entity = scene.spawn();
        scene.set_camera(cam_entity, TargetCamera::new(target, Vec3::new(0.0, 2.0, 0.0)));

        let cam = scene.camera(cam_entity).unwrap();
        assert_eq!(cam.target, target);
        assert!(scene.camera(target).is_none());
    }
}
