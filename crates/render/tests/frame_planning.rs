//! Integration test: a frame's worth of planning against a demo-like scene.
//!
//! Exercises the slot allocator, all three drawing-pass plans and the
//! uniform record layouts together, the way the orchestrator composes them,
//! without touching a GPU.

use std::collections::HashMap;

use glam::{Mat4, Vec3};

use dreams_render::passes::geometry::GeometryPlan;
use dreams_render::passes::lighting::LightingPlan;
use dreams_render::passes::shadow::ShadowPlan;
use dreams_render::pool::PoolLayouts;
use dreams_render::slots::FrameSlots;
use dreams_render::{MAX_LIGHTS, MAX_OBJECTS};
use dreams_resources::{LightRecord, ObjectRecord};
use dreams_scene::{
    Aabb, Light, ModelRef, Position, Renderable, Rotation, Scene, TextureRef,
};

fn demo_scene() -> (Scene, HashMap<ModelRef, Aabb>) {
    let mut scene = Scene::new();

    let light = scene.spawn();
    scene.set_position(light, Position::new(20.0, 35.0, 20.0));
    scene.set_light(light, Light::new(Vec3::ONE, Vec3::new(1.0, 0.5, 0.75), 1e-9, 50.0));
    scene.set_renderable(
        light,
        Renderable::new(ModelRef(2), TextureRef(0)).with_shadow_caster(false),
    );

    let player = scene.spawn();
    scene.set_position(player, Position::new(0.0, 0.0, 0.0));
    scene.set_rotation(player, Rotation::default());
    scene.set_renderable(player, Renderable::new(ModelRef(1), TextureRef(0)));

    let ground = scene.spawn();
    scene.set_renderable(ground, Renderable::new(ModelRef(0), TextureRef(1)));
    scene.set_collision(ground, Aabb::zero());

    let cube = scene.spawn();
    scene.set_position(cube, Position::new(-1.0, 0.25, -0.5));
    scene.set_renderable(cube, Renderable::new(ModelRef(3), TextureRef(2)));
    scene.set_collision(cube, Aabb::zero());

    let mut bounds = HashMap::new();
    bounds.insert(ModelRef(0), Aabb::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 0.0, 10.0)));
    bounds.insert(ModelRef(1), Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)));
    bounds.insert(ModelRef(2), Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)));
    bounds.insert(ModelRef(3), Aabb::new(Vec3::splat(-0.25), Vec3::splat(0.25)));

    (scene, bounds)
}

#[test]
fn demo_scene_produces_consistent_plans() {
    let (scene, bounds) = demo_scene();
    let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);

    assert_eq!(slots.object_count(), 4);
    assert_eq!(slots.light_count(), 1);

    let shadow = ShadowPlan::build(&scene, &slots);
    let geometry = GeometryPlan::build(&scene, &slots, &bounds);
    let lighting = LightingPlan::build(&scene, &slots);

    // The light's monkey model is visible but does not self-shadow:
    // three casters reach the shadow pass, all four objects the geometry
    // pass, one full-screen draw the lighting pass.
    assert_eq!(shadow.lights.len(), 1);
    assert_eq!(shadow.total_draws(), 3);
    assert_eq!(geometry.draws.len(), 4);
    assert_eq!(geometry.hitboxes.len(), 2);
    assert_eq!(lighting.draws.len(), 1);

    // Light slots agree across the shadow and lighting passes.
    assert_eq!(shadow.lights[0].slot, lighting.draws[0].slot);

    // Every planned slot addresses uniform memory inside its capacity.
    for draw in shadow.lights.iter().flat_map(|l| l.draws.iter()) {
        assert!(draw.slot < MAX_OBJECTS);
    }
    for draw in &geometry.draws {
        assert!(draw.slot < MAX_OBJECTS);
    }
}

#[test]
fn planned_slots_address_records_in_mock_memory() {
    let (scene, bounds) = demo_scene();
    let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
    let geometry = GeometryPlan::build(&scene, &slots, &bounds);
    let shadow = ShadowPlan::build(&scene, &slots);

    // Stand-in for the persistently mapped uniform regions.
    let layouts = PoolLayouts::new(256);
    let mut object_store = vec![0u8; layouts.objects.buffer_size()];
    let mut light_store = vec![0u8; layouts.lights.buffer_size()];

    for view in scene.renderables() {
        let slot = slots.object(view.entity).unwrap();
        let record = ObjectRecord::new(view.world_matrix());
        layouts.objects.write(&mut object_store, slot, &record).unwrap();
    }

    for hitbox in &geometry.hitboxes {
        let mut record = layouts.objects.read(&object_store, hitbox.slot).unwrap();
        record.aabb_min = hitbox.world_aabb.min.extend(0.0);
        record.aabb_max = hitbox.world_aabb.max.extend(0.0);
        layouts.objects.write(&mut object_store, hitbox.slot, &record).unwrap();

        let back = layouts.objects.read(&object_store, hitbox.slot).unwrap();
        assert_eq!(back.aabb_min.truncate(), hitbox.world_aabb.min);
        assert_eq!(back.aabb_max.truncate(), hitbox.world_aabb.max);
    }

    for light_pass in &shadow.lights {
        let record = LightRecord {
            position: Vec3::new(20.0, 35.0, 20.0).extend(1.0),
            light_matrix: light_pass.camera.view_projection(),
            camera_inverse: Mat4::IDENTITY,
            ..LightRecord::default()
        };
        layouts.lights.write(&mut light_store, light_pass.slot, &record).unwrap();
        let back = layouts.lights.read(&light_store, light_pass.slot).unwrap();
        assert_eq!(back, record);
    }
}

#[test]
fn ground_box_spans_the_whole_plane() {
    let (mut scene, bounds) = demo_scene();
    let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
    let geometry = GeometryPlan::build(&scene, &slots, &bounds);

    // Apply the write-back the way the orchestrator does.
    for hitbox in &geometry.hitboxes {
        scene.set_collision(hitbox.entity, hitbox.world_aabb);
    }

    // The ground plane entity sits at the origin with identity rotation, so
    // its box equals the model bounds exactly.
    let ground_box = geometry
        .hitboxes
        .iter()
        .find(|h| bounds[&ModelRef(0)].extent().x == h.world_aabb.extent().x)
        .expect("ground hitbox present");
    assert_eq!(ground_box.world_aabb, bounds[&ModelRef(0)]);
    assert_eq!(scene.collision(ground_box.entity), Some(ground_box.world_aabb));
}
