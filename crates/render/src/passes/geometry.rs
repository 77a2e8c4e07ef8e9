//! Geometry (G-buffer) pass.
//!
//! Draws every visible renderable into the multisampled color, shade and
//! depth attachments; color and shade resolve into single-sample images as
//! part of the same rendering scope. A second iteration draws world-space
//! AABB wireframes for entities carrying a collision box, and the plan
//! carries the recomputed boxes so the orchestrator can write them back to
//! the entity and its uniform record — the box tracks the transformed model
//! bounds every frame.

use ash::vk;

use dreams_rhi::command::{CommandBuffer, ImageBarrier};
use dreams_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};
use dreams_scene::{Aabb, EntityId, Scene};

use crate::assets::AssetLibrary;
use crate::error::{RenderError, RenderResult};
use crate::passes::pipelines::PassPipelines;
use crate::passes::{ModelBounds, ObjectDraw};
use crate::pool::ResourcePool;
use crate::slots::FrameSlots;

/// One AABB wireframe draw with the box to write back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitboxDraw {
    /// Entity whose box is drawn and updated.
    pub entity: EntityId,
    /// The entity's object slot.
    pub slot: usize,
    /// Model bounds under the entity's current world matrix.
    pub world_aabb: Aabb,
}

/// The frame's geometry pass draw lists.
#[derive(Clone, Debug, Default)]
pub struct GeometryPlan {
    /// Visible renderables in slot order.
    pub draws: Vec<ObjectDraw>,
    /// Collision-carrying renderables and their recomputed boxes.
    pub hitboxes: Vec<HitboxDraw>,
}

impl GeometryPlan {
    /// Plans the geometry pass from the scene snapshot.
    ///
    /// Invisible renderables are excluded from `draws` but still get their
    /// box recomputed when they carry one; entities without a slot this
    /// frame are excluded from both lists.
    pub fn build(scene: &Scene, slots: &FrameSlots, bounds: &impl ModelBounds) -> Self {
        let mut draws = Vec::with_capacity(slots.object_count());
        let mut hitboxes = Vec::new();

        for view in scene.renderables() {
            let Some(slot) = slots.object(view.entity) else {
                continue;
            };

            if view.renderable.visible {
                draws.push(ObjectDraw {
                    entity: view.entity,
                    slot,
                    model: view.renderable.model,
                    texture: view.renderable.texture,
                });
            }

            if view.collision.is_some() {
                let object_bounds = bounds
                    .model_bounds(view.renderable.model)
                    .unwrap_or_default();
                hitboxes.push(HitboxDraw {
                    entity: view.entity,
                    slot,
                    world_aabb: object_bounds.transform(view.world_matrix()),
                });
            }
        }

        Self { draws, hitboxes }
    }
}

/// Records the geometry pass for `frame`, leaving the resolved color and
/// shade images in shader-read layout for the lighting pass.
///
/// # Errors
///
/// Returns an error if a draw references an unknown asset or a slot offset
/// is out of range.
pub fn record(
    cmd: &CommandBuffer,
    pool: &ResourcePool,
    pipelines: &PassPipelines,
    assets: &AssetLibrary,
    frame: usize,
    plan: &GeometryPlan,
) -> RenderResult<()> {
    let resources = pool.frame(frame);
    let extent = pool.extent();

    // All five images enter the pass fresh; prior contents are irrelevant.
    for (image, aspect, stage, access) in [
        (
            resources.color.image(),
            vk::ImageAspectFlags::COLOR,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        (
            resources.shade.image(),
            vk::ImageAspectFlags::COLOR,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        (
            resources.resolve_color.image(),
            vk::ImageAspectFlags::COLOR,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        (
            resources.resolve_shade.image(),
            vk::ImageAspectFlags::COLOR,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
    ] {
        cmd.image_barrier(ImageBarrier {
            image,
            aspect,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            dst_stage: stage,
            src_access: vk::AccessFlags::empty(),
            dst_access: access,
        });
    }
    cmd.image_barrier(ImageBarrier {
        image: resources.depth.image(),
        aspect: vk::ImageAspectFlags::DEPTH,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        src_stage: vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    });

    let config = RenderingConfig::from_extent(extent)
        .with_color_attachment(
            ColorAttachment::new(resources.color.view())
                .dont_store()
                .resolve_to(resources.resolve_color.view()),
        )
        .with_color_attachment(
            ColorAttachment::new(resources.shade.view())
                .dont_store()
                .resolve_to(resources.resolve_shade.view()),
        )
        .with_depth_attachment(DepthAttachment::new(resources.depth.view()));
    let bundle = config.build();

    cmd.set_viewport_scissor(extent);
    cmd.begin_rendering(&bundle.info());

    cmd.bind_pipeline(pipelines.geometry.handle());
    for draw in &plan.draws {
        let model = assets
            .model(draw.model)
            .ok_or_else(|| RenderError::UnknownAsset(format!("model {:?}", draw.model)))?;
        let texture_set = assets
            .texture_set(draw.texture)
            .ok_or_else(|| RenderError::UnknownAsset(format!("texture {:?}", draw.texture)))?;

        cmd.bind_vertex_buffers(&[model.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(model.index_buffer.handle(), 0);
        cmd.bind_descriptor_sets(
            pipelines.geometry_pipeline_layout.handle(),
            0,
            &[resources.geometry_set],
            &[0, pool.object_offset(draw.slot)?],
        );
        cmd.bind_descriptor_sets(
            pipelines.geometry_pipeline_layout.handle(),
            1,
            &[texture_set],
            &[],
        );
        cmd.draw_indexed(model.index_count, 1);
    }

    // Wireframe boxes: 12 edges expanded from the uniform record's corners.
    cmd.bind_pipeline(pipelines.hitbox.handle());
    for hitbox in &plan.hitboxes {
        cmd.bind_descriptor_sets(
            pipelines.geometry_pipeline_layout.handle(),
            0,
            &[resources.geometry_set],
            &[0, pool.object_offset(hitbox.slot)?],
        );
        cmd.draw(24, 1, 0);
    }

    cmd.end_rendering();

    // Resolved outputs become the lighting pass's inputs.
    for image in [
        resources.resolve_color.image(),
        resources.resolve_shade.image(),
    ] {
        cmd.image_barrier(ImageBarrier {
            image,
            aspect: vk::ImageAspectFlags::COLOR,
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreams_scene::{ModelRef, Position, Renderable, Rotation, TextureRef};
    use glam::Vec3;
    use std::collections::HashMap;
    use crate::{MAX_LIGHTS, MAX_OBJECTS};

    fn unit_bounds() -> HashMap<ModelRef, Aabb> {
        let mut bounds = HashMap::new();
        bounds.insert(
            ModelRef(0),
            Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0)),
        );
        bounds
    }

    #[test]
    fn test_draws_follow_visibility() {
        let mut scene = Scene::new();
        let visible = scene.spawn();
        scene.set_renderable(visible, Renderable::new(ModelRef(0), TextureRef(0)));
        let hidden = scene.spawn();
        scene.set_renderable(
            hidden,
            Renderable::new(ModelRef(0), TextureRef(0)).with_visible(false),
        );

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = GeometryPlan::build(&scene, &slots, &unit_bounds());

        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].entity, visible);
        assert!(plan.hitboxes.is_empty());
    }

    #[test]
    fn test_translated_identity_box_matches_model_bounds_exactly() {
        let mut scene = Scene::new();
        let id = scene.spawn();
        scene.set_position(id, Position::new(5.0, -1.5, 0.25));
        scene.set_renderable(id, Renderable::new(ModelRef(0), TextureRef(0)));
        scene.set_collision(id, Aabb::zero());

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = GeometryPlan::build(&scene, &slots, &unit_bounds());

        assert_eq!(plan.hitboxes.len(), 1);
        let world = plan.hitboxes[0].world_aabb;
        // With identity rotation the box is the model bounds translated
        // exactly by the entity position.
        assert_eq!(world.min, Vec3::new(-1.0 + 5.0, -2.0 - 1.5, -3.0 + 0.25));
        assert_eq!(world.max, Vec3::new(1.0 + 5.0, 2.0 - 1.5, 3.0 + 0.25));
    }

    #[test]
    fn test_rotated_box_stays_finite_and_encloses() {
        let mut scene = Scene::new();
        let id = scene.spawn();
        scene.set_rotation(
            id,
            Rotation {
                yaw: std::f64::consts::FRAC_PI_4,
                pitch: 0.0,
            },
        );
        scene.set_renderable(id, Renderable::new(ModelRef(0), TextureRef(0)));
        scene.set_collision(id, Aabb::zero());

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = GeometryPlan::build(&scene, &slots, &unit_bounds());

        let world = plan.hitboxes[0].world_aabb;
        assert!(world.min.is_finite() && world.max.is_finite());
        // Yaw rotation widens x/z, leaves y untouched.
        assert!(world.max.x > 1.0);
        assert!((world.max.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_model_yields_zero_box_not_crash() {
        let mut scene = Scene::new();
        let id = scene.spawn();
        scene.set_position(id, Position::new(3.0, 0.0, 0.0));
        scene.set_renderable(id, Renderable::new(ModelRef(42), TextureRef(0)));
        scene.set_collision(id, Aabb::zero());

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = GeometryPlan::build(&scene, &slots, &unit_bounds());

        let world = plan.hitboxes[0].world_aabb;
        assert_eq!(world.extent(), Vec3::ZERO);
        assert_eq!(world.min, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_end_to_end_scenario_draw_counts() {
        // One light, two renderables (one shadow caster), one camera:
        // the geometry pass draws exactly two objects.
        let mut scene = Scene::new();
        let light = scene.spawn();
        scene.set_light(light, dreams_scene::Light::default());

        let caster = scene.spawn();
        scene.set_renderable(caster, Renderable::new(ModelRef(0), TextureRef(0)));
        let non_caster = scene.spawn();
        scene.set_renderable(
            non_caster,
            Renderable::new(ModelRef(0), TextureRef(0)).with_shadow_caster(false),
        );

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);

        let shadow = crate::passes::shadow::ShadowPlan::build(&scene, &slots);
        assert_eq!(shadow.lights.len(), 1);
        assert_eq!(shadow.total_draws(), 1);

        let geometry = GeometryPlan::build(&scene, &slots, &unit_bounds());
        assert_eq!(geometry.draws.len(), 2);

        let lighting = crate::passes::lighting::LightingPlan::build(&scene, &slots);
        assert_eq!(lighting.draws.len(), 1);
    }

    #[test]
    fn test_objects_beyond_capacity_are_not_drawn() {
        let mut scene = Scene::new();
        for _ in 0..6 {
            let id = scene.spawn();
            scene.set_renderable(id, Renderable::new(ModelRef(0), TextureRef(0)));
        }

        let slots = FrameSlots::assign(&scene, 4, MAX_LIGHTS);
        let plan = GeometryPlan::build(&scene, &slots, &unit_bounds());

        assert_eq!(plan.draws.len(), 4);
        assert!(plan.draws.iter().all(|draw| draw.slot < 4));
    }
}
