//! Shadow pass: one depth-only sub-invocation per light slot.
//!
//! Each assigned light renders every shadow-casting renderable into its own
//! depth map at the configured shadow resolution, front-face culled, using
//! an orthographic frustum looking from the light position toward the
//! origin. The maps transition to shader-read at the end of the pass for
//! the lighting pass to sample.

use ash::vk;

use dreams_resources::CameraRecord;
use dreams_rhi::command::{CommandBuffer, ImageBarrier};
use dreams_rhi::rendering::{DepthAttachment, RenderingConfig};
use dreams_scene::{EntityId, Scene};

use crate::assets::AssetLibrary;
use crate::error::{RenderError, RenderResult};
use crate::passes::pipelines::PassPipelines;
use crate::passes::ObjectDraw;
use crate::pool::ResourcePool;
use crate::slots::FrameSlots;

/// One light's shadow rendering: its slot, shadow camera and draw list.
#[derive(Clone, Debug)]
pub struct ShadowLightPass {
    /// Light entity.
    pub entity: EntityId,
    /// Light slot, addressing the shadow map and shadow-camera record.
    pub slot: usize,
    /// Orthographic shadow camera for this light.
    pub camera: CameraRecord,
    /// Shadow casters to draw, empty when the light casts no shadows.
    pub draws: Vec<ObjectDraw>,
}

/// The frame's complete shadow pass, ordered by light slot.
#[derive(Clone, Debug, Default)]
pub struct ShadowPlan {
    pub lights: Vec<ShadowLightPass>,
}

impl ShadowPlan {
    /// Plans the shadow pass from the scene snapshot.
    ///
    /// Lights without a slot (beyond capacity) are absent; a light with the
    /// cast-shadow flag cleared keeps its slot and cleared map but draws
    /// nothing into it.
    pub fn build(scene: &Scene, slots: &FrameSlots) -> Self {
        let casters: Vec<ObjectDraw> = scene
            .renderables()
            .filter(|view| view.renderable.shadow_caster)
            .filter_map(|view| {
                slots.object(view.entity).map(|slot| ObjectDraw {
                    entity: view.entity,
                    slot,
                    model: view.renderable.model,
                    texture: view.renderable.texture,
                })
            })
            .collect();

        let mut lights: Vec<ShadowLightPass> = scene
            .lights()
            .filter_map(|view| {
                let slot = slots.light(view.entity)?;
                let camera = CameraRecord::new(
                    view.light.shadow_projection(),
                    view.light.shadow_view(view.position.to_vec3()),
                );
                let draws = if view.light.cast_shadow {
                    casters.clone()
                } else {
                    Vec::new()
                };
                Some(ShadowLightPass {
                    entity: view.entity,
                    slot,
                    camera,
                    draws,
                })
            })
            .collect();
        lights.sort_by_key(|pass| pass.slot);

        Self { lights }
    }

    /// Total draws across all lights.
    pub fn total_draws(&self) -> usize {
        self.lights.iter().map(|light| light.draws.len()).sum()
    }
}

/// Records the shadow pass for `frame`.
///
/// # Errors
///
/// Returns an error if a draw references an unknown model or a slot offset
/// is out of range.
pub fn record(
    cmd: &CommandBuffer,
    pool: &ResourcePool,
    pipelines: &PassPipelines,
    assets: &AssetLibrary,
    frame: usize,
    plan: &ShadowPlan,
) -> RenderResult<()> {
    let resources = pool.frame(frame);
    let resolution = pool.shadow_resolution();
    let extent = vk::Extent2D {
        width: resolution,
        height: resolution,
    };

    cmd.set_viewport_scissor(extent);

    for light in &plan.lights {
        let map = &resources.shadow_maps[light.slot];

        // Discard last frame's contents; the clear provides this frame's.
        cmd.image_barrier(ImageBarrier {
            image: map.image(),
            aspect: vk::ImageAspectFlags::DEPTH,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        });

        let config = RenderingConfig::new(resolution, resolution)
            .with_depth_attachment(DepthAttachment::new(map.view()).store());
        let bundle = config.build();

        cmd.begin_rendering(&bundle.info());
        cmd.bind_pipeline(pipelines.shadow.handle());

        for draw in &light.draws {
            let model = assets
                .model(draw.model)
                .ok_or_else(|| RenderError::UnknownAsset(format!("model {:?}", draw.model)))?;

            cmd.bind_vertex_buffers(&[model.vertex_buffer.handle()], &[0]);
            cmd.bind_index_buffer(model.index_buffer.handle(), 0);
            cmd.bind_descriptor_sets(
                pipelines.shadow_pipeline_layout.handle(),
                0,
                &[resources.shadow_set],
                &[
                    pool.shadow_camera_offset(light.slot)?,
                    pool.object_offset(draw.slot)?,
                ],
            );
            cmd.draw_indexed(model.index_count, 1);
        }

        cmd.end_rendering();

        // Hand the map to the lighting pass's fragment reads.
        cmd.image_barrier(ImageBarrier {
            image: map.image(),
            aspect: vk::ImageAspectFlags::DEPTH,
            old_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_stage: vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreams_scene::{Light, ModelRef, Position, Renderable, TextureRef};
    use glam::Vec3;
    use crate::{MAX_LIGHTS, MAX_OBJECTS};

    fn caster(scene: &mut Scene) -> EntityId {
        let id = scene.spawn();
        scene.set_renderable(id, Renderable::new(ModelRef(0), TextureRef(0)));
        id
    }

    #[test]
    fn test_one_light_draws_only_shadow_casters() {
        let mut scene = Scene::new();
        let light = scene.spawn();
        scene.set_position(light, Position::new(20.0, 35.0, 20.0));
        scene.set_light(light, Light::new(Vec3::NEG_Y, Vec3::ONE, 1.0, 50.0));

        let _casts = caster(&mut scene);
        let no_shadow = scene.spawn();
        scene.set_renderable(
            no_shadow,
            Renderable::new(ModelRef(1), TextureRef(0)).with_shadow_caster(false),
        );

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = ShadowPlan::build(&scene, &slots);

        // Exactly one light invocation, drawing exactly the one caster.
        assert_eq!(plan.lights.len(), 1);
        assert_eq!(plan.lights[0].slot, 0);
        assert_eq!(plan.lights[0].draws.len(), 1);
        assert_eq!(plan.total_draws(), 1);
    }

    #[test]
    fn test_non_casting_light_keeps_slot_with_empty_draws() {
        let mut scene = Scene::new();
        let light = scene.spawn();
        let mut params = Light::default();
        params.cast_shadow = false;
        scene.set_light(light, params);
        caster(&mut scene);

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = ShadowPlan::build(&scene, &slots);

        assert_eq!(plan.lights.len(), 1);
        assert!(plan.lights[0].draws.is_empty());
    }

    #[test]
    fn test_lights_beyond_capacity_are_absent() {
        let mut scene = Scene::new();
        for _ in 0..MAX_LIGHTS + 3 {
            let id = scene.spawn();
            scene.set_light(id, Light::default());
        }
        caster(&mut scene);

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = ShadowPlan::build(&scene, &slots);

        assert_eq!(plan.lights.len(), MAX_LIGHTS);
        // Slots are dense and ordered.
        let ordered: Vec<usize> = plan.lights.iter().map(|l| l.slot).collect();
        assert_eq!(ordered, (0..MAX_LIGHTS).collect::<Vec<_>>());
    }

    #[test]
    fn test_shadow_camera_faces_origin() {
        let mut scene = Scene::new();
        let light = scene.spawn();
        scene.set_position(light, Position::new(0.0, 10.0, 0.0));
        scene.set_light(light, Light::new(Vec3::NEG_Y, Vec3::ONE, 1.0, 50.0));

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = ShadowPlan::build(&scene, &slots);

        let camera = &plan.lights[0].camera;
        let origin_clip = camera.view_projection().project_point3(Vec3::ZERO);
        // The origin lands in the center of the shadow frustum.
        assert!(origin_clip.x.abs() < 1e-5);
        assert!(origin_clip.y.abs() < 1e-5);
        assert!(origin_clip.z > 0.0 && origin_clip.z < 1.0);
    }
}
