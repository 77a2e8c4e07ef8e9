//! Lighting-accumulation pass.
//!
//! Single-sample, writing straight into the swapchain image. Every assigned
//! light slot contributes one full-screen draw that samples the resolved
//! G-buffer, reconstructs world position from depth through the inverse
//! camera matrix, applies its shadow map, and adds its contribution with
//! ONE/ONE additive blending — the blend is the accumulation.

use ash::vk;

use dreams_rhi::command::{CommandBuffer, ImageBarrier};
use dreams_rhi::rendering::{ColorAttachment, RenderingConfig};
use dreams_scene::{EntityId, Scene};

use crate::error::RenderResult;
use crate::passes::pipelines::PassPipelines;
use crate::pool::ResourcePool;
use crate::slots::FrameSlots;

/// One light's full-screen contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightDraw {
    /// Light entity.
    pub entity: EntityId,
    /// Light slot, addressing its shading record and shadow map set.
    pub slot: usize,
}

/// The frame's lighting pass, ordered by light slot.
#[derive(Clone, Debug, Default)]
pub struct LightingPlan {
    pub draws: Vec<LightDraw>,
}

impl LightingPlan {
    /// Plans one draw per assigned light slot.
    pub fn build(scene: &Scene, slots: &FrameSlots) -> Self {
        let mut draws: Vec<LightDraw> = scene
            .lights()
            .filter_map(|view| {
                slots.light(view.entity).map(|slot| LightDraw {
                    entity: view.entity,
                    slot,
                })
            })
            .collect();
        draws.sort_by_key(|draw| draw.slot);
        Self { draws }
    }
}

/// Records the lighting pass for `frame` into `swapchain_image`.
///
/// The swapchain image is cleared on entry and left in color-attachment
/// layout for the overlay pass.
///
/// # Errors
///
/// Returns an error if a light slot offset is out of range.
pub fn record(
    cmd: &CommandBuffer,
    pool: &ResourcePool,
    pipelines: &PassPipelines,
    frame: usize,
    plan: &LightingPlan,
    swapchain_image: vk::Image,
    swapchain_view: vk::ImageView,
) -> RenderResult<()> {
    let resources = pool.frame(frame);
    let extent = pool.extent();

    cmd.image_barrier(ImageBarrier {
        image: swapchain_image,
        aspect: vk::ImageAspectFlags::COLOR,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    });

    let config = RenderingConfig::from_extent(extent)
        .with_color_attachment(ColorAttachment::new(swapchain_view));
    let bundle = config.build();

    cmd.set_viewport_scissor(extent);
    cmd.begin_rendering(&bundle.info());
    cmd.bind_pipeline(pipelines.shading.handle());

    for draw in &plan.draws {
        cmd.bind_descriptor_sets(
            pipelines.shading_pipeline_layout.handle(),
            0,
            &[resources.shading_set],
            &[pool.light_offset(draw.slot)?],
        );
        cmd.bind_descriptor_sets(
            pipelines.shading_pipeline_layout.handle(),
            1,
            &[resources.shadow_map_sets[draw.slot]],
            &[],
        );
        // Full-screen quad as two triangles, generated in the vertex shader.
        cmd.draw(6, 1, 0);
    }

    cmd.end_rendering();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreams_scene::Light;
    use crate::{MAX_LIGHTS, MAX_OBJECTS};

    #[test]
    fn test_one_draw_per_light_slot() {
        let mut scene = Scene::new();
        for _ in 0..3 {
            let id = scene.spawn();
            scene.set_light(id, Light::default());
        }

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = LightingPlan::build(&scene, &slots);

        assert_eq!(plan.draws.len(), 3);
        let ordered: Vec<usize> = plan.draws.iter().map(|draw| draw.slot).collect();
        assert_eq!(ordered, vec![0, 1, 2]);
    }

    #[test]
    fn test_excess_lights_do_not_reach_the_pass() {
        let mut scene = Scene::new();
        for _ in 0..MAX_LIGHTS + 5 {
            let id = scene.spawn();
            scene.set_light(id, Light::default());
        }

        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = LightingPlan::build(&scene, &slots);

        assert_eq!(plan.draws.len(), MAX_LIGHTS);
        assert!(plan.draws.iter().all(|draw| draw.slot < MAX_LIGHTS));
    }

    #[test]
    fn test_no_lights_means_no_draws() {
        let scene = Scene::new();
        let slots = FrameSlots::assign(&scene, MAX_OBJECTS, MAX_LIGHTS);
        let plan = LightingPlan::build(&scene, &slots);
        assert!(plan.draws.is_empty());
    }
}
