//! Overlay pass.
//!
//! Loads the swapchain image with the lighting output intact, lets the
//! caller issue text draws through an [`OverlayContext`] that only exists
//! while the pass is open, then stores the image back for presentation.

use ash::vk;

use dreams_rhi::command::{CommandBuffer, ImageBarrier};
use dreams_rhi::rendering::{ColorAttachment, RenderingConfig};

use crate::error::RenderResult;
use crate::passes::pipelines::PassPipelines;
use crate::text::{OverlayContext, TextRenderer};

/// Records the overlay pass for `frame`, invoking `draw` with the open
/// overlay context, and leaves the swapchain image ready for presentation.
///
/// # Errors
///
/// Returns an error if flushing the glyph vertices fails.
pub fn record<F>(
    cmd: &CommandBuffer,
    pipelines: &PassPipelines,
    text: &mut TextRenderer,
    frame: usize,
    extent: vk::Extent2D,
    swapchain_image: vk::Image,
    swapchain_view: vk::ImageView,
    draw: F,
) -> RenderResult<()>
where
    F: FnOnce(&mut OverlayContext),
{
    text.begin_frame();
    {
        let mut context = OverlayContext::new(text);
        draw(&mut context);
    }
    let vertex_count = text.flush(frame)?;

    let config = RenderingConfig::from_extent(extent)
        .with_color_attachment(ColorAttachment::new(swapchain_view).load());
    let bundle = config.build();

    cmd.set_viewport_scissor(extent);
    cmd.begin_rendering(&bundle.info());

    if vertex_count > 0 {
        cmd.bind_pipeline(pipelines.overlay.handle());
        cmd.bind_descriptor_sets(
            pipelines.overlay_pipeline_layout.handle(),
            0,
            &[text.descriptor_set()],
            &[],
        );
        cmd.bind_vertex_buffers(&[text.vertex_buffer(frame)], &[0]);
        cmd.draw(vertex_count, 1, 0);
    }

    cmd.end_rendering();

    // Ready for presentation.
    cmd.image_barrier(ImageBarrier {
        image: swapchain_image,
        aspect: vk::ImageAspectFlags::COLOR,
        old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        src_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dst_access: vk::AccessFlags::empty(),
    });

    Ok(())
}
