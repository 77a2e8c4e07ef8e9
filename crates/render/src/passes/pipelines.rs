//! Pipeline and descriptor layout creation for the four passes.
//!
//! Everything here is built once at startup from SPIR-V on disk and the
//! swapchain format; only a configuration change (sample count) forces a
//! rebuild.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use dreams_rhi::descriptor::{
    combined_image_sampler_binding, uniform_buffer_dynamic_binding, DescriptorSetLayout,
};
use dreams_rhi::device::Device;
use dreams_rhi::pipeline::{
    ColorBlendAttachment, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
    PrimitiveTopology,
};
use dreams_rhi::shader::{Shader, ShaderStage};
use dreams_rhi::vertex::{MeshVertex, OverlayVertex};

use crate::error::RenderResult;
use crate::pool::{COLOR_FORMAT, DEPTH_FORMAT, SHADE_FORMAT};

/// All pipelines and layouts used by the pass graph.
pub struct PassPipelines {
    scene_set_layout: DescriptorSetLayout,
    texture_set_layout: DescriptorSetLayout,
    shading_set_layout: DescriptorSetLayout,
    shadow_map_set_layout: DescriptorSetLayout,
    overlay_set_layout: DescriptorSetLayout,

    /// Shadow pass layout: camera + object records.
    pub shadow_pipeline_layout: PipelineLayout,
    /// Geometry pass layout: camera + object records, then the texture set.
    pub geometry_pipeline_layout: PipelineLayout,
    /// Lighting pass layout: shading set, then the per-light shadow map.
    pub shading_pipeline_layout: PipelineLayout,
    /// Overlay pass layout: the glyph atlas.
    pub overlay_pipeline_layout: PipelineLayout,

    /// Depth-only, front-face culled shadow pipeline.
    pub shadow: Pipeline,
    /// Multisampled G-buffer pipeline.
    pub geometry: Pipeline,
    /// Line-list wireframe pipeline for collision boxes.
    pub hitbox: Pipeline,
    /// Additive full-screen lighting pipeline.
    pub shading: Pipeline,
    /// Alpha-blended glyph quad pipeline.
    pub overlay: Pipeline,
}

impl PassPipelines {
    /// Builds every pass pipeline.
    ///
    /// `shader_dir` must hold the compiled `*.spv` files; `swapchain_format`
    /// is the lighting and overlay passes' color target format.
    ///
    /// # Errors
    ///
    /// Returns an error if a shader is missing or any creation fails —
    /// fatal at startup.
    pub fn new(
        device: Arc<Device>,
        swapchain_format: vk::Format,
        samples: vk::SampleCountFlags,
        shader_dir: &Path,
    ) -> RenderResult<Self> {
        let scene_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[
                uniform_buffer_dynamic_binding(0, vk::ShaderStageFlags::VERTEX),
                uniform_buffer_dynamic_binding(1, vk::ShaderStageFlags::VERTEX),
            ],
        )?;
        let texture_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[combined_image_sampler_binding(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let shading_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[
                combined_image_sampler_binding(0, vk::ShaderStageFlags::FRAGMENT),
                combined_image_sampler_binding(1, vk::ShaderStageFlags::FRAGMENT),
                uniform_buffer_dynamic_binding(2, vk::ShaderStageFlags::FRAGMENT),
            ],
        )?;
        let shadow_map_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[combined_image_sampler_binding(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let overlay_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[combined_image_sampler_binding(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;

        let shadow_pipeline_layout =
            PipelineLayout::new(device.clone(), &[scene_set_layout.handle()])?;
        let geometry_pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[scene_set_layout.handle(), texture_set_layout.handle()],
        )?;
        let shading_pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[shading_set_layout.handle(), shadow_map_set_layout.handle()],
        )?;
        let overlay_pipeline_layout =
            PipelineLayout::new(device.clone(), &[overlay_set_layout.handle()])?;

        let load = |name: &str, stage: ShaderStage| {
            Shader::from_spirv_file(device.clone(), &shader_dir.join(name), stage)
        };

        let shadow_vert = load("shadow.vert.spv", ShaderStage::Vertex)?;
        let shadow_frag = load("shadow.frag.spv", ShaderStage::Fragment)?;
        let geometry_vert = load("geometry.vert.spv", ShaderStage::Vertex)?;
        let geometry_frag = load("geometry.frag.spv", ShaderStage::Fragment)?;
        let hitbox_vert = load("hitbox.vert.spv", ShaderStage::Vertex)?;
        let hitbox_frag = load("hitbox.frag.spv", ShaderStage::Fragment)?;
        let shade_vert = load("shade.vert.spv", ShaderStage::Vertex)?;
        let shade_frag = load("shade.frag.spv", ShaderStage::Fragment)?;
        let overlay_vert = load("overlay.vert.spv", ShaderStage::Vertex)?;
        let overlay_frag = load("overlay.frag.spv", ShaderStage::Fragment)?;

        let shadow = GraphicsPipelineBuilder::new()
            .vertex_shader(&shadow_vert)
            .fragment_shader(&shadow_frag)
            .vertex_binding(MeshVertex::binding_description())
            .vertex_attributes(&MeshVertex::attribute_descriptions())
            .cull_mode(CullMode::Front)
            .depth_attachment_format(DEPTH_FORMAT)
            .build(device.clone(), &shadow_pipeline_layout)?;

        let geometry = GraphicsPipelineBuilder::new()
            .vertex_shader(&geometry_vert)
            .fragment_shader(&geometry_frag)
            .vertex_binding(MeshVertex::binding_description())
            .vertex_attributes(&MeshVertex::attribute_descriptions())
            .rasterization_samples(samples)
            .color_attachment_format(COLOR_FORMAT)
            .color_attachment_format(SHADE_FORMAT)
            .depth_attachment_format(DEPTH_FORMAT)
            .build(device.clone(), &geometry_pipeline_layout)?;

        let hitbox = GraphicsPipelineBuilder::new()
            .vertex_shader(&hitbox_vert)
            .fragment_shader(&hitbox_frag)
            .topology(PrimitiveTopology::LineList)
            .polygon_mode(vk::PolygonMode::LINE)
            .cull_mode(CullMode::None)
            .line_width(5.0)
            .rasterization_samples(samples)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .color_attachment_format(COLOR_FORMAT)
            .color_attachment_format(SHADE_FORMAT)
            .depth_attachment_format(DEPTH_FORMAT)
            .build(device.clone(), &geometry_pipeline_layout)?;

        let shading = GraphicsPipelineBuilder::new()
            .vertex_shader(&shade_vert)
            .fragment_shader(&shade_frag)
            .cull_mode(CullMode::None)
            .depth_test(false, false)
            .color_blend_attachment(ColorBlendAttachment::additive())
            .color_attachment_format(swapchain_format)
            .build(device.clone(), &shading_pipeline_layout)?;

        let overlay = GraphicsPipelineBuilder::new()
            .vertex_shader(&overlay_vert)
            .fragment_shader(&overlay_frag)
            .vertex_binding(OverlayVertex::binding_description())
            .vertex_attributes(&OverlayVertex::attribute_descriptions())
            .cull_mode(CullMode::None)
            .depth_test(false, false)
            .color_blend_attachment(ColorBlendAttachment::alpha())
            .color_attachment_format(swapchain_format)
            .build(device.clone(), &overlay_pipeline_layout)?;

        info!("Pass pipelines created");

        Ok(Self {
            scene_set_layout,
            texture_set_layout,
            shading_set_layout,
            shadow_map_set_layout,
            overlay_set_layout,
            shadow_pipeline_layout,
            geometry_pipeline_layout,
            shading_pipeline_layout,
            overlay_pipeline_layout,
            shadow,
            geometry,
            hitbox,
            shading,
            overlay,
        })
    }

    /// Camera + object set layout handle.
    #[inline]
    pub fn scene_set_layout(&self) -> vk::DescriptorSetLayout {
        self.scene_set_layout.handle()
    }

    /// Texture set layout handle, for the asset library.
    #[inline]
    pub fn texture_set_layout(&self) -> vk::DescriptorSetLayout {
        self.texture_set_layout.handle()
    }

    /// Shading set layout handle.
    #[inline]
    pub fn shading_set_layout(&self) -> vk::DescriptorSetLayout {
        self.shading_set_layout.handle()
    }

    /// Shadow map set layout handle.
    #[inline]
    pub fn shadow_map_set_layout(&self) -> vk::DescriptorSetLayout {
        self.shadow_map_set_layout.handle()
    }

    /// Overlay set layout handle, for the text renderer.
    #[inline]
    pub fn overlay_set_layout(&self) -> vk::DescriptorSetLayout {
        self.overlay_set_layout.handle()
    }
}
