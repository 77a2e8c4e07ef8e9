//! Per-frame-in-flight resource pool.
//!
//! One [`FrameResources`] exists per frame in flight: the multisampled
//! G-buffer attachments, their single-sample resolve images, one shadow map
//! per light slot, four persistently mapped uniform regions, and the
//! descriptor sets bound to all of the above. Everything is allocated at
//! swapchain (re)configuration time and destroyed together; per frame only
//! the mapped uniform contents change.
//!
//! Uniform writes go through [`RecordLayout`] offsets, so a slot index past
//! its capacity is an error before it is a memory write.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use dreams_core::RenderConfig;
use dreams_resources::{CameraRecord, LightRecord, ObjectRecord, RecordLayout};
use dreams_rhi::buffer::{Buffer, BufferUsage};
use dreams_rhi::descriptor::{self, DescriptorPool};
use dreams_rhi::device::Device;
use dreams_rhi::image::{sample_count_flags, AttachmentImage};
use dreams_rhi::sampler::Sampler;

use crate::error::RenderResult;
use crate::passes::pipelines::PassPipelines;
use crate::{MAX_LIGHTS, MAX_OBJECTS};

/// G-buffer color format (matches the swapchain-independent albedo target).
pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;
/// Linear HDR accumulation format for the shade target.
pub const SHADE_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;
/// Depth format for the geometry pass and the shadow maps.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Record layouts for the four uniform regions, strides aligned to the
/// device's dynamic-offset requirement.
#[derive(Clone, Copy, Debug)]
pub struct PoolLayouts {
    /// One camera record.
    pub camera: RecordLayout<CameraRecord>,
    /// One shadow camera per light slot.
    pub shadow_cameras: RecordLayout<CameraRecord>,
    /// One transform+bounds record per object slot.
    pub objects: RecordLayout<ObjectRecord>,
    /// One shading record per light slot.
    pub lights: RecordLayout<LightRecord>,
}

impl PoolLayouts {
    /// Layouts aligned for dynamic descriptor offsets.
    pub fn new(alignment: usize) -> Self {
        Self {
            camera: RecordLayout::with_alignment(1, alignment),
            shadow_cameras: RecordLayout::with_alignment(MAX_LIGHTS, alignment),
            objects: RecordLayout::with_alignment(MAX_OBJECTS, alignment),
            lights: RecordLayout::with_alignment(MAX_LIGHTS, alignment),
        }
    }
}

/// GPU resources for one frame in flight.
pub struct FrameResources {
    /// Multisampled albedo attachment.
    pub color: AttachmentImage,
    /// Multisampled HDR shade attachment.
    pub shade: AttachmentImage,
    /// Multisampled depth attachment.
    pub depth: AttachmentImage,
    /// Single-sample resolve target for `color`, read by the lighting pass.
    pub resolve_color: AttachmentImage,
    /// Single-sample resolve target for `shade`, read by the lighting pass.
    pub resolve_shade: AttachmentImage,
    /// One depth-only shadow map per light slot.
    pub shadow_maps: Vec<AttachmentImage>,

    camera_buffer: Buffer,
    shadow_camera_buffer: Buffer,
    object_buffer: Buffer,
    light_buffer: Buffer,

    /// Camera + object bindings for the geometry pass.
    pub geometry_set: vk::DescriptorSet,
    /// Shadow-camera + object bindings for the shadow pass.
    pub shadow_set: vk::DescriptorSet,
    /// Resolved G-buffer + light record bindings for the lighting pass.
    pub shading_set: vk::DescriptorSet,
    /// One shadow-map binding per light slot for the lighting pass.
    pub shadow_map_sets: Vec<vk::DescriptorSet>,
}

/// The pool of all per-frame GPU state.
pub struct ResourcePool {
    layouts: PoolLayouts,
    frames: Vec<FrameResources>,
    // Held for the descriptor sets' lifetime.
    _descriptor_pool: DescriptorPool,
    shadow_sampler: Sampler,
    gbuffer_sampler: Sampler,
    extent: vk::Extent2D,
    shadow_resolution: u32,
    samples: vk::SampleCountFlags,
}

impl ResourcePool {
    /// Allocates every per-frame resource for `frame_count` frames at the
    /// given swapchain extent.
    ///
    /// Failure here is fatal for startup or reconfiguration; nothing is
    /// retried per frame.
    ///
    /// # Errors
    ///
    /// Returns an error if any allocation or descriptor operation fails.
    pub fn new(
        device: Arc<Device>,
        pipelines: &PassPipelines,
        config: &RenderConfig,
        extent: vk::Extent2D,
        frame_count: usize,
    ) -> RenderResult<Self> {
        let samples = sample_count_flags(config.sample_count)?;
        let layouts = PoolLayouts::new(device.min_uniform_offset_alignment() as usize);

        let shadow_sampler = Sampler::shadow(device.clone())?;
        let gbuffer_sampler = Sampler::texture(device.clone())?;

        // Fixed descriptor demand: three uniform-backed sets plus one
        // shadow-map set per light slot, per frame.
        let frame_count_u32 = frame_count as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .descriptor_count(5 * frame_count_u32),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count((2 + MAX_LIGHTS as u32) * frame_count_u32),
        ];
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            (3 + MAX_LIGHTS as u32) * frame_count_u32,
            &pool_sizes,
        )?;

        let mut frames = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            frames.push(FrameResources::new(
                &device,
                pipelines,
                &descriptor_pool,
                &layouts,
                &shadow_sampler,
                &gbuffer_sampler,
                extent,
                config.shadow_resolution,
                samples,
            )?);
        }

        info!(
            "Resource pool created: {} frame(s), {}x{}, {} shadow maps each at {}^2",
            frame_count, extent.width, extent.height, MAX_LIGHTS, config.shadow_resolution
        );

        Ok(Self {
            layouts,
            frames,
            _descriptor_pool: descriptor_pool,
            shadow_sampler,
            gbuffer_sampler,
            extent,
            shadow_resolution: config.shadow_resolution,
            samples,
        })
    }

    /// Resources for frame slot `frame`.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is out of range.
    #[inline]
    pub fn frame(&self, frame: usize) -> &FrameResources {
        &self.frames[frame]
    }

    /// Number of frame slots.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The uniform record layouts.
    #[inline]
    pub fn layouts(&self) -> &PoolLayouts {
        &self.layouts
    }

    /// Swapchain extent the attachments were sized for.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Shadow map resolution.
    #[inline]
    pub fn shadow_resolution(&self) -> u32 {
        self.shadow_resolution
    }

    /// Geometry-pass sample count.
    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    /// Writes the scene camera record for `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is out of bounds.
    pub fn write_camera(&self, frame: usize, record: &CameraRecord) -> RenderResult<()> {
        let offset = self.layouts.camera.byte_offset(0)?;
        self.frames[frame]
            .camera_buffer
            .write_data(offset as u64, bytemuck::bytes_of(record))?;
        Ok(())
    }

    /// Writes the shadow camera record for light `slot` in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range.
    pub fn write_shadow_camera(
        &self,
        frame: usize,
        slot: usize,
        record: &CameraRecord,
    ) -> RenderResult<()> {
        let offset = self.layouts.shadow_cameras.byte_offset(slot)?;
        self.frames[frame]
            .shadow_camera_buffer
            .write_data(offset as u64, bytemuck::bytes_of(record))?;
        Ok(())
    }

    /// Writes the object record for object `slot` in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range.
    pub fn write_object(
        &self,
        frame: usize,
        slot: usize,
        record: &ObjectRecord,
    ) -> RenderResult<()> {
        let offset = self.layouts.objects.byte_offset(slot)?;
        self.frames[frame]
            .object_buffer
            .write_data(offset as u64, bytemuck::bytes_of(record))?;
        Ok(())
    }

    /// Writes the shading record for light `slot` in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range.
    pub fn write_light(&self, frame: usize, slot: usize, record: &LightRecord) -> RenderResult<()> {
        let offset = self.layouts.lights.byte_offset(slot)?;
        self.frames[frame]
            .light_buffer
            .write_data(offset as u64, bytemuck::bytes_of(record))?;
        Ok(())
    }

    /// Dynamic offset of object `slot` for descriptor binds.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range.
    pub fn object_offset(&self, slot: usize) -> RenderResult<u32> {
        Ok(self.layouts.objects.dynamic_offset(slot)?)
    }

    /// Dynamic offset of shadow camera `slot` for descriptor binds.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range.
    pub fn shadow_camera_offset(&self, slot: usize) -> RenderResult<u32> {
        Ok(self.layouts.shadow_cameras.dynamic_offset(slot)?)
    }

    /// Dynamic offset of light `slot` for descriptor binds.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range.
    pub fn light_offset(&self, slot: usize) -> RenderResult<u32> {
        Ok(self.layouts.lights.dynamic_offset(slot)?)
    }
}

impl FrameResources {
    #[allow(clippy::too_many_arguments)]
    fn new(
        device: &Arc<Device>,
        pipelines: &PassPipelines,
        descriptor_pool: &DescriptorPool,
        layouts: &PoolLayouts,
        shadow_sampler: &Sampler,
        gbuffer_sampler: &Sampler,
        extent: vk::Extent2D,
        shadow_resolution: u32,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let color = AttachmentImage::new(
            device.clone(),
            extent.width,
            extent.height,
            COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
            samples,
            vk::ImageAspectFlags::COLOR,
        )?;
        let shade = AttachmentImage::new(
            device.clone(),
            extent.width,
            extent.height,
            SHADE_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
            samples,
            vk::ImageAspectFlags::COLOR,
        )?;
        let depth = AttachmentImage::new(
            device.clone(),
            extent.width,
            extent.height,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            samples,
            vk::ImageAspectFlags::DEPTH,
        )?;
        let resolve_color = AttachmentImage::new(
            device.clone(),
            extent.width,
            extent.height,
            COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageAspectFlags::COLOR,
        )?;
        let resolve_shade = AttachmentImage::new(
            device.clone(),
            extent.width,
            extent.height,
            SHADE_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageAspectFlags::COLOR,
        )?;

        let mut shadow_maps = Vec::with_capacity(MAX_LIGHTS);
        for _ in 0..MAX_LIGHTS {
            shadow_maps.push(AttachmentImage::new(
                device.clone(),
                shadow_resolution,
                shadow_resolution,
                DEPTH_FORMAT,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                vk::SampleCountFlags::TYPE_1,
                vk::ImageAspectFlags::DEPTH,
            )?);
        }

        let camera_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            layouts.camera.buffer_size() as u64,
        )?;
        let shadow_camera_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            layouts.shadow_cameras.buffer_size() as u64,
        )?;
        let object_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            layouts.objects.buffer_size() as u64,
        )?;
        let light_buffer = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            layouts.lights.buffer_size() as u64,
        )?;

        let scene_layout = pipelines.scene_set_layout();
        let sets =
            descriptor_pool.allocate(&[scene_layout, scene_layout, pipelines.shading_set_layout()])?;
        let geometry_set = sets[0];
        let shadow_set = sets[1];
        let shading_set = sets[2];

        let shadow_map_layouts = vec![pipelines.shadow_map_set_layout(); MAX_LIGHTS];
        let shadow_map_sets = descriptor_pool.allocate(&shadow_map_layouts)?;

        // Bind every set once; contents never move, only the mapped bytes
        // behind them change.
        let camera_info = descriptor::buffer_info(
            camera_buffer.handle(),
            0,
            CameraRecord::SIZE as u64,
        );
        let shadow_camera_info = descriptor::buffer_info(
            shadow_camera_buffer.handle(),
            0,
            CameraRecord::SIZE as u64,
        );
        let object_info =
            descriptor::buffer_info(object_buffer.handle(), 0, ObjectRecord::SIZE as u64);
        let light_info =
            descriptor::buffer_info(light_buffer.handle(), 0, LightRecord::SIZE as u64);
        let resolve_color_info = descriptor::image_info(
            gbuffer_sampler.handle(),
            resolve_color.view(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        let resolve_shade_info = descriptor::image_info(
            gbuffer_sampler.handle(),
            resolve_shade.view(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );

        let mut writes = vec![
            vk::WriteDescriptorSet::default()
                .dst_set(geometry_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(std::slice::from_ref(&camera_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(geometry_set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(std::slice::from_ref(&object_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(shadow_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(std::slice::from_ref(&shadow_camera_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(shadow_set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(std::slice::from_ref(&object_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(shading_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&resolve_color_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(shading_set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&resolve_shade_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(shading_set)
                .dst_binding(2)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(std::slice::from_ref(&light_info)),
        ];

        let shadow_map_infos: Vec<vk::DescriptorImageInfo> = shadow_maps
            .iter()
            .map(|map| {
                descriptor::image_info(
                    shadow_sampler.handle(),
                    map.view(),
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
            })
            .collect();
        for (set, info) in shadow_map_sets.iter().zip(&shadow_map_infos) {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info)),
            );
        }

        descriptor::update_descriptor_sets(device, &writes);

        Ok(Self {
            color,
            shade,
            depth,
            resolve_color,
            resolve_shade,
            shadow_maps,
            camera_buffer,
            shadow_camera_buffer,
            object_buffer,
            light_buffer,
            geometry_set,
            shadow_set,
            shading_set,
            shadow_map_sets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_layouts_capacities() {
        let layouts = PoolLayouts::new(256);
        assert_eq!(layouts.camera.capacity(), 1);
        assert_eq!(layouts.shadow_cameras.capacity(), MAX_LIGHTS);
        assert_eq!(layouts.objects.capacity(), MAX_OBJECTS);
        assert_eq!(layouts.lights.capacity(), MAX_LIGHTS);
    }

    #[test]
    fn test_pool_layouts_strides_are_aligned() {
        let layouts = PoolLayouts::new(256);
        assert_eq!(layouts.objects.stride() % 256, 0);
        assert_eq!(layouts.lights.stride() % 256, 0);
        // A loose alignment leaves the natural stride.
        let natural = PoolLayouts::new(1);
        assert_eq!(natural.objects.stride(), ObjectRecord::SIZE);
    }

    #[test]
    fn test_offsets_reject_out_of_range_slots() {
        let layouts = PoolLayouts::new(64);
        assert!(layouts.lights.dynamic_offset(MAX_LIGHTS - 1).is_ok());
        assert!(layouts.lights.dynamic_offset(MAX_LIGHTS).is_err());
        assert!(layouts.objects.dynamic_offset(MAX_OBJECTS).is_err());
    }
}
