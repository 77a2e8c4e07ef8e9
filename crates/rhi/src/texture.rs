//! Sampled textures.
//!
//! Textures are uploaded once at load time through a staging buffer and a
//! one-shot command submission, then live in shader-read-only layout for the
//! rest of the run.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandPool, ImageBarrier};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// A sampled 2D texture in shader-read-only layout.
pub struct Texture {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    extent: vk::Extent2D,
}

impl Texture {
    /// Creates a texture from tightly packed RGBA8 pixels and uploads them.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not match the dimensions or any
    /// Vulkan operation fails.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> RhiResult<Self> {
        Self::upload(
            device,
            pool,
            width,
            height,
            data,
            vk::Format::R8G8B8A8_SRGB,
            4,
        )
    }

    /// Creates a single-channel texture, used for the glyph atlas coverage
    /// masks.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not match the dimensions or any
    /// Vulkan operation fails.
    pub fn from_r8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> RhiResult<Self> {
        Self::upload(device, pool, width, height, data, vk::Format::R8_UNORM, 1)
    }

    fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        data: &[u8],
        format: vk::Format,
        bytes_per_pixel: usize,
    ) -> RhiResult<Self> {
        let expected = width as usize * height as usize * bytes_per_pixel;
        if data.len() != expected {
            return Err(RhiError::OutOfBounds(format!(
                "texture data is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "texture",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, data)?;

        pool.submit_once(device.graphics_queue(), |cmd| {
            cmd.image_barrier(ImageBarrier {
                image,
                aspect: vk::ImageAspectFlags::COLOR,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
            });
            cmd.copy_buffer_to_image(staging.handle(), image, width, height);
            cmd.image_barrier(ImageBarrier {
                image,
                aspect: vk::ImageAspectFlags::COLOR,
                old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
            });
        })?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!("Uploaded {}x{} texture ({:?})", width, height, format);

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            extent: vk::Extent2D { width, height },
        })
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the texture extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free texture allocation: {:?}", e);
            }
        }

        debug!("Destroyed texture");
    }
}
