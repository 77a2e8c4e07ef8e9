//! Attachment images.
//!
//! GPU-only images used as render targets: the multisampled G-buffer
//! attachments, their single-sample resolve images, and the per-light shadow
//! maps. Each image owns its view and allocation and destroys them together.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Converts a configured sample count into Vulkan flags.
///
/// # Errors
///
/// Returns an error for counts other than 1, 2, 4 or 8.
pub fn sample_count_flags(samples: u32) -> RhiResult<vk::SampleCountFlags> {
    match samples {
        1 => Ok(vk::SampleCountFlags::TYPE_1),
        2 => Ok(vk::SampleCountFlags::TYPE_2),
        4 => Ok(vk::SampleCountFlags::TYPE_4),
        8 => Ok(vk::SampleCountFlags::TYPE_8),
        other => Err(RhiError::OutOfBounds(format!(
            "unsupported sample count {other}"
        ))),
    }
}

/// A GPU-only image with its view, usable as a render attachment.
pub struct AttachmentImage {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Vulkan image view handle.
    view: vk::ImageView,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Image format.
    format: vk::Format,
    /// Image dimensions.
    extent: vk::Extent2D,
}

impl AttachmentImage {
    /// Creates an attachment image.
    ///
    /// `aspect` selects the view aspect: `COLOR` for color targets, `DEPTH`
    /// for depth targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or any Vulkan object
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
        aspect: vk::ImageAspectFlags,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::OutOfBounds(
                "attachment dimensions must be greater than 0".to_string(),
            ));
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
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "attachment",
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

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created attachment image {}x{} ({:?}, {:?})",
            width, height, format, samples
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            format,
            extent: vk::Extent2D { width, height },
        })
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free attachment allocation: {:?}", e);
            }
        }

        debug!(
            "Destroyed attachment image {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_flags() {
        assert_eq!(sample_count_flags(1).unwrap(), vk::SampleCountFlags::TYPE_1);
        assert_eq!(sample_count_flags(2).unwrap(), vk::SampleCountFlags::TYPE_2);
        assert_eq!(sample_count_flags(4).unwrap(), vk::SampleCountFlags::TYPE_4);
        assert_eq!(sample_count_flags(8).unwrap(), vk::SampleCountFlags::TYPE_8);
        assert!(sample_count_flags(3).is_err());
        assert!(sample_count_flags(16).is_err());
    }
}
