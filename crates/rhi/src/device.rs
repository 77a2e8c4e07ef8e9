//! Vulkan logical device and queue management.
//!
//! The [`Device`] owns the logical device, the graphics and present queues,
//! and the gpu-allocator instance. It is shared across the renderer through
//! `Arc`; the allocator sits behind a `Mutex` for thread-safe allocation.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilies};

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Fraction of GPU memory usage reported by [`Device::memory_usage`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryUsage {
    /// Bytes currently allocated by the renderer.
    pub allocated: u64,
    /// Bytes reserved from the driver by the allocator.
    pub reserved: u64,
}

impl MemoryUsage {
    /// Allocated fraction of reserved memory in `[0, 1]`; zero when nothing
    /// is reserved yet.
    pub fn fraction(&self) -> f64 {
        if self.reserved == 0 {
            0.0
        } else {
            self.allocated as f64 / self.reserved as f64
        }
    }
}

/// Vulkan logical device wrapper.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// GPU memory allocator. Dropped explicitly before the device it
    /// allocates from.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle.
    present_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilies,
    /// Minimum alignment for dynamic uniform buffer offsets.
    min_uniform_offset_alignment: u64,
}

impl Device {
    /// Creates the logical device with the features the renderer depends on:
    /// dynamic rendering and synchronization2 (Vulkan 1.3), anisotropic
    /// sampling, non-solid fill and wide lines for the hitbox pass.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_families = physical_device_info.queue_families;
        let unique_families = queue_families.unique();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!("Creating queues for families {:?}", unique_families);

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let features = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .fill_mode_non_solid(true)
            .wide_lines(true);

        let extension_names: Vec<*const i8> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };
        info!("Logical device created");

        let graphics_queue =
            unsafe { device.get_device_queue(queue_families.graphics.unwrap_or(0), 0) };
        let present_queue =
            unsafe { device.get_device_queue(queue_families.present.unwrap_or(0), 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
            min_uniform_offset_alignment: physical_device_info.min_uniform_offset_alignment(),
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the present queue.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    /// Returns the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Minimum alignment for dynamic uniform buffer offsets, from the device
    /// limits. Uniform record strides are rounded up to this.
    #[inline]
    pub fn min_uniform_offset_alignment(&self) -> u64 {
        self.min_uniform_offset_alignment
    }

    /// Current GPU memory usage as tracked by the allocator, for the memory
    /// budget overlay readout.
    pub fn memory_usage(&self) -> MemoryUsage {
        let allocator = self.allocator.lock().unwrap();
        let report = allocator.generate_report();
        MemoryUsage {
            allocated: report.total_allocated_bytes,
            reserved: report.total_reserved_bytes,
        }
    }

    /// Blocks until the device is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails, which indicates device loss.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            // The allocator must release its memory blocks while the device
            // is still alive.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_usage_fraction() {
        let empty = MemoryUsage::default();
        assert_eq!(empty.fraction(), 0.0);

        let half = MemoryUsage {
            allocated: 512,
            reserved: 1024,
        };
        assert!((half.fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
