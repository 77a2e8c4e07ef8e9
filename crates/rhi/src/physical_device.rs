//! Physical device (GPU) selection.
//!
//! Enumerates GPUs and selects the one best suited for the renderer:
//! graphics and present queues, Vulkan 1.3 (for dynamic rendering),
//! anisotropic sampling, and non-solid fill (for the hitbox wireframes).

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices used by the renderer.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilies {
    /// Queue family supporting graphics operations.
    pub graphics: Option<u32>,
    /// Queue family supporting presentation to the surface.
    pub present: Option<u32>,
}

impl QueueFamilies {
    /// True when both required families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Unique family indices, for device queue creation.
    pub fn unique(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics {
            families.push(graphics);
        }
        if let Some(present) = self.present {
            if !families.contains(&present) {
                families.push(present);
            }
        }
        families
    }
}

/// Information about a selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices.
    pub queue_families: QueueFamilies,
}

impl PhysicalDeviceInfo {
    /// Device name as reported by the driver.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown")
        }
    }

    /// Minimum alignment for dynamic uniform buffer offsets.
    pub fn min_uniform_offset_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    /// Total device-local memory across all heaps, in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable GPU for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no device passes the checks.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;
    for device in devices {
        let Some(info) = check_suitability(instance, device, surface, surface_loader) else {
            continue;
        };
        let score = rate_device(&info);
        debug!("GPU '{}' scored {}", info.device_name(), score);
        if best.as_ref().is_none_or(|(_, s)| score > *s) {
            best = Some((info, score));
        }
    }

    let (selected, score) = best.ok_or(RhiError::NoSuitableGpu)?;
    info!(
        "Selected GPU: '{}' (score {})",
        selected.device_name(),
        score
    );
    Ok(selected)
}

fn check_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        return None;
    }

    // Anisotropic sampling for textures, non-solid fill for hitbox wireframes.
    if features.sampler_anisotropy == vk::FALSE || features.fill_mode_non_solid == vk::FALSE {
        return None;
    }

    // Dynamic rendering needs Vulkan 1.3.
    if vk::api_version_major(properties.api_version) == 1
        && vk::api_version_minor(properties.api_version) < 3
    {
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilies {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilies::default();
    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }

        if indices.present.is_none() {
            let supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };
            if supported {
                indices.present = Some(i);
            }
        }
    }
    indices
}

/// Higher score wins; discrete GPUs with more VRAM are preferred.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        _ => 10,
    };
    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    score += vram_mb.min(16_000);
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_families_complete() {
        let complete = QueueFamilies {
            graphics: Some(0),
            present: Some(1),
        };
        assert!(complete.is_complete());

        let missing_present = QueueFamilies {
            graphics: Some(0),
            present: None,
        };
        assert!(!missing_present.is_complete());
        assert!(!QueueFamilies::default().is_complete());
    }

    #[test]
    fn test_unique_families_deduplicates() {
        let same = QueueFamilies {
            graphics: Some(0),
            present: Some(0),
        };
        assert_eq!(same.unique(), vec![0]);

        let distinct = QueueFamilies {
            graphics: Some(0),
            present: Some(2),
        };
        assert_eq!(distinct.unique(), vec![0, 2]);
    }
}
