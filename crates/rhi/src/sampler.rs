//! Samplers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan sampler wrapper.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear sampler with repeat addressing, for model textures and the
    /// glyph atlas.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn texture(device: Arc<Device>) -> RhiResult<Self> {
        Self::new(
            device,
            vk::SamplerAddressMode::REPEAT,
            vk::BorderColor::FLOAT_OPAQUE_WHITE,
        )
    }

    /// Linear sampler clamping to an opaque white border, for shadow maps.
    /// Samples outside a light's frustum read as maximum depth, so geometry
    /// out of shadow-map range is lit rather than striped.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn shadow(device: Arc<Device>) -> RhiResult<Self> {
        Self::new(
            device,
            vk::SamplerAddressMode::CLAMP_TO_BORDER,
            vk::BorderColor::FLOAT_OPAQUE_WHITE,
        )
    }

    fn new(
        device: Arc<Device>,
        address_mode: vk::SamplerAddressMode,
        border_color: vk::BorderColor,
    ) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .border_color(border_color)
            .compare_op(vk::CompareOp::NEVER);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!("Created sampler ({:?})", address_mode);

        Ok(Self { device, sampler })
    }

    /// Returns the Vulkan sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed sampler");
    }
}
