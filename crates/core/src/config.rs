//! Run configuration for the renderer.
//!
//! The configuration is read once at startup and passed by reference into the
//! subsystems that need it. Changing any of these values at runtime requires
//! tearing down and rebuilding the per-frame resource pool, so there is no
//! live-reload path.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

/// Preferred presentation mode, mapped to the Vulkan equivalent by the RHI.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// No vertical sync, may tear.
    Immediate,
    /// Triple-buffered vsync without tearing. The default.
    #[default]
    Mailbox,
    /// Classic vsync. Always available per the Vulkan spec.
    Fifo,
}

/// Static render configuration.
///
/// Sample count, shadow resolution and present mode are read at pool-creation
/// time; a rebuild is required to change them.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// MSAA sample count for the geometry pass (1, 2, 4 or 8).
    pub sample_count: u32,
    /// Width and height of every shadow map, in pixels.
    pub shadow_resolution: u32,
    /// Preferred swapchain present mode.
    pub present_mode: PresentMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_count: 2,
            shadow_resolution: 2048,
            present_mode: PresentMode::Mailbox,
        }
    }
}

impl RenderConfig {
    /// Loads the configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a parsed value is out of range.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let config: RenderConfig = toml::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
            info!("Loaded render config from {}", path.display());
            config
        } else {
            info!("No config at {}, using defaults", path.display());
            RenderConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is in its supported range.
    ///
    /// # Errors
    ///
    /// Returns a [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.sample_count, 1 | 2 | 4 | 8) {
            return Err(Error::Config(format!(
                "sample_count must be 1, 2, 4 or 8, got {}",
                self.sample_count
            )));
        }
        if self.shadow_resolution == 0 || !self.shadow_resolution.is_power_of_two() {
            return Err(Error::Config(format!(
                "shadow_resolution must be a power of two, got {}",
                self.shadow_resolution
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_count, 2);
        assert_eq!(config.shadow_resolution, 2048);
        assert_eq!(config.present_mode, PresentMode::Mailbox);
    }

    #[test]
    fn test_rejects_bad_sample_count() {
        let config = RenderConfig {
            sample_count: 3,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_shadow_resolution() {
        let config = RenderConfig {
            shadow_resolution: 1000,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_toml() {
        let config: RenderConfig = toml::from_str(
            "sample_count = 4\nshadow_resolution = 1024\npresent_mode = \"fifo\"\n",
        )
        .unwrap();
        assert_eq!(config.sample_count, 4);
        assert_eq!(config.shadow_resolution, 1024);
        assert_eq!(config.present_mode, PresentMode::Fifo);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RenderConfig::load(Path::new("/nonexistent/dreams.toml")).unwrap();
        assert_eq!(config.sample_count, RenderConfig::default().sample_count);
    }
}
