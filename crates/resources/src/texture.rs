//! Texture decoding.

use std::path::Path;

use tracing::debug;

use crate::error::ResourceResult;

/// Decoded RGBA8 pixel data, ready for upload.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 pixels, row-major.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes an image file into RGBA8.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        debug!("Loading texture from {:?}", path);
        let image = image::open(path)?.into_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// A 1x1 opaque texture of the given color, the fallback for missing
    /// assets.
    pub fn solid(r: u8, g: u8, b: u8) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![r, g, b, 255],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_texture() {
        let texture = TextureData::solid(128, 64, 32);
        assert_eq!(texture.width, 1);
        assert_eq!(texture.height, 1);
        assert_eq!(texture.pixels, vec![128, 64, 32, 255]);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(TextureData::load(Path::new("/nonexistent/texture.png")).is_err());
    }
}
