//! Overlay text rendering.
//!
//! A fontdue-rasterized ASCII atlas is uploaded once; per frame, draw calls
//! append glyph quads to a CPU list that is flushed into that frame's vertex
//! buffer when the overlay pass records. Coordinates live in the overlay's
//! normalized space: `[0, 2]` on both axes, origin top-left, `scale` giving
//! the line height.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::{Vec2, Vec4};
use tracing::{debug, info, warn};

use dreams_rhi::buffer::{Buffer, BufferUsage};
use dreams_rhi::command::CommandPool;
use dreams_rhi::descriptor::{self, DescriptorPool};
use dreams_rhi::device::Device;
use dreams_rhi::sampler::Sampler;
use dreams_rhi::RhiError;
use dreams_rhi::texture::Texture;
use dreams_rhi::vertex::OverlayVertex;

use crate::error::RenderResult;

/// Vertex capacity of each per-frame overlay buffer.
///
/// Text beyond this truncates for the frame with a warning.
pub const MAX_OVERLAY_VERTICES: usize = 6 * 4096;

/// ASCII range rasterized into the atlas.
const FIRST_GLYPH: char = ' ';
const LAST_GLYPH: char = '~';

/// Per-glyph metrics in em units (relative to the line height) plus the
/// glyph's atlas region.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphMetrics {
    /// Atlas region minimum (normalized).
    pub uv_min: Vec2,
    /// Atlas region maximum (normalized).
    pub uv_max: Vec2,
    /// Glyph quad size in em units.
    pub size: Vec2,
    /// Pen advance in em units.
    pub advance: f32,
    /// Offset from the pen position to the quad's top-left, in em units
    /// with y pointing down.
    pub bearing: Vec2,
}

/// One glyph quad in overlay space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    pub min: Vec2,
    pub max: Vec2,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
}

/// Lays out `text` starting at `(x, y)` (top-left of the line) with the
/// given line height. Characters without metrics are skipped; zero-size
/// glyphs (spaces) advance the pen without emitting a quad.
pub fn layout_text(
    glyphs: &HashMap<char, GlyphMetrics>,
    text: &str,
    x: f32,
    y: f32,
    scale: f32,
) -> Vec<GlyphQuad> {
    let mut quads = Vec::with_capacity(text.len());
    let mut pen_x = x;

    for ch in text.chars() {
        let Some(metrics) = glyphs.get(&ch) else {
            continue;
        };

        if metrics.size.x > 0.0 && metrics.size.y > 0.0 {
            let min = Vec2::new(pen_x, y) + metrics.bearing * scale;
            quads.push(GlyphQuad {
                min,
                max: min + metrics.size * scale,
                uv_min: metrics.uv_min,
                uv_max: metrics.uv_max,
            });
        }

        pen_x += metrics.advance * scale;
    }

    quads
}

/// CPU-side glyph atlas: coverage pixels plus per-glyph metrics.
pub struct FontAtlas {
    /// Atlas width in pixels.
    pub width: u32,
    /// Atlas height in pixels.
    pub height: u32,
    /// Single-channel coverage pixels.
    pub pixels: Vec<u8>,
    /// Metrics per rasterized character.
    pub glyphs: HashMap<char, GlyphMetrics>,
}

impl FontAtlas {
    /// Rasterizes the printable ASCII range from a font file at `px` pixels
    /// per em into a grid atlas.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed as a font.
    pub fn from_file(path: &Path, px: f32) -> RenderResult<Self> {
        let bytes = std::fs::read(path).map_err(dreams_resources::ResourceError::Io)?;
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| RhiError::Shader(format!("font load failed: {e}")))?;

        let ascent = font
            .horizontal_line_metrics(px)
            .map(|m| m.ascent)
            .unwrap_or(px * 0.8);

        // Grid atlas: one fixed-size cell per glyph.
        let cell = px.ceil() as u32 + 2;
        let count = LAST_GLYPH as u32 - FIRST_GLYPH as u32 + 1;
        let columns = 12u32;
        let rows = count.div_ceil(columns);
        let width = columns * cell;
        let height = rows * cell;
        let mut pixels = vec![0u8; (width * height) as usize];
        let mut glyphs = HashMap::with_capacity(count as usize);

        for (index, ch) in (FIRST_GLYPH..=LAST_GLYPH).enumerate() {
            let (metrics, coverage) = font.rasterize(ch, px);
            let cell_x = (index as u32 % columns) * cell;
            let cell_y = (index as u32 / columns) * cell;

            let glyph_w = (metrics.width as u32).min(cell);
            let glyph_h = (metrics.height as u32).min(cell);
            for row in 0..glyph_h {
                for col in 0..glyph_w {
                    let src = (row as usize) * metrics.width + col as usize;
                    let dst = ((cell_y + row) * width + cell_x + col) as usize;
                    pixels[dst] = coverage[src];
                }
            }

            // Em-normalized layout metrics; the quad top is measured from
            // the line top with y down.
            let top_from_baseline = metrics.ymin as f32 + metrics.height as f32;
            glyphs.insert(
                ch,
                GlyphMetrics {
                    uv_min: Vec2::new(cell_x as f32 / width as f32, cell_y as f32 / height as f32),
                    uv_max: Vec2::new(
                        (cell_x + glyph_w) as f32 / width as f32,
                        (cell_y + glyph_h) as f32 / height as f32,
                    ),
                    size: Vec2::new(metrics.width as f32 / px, metrics.height as f32 / px),
                    advance: metrics.advance_width / px,
                    bearing: Vec2::new(
                        metrics.xmin as f32 / px,
                        (ascent - top_from_baseline) / px,
                    ),
                },
            );
        }

        info!(
            "Rasterized {} glyphs into {}x{} atlas from {:?}",
            glyphs.len(),
            width,
            height,
            path
        );

        Ok(Self {
            width,
            height,
            pixels,
            glyphs,
        })
    }
}

/// GPU text renderer for the overlay pass.
pub struct TextRenderer {
    atlas: FontAtlas,
    _texture: Texture,
    _sampler: Sampler,
    _descriptor_pool: DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    vertex_buffers: Vec<Buffer>,
    pending: Vec<OverlayVertex>,
    truncated: bool,
}

impl TextRenderer {
    /// Uploads the atlas and allocates one vertex buffer per frame slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the font cannot be loaded or any GPU resource
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        overlay_set_layout: vk::DescriptorSetLayout,
        frame_count: usize,
        font_path: &Path,
        font_px: f32,
    ) -> RenderResult<Self> {
        let atlas = FontAtlas::from_file(font_path, font_px)?;

        let texture = Texture::from_r8(
            device.clone(),
            command_pool,
            atlas.width,
            atlas.height,
            &atlas.pixels,
        )?;
        let sampler = Sampler::texture(device.clone())?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)];
        let descriptor_pool = DescriptorPool::new(device.clone(), 1, &pool_sizes)?;
        let descriptor_set = descriptor_pool.allocate(&[overlay_set_layout])?[0];

        let atlas_info = descriptor::image_info(
            sampler.handle(),
            texture.view(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        descriptor::update_descriptor_sets(
            &device,
            &[vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&atlas_info))],
        );

        let buffer_size = (MAX_OVERLAY_VERTICES * std::mem::size_of::<OverlayVertex>()) as u64;
        let mut vertex_buffers = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            vertex_buffers.push(Buffer::new(
                device.clone(),
                BufferUsage::Vertex,
                buffer_size,
            )?);
        }

        debug!("Text renderer ready ({} frame buffers)", frame_count);

        Ok(Self {
            atlas,
            _texture: texture,
            _sampler: sampler,
            _descriptor_pool: descriptor_pool,
            descriptor_set,
            vertex_buffers,
            pending: Vec::new(),
            truncated: false,
        })
    }

    /// Clears the pending glyphs for a new frame.
    pub fn begin_frame(&mut self) {
        self.pending.clear();
        self.truncated = false;
    }

    /// Queues `text` at `(x, y)` in overlay space with the given line height
    /// and color. Quads past the vertex capacity are dropped for the frame.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, scale: f32, color: Vec4) {
        for quad in layout_text(&self.atlas.glyphs, text, x, y, scale) {
            if self.pending.len() + 6 > MAX_OVERLAY_VERTICES {
                if !self.truncated {
                    warn!("Overlay text exceeds vertex capacity, truncating");
                    self.truncated = true;
                }
                return;
            }

            let top_left = OverlayVertex::new(quad.min, quad.uv_min, color);
            let top_right = OverlayVertex::new(
                Vec2::new(quad.max.x, quad.min.y),
                Vec2::new(quad.uv_max.x, quad.uv_min.y),
                color,
            );
            let bottom_left = OverlayVertex::new(
                Vec2::new(quad.min.x, quad.max.y),
                Vec2::new(quad.uv_min.x, quad.uv_max.y),
                color,
            );
            let bottom_right = OverlayVertex::new(quad.max, quad.uv_max, color);

            self.pending.extend_from_slice(&[
                top_left,
                bottom_left,
                top_right,
                top_right,
                bottom_left,
                bottom_right,
            ]);
        }
    }

    /// Writes the pending vertices into `frame`'s buffer and returns the
    /// vertex count to draw.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer write fails.
    pub fn flush(&mut self, frame: usize) -> RenderResult<u32> {
        if !self.pending.is_empty() {
            self.vertex_buffers[frame].write_data(0, bytemuck::cast_slice(&self.pending))?;
        }
        Ok(self.pending.len() as u32)
    }

    /// Grows the per-frame vertex buffers to cover `frame_count` slots
    /// after a swapchain rebuild changed the image count.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation fails.
    pub fn ensure_frames(&mut self, device: Arc<Device>, frame_count: usize) -> RenderResult<()> {
        let buffer_size = (MAX_OVERLAY_VERTICES * std::mem::size_of::<OverlayVertex>()) as u64;
        while self.vertex_buffers.len() < frame_count {
            self.vertex_buffers
                .push(Buffer::new(device.clone(), BufferUsage::Vertex, buffer_size)?);
        }
        Ok(())
    }

    /// The frame's vertex buffer handle.
    #[inline]
    pub fn vertex_buffer(&self, frame: usize) -> vk::Buffer {
        self.vertex_buffers[frame].handle()
    }

    /// The glyph atlas descriptor set.
    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }
}

/// Text drawing surface handed to callers while the overlay pass is open.
///
/// Constructed only by the overlay pass recording, which bounds its
/// lifetime to the pass.
pub struct OverlayContext<'a> {
    text: &'a mut TextRenderer,
}

impl<'a> OverlayContext<'a> {
    pub(crate) fn new(text: &'a mut TextRenderer) -> Self {
        Self { text }
    }

    /// Queues `text` at `(x, y)` in overlay space.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, scale: f32, color: Vec4) {
        self.text.draw_text(text, x, y, scale, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_glyphs() -> HashMap<char, GlyphMetrics> {
        let mut glyphs = HashMap::new();
        glyphs.insert(
            'a',
            GlyphMetrics {
                uv_min: Vec2::ZERO,
                uv_max: Vec2::splat(0.1),
                size: Vec2::new(0.5, 0.7),
                advance: 0.6,
                bearing: Vec2::new(0.05, 0.3),
            },
        );
        glyphs.insert(
            ' ',
            GlyphMetrics {
                advance: 0.4,
                ..GlyphMetrics::default()
            },
        );
        glyphs
    }

    #[test]
    fn test_layout_emits_quads_for_visible_glyphs_only() {
        let glyphs = test_glyphs();
        let quads = layout_text(&glyphs, "a a", 0.0, 0.0, 1.0);
        // Two 'a's, the space only advances.
        assert_eq!(quads.len(), 2);
    }

    #[test]
    fn test_layout_advances_pen() {
        let glyphs = test_glyphs();
        let quads = layout_text(&glyphs, "aa", 0.1, 0.2, 0.05);

        let first = quads[0];
        let second = quads[1];
        // Second glyph starts one advance further.
        assert!((second.min.x - first.min.x - 0.6 * 0.05).abs() < 1e-6);
        // Same baseline.
        assert_eq!(first.min.y, second.min.y);
        // Quad size follows scale.
        assert!((first.max.x - first.min.x - 0.5 * 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_layout_skips_unknown_characters() {
        let glyphs = test_glyphs();
        let quads = layout_text(&glyphs, "azza", 0.0, 0.0, 1.0);
        assert_eq!(quads.len(), 2);
    }

    #[test]
    fn test_atlas_from_system_font_if_present() {
        // A system font may not exist in minimal environments; skip then.
        let candidates = [
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        ];
        let Some(path) = candidates.iter().map(Path::new).find(|p| p.exists()) else {
            eprintln!("Skipping test: no system font found");
            return;
        };

        let atlas = FontAtlas::from_file(path, 48.0).unwrap();
        assert!(atlas.glyphs.contains_key(&'A'));
        assert_eq!(atlas.pixels.len(), (atlas.width * atlas.height) as usize);

        // Printable glyphs have sensible metrics.
        let a = atlas.glyphs[&'A'];
        assert!(a.size.x > 0.0 && a.size.y > 0.0);
        assert!(a.advance > 0.0);
        let quads = layout_text(&atlas.glyphs, "FPS: 60.0", 0.05, 0.05, 0.05);
        assert!(!quads.is_empty());
    }
}
