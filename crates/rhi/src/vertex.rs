//! Vertex formats.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Mesh vertex: position, normal and texture coordinates.
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: normal (12 bytes)
/// - Offset 24: tex_coord (8 bytes)
///
/// Total size: 32 bytes. Shader locations 0..=2 in the same order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Position in object space.
    pub position: Vec3,
    /// Surface normal.
    pub normal: Vec3,
    /// Texture coordinates.
    pub tex_coord: Vec2,
}

impl MeshVertex {
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
        ]
    }
}

/// Overlay vertex: screen position, atlas coordinates and color.
///
/// Positions are in the overlay's normalized `[0, 2]` space with the origin
/// at the top-left corner.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct OverlayVertex {
    /// Position in overlay space.
    pub position: Vec2,
    /// Glyph atlas coordinates.
    pub tex_coord: Vec2,
    /// Text color.
    pub color: Vec4,
}

impl OverlayVertex {
    pub const fn new(position: Vec2, tex_coord: Vec2, color: Vec4) -> Self {
        Self {
            position,
            tex_coord,
            color,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32_SFLOAT,
                offset: 8,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 16,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_mesh_vertex_layout() {
        assert_eq!(size_of::<MeshVertex>(), 32);
        assert_eq!(
            MeshVertex::binding_description().stride,
            size_of::<MeshVertex>() as u32
        );
        let attrs = MeshVertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
    }

    #[test]
    fn test_overlay_vertex_layout() {
        assert_eq!(size_of::<OverlayVertex>(), 32);
        let attrs = OverlayVertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[2].offset, 16);
    }

    #[test]
    fn test_mesh_vertex_pod_cast() {
        let v = MeshVertex::new(Vec3::X, Vec3::Y, Vec2::ONE);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 32);
    }
}
