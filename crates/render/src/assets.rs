//! GPU-resident assets.
//!
//! The library resolves the scene's opaque model and texture references to
//! vertex/index buffers and sampled images. Uploads happen during the
//! loading phase; by the first geometry pass every referenced asset must be
//! resident.

use std::sync::Arc;

use ash::vk;
use glam::{Vec2, Vec3};
use tracing::info;

use dreams_resources::{ModelData, TextureData};
use dreams_rhi::buffer::{Buffer, BufferUsage};
use dreams_rhi::command::CommandPool;
use dreams_rhi::descriptor::{self, DescriptorPool};
use dreams_rhi::device::Device;
use dreams_rhi::sampler::Sampler;
use dreams_rhi::texture::Texture;
use dreams_rhi::vertex::MeshVertex;
use dreams_scene::{Aabb, ModelRef, TextureRef};

use crate::error::RenderResult;
use crate::passes::ModelBounds;

/// Maximum number of distinct textures the library can hold.
const MAX_TEXTURES: u32 = 64;

/// A model's GPU buffers and object-space bounds.
pub struct GpuModel {
    /// Interleaved vertex buffer.
    pub vertex_buffer: Buffer,
    /// 32-bit index buffer.
    pub index_buffer: Buffer,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Object-space bounding box.
    pub bounds: Aabb,
}

struct GpuTexture {
    _texture: Texture,
    descriptor_set: vk::DescriptorSet,
}

/// Maps model and texture references to GPU resources.
pub struct AssetLibrary {
    device: Arc<Device>,
    models: Vec<GpuModel>,
    textures: Vec<GpuTexture>,
    descriptor_pool: DescriptorPool,
    texture_set_layout: vk::DescriptorSetLayout,
    sampler: Sampler,
}

impl AssetLibrary {
    /// Creates an empty library allocating texture sets from its own pool.
    ///
    /// # Errors
    ///
    /// Returns an error if pool or sampler creation fails.
    pub fn new(
        device: Arc<Device>,
        texture_set_layout: vk::DescriptorSetLayout,
    ) -> RenderResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(MAX_TEXTURES)];
        let descriptor_pool = DescriptorPool::new(device.clone(), MAX_TEXTURES, &pool_sizes)?;
        let sampler = Sampler::texture(device.clone())?;

        Ok(Self {
            device,
            models: Vec::new(),
            textures: Vec::new(),
            descriptor_pool,
            texture_set_layout,
            sampler,
        })
    }

    /// Uploads a loaded model, interleaving all of its meshes into a single
    /// vertex and index buffer pair.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation fails.
    pub fn upload_model(&mut self, data: &ModelData) -> RenderResult<ModelRef> {
        let mut vertices: Vec<MeshVertex> = Vec::with_capacity(data.total_vertex_count());
        let mut indices: Vec<u32> = Vec::new();

        for mesh in &data.meshes {
            let base = vertices.len() as u32;
            for i in 0..mesh.positions.len() {
                vertices.push(MeshVertex::new(
                    mesh.positions[i],
                    mesh.normals.get(i).copied().unwrap_or(Vec3::ZERO),
                    mesh.tex_coords
                        .get(i)
                        .map(|uv| Vec2::new(uv[0], uv[1]))
                        .unwrap_or(Vec2::ZERO),
                ));
            }
            indices.extend(mesh.indices.iter().map(|&i| base + i));
        }

        let vertex_buffer = Buffer::new_with_data(
            self.device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_with_data(
            self.device.clone(),
            BufferUsage::Index,
            bytemuck::cast_slice(&indices),
        )?;

        let reference = ModelRef(self.models.len() as u32);
        self.models.push(GpuModel {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            bounds: data.bounds,
        });

        info!(
            "Uploaded model {:?}: {} vertices, {} indices",
            reference,
            vertices.len(),
            indices.len()
        );

        Ok(reference)
    }

    /// Uploads a decoded texture and binds its descriptor set.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload or descriptor allocation fails.
    pub fn upload_texture(
        &mut self,
        command_pool: &CommandPool,
        data: &TextureData,
    ) -> RenderResult<TextureRef> {
        let texture = Texture::from_rgba8(
            self.device.clone(),
            command_pool,
            data.width,
            data.height,
            &data.pixels,
        )?;

        let descriptor_set = self.descriptor_pool.allocate(&[self.texture_set_layout])?[0];
        let image_info = descriptor::image_info(
            self.sampler.handle(),
            texture.view(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        descriptor::update_descriptor_sets(
            &self.device,
            &[vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&image_info))],
        );

        let reference = TextureRef(self.textures.len() as u32);
        self.textures.push(GpuTexture {
            _texture: texture,
            descriptor_set,
        });

        info!(
            "Uploaded texture {:?}: {}x{}",
            reference, data.width, data.height
        );

        Ok(reference)
    }

    /// The GPU model behind `reference`.
    #[inline]
    pub fn model(&self, reference: ModelRef) -> Option<&GpuModel> {
        self.models.get(reference.0 as usize)
    }

    /// The descriptor set for `reference`.
    #[inline]
    pub fn texture_set(&self, reference: TextureRef) -> Option<vk::DescriptorSet> {
        self.textures
            .get(reference.0 as usize)
            .map(|t| t.descriptor_set)
    }

    /// Number of resident models.
    #[inline]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

impl ModelBounds for AssetLibrary {
    fn model_bounds(&self, model: ModelRef) -> Option<Aabb> {
        self.model(model).map(|m| m.bounds)
    }
}
