/// Asset-loading collaborator interface and the model/mesh containers it fills
///
/// Loaders parse whatever format they like and hand back a `Model`: vertex and
/// index buffers routed through the resource allocator, plus one `Mesh` per
/// draw range carrying its material bindings. Meshes create their material
/// descriptor set lazily, once per pipeline key.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferDesc, BufferUsage, CommandList, DescriptorSet, DescriptorWrite, GraphicsDevice,
    ImageDesc, ImageFormat, IndexType, Pipeline, SamplerDesc, Vertex,
};
use crate::memory::{MemoryFlags, SharedAllocator};
use crate::registry::PipelineKey;
use crate::resource::{GpuBuffer, GpuImage};

/// Descriptor set index of per-mesh material bindings
pub const MATERIAL_SET: u32 = 1;

/// 1x1 textures bound when a material lacks a map
pub struct DefaultTextures {
    pub diffuse: GpuImage,
    pub normal: GpuImage,
    pub metallic_roughness: GpuImage,
    pub emissive: GpuImage,
    pub occlusion: GpuImage,
}

impl DefaultTextures {
    pub fn create(device: &mut dyn GraphicsDevice, allocator: &SharedAllocator) -> Result<Self> {
        let mut solid = |format: ImageFormat, texel: [u8; 4]| {
            GpuImage::create(
                device,
                allocator,
                ImageDesc::solid(format, texel.to_vec()),
                Some(SamplerDesc::linear_repeat(1)),
            )
        };
        Ok(Self {
            diffuse: solid(ImageFormat::R8G8B8A8_SRGB, [128, 128, 128, 255])?,
            normal: solid(ImageFormat::R8G8B8A8_UNORM, [128, 128, 255, 0])?,
            metallic_roughness: solid(ImageFormat::R8G8B8A8_UNORM, [0, 0, 0, 0])?,
            emissive: solid(ImageFormat::R8G8B8A8_UNORM, [0, 0, 0, 0])?,
            occlusion: solid(ImageFormat::R8G8B8A8_UNORM, [255, 255, 255, 255])?,
        })
    }

    /// Material bindings 0..=4 using only default textures
    pub fn material_writes(&self) -> Result<Vec<DescriptorWrite>> {
        let textures = [
            &self.diffuse,
            &self.normal,
            &self.metallic_roughness,
            &self.emissive,
            &self.occlusion,
        ];
        textures
            .iter()
            .enumerate()
            .map(|(binding, image)| {
                let (view, sampler) = image.binding()?;
                Ok(DescriptorWrite::CombinedImageSampler { binding: binding as u32, view, sampler })
            })
            .collect()
    }
}

/// Indexed draw range with its material
pub struct Mesh {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: i32,
    /// Material texture bindings (written into set `MATERIAL_SET`)
    pub material: Vec<DescriptorWrite>,
    descriptor_sets: FxHashMap<PipelineKey, Arc<dyn DescriptorSet>>,
}

impl Mesh {
    pub fn new(first_index: u32, index_count: u32, vertex_offset: i32, material: Vec<DescriptorWrite>) -> Self {
        Self {
            first_index,
            index_count,
            vertex_offset,
            material,
            descriptor_sets: FxHashMap::default(),
        }
    }

    /// Find or create the material set for `key`
    pub fn create_descriptor_set(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: &PipelineKey,
        pipeline: &Arc<dyn Pipeline>,
    ) -> Result<Arc<dyn DescriptorSet>> {
        if let Some(set) = self.descriptor_sets.get(key) {
            return Ok(set.clone());
        }
        let set = device.create_descriptor_set(pipeline, MATERIAL_SET, &self.material)?;
        self.descriptor_sets.insert(key.clone(), set.clone());
        Ok(set)
    }

    pub fn descriptor_set(&self, key: &PipelineKey) -> Option<&Arc<dyn DescriptorSet>> {
        self.descriptor_sets.get(key)
    }
}

/// Loaded model: shared geometry buffers and its meshes
pub struct Model {
    path: String,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    pub meshes: Vec<Mesh>,
}

impl Model {
    /// Upload geometry into host-visible buffers
    pub fn from_geometry(
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        path: &str,
        vertices: &[Vertex],
        indices: &[u32],
        meshes: Vec<Mesh>,
    ) -> Result<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(Error::InvalidResource(format!("model '{}' has no geometry", path)));
        }
        let memory = MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_COHERENT;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_buffer = GpuBuffer::create(device, allocator, BufferDesc {
            size: vertex_bytes.len() as u64,
            usage: BufferUsage::Vertex,
            memory,
        })?;
        vertex_buffer.write(0, vertex_bytes)?;

        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let index_buffer = GpuBuffer::create(device, allocator, BufferDesc {
            size: index_bytes.len() as u64,
            usage: BufferUsage::Index,
            memory,
        })?;
        index_buffer.write(0, index_bytes)?;

        Ok(Self {
            path: path.to_string(),
            vertex_buffer,
            index_buffer,
            meshes,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Create the material sets of every mesh for `key`
    ///
    /// Pipelines without a material set slot get none.
    pub fn create_descriptor_sets(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: &PipelineKey,
        pipeline: &Arc<dyn Pipeline>,
    ) -> Result<()> {
        if pipeline.descriptor_set_count() <= MATERIAL_SET {
            return Ok(());
        }
        for mesh in &mut self.meshes {
            mesh.create_descriptor_set(device, key, pipeline)?;
        }
        Ok(())
    }

    pub fn has_descriptor_sets(&self, key: &PipelineKey) -> bool {
        self.meshes.iter().all(|m| m.descriptor_set(key).is_some())
    }

    /// Forget every material set (pipelines were recompiled)
    pub fn clear_descriptor_sets(&mut self) {
        for mesh in &mut self.meshes {
            mesh.descriptor_sets.clear();
        }
    }

    /// Record one indexed draw per mesh, returning the number of draws
    ///
    /// With `material`, each mesh binds its set for that key before drawing.
    pub fn draw(
        &self,
        cmd: &mut dyn CommandList,
        pipeline: &Arc<dyn Pipeline>,
        material: Option<&PipelineKey>,
    ) -> Result<u32> {
        cmd.bind_vertex_buffer(self.vertex_buffer.buffer()?, 0)?;
        cmd.bind_index_buffer(self.index_buffer.buffer()?, 0, IndexType::U32)?;

        for mesh in &self.meshes {
            if let Some(set) = material.and_then(|key| mesh.descriptor_set(key)) {
                cmd.bind_descriptor_set(pipeline, MATERIAL_SET, set)?;
            }
            cmd.draw_indexed(mesh.index_count, mesh.first_index, mesh.vertex_offset)?;
        }
        Ok(self.meshes.len() as u32)
    }
}

/// Asset-loading collaborator
pub trait ModelLoader: Send {
    /// Load a model; missing material maps fall back to `defaults`
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` naming the path when the asset does not exist.
    fn load_model(
        &mut self,
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        path: &str,
        defaults: &DefaultTextures,
    ) -> Result<Model>;

    /// Load an environment cubemap (6 layers, sampled)
    fn load_environment(
        &mut self,
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        path: &str,
    ) -> Result<GpuImage>;
}

#[cfg(test)]
#[path = "asset_tests.rs"]
mod tests;
