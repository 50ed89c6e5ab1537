/// Per-frame uniforms shared by every entity, and the GPU state of one entity
///
/// Entity set 0 layouts:
/// - scene: camera, object, lighting, shadow uniform, shadow-map array, time
/// - depth prepass: camera, object
/// - shadow: shadow uniform, object

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, DescriptorSet, DescriptorWrite, GraphicsDevice, Pipeline};
use crate::memory::SharedAllocator;
use crate::passes::ShadowRenderer;
use crate::registry::PipelineKey;
use crate::resource::PerFrameUniform;
use crate::uniforms::{CameraUniform, LightingUniform, ObjectUniform, TimeUniform};

/// Uniform buffers written once per frame for the in-flight slot
pub struct FrameUniforms {
    pub camera: PerFrameUniform<CameraUniform>,
    pub lighting: PerFrameUniform<LightingUniform>,
    pub time: PerFrameUniform<TimeUniform>,
}

impl FrameUniforms {
    pub fn new(device: &mut dyn GraphicsDevice, allocator: &SharedAllocator, frames: usize) -> Result<Self> {
        Ok(Self {
            camera: PerFrameUniform::new(device, allocator, frames)?,
            lighting: PerFrameUniform::new(device, allocator, frames)?,
            time: PerFrameUniform::new(device, allocator, frames)?,
        })
    }

    /// Camera buffer of every slot
    pub fn camera_buffers(&self) -> Result<Vec<Arc<dyn Buffer>>> {
        (0..self.camera.frames())
            .map(|frame| self.camera.buffer(frame).cloned())
            .collect()
    }
}

/// Everything entity descriptor sets point at
pub struct EntityBindings<'a> {
    pub uniforms: &'a FrameUniforms,
    pub shadow: &'a ShadowRenderer,
    pub prepass_pipeline: &'a Arc<dyn Pipeline>,
}

pub struct EntityResources {
    scene_sets: Vec<Arc<dyn DescriptorSet>>,
    prepass_sets: Vec<Arc<dyn DescriptorSet>>,
    shadow_sets: Vec<Arc<dyn DescriptorSet>>,
    object: PerFrameUniform<ObjectUniform>,
    pub key: PipelineKey,
    pub pipeline: Arc<dyn Pipeline>,
    pub model_path: String,
}

impl EntityResources {
    /// Allocate the per-frame object buffers; sets come from `create_descriptor_sets`
    pub fn new(
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        frames: usize,
        key: PipelineKey,
        pipeline: Arc<dyn Pipeline>,
        model_path: &str,
    ) -> Result<Self> {
        Ok(Self {
            scene_sets: Vec::new(),
            prepass_sets: Vec::new(),
            shadow_sets: Vec::new(),
            object: PerFrameUniform::new(device, allocator, frames)?,
            key,
            pipeline,
            model_path: model_path.to_string(),
        })
    }

    /// (Re)create the scene, prepass and shadow sets of every slot
    ///
    /// A scene pipeline without descriptor sets gets no scene sets.
    pub fn create_descriptor_sets(&mut self, device: &mut dyn GraphicsDevice, bindings: &EntityBindings) -> Result<()> {
        self.scene_sets.clear();
        self.prepass_sets.clear();
        self.shadow_sets.clear();

        let shadow_maps = bindings.shadow.map_bindings()?;
        let uniforms = bindings.uniforms;

        for frame in 0..self.object.frames() {
            let object = self.object.buffer(frame)?.clone();
            let camera = uniforms.camera.buffer(frame)?.clone();
            let shadow = bindings.shadow.uniform_buffer(frame)?.clone();

            if self.pipeline.descriptor_set_count() > 0 {
                self.scene_sets.push(device.create_descriptor_set(&self.pipeline, 0, &[
                    DescriptorWrite::UniformBuffer { binding: 0, buffer: camera.clone() },
                    DescriptorWrite::UniformBuffer { binding: 1, buffer: object.clone() },
                    DescriptorWrite::UniformBuffer { binding: 2, buffer: uniforms.lighting.buffer(frame)?.clone() },
                    DescriptorWrite::UniformBuffer { binding: 3, buffer: shadow.clone() },
                    DescriptorWrite::CombinedImageSamplerArray { binding: 4, images: shadow_maps.clone() },
                    DescriptorWrite::UniformBuffer { binding: 5, buffer: uniforms.time.buffer(frame)?.clone() },
                ])?);
            }

            self.prepass_sets.push(device.create_descriptor_set(bindings.prepass_pipeline, 0, &[
                DescriptorWrite::UniformBuffer { binding: 0, buffer: camera },
                DescriptorWrite::UniformBuffer { binding: 1, buffer: object.clone() },
            ])?);

            self.shadow_sets.push(device.create_descriptor_set(bindings.shadow.pipeline(), 0, &[
                DescriptorWrite::UniformBuffer { binding: 0, buffer: shadow },
                DescriptorWrite::UniformBuffer { binding: 1, buffer: object },
            ])?);
        }
        Ok(())
    }

    pub fn write_object(&self, frame: usize, uniform: &ObjectUniform) -> Result<()> {
        self.object.write(frame, uniform)
    }

    /// Scene set of `frame` (None when the pipeline declares no sets)
    pub fn scene_set(&self, frame: usize) -> Option<&Arc<dyn DescriptorSet>> {
        self.scene_sets.get(frame)
    }

    pub fn prepass_set(&self, frame: usize) -> Result<&Arc<dyn DescriptorSet>> {
        Self::slot(&self.prepass_sets, frame, "prepass")
    }

    pub fn shadow_set(&self, frame: usize) -> Result<&Arc<dyn DescriptorSet>> {
        Self::slot(&self.shadow_sets, frame, "shadow")
    }

    fn slot<'s>(sets: &'s [Arc<dyn DescriptorSet>], frame: usize, pass: &str) -> Result<&'s Arc<dyn DescriptorSet>> {
        sets.get(frame).ok_or_else(|| {
            Error::InvalidResource(format!("entity has no {} descriptor set for frame {}", pass, frame))
        })
    }
}

#[cfg(test)]
#[path = "entity_resources_tests.rs"]
mod tests;
