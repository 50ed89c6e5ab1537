/// Environment cubemap drawn behind the scene
///
/// The cube is generated in the vertex shader (36 vertices, no vertex
/// buffer) and drawn last in the scene pass with a LessOrEqual depth test.

use std::sync::Arc;
use crate::asset::ModelLoader;
use crate::error::Result;
use crate::graphics_device::{
    CommandList, DescriptorSet, DescriptorWrite, FixedFunctionState, Pipeline, ShaderStages,
};
use crate::passes::PassContext;
use crate::registry::PipelineKey;
use crate::renderer::SCENE_PASS;
use crate::resource::GpuImage;
use crate::engine_info;

const SKYBOX_VERTEX_COUNT: u32 = 36;

pub struct Skybox {
    sets: Vec<Arc<dyn DescriptorSet>>,
    environment: Option<(String, GpuImage)>,
    key: PipelineKey,
    pipeline: Arc<dyn Pipeline>,
}

impl Skybox {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let key = PipelineKey::new(
            ShaderStages::new(ctx.config.shader_path("skybox.vert"), ctx.config.shader_path("skybox.frag")),
            FixedFunctionState::skybox(),
            SCENE_PASS,
        );
        let pipeline = ctx.pipeline(&key)?;
        Ok(Self {
            sets: Vec::new(),
            environment: None,
            key,
            pipeline,
        })
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_ref().map(|(path, _)| path.as_str())
    }

    /// Switch to the cubemap at `path`, or drop the environment with `None`
    ///
    /// The device must be idle when an environment is already loaded.
    pub fn set_environment(
        &mut self,
        ctx: &mut PassContext,
        loader: &mut dyn ModelLoader,
        path: Option<&str>,
    ) -> Result<()> {
        self.sets.clear();
        self.environment = None;
        if let Some(path) = path {
            let cubemap = loader.load_environment(ctx.device, ctx.allocator, path)?;
            engine_info!("aurora::Skybox", "Environment '{}' loaded", path);
            self.environment = Some((path.to_string(), cubemap));
            self.create_sets(ctx)?;
        }
        Ok(())
    }

    /// Re-resolve the pipeline after a reload and rebuild the sets against it
    pub fn resolve_pipeline(&mut self, ctx: &mut PassContext) -> Result<()> {
        self.pipeline = ctx.pipeline(&self.key)?;
        self.create_sets(ctx)
    }

    fn create_sets(&mut self, ctx: &mut PassContext) -> Result<()> {
        self.sets.clear();
        let Some((_, cubemap)) = &self.environment else {
            return Ok(());
        };
        let (view, sampler) = cubemap.binding()?;
        for camera in &ctx.shared.camera {
            self.sets.push(ctx.device.create_descriptor_set(&self.pipeline, 0, &[
                DescriptorWrite::UniformBuffer { binding: 0, buffer: camera.clone() },
                DescriptorWrite::CombinedImageSampler {
                    binding: 1,
                    view: view.clone(),
                    sampler: sampler.clone(),
                },
            ])?);
        }
        Ok(())
    }

    /// Record the skybox for `frame`; nothing without an environment
    pub fn draw(&self, cmd: &mut dyn CommandList, frame: usize) -> Result<bool> {
        let Some(set) = self.sets.get(frame) else {
            return Ok(false);
        };
        cmd.bind_pipeline(&self.pipeline)?;
        cmd.bind_descriptor_set(&self.pipeline, 0, set)?;
        cmd.draw(SKYBOX_VERTEX_COUNT, 0)?;
        Ok(true)
    }
}
