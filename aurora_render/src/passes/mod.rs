/// Per-pass sub-renderers
///
/// Each sub-renderer owns the images, framebuffers and pipeline of one pass of
/// the frame graph. Resources sized to the viewport are built by
/// `create_resources` and released by `destroy_resources`; the frame
/// orchestrator calls both around every swapchain rebuild.

pub mod depth_prepass;
pub mod shadow;
pub mod ambient_occlusion;

pub use depth_prepass::*;
pub use shadow::*;
pub use ambient_occlusion::*;

use std::sync::Arc;
use crate::asset::Model;
use crate::config::RendererConfig;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, CommandList, DescriptorSet, GraphicsDevice, ImageView, Pipeline, Sampler, Viewport,
};
use crate::memory::SharedAllocator;
use crate::registry::{PipelineCache, PipelineKey, RenderPassRegistry};

/// Buffers and images produced outside a pass that it reads
#[derive(Clone, Default)]
pub struct SharedBindings {
    /// Camera uniform buffer of each frame-in-flight slot
    pub camera: Vec<Arc<dyn Buffer>>,
    /// Depth written by the prepass
    pub depth: Option<(Arc<dyn ImageView>, Arc<dyn Sampler>)>,
}

/// Device-side state a sub-renderer builds its resources against
pub struct PassContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub allocator: &'a SharedAllocator,
    pub render_passes: &'a RenderPassRegistry,
    pub pipelines: &'a mut PipelineCache,
    pub config: &'a RendererConfig,
    pub shared: &'a SharedBindings,
}

impl PassContext<'_> {
    /// Resolve `key` through the pipeline cache
    pub fn pipeline(&mut self, key: &PipelineKey) -> Result<Arc<dyn Pipeline>> {
        self.pipelines.get_or_create(self.device, self.render_passes, key)
    }
}

/// One entity draw inside a geometry pass
pub struct PassDraw<'a> {
    pub model: &'a Model,
    /// The entity's set 0 for this pass and frame
    pub descriptor_set: &'a Arc<dyn DescriptorSet>,
}

/// Sub-renderer interface
pub trait PassRenderer {
    /// Registry name of the pass
    fn name(&self) -> &'static str;

    /// Build the viewport-sized resources
    fn create_resources(&mut self, ctx: &mut PassContext, viewport: Viewport) -> Result<()>;

    /// Release the viewport-sized resources (idempotent)
    fn destroy_resources(&mut self);

    /// Re-resolve pipelines from the cache after a reload
    fn resolve_pipelines(&mut self, ctx: &mut PassContext) -> Result<()>;

    /// Record the pass for in-flight slot `frame`, returning the number of draw calls
    fn draw(&mut self, cmd: &mut dyn CommandList, frame: usize, draws: &[PassDraw]) -> Result<u32>;
}

/// Record the draws of a geometry pass with one pipeline
///
/// Each entity binds its own set 0; meshes draw without material sets.
pub(crate) fn draw_geometry(
    cmd: &mut dyn CommandList,
    pipeline: &Arc<dyn Pipeline>,
    draws: &[PassDraw],
) -> Result<u32> {
    let mut count = 0;
    for draw in draws {
        cmd.bind_descriptor_set(pipeline, 0, draw.descriptor_set)?;
        count += draw.model.draw(cmd, pipeline, None)?;
    }
    Ok(count)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
    use crate::memory::ResourceAllocator;

    /// Registries and allocator a sub-renderer test builds against
    pub struct PassFixture {
        pub device: MockGraphicsDevice,
        pub allocator: SharedAllocator,
        pub render_passes: RenderPassRegistry,
        pub pipelines: PipelineCache,
        pub config: RendererConfig,
        pub shared: SharedBindings,
    }

    impl PassFixture {
        pub fn new() -> Self {
            Self {
                device: MockGraphicsDevice::new(),
                allocator: ResourceAllocator::new().shared(),
                render_passes: RenderPassRegistry::new(),
                pipelines: PipelineCache::new(),
                config: RendererConfig::default(),
                shared: SharedBindings::default(),
            }
        }

        pub fn ctx(&mut self) -> PassContext<'_> {
            PassContext {
                device: &mut self.device,
                allocator: &self.allocator,
                render_passes: &self.render_passes,
                pipelines: &mut self.pipelines,
                config: &self.config,
                shared: &self.shared,
            }
        }
    }
}
