/// Depth prepass
///
/// Renders every entity depth-only so the scene pass can test with `Equal`
/// and skip shading of hidden fragments. The depth image doubles as the scene
/// pass depth attachment and as the ambient occlusion input.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, CommandList, FixedFunctionState, Framebuffer, GraphicsDevice, ImageDesc,
    ImageLayout, ImageUsage, ImageView, Pipeline, Sampler, SamplerDesc, ShaderStages,
    SubpassDependency, Viewport,
};
use crate::passes::{draw_geometry, PassContext, PassDraw, PassRenderer};
use crate::registry::{PipelineKey, RenderPassEntry, RenderPassRegistry};
use crate::resource::GpuImage;

pub const DEPTH_PREPASS: &str = "depth_prepass";

pub struct DepthPrepass {
    render_pass: Arc<RenderPassEntry>,
    key: PipelineKey,
    pipeline: Arc<dyn Pipeline>,
    depth: Option<GpuImage>,
    framebuffer: Option<Arc<dyn Framebuffer>>,
}

impl DepthPrepass {
    /// Register the "depth_prepass" render pass
    pub fn register_render_pass(
        device: &mut dyn GraphicsDevice,
        registry: &mut RenderPassRegistry,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let depth = AttachmentDesc::depth(device.depth_format())
            .with_layouts(ImageLayout::Undefined, ImageLayout::DepthStencilReadOnly);
        let entry = RenderPassEntry::new(
            device,
            DEPTH_PREPASS,
            vec![depth],
            vec![
                SubpassDependency::sample_then_depth_write(),
                SubpassDependency::depth_write_then_sample(),
            ],
            clear_color,
        )?;
        registry.register(entry)?;
        Ok(())
    }

    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let render_pass = ctx.render_passes.get(DEPTH_PREPASS)?.clone();
        let key = PipelineKey::new(
            ShaderStages::new(
                ctx.config.shader_path("depthPrepass.vert"),
                ctx.config.shader_path("depthPrepass.frag"),
            ),
            FixedFunctionState::depth_only(),
            DEPTH_PREPASS,
        );
        let pipeline = ctx.pipeline(&key)?;
        Ok(Self {
            render_pass,
            key,
            pipeline,
            depth: None,
            framebuffer: None,
        })
    }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    pub fn pipeline_key(&self) -> &PipelineKey {
        &self.key
    }

    /// Depth view, attached by the scene pass
    pub fn depth_view(&self) -> Result<&Arc<dyn ImageView>> {
        self.depth_image()?.view()
    }

    /// Depth view and sampler, read by ambient occlusion
    pub fn depth_binding(&self) -> Result<(Arc<dyn ImageView>, Arc<dyn Sampler>)> {
        self.depth_image()?.binding()
    }

    fn depth_image(&self) -> Result<&GpuImage> {
        self.depth
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("depth prepass resources not created".to_string()))
    }
}

impl PassRenderer for DepthPrepass {
    fn name(&self) -> &'static str {
        DEPTH_PREPASS
    }

    fn create_resources(&mut self, ctx: &mut PassContext, viewport: Viewport) -> Result<()> {
        self.destroy_resources();
        let (width, height) = (viewport.width as u32, viewport.height as u32);
        let format = ctx.device.depth_format();

        let depth = GpuImage::create(
            ctx.device,
            ctx.allocator,
            ImageDesc::attachment(
                width,
                height,
                format,
                ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED,
            ),
            Some(SamplerDesc::nearest_clamp()),
        )?;
        let framebuffer = self.render_pass.create_framebuffer(
            ctx.device,
            vec![depth.view()?.clone()],
            width,
            height,
        )?;

        self.depth = Some(depth);
        self.framebuffer = Some(framebuffer);
        Ok(())
    }

    fn destroy_resources(&mut self) {
        self.framebuffer = None;
        self.depth = None;
    }

    fn resolve_pipelines(&mut self, ctx: &mut PassContext) -> Result<()> {
        self.pipeline = ctx.pipeline(&self.key)?;
        Ok(())
    }

    fn draw(&mut self, cmd: &mut dyn CommandList, _frame: usize, draws: &[PassDraw]) -> Result<u32> {
        let framebuffer = self
            .framebuffer
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("depth prepass framebuffer not created".to_string()))?;

        let pipeline = &self.pipeline;
        let mut count = 0;
        self.render_pass.record(cmd, framebuffer, |cmd| {
            cmd.bind_pipeline(pipeline)?;
            count = draw_geometry(cmd, pipeline, draws)?;
            Ok(())
        })?;
        Ok(count)
    }
}

#[cfg(test)]
#[path = "depth_prepass_tests.rs"]
mod tests;
