/// Shadow map renderer
///
/// One depth-only pass per shadow-casting light into its own map. The light
/// index is pushed as a vertex-stage constant so a single pipeline selects the
/// right light-space transform from the shadow uniform. Slots of the scene's
/// shadow-map array without a caster are filled with a 1x1 fallback map.

use std::sync::Arc;
use crate::config::{MAX_DIRECTIONAL_LIGHTS, MAX_SPOT_LIGHTS};
use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, Buffer, CommandList, FixedFunctionState, Framebuffer, GraphicsDevice,
    ImageDesc, ImageLayout, ImageUsage, ImageView, Pipeline, Sampler, SamplerDesc,
    ShaderStageFlags, ShaderStages, SubpassDependency, Viewport,
};
use crate::passes::{draw_geometry, PassContext, PassDraw, PassRenderer};
use crate::registry::{PipelineKey, RenderPassEntry, RenderPassRegistry};
use crate::resource::{GpuImage, PerFrameUniform};
use crate::uniforms::{ShadowCaster, ShadowUniform};
use crate::engine_debug;

pub const SHADOW_PASS: &str = "shadow";

/// Length of the shadow-map array binding
pub const MAX_SHADOW_MAPS: usize = MAX_DIRECTIONAL_LIGHTS + MAX_SPOT_LIGHTS;

struct ShadowMap {
    framebuffer: Arc<dyn Framebuffer>,
    image: GpuImage,
}

pub struct ShadowRenderer {
    render_pass: Arc<RenderPassEntry>,
    key: PipelineKey,
    pipeline: Arc<dyn Pipeline>,
    uniforms: PerFrameUniform<ShadowUniform>,
    maps: Vec<ShadowMap>,
    fallback: GpuImage,
    casters: Vec<ShadowCaster>,
    map_size: u32,
}

impl ShadowRenderer {
    /// Register the "shadow" render pass
    pub fn register_render_pass(
        device: &mut dyn GraphicsDevice,
        registry: &mut RenderPassRegistry,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let depth = AttachmentDesc::depth(device.depth_format())
            .with_layouts(ImageLayout::Undefined, ImageLayout::DepthStencilReadOnly);
        let entry = RenderPassEntry::new(
            device,
            SHADOW_PASS,
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
        let render_pass = ctx.render_passes.get(SHADOW_PASS)?.clone();
        let key = PipelineKey::new(
            ShaderStages::new(ctx.config.shader_path("shadow.vert"), ctx.config.shader_path("shadow.frag")),
            FixedFunctionState::depth_only(),
            SHADOW_PASS,
        );
        let pipeline = ctx.pipeline(&key)?;
        let uniforms = PerFrameUniform::new(ctx.device, ctx.allocator, ctx.config.frames_in_flight)?;
        let fallback = Self::create_map(ctx, 1)?;

        Ok(Self {
            render_pass,
            key,
            pipeline,
            uniforms,
            maps: Vec::new(),
            fallback,
            casters: Vec::new(),
            map_size: ctx.config.shadow_map_size,
        })
    }

    fn create_map(ctx: &mut PassContext, size: u32) -> Result<GpuImage> {
        let format = ctx.device.depth_format();
        GpuImage::create(
            ctx.device,
            ctx.allocator,
            ImageDesc::attachment(size, size, format, ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED),
            Some(SamplerDesc::shadow()),
        )
    }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    pub fn pipeline_key(&self) -> &PipelineKey {
        &self.key
    }

    /// Casters rendered by the next `draw`
    ///
    /// When the count differs from `map_count`, the maps must be rebuilt with
    /// `create_resources` (device idle) before drawing.
    pub fn set_casters(&mut self, casters: Vec<ShadowCaster>) {
        self.casters = casters;
    }

    pub fn casters(&self) -> &[ShadowCaster] {
        &self.casters
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn write_uniform(&self, frame: usize, uniform: &ShadowUniform) -> Result<()> {
        self.uniforms.write(frame, uniform)
    }

    pub fn uniform_buffer(&self, frame: usize) -> Result<&Arc<dyn Buffer>> {
        self.uniforms.buffer(frame)
    }

    /// Shadow-map array binding: caster maps in caster order, fallback for the rest
    pub fn map_bindings(&self) -> Result<Vec<(Arc<dyn ImageView>, Arc<dyn Sampler>)>> {
        let fallback = self.fallback.binding()?;
        let mut bindings = self
            .maps
            .iter()
            .map(|map| map.image.binding())
            .collect::<Result<Vec<_>>>()?;
        bindings.resize(MAX_SHADOW_MAPS, fallback);
        Ok(bindings)
    }
}

impl PassRenderer for ShadowRenderer {
    fn name(&self) -> &'static str {
        SHADOW_PASS
    }

    /// Build one map per caster; shadow maps do not follow the viewport
    fn create_resources(&mut self, ctx: &mut PassContext, _viewport: Viewport) -> Result<()> {
        if self.casters.len() > MAX_SHADOW_MAPS {
            return Err(Error::LimitExceeded(format!(
                "{} shadow casters, limit is {}", self.casters.len(), MAX_SHADOW_MAPS
            )));
        }
        self.destroy_resources();

        for _ in 0..self.casters.len() {
            let image = Self::create_map(ctx, self.map_size)?;
            let framebuffer = self.render_pass.create_framebuffer(
                ctx.device,
                vec![image.view()?.clone()],
                self.map_size,
                self.map_size,
            )?;
            self.maps.push(ShadowMap { framebuffer, image });
        }

        engine_debug!("aurora::ShadowRenderer", "{} shadow maps of {}x{}",
            self.maps.len(), self.map_size, self.map_size);
        Ok(())
    }

    fn destroy_resources(&mut self) {
        self.maps.clear();
    }

    fn resolve_pipelines(&mut self, ctx: &mut PassContext) -> Result<()> {
        self.pipeline = ctx.pipeline(&self.key)?;
        Ok(())
    }

    fn draw(&mut self, cmd: &mut dyn CommandList, _frame: usize, draws: &[PassDraw]) -> Result<u32> {
        if self.maps.len() != self.casters.len() {
            return Err(Error::InvalidResource(format!(
                "{} shadow casters but {} shadow maps", self.casters.len(), self.maps.len()
            )));
        }

        let pipeline = &self.pipeline;
        let mut count = 0;
        for (caster, map) in self.casters.iter().zip(&self.maps) {
            self.render_pass.record(cmd, &map.framebuffer, |cmd| {
                cmd.bind_pipeline(pipeline)?;
                cmd.push_constants(pipeline, ShaderStageFlags::VERTEX, 0, &caster.caster_index.to_ne_bytes())?;
                count += draw_geometry(cmd, pipeline, draws)?;
                Ok(())
            })?;
        }
        Ok(count)
    }
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
