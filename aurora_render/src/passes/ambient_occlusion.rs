/// Screen-space ambient occlusion
///
/// Two fullscreen passes after the scene: the occlusion pass samples the
/// prepass depth with a hemisphere kernel rotated by a tiled 4x4 noise
/// texture, and the blur pass removes the noise pattern. The post pass reads
/// the blurred result.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::config::{SsaoConfig, MAX_SSAO_KERNEL_SIZE};
use crate::error::{Error, Result};
use crate::graphics_device::{
    AddressMode, AttachmentDesc, BufferDesc, CommandList, DescriptorSet, DescriptorWrite,
    FixedFunctionState, Filter, Framebuffer, GraphicsDevice, ImageDesc, ImageFormat,
    ImageLayout, ImageUsage, ImageView, Pipeline, Sampler, SamplerDesc, ShaderStages,
    SubpassDependency, Viewport,
};
use crate::passes::{PassContext, PassDraw, PassRenderer};
use crate::registry::{PipelineKey, RenderPassEntry, RenderPassRegistry};
use crate::resource::{GpuBuffer, GpuImage};

pub const SSAO_PASS: &str = "ssao";
pub const SSAO_BLUR_PASS: &str = "ssao_blur";

/// Noise texture edge length in texels
const NOISE_SIZE: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SsaoUniform {
    pub samples: [Vec4; MAX_SSAO_KERNEL_SIZE],
    /// kernel size, radius, bias, 0
    pub params: Vec4,
    /// Noise tiling: width / 4, height / 4
    pub noise_scale: Vec4,
}

/// Hemisphere sample kernel, denser near the origin
pub fn generate_kernel(samples: usize) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..samples)
        .map(|i| {
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.01..1.0),
            )
            .normalize();
            let t = i as f32 / samples as f32;
            let scale = 0.1 + 0.9 * t * t;
            (direction * rng.gen_range(0.0..1.0f32) * scale).extend(0.0)
        })
        .collect()
}

/// 4x4 RGBA8 texels holding random rotation vectors in XY
pub fn generate_noise() -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..NOISE_SIZE * NOISE_SIZE)
        .flat_map(|_| {
            let xy = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0).normalize_or_zero();
            [
                ((xy.x * 0.5 + 0.5) * 255.0) as u8,
                ((xy.y * 0.5 + 0.5) * 255.0) as u8,
                0,
                255,
            ]
        })
        .collect()
}

// Drop order: sets, then framebuffers, then images
struct AoTargets {
    occlusion_sets: Vec<Arc<dyn DescriptorSet>>,
    blur_set: Arc<dyn DescriptorSet>,
    occlusion_framebuffer: Arc<dyn Framebuffer>,
    blur_framebuffer: Arc<dyn Framebuffer>,
    // Sampled only through blur_set
    _occlusion: GpuImage,
    blurred: GpuImage,
}

pub struct AmbientOcclusion {
    occlusion_pass: Arc<RenderPassEntry>,
    blur_pass: Arc<RenderPassEntry>,
    occlusion_key: PipelineKey,
    blur_key: PipelineKey,
    occlusion_pipeline: Arc<dyn Pipeline>,
    blur_pipeline: Arc<dyn Pipeline>,
    settings: SsaoConfig,
    kernel: Vec<Vec4>,
    targets: Option<AoTargets>,
    params: GpuBuffer,
    noise: GpuImage,
    viewport: Option<Viewport>,
}

impl AmbientOcclusion {
    /// Register the "ssao" and "ssao_blur" render passes
    pub fn register_render_passes(
        device: &mut dyn GraphicsDevice,
        registry: &mut RenderPassRegistry,
    ) -> Result<()> {
        for name in [SSAO_PASS, SSAO_BLUR_PASS] {
            let color = AttachmentDesc::color(ImageFormat::R8_UNORM)
                .with_layouts(ImageLayout::Undefined, ImageLayout::ShaderReadOnly);
            let entry = RenderPassEntry::new(
                device,
                name,
                vec![color],
                vec![
                    SubpassDependency::sample_then_color_write(),
                    SubpassDependency::color_write_then_sample(),
                ],
                [1.0, 1.0, 1.0, 1.0],
            )?;
            registry.register(entry)?;
        }
        Ok(())
    }

    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let occlusion_pass = ctx.render_passes.get(SSAO_PASS)?.clone();
        let blur_pass = ctx.render_passes.get(SSAO_BLUR_PASS)?.clone();
        let fullscreen = ctx.config.shader_path("fullscreenTriangle.vert");
        let occlusion_key = PipelineKey::new(
            ShaderStages::new(fullscreen.clone(), ctx.config.shader_path("ssao.frag")),
            FixedFunctionState::fullscreen(),
            SSAO_PASS,
        );
        let blur_key = PipelineKey::new(
            ShaderStages::new(fullscreen, ctx.config.shader_path("ssaoBlur.frag")),
            FixedFunctionState::fullscreen(),
            SSAO_BLUR_PASS,
        );
        let occlusion_pipeline = ctx.pipeline(&occlusion_key)?;
        let blur_pipeline = ctx.pipeline(&blur_key)?;

        let settings = ctx.config.ssao;
        let kernel = generate_kernel(settings.kernel_size);
        let params = GpuBuffer::create(
            ctx.device,
            ctx.allocator,
            BufferDesc::uniform(std::mem::size_of::<SsaoUniform>() as u64),
        )?;
        let noise_sampler = SamplerDesc {
            filter: Filter::Nearest,
            address_mode: AddressMode::Repeat,
            ..SamplerDesc::nearest_clamp()
        };
        let noise = GpuImage::create(
            ctx.device,
            ctx.allocator,
            ImageDesc {
                width: NOISE_SIZE,
                height: NOISE_SIZE,
                ..ImageDesc::solid(ImageFormat::R8G8B8A8_UNORM, generate_noise())
            },
            Some(noise_sampler),
        )?;

        Ok(Self {
            occlusion_pass,
            blur_pass,
            occlusion_key,
            blur_key,
            occlusion_pipeline,
            blur_pipeline,
            settings,
            kernel,
            targets: None,
            params,
            noise,
            viewport: None,
        })
    }

    pub fn uniform(&self, viewport: Viewport) -> SsaoUniform {
        let mut uniform = SsaoUniform::zeroed();
        for (slot, sample) in uniform.samples.iter_mut().zip(&self.kernel) {
            *slot = *sample;
        }
        uniform.params = Vec4::new(
            self.kernel.len() as f32,
            self.settings.radius,
            self.settings.bias,
            0.0,
        );
        uniform.noise_scale = Vec4::new(
            viewport.width / NOISE_SIZE as f32,
            viewport.height / NOISE_SIZE as f32,
            0.0,
            0.0,
        );
        uniform
    }

    /// Blurred occlusion, sampled by the post pass
    pub fn blurred_binding(&self) -> Result<(Arc<dyn ImageView>, Arc<dyn Sampler>)> {
        self.targets()?.blurred.binding()
    }

    fn targets(&self) -> Result<&AoTargets> {
        self.targets
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("ambient occlusion resources not created".to_string()))
    }

    fn create_target(
        &self,
        ctx: &mut PassContext,
        pass: &RenderPassEntry,
        width: u32,
        height: u32,
    ) -> Result<(GpuImage, Arc<dyn Framebuffer>)> {
        let image = GpuImage::create(
            ctx.device,
            ctx.allocator,
            ImageDesc::attachment(width, height, ImageFormat::R8_UNORM, ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED),
            Some(SamplerDesc::linear_clamp()),
        )?;
        let framebuffer = pass.create_framebuffer(ctx.device, vec![image.view()?.clone()], width, height)?;
        Ok((image, framebuffer))
    }
}

impl PassRenderer for AmbientOcclusion {
    fn name(&self) -> &'static str {
        SSAO_PASS
    }

    fn create_resources(&mut self, ctx: &mut PassContext, viewport: Viewport) -> Result<()> {
        self.destroy_resources();

        let (depth_view, depth_sampler) = ctx.shared.depth.clone().ok_or_else(|| {
            Error::InvalidResource("ambient occlusion needs the prepass depth".to_string())
        })?;
        if ctx.shared.camera.len() != ctx.config.frames_in_flight {
            return Err(Error::InvalidResource(format!(
                "ambient occlusion got {} camera buffers for {} frames",
                ctx.shared.camera.len(), ctx.config.frames_in_flight
            )));
        }

        let (width, height) = (viewport.width as u32, viewport.height as u32);
        let (occlusion, occlusion_framebuffer) = self.create_target(ctx, &self.occlusion_pass, width, height)?;
        let (blurred, blur_framebuffer) = self.create_target(ctx, &self.blur_pass, width, height)?;

        self.params.write(0, bytemuck::bytes_of(&self.uniform(viewport)))?;

        let (noise_view, noise_sampler) = self.noise.binding()?;
        let params = self.params.buffer()?.clone();
        let mut occlusion_sets = Vec::with_capacity(ctx.shared.camera.len());
        for camera in &ctx.shared.camera {
            occlusion_sets.push(ctx.device.create_descriptor_set(&self.occlusion_pipeline, 0, &[
                DescriptorWrite::UniformBuffer { binding: 0, buffer: camera.clone() },
                DescriptorWrite::CombinedImageSampler {
                    binding: 1,
                    view: depth_view.clone(),
                    sampler: depth_sampler.clone(),
                },
                DescriptorWrite::CombinedImageSampler {
                    binding: 2,
                    view: noise_view.clone(),
                    sampler: noise_sampler.clone(),
                },
                DescriptorWrite::UniformBuffer { binding: 3, buffer: params.clone() },
            ])?);
        }

        let (view, sampler) = occlusion.binding()?;
        let blur_set = ctx.device.create_descriptor_set(&self.blur_pipeline, 0, &[
            DescriptorWrite::CombinedImageSampler { binding: 0, view, sampler },
        ])?;

        self.targets = Some(AoTargets {
            occlusion_sets,
            blur_set,
            occlusion_framebuffer,
            blur_framebuffer,
            _occlusion: occlusion,
            blurred,
        });
        self.viewport = Some(viewport);
        Ok(())
    }

    fn destroy_resources(&mut self) {
        self.targets = None;
        self.viewport = None;
    }

    /// Descriptor sets follow the pipelines, so live targets are rebuilt
    fn resolve_pipelines(&mut self, ctx: &mut PassContext) -> Result<()> {
        self.occlusion_pipeline = ctx.pipeline(&self.occlusion_key)?;
        self.blur_pipeline = ctx.pipeline(&self.blur_key)?;
        if let Some(viewport) = self.viewport {
            self.create_resources(ctx, viewport)?;
        }
        Ok(())
    }

    fn draw(&mut self, cmd: &mut dyn CommandList, frame: usize, _draws: &[PassDraw]) -> Result<u32> {
        let targets = self.targets()?;
        let occlusion_set = targets.occlusion_sets.get(frame).ok_or_else(|| {
            Error::InvalidResource(format!("no ambient occlusion set for frame {}", frame))
        })?;

        let occlusion_pipeline = &self.occlusion_pipeline;
        self.occlusion_pass.record(cmd, &targets.occlusion_framebuffer, |cmd| {
            cmd.bind_pipeline(occlusion_pipeline)?;
            cmd.bind_descriptor_set(occlusion_pipeline, 0, occlusion_set)?;
            cmd.draw(3, 0)
        })?;

        let blur_pipeline = &self.blur_pipeline;
        self.blur_pass.record(cmd, &targets.blur_framebuffer, |cmd| {
            cmd.bind_pipeline(blur_pipeline)?;
            cmd.bind_descriptor_set(blur_pipeline, 0, &targets.blur_set)?;
            cmd.draw(3, 0)
        })?;
        Ok(2)
    }
}

#[cfg(test)]
#[path = "ambient_occlusion_tests.rs"]
mod tests;
