/// Frame orchestrator
///
/// Drives the per-frame state machine (fence wait, acquire, uniform update,
/// recording, submit, present), owns every device-side resource of the frame
/// graph and rebuilds the swapchain-dependent part of it on resize or when the
/// surface goes stale. Scene content comes from an injected `SceneView`,
/// models from an injected `ModelLoader`.
///
/// Per-frame pass order: depth prepass, one shadow pass per shadow-casting
/// light, scene (entities then skybox), ambient occlusion, post composite.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use bytemuck::Zeroable;
use glam::Mat4;
use rustc_hash::FxHashMap;
use crate::asset::{DefaultTextures, Model, ModelLoader, MATERIAL_SET};
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, AcquireOutcome, AttachmentDesc, CommandList, DescriptorSet, DescriptorWrite,
    FixedFunctionState, Framebuffer, GraphicsDevice, ImageDesc, ImageFormat, ImageLayout,
    ImageUsage, LoadOp, Pipeline, PipelineStages, PresentOutcome, SamplerDesc, ShaderStages,
    SubpassDependency, Swapchain, Viewport,
};
use crate::memory::{ResourceAllocator, SharedAllocator};
use crate::passes::{
    AmbientOcclusion, DepthPrepass, PassContext, PassDraw, PassRenderer, ShadowRenderer,
    SharedBindings,
};
use crate::registry::{PipelineCache, PipelineKey, RenderPassEntry, RenderPassRegistry};
use crate::renderer::{
    CountingCommandList, EntityBindings, EntityResources, FrameCommand, FrameState, FrameStats,
    FrameSync, FrameUniforms, Skybox,
};
use crate::resource::GpuImage;
use crate::scene::{Camera, EntityId, Renderable, SceneView};
use crate::uniforms::{CameraUniform, LightingData, ObjectUniform, TimeUniform};
use crate::window::WindowSurface;
use crate::{engine_debug, engine_error, engine_info, engine_warn};

pub const SCENE_PASS: &str = "scene";
pub const POST_PASS: &str = "post";

fn lock_device(device: &Arc<Mutex<dyn GraphicsDevice>>) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device
        .lock()
        .map_err(|_| Error::BackendError("graphics device lock poisoned".to_string()))
}

fn destroyed() -> Error {
    Error::InvalidResource("renderer was destroyed".to_string())
}

/// Register every render pass of the frame graph
fn register_render_passes(
    device: &mut dyn GraphicsDevice,
    registry: &mut RenderPassRegistry,
    config: &RendererConfig,
    swapchain_format: ImageFormat,
) -> Result<()> {
    DepthPrepass::register_render_pass(device, registry, config.clear_color)?;
    ShadowRenderer::register_render_pass(device, registry, config.clear_color)?;
    AmbientOcclusion::register_render_passes(device, registry)?;

    // Depth comes from the prepass and stays read-only
    let color = AttachmentDesc::color(device.color_format())
        .with_layouts(ImageLayout::Undefined, ImageLayout::ShaderReadOnly);
    let depth = AttachmentDesc::depth(device.depth_format())
        .with_load_op(LoadOp::Load)
        .with_layouts(ImageLayout::DepthStencilReadOnly, ImageLayout::DepthStencilReadOnly);
    let scene = RenderPassEntry::new(
        device,
        SCENE_PASS,
        vec![color, depth],
        vec![
            SubpassDependency::sample_then_color_write(),
            SubpassDependency::incoming(
                PipelineStages::LATE_FRAGMENT_TESTS,
                PipelineStages::EARLY_FRAGMENT_TESTS,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            ),
            SubpassDependency::depth_write_then_sample(),
            SubpassDependency::color_write_then_sample(),
        ],
        config.clear_color,
    )?;
    registry.register(scene)?;

    let target = AttachmentDesc::swapchain(swapchain_format).with_load_op(LoadOp::DontCare);
    let post = RenderPassEntry::new(
        device,
        POST_PASS,
        vec![target],
        vec![SubpassDependency::incoming(
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::empty(),
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        )],
        config.clear_color,
    )?;
    registry.register(post)?;
    Ok(())
}

/// Swapchain-sized resources owned by the orchestrator
struct ViewportTargets {
    post_set: Arc<dyn DescriptorSet>,
    post_framebuffers: Vec<Arc<dyn Framebuffer>>,
    scene_framebuffer: Arc<dyn Framebuffer>,
    color: GpuImage,
}

/// Scene snapshot taken once per update
struct FrameInput {
    renderables: Vec<Renderable>,
    camera: Option<Camera>,
    lighting: LightingData,
}

struct RecordCounts {
    draw_calls: u32,
    pipeline_binds: u32,
}

// Fields drop in declaration order: users before what they reference
struct GpuState {
    entities: FxHashMap<EntityId, EntityResources>,
    models: FxHashMap<String, Model>,
    skybox: Skybox,
    targets: Option<ViewportTargets>,
    post_pipeline: Arc<dyn Pipeline>,
    ambient_occlusion: AmbientOcclusion,
    shadow: ShadowRenderer,
    prepass: DepthPrepass,
    uniforms: FrameUniforms,
    defaults: DefaultTextures,
    command_lists: Vec<Option<Box<dyn CommandList>>>,
    sync: FrameSync,
    swapchain: Box<dyn Swapchain>,
    pipelines: PipelineCache,
    render_passes: RenderPassRegistry,
    post_key: PipelineKey,
}

impl GpuState {
    fn new(
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let swapchain = device.create_swapchain(width, height, config.vsync)?;

        engine_info!("aurora::Renderer", "Frames in flight: {}", config.frames_in_flight);
        engine_info!("aurora::Renderer", "Swapchain: {} images, format {:?}, present mode {}",
            swapchain.image_count(), swapchain.format(), swapchain.present_mode());
        engine_info!("aurora::Renderer", "Color format {:?}, depth format {:?}",
            device.color_format(), device.depth_format());

        let sync = FrameSync::new(device, config.frames_in_flight, swapchain.image_count())?;
        let command_lists = (0..config.frames_in_flight)
            .map(|_| device.create_command_list().map(Some))
            .collect::<Result<Vec<_>>>()?;

        let mut render_passes = RenderPassRegistry::new();
        register_render_passes(device, &mut render_passes, config, swapchain.format())?;

        let uniforms = FrameUniforms::new(device, allocator, config.frames_in_flight)?;
        let defaults = DefaultTextures::create(device, allocator)?;

        let mut pipelines = PipelineCache::new();
        let shared = SharedBindings {
            camera: uniforms.camera_buffers()?,
            depth: None,
        };
        let mut ctx = PassContext {
            device: &mut *device,
            allocator,
            render_passes: &render_passes,
            pipelines: &mut pipelines,
            config,
            shared: &shared,
        };
        let prepass = DepthPrepass::new(&mut ctx)?;
        let shadow = ShadowRenderer::new(&mut ctx)?;
        let ambient_occlusion = AmbientOcclusion::new(&mut ctx)?;
        let skybox = Skybox::new(&mut ctx)?;
        let post_key = PipelineKey::new(
            ShaderStages::new(
                config.shader_path("fullscreenTriangle.vert"),
                config.shader_path("postProcess.frag"),
            ),
            FixedFunctionState::fullscreen(),
            POST_PASS,
        );
        let post_pipeline = ctx.pipeline(&post_key)?;

        Ok(Self {
            entities: FxHashMap::default(),
            models: FxHashMap::default(),
            skybox,
            targets: None,
            post_pipeline,
            ambient_occlusion,
            shadow,
            prepass,
            uniforms,
            defaults,
            command_lists,
            sync,
            swapchain,
            pipelines,
            render_passes,
            post_key,
        })
    }

    fn shared_bindings(&self) -> Result<SharedBindings> {
        Ok(SharedBindings {
            camera: self.uniforms.camera_buffers()?,
            depth: self.prepass.depth_binding().ok(),
        })
    }

    /// Prepass depth, color target, framebuffers, occlusion targets and post set
    fn create_viewport_resources(
        &mut self,
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        config: &RendererConfig,
        viewport: Viewport,
    ) -> Result<()> {
        let (width, height) = (viewport.width as u32, viewport.height as u32);

        let shared = self.shared_bindings()?;
        self.prepass.create_resources(&mut PassContext {
            device: &mut *device,
            allocator,
            render_passes: &self.render_passes,
            pipelines: &mut self.pipelines,
            config,
            shared: &shared,
        }, viewport)?;

        let shared = self.shared_bindings()?;
        self.ambient_occlusion.create_resources(&mut PassContext {
            device: &mut *device,
            allocator,
            render_passes: &self.render_passes,
            pipelines: &mut self.pipelines,
            config,
            shared: &shared,
        }, viewport)?;

        let color_format = device.color_format();
        let color = GpuImage::create(
            device,
            allocator,
            ImageDesc::attachment(width, height, color_format, ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED),
            Some(SamplerDesc::linear_clamp()),
        )?;
        let scene_framebuffer = self.render_passes.get(SCENE_PASS)?.create_framebuffer(
            device,
            vec![color.view()?.clone(), self.prepass.depth_view()?.clone()],
            width,
            height,
        )?;

        let post_pass = self.render_passes.get(POST_PASS)?;
        let mut post_framebuffers = Vec::with_capacity(self.swapchain.image_count());
        for index in 0..self.swapchain.image_count() {
            let view = self.swapchain.image_view(index)?;
            post_framebuffers.push(post_pass.create_framebuffer(device, vec![view], width, height)?);
        }

        let post_set = device.create_descriptor_set(
            &self.post_pipeline,
            0,
            &Self::post_writes(&color, &self.ambient_occlusion)?,
        )?;

        self.targets = Some(ViewportTargets {
            post_set,
            post_framebuffers,
            scene_framebuffer,
            color,
        });
        Ok(())
    }

    fn post_writes(color: &GpuImage, ambient_occlusion: &AmbientOcclusion) -> Result<Vec<DescriptorWrite>> {
        let (view, sampler) = color.binding()?;
        let (ao_view, ao_sampler) = ambient_occlusion.blurred_binding()?;
        Ok(vec![
            DescriptorWrite::CombinedImageSampler { binding: 0, view, sampler },
            DescriptorWrite::CombinedImageSampler { binding: 1, view: ao_view, sampler: ao_sampler },
        ])
    }

    /// Post set, framebuffers, scene targets, then pass resources
    fn destroy_viewport_resources(&mut self) {
        self.targets = None;
        self.ambient_occlusion.destroy_resources();
        self.prepass.destroy_resources();
    }

    fn recreate_entity_sets(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let bindings = EntityBindings {
            uniforms: &self.uniforms,
            shadow: &self.shadow,
            prepass_pipeline: self.prepass.pipeline(),
        };
        for entity in self.entities.values_mut() {
            entity.create_descriptor_sets(device, &bindings)?;
        }
        Ok(())
    }

    fn load_entity(
        &mut self,
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        config: &RendererConfig,
        loader: &mut dyn ModelLoader,
        renderable: &Renderable,
    ) -> Result<()> {
        if self.entities.contains_key(&renderable.id) {
            return Ok(());
        }

        let key = PipelineKey::new(
            renderable.shaders.clone(),
            FixedFunctionState::scene(renderable.topology),
            SCENE_PASS,
        );
        let pipeline = self.pipelines.get_or_create(device, &self.render_passes, &key)?;

        let path = &renderable.model_path;
        if !self.models.contains_key(path) {
            let model = loader.load_model(device, allocator, path, &self.defaults)?;
            self.models.insert(path.clone(), model);
        }
        if let Some(model) = self.models.get_mut(path) {
            model.create_descriptor_sets(device, &key, &pipeline)?;
        }

        let mut entity = EntityResources::new(device, allocator, config.frames_in_flight, key, pipeline, path)?;
        entity.create_descriptor_sets(device, &EntityBindings {
            uniforms: &self.uniforms,
            shadow: &self.shadow,
            prepass_pipeline: self.prepass.pipeline(),
        })?;
        self.entities.insert(renderable.id, entity);

        engine_debug!("aurora::Renderer", "Entity {} loaded ('{}')", renderable.id.0, path);
        Ok(())
    }

    /// Drop an entity, and its model once no other entity uses it
    ///
    /// The device must be idle.
    fn remove_entity(&mut self, id: EntityId) {
        let Some(entity) = self.entities.remove(&id) else {
            return;
        };
        if !self.entities.values().any(|e| e.model_path == entity.model_path) {
            self.models.remove(&entity.model_path);
        }
        engine_debug!("aurora::Renderer", "Entity {} unloaded", id.0);
    }

    fn write_uniforms(&self, frame: usize, input: &FrameInput, projection: Mat4, seconds: f32) -> Result<()> {
        let camera = match &input.camera {
            Some(camera) => CameraUniform::new(camera, projection),
            None => CameraUniform::zeroed(),
        };
        self.uniforms.camera.write(frame, &camera)?;
        self.uniforms.lighting.write(frame, &input.lighting.lighting)?;
        self.uniforms.time.write(frame, &TimeUniform::new(seconds))?;
        self.shadow.write_uniform(frame, &input.lighting.shadow)?;

        for renderable in &input.renderables {
            if let Some(entity) = self.entities.get(&renderable.id) {
                entity.write_object(frame, &ObjectUniform { model: renderable.transform.model_matrix() })?;
            }
        }
        Ok(())
    }

    /// Record the whole frame; the list is always ended once begun
    fn record(
        &mut self,
        cmd: &mut dyn CommandList,
        frame: usize,
        image_index: usize,
        renderables: &[Renderable],
    ) -> Result<RecordCounts> {
        let mut counting = CountingCommandList::new(cmd);
        counting.begin()?;
        let result = self.record_passes(&mut counting, frame, image_index, renderables);
        let end = counting.end();
        result.and(end)?;
        Ok(RecordCounts {
            draw_calls: counting.draw_calls,
            pipeline_binds: counting.pipeline_binds,
        })
    }

    fn record_passes(
        &mut self,
        cmd: &mut dyn CommandList,
        frame: usize,
        image_index: usize,
        renderables: &[Renderable],
    ) -> Result<()> {
        let visible: Vec<(&EntityResources, &Model)> = renderables
            .iter()
            .filter_map(|r| {
                let entity = self.entities.get(&r.id)?;
                let model = self.models.get(&entity.model_path)?;
                Some((entity, model))
            })
            .collect();

        let draws = visible
            .iter()
            .map(|&(entity, model)| Ok(PassDraw { model, descriptor_set: entity.prepass_set(frame)? }))
            .collect::<Result<Vec<_>>>()?;
        self.prepass.draw(cmd, frame, &draws)?;

        if !self.shadow.casters().is_empty() {
            let draws = visible
                .iter()
                .map(|&(entity, model)| Ok(PassDraw { model, descriptor_set: entity.shadow_set(frame)? }))
                .collect::<Result<Vec<_>>>()?;
            self.shadow.draw(cmd, frame, &draws)?;
        }

        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| Error::InvalidResource("viewport resources not created".to_string()))?;
        let skybox = &self.skybox;
        self.render_passes.get(SCENE_PASS)?.record(cmd, &targets.scene_framebuffer, |cmd| {
            // Only the scene pass draws with several pipelines; every other pass binds its one pipeline once per begin
            let mut bound: Option<&Arc<dyn Pipeline>> = None;
            for &(entity, model) in &visible {
                let pipeline = &entity.pipeline;
                if !bound.is_some_and(|current| Arc::ptr_eq(current, pipeline)) {
                    cmd.bind_pipeline(pipeline)?;
                    bound = Some(pipeline);
                }
                if let Some(set) = entity.scene_set(frame) {
                    cmd.bind_descriptor_set(pipeline, 0, set)?;
                }
                let material = (pipeline.descriptor_set_count() > MATERIAL_SET).then_some(&entity.key);
                model.draw(cmd, pipeline, material)?;
            }
            skybox.draw(cmd, frame)?;
            Ok(())
        })?;

        self.ambient_occlusion.draw(cmd, frame, &[])?;

        let framebuffer = targets.post_framebuffers.get(image_index).ok_or_else(|| {
            Error::InvalidResource(format!("no post framebuffer for swapchain image {}", image_index))
        })?;
        let post_pipeline = &self.post_pipeline;
        let post_set = &targets.post_set;
        self.render_passes.get(POST_PASS)?.record(cmd, framebuffer, |cmd| {
            cmd.bind_pipeline(post_pipeline)?;
            cmd.bind_descriptor_set(post_pipeline, 0, post_set)?;
            cmd.draw(3, 0)
        })
    }
}

/// Frame orchestrator
pub struct Renderer {
    gpu: Option<GpuState>,
    device: Arc<Mutex<dyn GraphicsDevice>>,
    window: Box<dyn WindowSurface>,
    scene: Arc<dyn SceneView>,
    loader: Box<dyn ModelLoader>,
    allocator: SharedAllocator,
    config: RendererConfig,
    state: FrameState,
    resize_pending: bool,
    viewport: Viewport,
    projection: Option<Mat4>,
    started: Instant,
}

impl Renderer {
    /// Build the swapchain, render passes, pipelines, sync objects and the
    /// resources of every entity the scene currently lists
    ///
    /// Blocks while the window has zero area.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` for an invalid configuration or a window closed
    /// before it ever had an area; any device creation error is returned as is
    /// and is fatal.
    pub fn new(
        device: Arc<Mutex<dyn GraphicsDevice>>,
        window: Box<dyn WindowSurface>,
        scene: Arc<dyn SceneView>,
        loader: Box<dyn ModelLoader>,
        config: RendererConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut renderer = Self {
            gpu: None,
            device,
            window,
            scene,
            loader,
            allocator: ResourceAllocator::new().shared(),
            config,
            state: FrameState::Idle,
            resize_pending: false,
            viewport: Viewport::full(1, 1),
            projection: None,
            started: Instant::now(),
        };

        let (width, height) = renderer.wait_for_extent().ok_or_else(|| {
            Error::InitializationFailed("window closed before it had a drawable area".to_string())
        })?;

        let device_arc = renderer.device.clone();
        let mut guard = lock_device(&device_arc)?;
        let device: &mut dyn GraphicsDevice = &mut *guard;

        let mut gpu = GpuState::new(device, &renderer.allocator, &renderer.config, width, height)?;
        renderer.viewport = Viewport::full(gpu.swapchain.width(), gpu.swapchain.height());
        gpu.create_viewport_resources(device, &renderer.allocator, &renderer.config, renderer.viewport)?;
        renderer.gpu = Some(gpu);
        renderer.projection = renderer.compute_projection();
        renderer.sync_scene(device)?;

        engine_info!("aurora::Renderer", "Renderer initialized at {}x{} with {} entities",
            renderer.viewport.width, renderer.viewport.height, renderer.entity_count());
        Ok(renderer)
    }

    /// Run one frame
    ///
    /// Staleness of the surface is absorbed here: the swapchain is rebuilt and
    /// the call returns normally (with no draws when acquisition failed).
    ///
    /// # Errors
    ///
    /// Every other acquire, submit or present failure is fatal for the render
    /// loop. `LimitExceeded` when the scene has more lights than configured.
    pub fn update(&mut self, commands: &[FrameCommand]) -> Result<FrameStats> {
        if self.gpu.is_none() {
            return Err(destroyed());
        }
        let device_arc = self.device.clone();
        let mut guard = lock_device(&device_arc)?;
        let device: &mut dyn GraphicsDevice = &mut *guard;
        let mut stats = FrameStats::default();

        self.window.poll_events();
        for command in commands {
            self.handle_command(device, *command)?;
        }

        if self.window.resize_requested() {
            self.resize_pending = true;
        }
        let (width, height) = self.window.current_extent();
        if self.resize_pending || width == 0 || height == 0 {
            stats.state = FrameState::Rebuilding;
            if !self.rebuild(device)? {
                return Ok(stats);
            }
            stats.rebuilt = true;
        }

        let input = self.sync_scene(device)?;
        let projection = match &input.camera {
            Some(camera) => self.projection_for(camera),
            None => Mat4::IDENTITY,
        };
        let seconds = self.started.elapsed().as_secs_f32();

        let gpu = self.gpu.as_mut().ok_or_else(destroyed)?;
        self.state = FrameState::Acquiring;
        stats.state = self.state;
        let frame = gpu.sync.current();
        gpu.sync.fence(frame)?.wait(u64::MAX)?;

        let image_index = match gpu.swapchain.acquire_next_image(gpu.sync.image_acquired(frame)?)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    self.resize_pending = true;
                }
                image_index as usize
            }
            AcquireOutcome::OutOfDate => {
                engine_debug!("aurora::Renderer", "Swapchain out of date on acquire");
                stats.state = FrameState::Rebuilding;
                stats.rebuilt = self.rebuild(device)?;
                self.state = FrameState::Idle;
                return Ok(stats);
            }
        };

        gpu.write_uniforms(frame, &input, projection, seconds)?;
        let lights = input.lighting.lighting.num_lights;
        stats.light_counts = [lights[0], lights[1], lights[2]];

        self.state = FrameState::Recording;
        let mut cmd = gpu
            .command_lists
            .get_mut(frame)
            .and_then(Option::take)
            .ok_or_else(|| Error::InvalidResource(format!("no command list for frame {}", frame)))?;
        let recorded = gpu.record(cmd.as_mut(), frame, image_index, &input.renderables);
        let submitted = recorded.and_then(|counts| {
            let fence = gpu.sync.fence(frame)?;
            fence.reset()?;
            device.submit(
                &*cmd,
                &[(gpu.sync.image_acquired(frame)?, PipelineStages::COLOR_ATTACHMENT_OUTPUT)],
                &[gpu.sync.render_finished(image_index)?],
                Some(fence),
            )?;
            Ok(counts)
        });
        gpu.command_lists[frame] = Some(cmd);
        let counts = submitted?;
        self.state = FrameState::Submitted;
        stats.draw_calls = counts.draw_calls;
        stats.pipeline_binds = counts.pipeline_binds;
        stats.shadow_passes = gpu.shadow.casters().len() as u32;

        self.state = FrameState::Presenting;
        stats.state = self.state;
        let outcome = gpu.swapchain.present(image_index as u32, gpu.sync.render_finished(image_index)?)?;
        stats.presented = outcome != PresentOutcome::OutOfDate;
        gpu.sync.advance();

        if self.window.resize_requested() {
            self.resize_pending = true;
        }
        if outcome.needs_rebuild() || self.resize_pending {
            stats.state = FrameState::Rebuilding;
            stats.rebuilt |= self.rebuild(device)?;
        }

        self.state = FrameState::Idle;
        Ok(stats)
    }

    /// Rebuild every swapchain-dependent resource at the current window extent
    ///
    /// Returns false when the window was closed while it had no area; nothing
    /// is rebuilt then.
    pub fn reload_on_resize(&mut self) -> Result<bool> {
        let device_arc = self.device.clone();
        let mut guard = lock_device(&device_arc)?;
        self.rebuild(&mut *guard)
    }

    fn rebuild(&mut self, device: &mut dyn GraphicsDevice) -> Result<bool> {
        self.state = FrameState::Rebuilding;
        let Some((width, height)) = self.wait_for_extent() else {
            engine_info!("aurora::Renderer", "Window closed while minimized");
            self.state = FrameState::Idle;
            return Ok(false);
        };
        self.resize_pending = false;

        device.wait_idle()?;
        let gpu = self.gpu.as_mut().ok_or_else(destroyed)?;
        gpu.destroy_viewport_resources();

        gpu.swapchain.recreate(width, height)?;
        let image_count = gpu.swapchain.image_count();
        if image_count != gpu.sync.render_finished_count() {
            gpu.sync.rebuild_render_finished(device, image_count)?;
        }

        self.viewport = Viewport::full(gpu.swapchain.width(), gpu.swapchain.height());
        gpu.create_viewport_resources(device, &self.allocator, &self.config, self.viewport)?;
        gpu.recreate_entity_sets(device)?;
        self.projection = self.compute_projection();

        engine_debug!("aurora::Renderer", "Swapchain rebuilt at {}x{} ({} images)",
            self.viewport.width, self.viewport.height, image_count);
        self.state = FrameState::Idle;
        Ok(true)
    }

    /// Block on window events until the extent has an area
    ///
    /// The resize flag is cleared before each extent read, so a resize landing
    /// after the read stays pending for the next update.
    fn wait_for_extent(&mut self) -> Option<(u32, u32)> {
        loop {
            self.window.resize_requested();
            let (width, height) = self.window.current_extent();
            if width > 0 && height > 0 {
                return Some((width, height));
            }
            if self.window.close_requested() {
                return None;
            }
            self.window.wait_events();
        }
    }

    fn aspect(&self) -> f32 {
        self.viewport.width / self.viewport.height.max(1.0)
    }

    fn compute_projection(&self) -> Option<Mat4> {
        self.scene.camera().map(|camera| camera.projection_matrix(self.aspect()))
    }

    fn projection_for(&mut self, camera: &Camera) -> Mat4 {
        let aspect = self.aspect();
        *self.projection.get_or_insert_with(|| camera.projection_matrix(aspect))
    }

    /// Bring GPU state in line with the scene and snapshot it for this frame
    ///
    /// Loads new renderables, unloads vanished ones, rebuilds the shadow maps
    /// when the caster count changed and follows the camera environment. Any
    /// release waits for the device to go idle first.
    fn sync_scene(&mut self, device: &mut dyn GraphicsDevice) -> Result<FrameInput> {
        let renderables = self.scene.renderables();
        let camera = self.scene.camera();
        let lights = self.scene.lights();
        let lighting = LightingData::gather(
            &lights,
            camera.as_ref().unwrap_or(&Camera::default()),
            &self.config.light_limits,
        )?;

        let gpu = self.gpu.as_mut().ok_or_else(destroyed)?;
        let vanished: Vec<EntityId> = gpu
            .entities
            .keys()
            .filter(|id| !renderables.iter().any(|r| r.id == **id))
            .copied()
            .collect();
        let casters_changed = lighting.shadow_casters.len() != gpu.shadow.map_count();
        let environment = camera.as_ref().and_then(|c| c.environment.clone());
        let environment_changed = gpu.skybox.environment() != environment.as_deref();

        if !vanished.is_empty() || casters_changed || environment_changed {
            device.wait_idle()?;
        }
        for id in vanished {
            gpu.remove_entity(id);
        }

        gpu.shadow.set_casters(lighting.shadow_casters.clone());
        let shared = gpu.shared_bindings()?;
        let mut ctx = PassContext {
            device: &mut *device,
            allocator: &self.allocator,
            render_passes: &gpu.render_passes,
            pipelines: &mut gpu.pipelines,
            config: &self.config,
            shared: &shared,
        };
        if casters_changed {
            gpu.shadow.create_resources(&mut ctx, self.viewport)?;
        }
        if environment_changed {
            gpu.skybox.set_environment(&mut ctx, self.loader.as_mut(), environment.as_deref())?;
        }
        if casters_changed {
            gpu.recreate_entity_sets(device)?;
        }

        for renderable in &renderables {
            gpu.load_entity(device, &self.allocator, &self.config, self.loader.as_mut(), renderable)?;
        }

        Ok(FrameInput { renderables, camera, lighting })
    }

    fn handle_command(&mut self, device: &mut dyn GraphicsDevice, command: FrameCommand) -> Result<()> {
        match command {
            FrameCommand::ReloadPipelines => self.reload_pipelines(device),
            FrameCommand::AnalyzeMemory => {
                self.allocator
                    .lock()
                    .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?
                    .log_report();
                Ok(())
            }
        }
    }

    /// Recompile every pipeline in place and rebuild the sets that reference them
    fn reload_pipelines(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        device.wait_idle()?;
        let gpu = self.gpu.as_mut().ok_or_else(destroyed)?;
        let count = gpu.pipelines.reload_all(device, &gpu.render_passes)?;

        let shared = gpu.shared_bindings()?;
        let mut ctx = PassContext {
            device: &mut *device,
            allocator: &self.allocator,
            render_passes: &gpu.render_passes,
            pipelines: &mut gpu.pipelines,
            config: &self.config,
            shared: &shared,
        };
        gpu.prepass.resolve_pipelines(&mut ctx)?;
        gpu.shadow.resolve_pipelines(&mut ctx)?;
        gpu.ambient_occlusion.resolve_pipelines(&mut ctx)?;
        gpu.skybox.resolve_pipeline(&mut ctx)?;
        gpu.post_pipeline = ctx.pipeline(&gpu.post_key)?;

        if let Some(targets) = gpu.targets.as_mut() {
            targets.post_set = device.create_descriptor_set(
                &gpu.post_pipeline,
                0,
                &GpuState::post_writes(&targets.color, &gpu.ambient_occlusion)?,
            )?;
        }

        for model in gpu.models.values_mut() {
            model.clear_descriptor_sets();
        }
        for entity in gpu.entities.values_mut() {
            entity.pipeline = gpu.pipelines.get_or_create(device, &gpu.render_passes, &entity.key)?;
            if let Some(model) = gpu.models.get_mut(&entity.model_path) {
                model.create_descriptor_sets(device, &entity.key, &entity.pipeline)?;
            }
        }
        gpu.recreate_entity_sets(device)?;

        engine_info!("aurora::Renderer", "Hot reload complete ({} pipelines)", count);
        Ok(())
    }

    /// Create the GPU resources of entity `id` (no-op when already loaded)
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when the scene has no renderable `id` or its model
    /// cannot be found.
    pub fn load_entity(&mut self, id: EntityId) -> Result<()> {
        let renderable = self
            .scene
            .renderable(id)
            .ok_or_else(|| Error::ResourceNotFound(format!("entity {}", id.0)))?;
        let device_arc = self.device.clone();
        let mut guard = lock_device(&device_arc)?;
        let gpu = self.gpu.as_mut().ok_or_else(destroyed)?;
        gpu.load_entity(&mut *guard, &self.allocator, &self.config, self.loader.as_mut(), &renderable)
    }

    /// Release the GPU resources of entity `id` once the device is idle
    ///
    /// An entity the scene still lists is loaded again by the next `update`.
    pub fn unload_entity(&mut self, id: EntityId) -> Result<()> {
        let device_arc = self.device.clone();
        let guard = lock_device(&device_arc)?;
        let gpu = self.gpu.as_mut().ok_or_else(destroyed)?;
        if !gpu.entities.contains_key(&id) {
            return Err(Error::ResourceNotFound(format!("entity {} is not loaded", id.0)));
        }
        guard.wait_idle()?;
        gpu.remove_entity(id);
        Ok(())
    }

    /// Wait for the device to go idle, then release every GPU resource
    ///
    /// Idempotent; also runs on drop.
    pub fn destroy(&mut self) -> Result<()> {
        if self.gpu.is_none() {
            return Ok(());
        }
        let device_arc = self.device.clone();
        let guard = lock_device(&device_arc)?;
        guard.wait_idle()?;
        drop(self.gpu.take());
        drop(guard);

        let live = self.allocator.lock().map(|a| a.live_count()).unwrap_or(0);
        if live > 0 {
            engine_warn!("aurora::Renderer", "{} allocations still live after teardown", live);
        }
        self.state = FrameState::Idle;
        engine_info!("aurora::Renderer", "Renderer destroyed");
        Ok(())
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn allocator(&self) -> &SharedAllocator {
        &self.allocator
    }

    pub fn swapchain_extent(&self) -> Option<(u32, u32)> {
        self.gpu.as_ref().map(|gpu| (gpu.swapchain.width(), gpu.swapchain.height()))
    }

    pub fn swapchain_image_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.swapchain.image_count())
    }

    /// Fences and image-acquired semaphores
    pub fn frames_in_flight(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.sync.frames_in_flight())
    }

    pub fn render_finished_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.sync.render_finished_count())
    }

    pub fn pipeline_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.pipelines.len())
    }

    pub fn entity_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.entities.len())
    }

    pub fn is_loaded(&self, id: EntityId) -> bool {
        self.gpu.as_ref().is_some_and(|gpu| gpu.entities.contains_key(&id))
    }

    pub fn model_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.models.len())
    }

    pub fn shadow_map_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.shadow.map_count())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            engine_error!("aurora::Renderer", "Teardown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
