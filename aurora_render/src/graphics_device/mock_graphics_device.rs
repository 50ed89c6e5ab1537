/// Mock graphics device for unit tests (no GPU required)
///
/// Every creation, recorded command, queue operation and destruction is
/// appended to a shared event log so tests can assert on ordering. Acquire and
/// present outcomes can be scripted to simulate a stale surface.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, Buffer, BufferDesc, Image, ImageDesc, ImageFormat, ImageView,
    Sampler, SamplerDesc, RenderPass, RenderPassDesc, Framebuffer, FramebufferDesc,
    Pipeline, PipelineDesc, ShaderStages, DescriptorSet, DescriptorWrite, CommandList,
    Swapchain, Fence, Semaphore, PipelineStages, AcquireOutcome, PresentOutcome,
    ClearValue, Viewport, Rect2D, IndexType, ShaderStageFlags, validate_image_desc,
};

/// Shared, ordered record of everything the mock did
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn push(log: &EventLog, event: impl Into<String>) {
    if let Ok(mut log) = log.lock() {
        log.push(event.into());
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub size: u64,
    pub contents: Mutex<Vec<u8>>,
    log: EventLog,
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset as usize + data.len();
        if end as u64 > self.size {
            return Err(Error::BackendError(format!(
                "buffer write {}..{} out of bounds ({} bytes)", offset, end, self.size
            )));
        }
        let mut contents = self.contents.lock()
            .map_err(|_| Error::BackendError("mock buffer lock poisoned".to_string()))?;
        contents[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        push(&self.log, "destroy_buffer");
    }
}

// ============================================================================
// Mock Image / View / Sampler
// ============================================================================

pub struct MockImage {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub mip_levels: u32,
    log: EventLog,
}

impl Image for MockImage {
    fn width(&self) -> u32 { self.width }
    fn height(&self) -> u32 { self.height }
    fn format(&self) -> ImageFormat { self.format }
    fn mip_levels(&self) -> u32 { self.mip_levels }
}

impl Drop for MockImage {
    fn drop(&mut self) {
        push(&self.log, "destroy_image");
    }
}

pub struct MockImageView {
    image: Arc<dyn Image>,
    log: EventLog,
}

impl ImageView for MockImageView {
    fn format(&self) -> ImageFormat { self.image.format() }
    fn width(&self) -> u32 { self.image.width() }
    fn height(&self) -> u32 { self.image.height() }
}

impl Drop for MockImageView {
    fn drop(&mut self) {
        push(&self.log, "destroy_image_view");
    }
}

pub struct MockSampler {
    pub desc: SamplerDesc,
    log: EventLog,
}

impl Sampler for MockSampler {
    fn desc(&self) -> SamplerDesc { self.desc }
}

impl Drop for MockSampler {
    fn drop(&mut self) {
        push(&self.log, "destroy_sampler");
    }
}

// ============================================================================
// Mock RenderPass / Framebuffer / Pipeline / DescriptorSet
// ============================================================================

pub struct MockRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn attachment_count(&self) -> usize {
        self.desc.attachments.len()
    }
}

pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
    pub attachment_count: usize,
    log: EventLog,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 { self.width }
    fn height(&self) -> u32 { self.height }
    fn attachment_count(&self) -> usize { self.attachment_count }
}

impl Drop for MockFramebuffer {
    fn drop(&mut self) {
        push(&self.log, "destroy_framebuffer");
    }
}

pub struct MockPipeline {
    pub shaders: ShaderStages,
    pub set_count: u32,
}

impl Pipeline for MockPipeline {
    fn descriptor_set_count(&self) -> u32 { self.set_count }
    fn push_constant_size(&self) -> u32 { 4 }
}

pub struct MockDescriptorSet {
    pub set_index: u32,
    pub writes: Vec<DescriptorWrite>,
}

impl DescriptorSet for MockDescriptorSet {
    fn set_index(&self) -> u32 { self.set_index }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub id: usize,
    log: EventLog,
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        push(&self.log, format!("begin {}", self.id));
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        push(&self.log, format!("end {}", self.id));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        _clear_values: &[ClearValue],
    ) -> Result<()> {
        push(&self.log, format!("begin_render_pass {}x{}", framebuffer.width(), framebuffer.height()));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        push(&self.log, "end_render_pass");
        Ok(())
    }

    fn set_viewport(&mut self, _viewport: Viewport) -> Result<()> {
        push(&self.log, "set_viewport");
        Ok(())
    }

    fn set_scissor(&mut self, _scissor: Rect2D) -> Result<()> {
        push(&self.log, "set_scissor");
        Ok(())
    }

    fn bind_pipeline(&mut self, _pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        push(&self.log, "bind_pipeline");
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        _descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        push(&self.log, format!("bind_descriptor_set {}", set_index));
        Ok(())
    }

    fn push_constants(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        _stages: ShaderStageFlags,
        _offset: u32,
        data: &[u8],
    ) -> Result<()> {
        push(&self.log, format!("push_constants {:?}", data));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        push(&self.log, "bind_vertex_buffer");
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64, _index_type: IndexType) -> Result<()> {
        push(&self.log, "bind_index_buffer");
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) -> Result<()> {
        push(&self.log, format!("draw {}", vertex_count));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        push(&self.log, format!("draw_indexed {}", index_count));
        Ok(())
    }
}

// ============================================================================
// Mock Fence / Semaphore
// ============================================================================

/// Fence state: `pending` means a submission is still executing on the "GPU"
#[derive(Debug, Default, Clone, Copy)]
pub struct MockFenceState {
    pub signaled: bool,
    pub pending: bool,
}

pub struct MockFence {
    pub id: usize,
    pub state: Arc<Mutex<MockFenceState>>,
    log: EventLog,
}

impl MockFence {
    fn state(&self) -> Result<std::sync::MutexGuard<'_, MockFenceState>> {
        self.state.lock()
            .map_err(|_| Error::BackendError("mock fence lock poisoned".to_string()))
    }
}

impl Fence for MockFence {
    /// Completes the pending submission; waiting on a fence nothing will signal fails
    fn wait(&self, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state()?;
        if state.pending {
            state.pending = false;
            state.signaled = true;
        }
        push(&self.log, format!("wait_fence {}", self.id));
        if !state.signaled {
            return Err(Error::BackendError(format!("fence {} would never signal", self.id)));
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.state()?;
        if state.pending {
            return Err(Error::BackendError(format!("fence {} reset while in flight", self.id)));
        }
        state.signaled = false;
        push(&self.log, format!("reset_fence {}", self.id));
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool> {
        Ok(self.state()?.signaled)
    }
}

pub struct MockSemaphore {
    pub id: usize,
}

impl Semaphore for MockSemaphore {}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub width: u32,
    pub height: u32,
    images: Vec<Arc<dyn ImageView>>,
    image_count: usize,
    next_image: u32,
    acquire_script: Arc<Mutex<VecDeque<AcquireOutcome>>>,
    present_script: Arc<Mutex<VecDeque<PresentOutcome>>>,
    log: EventLog,
}

impl MockSwapchain {
    fn build_images(&mut self) {
        self.images = (0..self.image_count)
            .map(|_| {
                let image: Arc<dyn Image> = Arc::new(MockImage {
                    width: self.width,
                    height: self.height,
                    format: ImageFormat::B8G8R8A8_SRGB,
                    mip_levels: 1,
                    log: self.log.clone(),
                });
                Arc::new(MockImageView { image, log: self.log.clone() }) as Arc<dyn ImageView>
            })
            .collect();
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, _signal: &dyn Semaphore) -> Result<AcquireOutcome> {
        let scripted = self.acquire_script.lock()
            .map_err(|_| Error::BackendError("acquire script lock poisoned".to_string()))?
            .pop_front();
        let outcome = scripted.unwrap_or_else(|| {
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            AcquireOutcome::Acquired { image_index, suboptimal: false }
        });
        push(&self.log, format!("acquire {:?}", outcome));
        Ok(outcome)
    }

    fn present(&mut self, image_index: u32, _wait: &dyn Semaphore) -> Result<PresentOutcome> {
        let outcome = self.present_script.lock()
            .map_err(|_| Error::BackendError("present script lock poisoned".to_string()))?
            .pop_front()
            .unwrap_or(PresentOutcome::Presented);
        push(&self.log, format!("present {} {:?}", image_index, outcome));
        Ok(outcome)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("swapchain extent {}x{}", width, height)));
        }
        push(&self.log, format!("recreate_swapchain {}x{}", width, height));
        self.width = width;
        self.height = height;
        self.next_image = 0;
        self.build_images();
        Ok(())
    }

    fn image_count(&self) -> usize { self.image_count }
    fn width(&self) -> u32 { self.width }
    fn height(&self) -> u32 { self.height }
    fn format(&self) -> ImageFormat { ImageFormat::B8G8R8A8_SRGB }
    fn present_mode(&self) -> &str { "FIFO" }

    fn image_view(&self, index: usize) -> Result<Arc<dyn ImageView>> {
        self.images.get(index).cloned().ok_or_else(|| {
            Error::ResourceNotFound(format!("swapchain image {}", index))
        })
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    pub log: EventLog,
    /// Swapchain image count handed to created swapchains
    pub image_count: usize,
    /// Descriptor set count reported by created pipelines
    pub pipeline_set_count: u32,
    pub acquire_script: Arc<Mutex<VecDeque<AcquireOutcome>>>,
    pub present_script: Arc<Mutex<VecDeque<PresentOutcome>>>,
    /// Extents of every image and framebuffer creation request
    pub created_extents: Arc<Mutex<Vec<(u32, u32)>>>,
    /// When set, swapchain creation fails
    pub fail_swapchain: bool,
    fences: Vec<Arc<Mutex<MockFenceState>>>,
    next_id: usize,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            image_count: 3,
            pipeline_set_count: 2,
            acquire_script: Arc::new(Mutex::new(VecDeque::new())),
            present_script: Arc::new(Mutex::new(VecDeque::new())),
            created_extents: Arc::new(Mutex::new(Vec::new())),
            fail_swapchain: false,
            fences: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_image_count(mut self, image_count: usize) -> Self {
        self.image_count = image_count;
        self
    }

    /// Submissions not yet completed by a fence wait or `wait_idle`
    pub fn pending_submissions(&self) -> usize {
        self.fences
            .iter()
            .filter(|f| f.lock().map(|s| s.pending).unwrap_or(false))
            .count()
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn record_extent(&self, width: u32, height: u32) {
        if let Ok(mut extents) = self.created_extents.lock() {
            extents.push((width, height));
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        push(&self.log, format!("create_buffer {}", desc.size));
        Ok(Arc::new(MockBuffer {
            size: desc.size,
            contents: Mutex::new(vec![0u8; desc.size as usize]),
            log: self.log.clone(),
        }))
    }

    fn create_image(&mut self, desc: ImageDesc) -> Result<Arc<dyn Image>> {
        self.record_extent(desc.width, desc.height);
        validate_image_desc(&desc)?;
        push(&self.log, format!("create_image {}x{}", desc.width, desc.height));
        Ok(Arc::new(MockImage {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels: desc.mip_levels,
            log: self.log.clone(),
        }))
    }

    fn create_image_view(&mut self, image: &Arc<dyn Image>) -> Result<Arc<dyn ImageView>> {
        push(&self.log, "create_image_view");
        Ok(Arc::new(MockImageView { image: image.clone(), log: self.log.clone() }))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>> {
        push(&self.log, "create_sampler");
        Ok(Arc::new(MockSampler { desc, log: self.log.clone() }))
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        push(&self.log, format!("create_render_pass {}", desc.attachments.len()));
        Ok(Arc::new(MockRenderPass { desc: desc.clone() }))
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        self.record_extent(desc.width, desc.height);
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "framebuffer extent {}x{} has zero area", desc.width, desc.height
            )));
        }
        push(&self.log, format!("create_framebuffer {}x{}", desc.width, desc.height));
        Ok(Arc::new(MockFramebuffer {
            width: desc.width,
            height: desc.height,
            attachment_count: desc.attachments.len(),
            log: self.log.clone(),
        }))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        push(&self.log, format!("create_pipeline {}", desc.shaders.vertex));
        Ok(Arc::new(MockPipeline {
            shaders: desc.shaders.clone(),
            set_count: self.pipeline_set_count,
        }))
    }

    fn create_descriptor_set(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        writes: &[DescriptorWrite],
    ) -> Result<Arc<dyn DescriptorSet>> {
        push(&self.log, format!("create_descriptor_set {}", set_index));
        Ok(Arc::new(MockDescriptorSet { set_index, writes: writes.to_vec() }))
    }

    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>> {
        let id = self.next_id();
        Ok(Box::new(MockCommandList { id, log: self.log.clone() }))
    }

    fn create_swapchain(&mut self, width: u32, height: u32, _vsync: bool) -> Result<Box<dyn Swapchain>> {
        if self.fail_swapchain {
            return Err(Error::InitializationFailed("mock swapchain creation failed".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("swapchain extent {}x{}", width, height)));
        }
        push(&self.log, format!("create_swapchain {}x{}", width, height));
        let mut swapchain = MockSwapchain {
            width,
            height,
            images: Vec::new(),
            image_count: self.image_count,
            next_image: 0,
            acquire_script: self.acquire_script.clone(),
            present_script: self.present_script.clone(),
            log: self.log.clone(),
        };
        swapchain.build_images();
        Ok(Box::new(swapchain))
    }

    fn create_fence(&mut self, signaled: bool) -> Result<Box<dyn Fence>> {
        let id = self.next_id();
        push(&self.log, format!("create_fence {}", id));
        let state = Arc::new(Mutex::new(MockFenceState { signaled, pending: false }));
        self.fences.push(state.clone());
        Ok(Box::new(MockFence { id, state, log: self.log.clone() }))
    }

    fn create_semaphore(&mut self) -> Result<Box<dyn Semaphore>> {
        let id = self.next_id();
        push(&self.log, format!("create_semaphore {}", id));
        Ok(Box::new(MockSemaphore { id }))
    }

    fn submit(
        &mut self,
        _commands: &dyn CommandList,
        _wait: &[(&dyn Semaphore, PipelineStages)],
        _signal: &[&dyn Semaphore],
        fence: Option<&dyn Fence>,
    ) -> Result<()> {
        if let Some(fence) = fence {
            // Safe downcast: every fence handed to this device was created by it
            let mock_fence = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
            let mut state = mock_fence.state()?;
            if state.pending {
                return Err(Error::BackendError(format!("fence {} still in flight", mock_fence.id)));
            }
            if state.signaled {
                return Err(Error::BackendError(format!("fence {} submitted while signaled", mock_fence.id)));
            }
            state.pending = true;
            push(&self.log, format!("submit {}", mock_fence.id));
        } else {
            push(&self.log, "submit");
        }
        Ok(())
    }

    /// Completes every pending submission
    fn wait_idle(&self) -> Result<()> {
        for fence in &self.fences {
            if let Ok(mut state) = fence.lock() {
                if state.pending {
                    state.pending = false;
                    state.signaled = true;
                }
            }
        }
        push(&self.log, "wait_idle");
        Ok(())
    }

    fn color_format(&self) -> ImageFormat {
        ImageFormat::R16G16B16A16_SFLOAT
    }

    fn depth_format(&self) -> ImageFormat {
        ImageFormat::D32_SFLOAT
    }
}

/// Count events starting with `prefix`
pub fn count_events(log: &EventLog, prefix: &str) -> usize {
    log.lock()
        .map(|log| log.iter().filter(|e| e.starts_with(prefix)).count())
        .unwrap_or(0)
}

/// Position of the first event starting with `prefix`
pub fn first_event(log: &EventLog, prefix: &str) -> Option<usize> {
    log.lock().ok()?.iter().position(|e| e.starts_with(prefix))
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
