/// GraphicsDevice trait - factory for GPU resources and queue submission

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, Image, ImageDesc, ImageView, Sampler, SamplerDesc,
    RenderPass, RenderPassDesc, Framebuffer, FramebufferDesc,
    Pipeline, PipelineDesc, DescriptorSet, DescriptorWrite,
    CommandList, Swapchain, Fence, Semaphore, ImageFormat, PipelineStages,
};

/// Main graphics device trait
///
/// Implemented by backend-specific devices (e.g. `VulkanGraphicsDevice`).
/// Shared as `Arc<Mutex<dyn GraphicsDevice>>`; every resource it hands out
/// releases its native objects when the last reference is dropped.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create an image, uploading `desc.data` when present
    fn create_image(&mut self, desc: ImageDesc) -> Result<Arc<dyn Image>>;

    /// Create a view over a whole image (cube view when it has 6 layers)
    fn create_image_view(&mut self, image: &Arc<dyn Image>) -> Result<Arc<dyn ImageView>>;

    /// Create a sampler
    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a render pass
    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Compile a graphics pipeline
    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Allocate and write a descriptor set for `set_index` of the pipeline layout
    fn create_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        writes: &[DescriptorWrite],
    ) -> Result<Arc<dyn DescriptorSet>>;

    /// Create a command list
    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>>;

    /// Create the swapchain for the device surface
    ///
    /// # Arguments
    ///
    /// * `width` - Requested width, clamped to the surface limits
    /// * `height` - Requested height, clamped to the surface limits
    /// * `vsync` - FIFO when true, MAILBOX preferred otherwise
    fn create_swapchain(&mut self, width: u32, height: u32, vsync: bool) -> Result<Box<dyn Swapchain>>;

    /// Create a fence
    fn create_fence(&mut self, signaled: bool) -> Result<Box<dyn Fence>>;

    /// Create a binary semaphore
    fn create_semaphore(&mut self) -> Result<Box<dyn Semaphore>>;

    /// Submit a recorded command list to the graphics queue
    ///
    /// # Arguments
    ///
    /// * `commands` - Recorded (ended) command list
    /// * `wait` - Semaphores to wait on, with the stage that waits
    /// * `signal` - Semaphores signaled on completion
    /// * `fence` - Fence signaled on completion (must be unsignaled)
    fn submit(
        &mut self,
        commands: &dyn CommandList,
        wait: &[(&dyn Semaphore, PipelineStages)],
        signal: &[&dyn Semaphore],
        fence: Option<&dyn Fence>,
    ) -> Result<()>;

    /// Wait for all GPU work to finish
    fn wait_idle(&self) -> Result<()>;

    /// Format of offscreen color targets
    fn color_format(&self) -> ImageFormat;

    /// Format of depth targets
    fn depth_format(&self) -> ImageFormat;
}
