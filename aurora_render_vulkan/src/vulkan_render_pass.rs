/// RenderPass - Vulkan implementation of the RenderPass trait

use aurora_render::aurora::device::RenderPass as DeviceRenderPass;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan render pass implementation
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    /// Vulkan render pass handle
    pub(crate) render_pass: vk::RenderPass,
    attachment_count: usize,
    /// Color attachments of the subpass (one blend state each in pipelines)
    pub(crate) color_count: usize,
}

impl RenderPass {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        render_pass: vk::RenderPass,
        attachment_count: usize,
        color_count: usize,
    ) -> Self {
        Self { ctx, render_pass, attachment_count, color_count }
    }
}

impl DeviceRenderPass for RenderPass {
    fn attachment_count(&self) -> usize {
        self.attachment_count
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
