/// Framebuffer - Vulkan implementation of the Framebuffer trait
///
/// Wraps a VkFramebuffer that groups the attachments of one render pass.
/// Keeps its views alive; destroyed when dropped.

use aurora_render::aurora::device::{Framebuffer as DeviceFramebuffer, ImageView};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan framebuffer implementation
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    /// Vulkan framebuffer handle
    pub(crate) framebuffer: vk::Framebuffer,
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    attachments: Vec<Arc<dyn ImageView>>,
}

impl Framebuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        framebuffer: vk::Framebuffer,
        width: u32,
        height: u32,
        attachments: Vec<Arc<dyn ImageView>>,
    ) -> Self {
        Self { ctx, framebuffer, width, height, attachments }
    }
}

impl DeviceFramebuffer for Framebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
