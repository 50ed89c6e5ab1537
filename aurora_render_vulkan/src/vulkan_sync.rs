/// Fence and Semaphore - Vulkan implementations of the sync traits

use aurora_render::aurora::Result;
use aurora_render::aurora::device::{Fence as DeviceFence, Semaphore as DeviceSemaphore};
use aurora_render::engine_err;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan fence implementation
pub struct Fence {
    ctx: Arc<GpuContext>,
    pub(crate) fence: vk::Fence,
}

impl Fence {
    pub(crate) fn new(ctx: Arc<GpuContext>, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { ctx.device.create_fence(&create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create fence: {:?}", e))?;
        Ok(Self { ctx, fence })
    }
}

impl DeviceFence for Fence {
    fn wait(&self, timeout_ns: u64) -> Result<()> {
        unsafe { self.ctx.device.wait_for_fences(&[self.fence], true, timeout_ns) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to wait for fence: {:?}", e))
    }

    fn reset(&self) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[self.fence]) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to reset fence: {:?}", e))
    }

    fn is_signaled(&self) -> Result<bool> {
        unsafe { self.ctx.device.get_fence_status(self.fence) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to query fence status: {:?}", e))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

/// Vulkan binary semaphore implementation
pub struct Semaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Semaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create semaphore: {:?}", e))?;
        Ok(Self { ctx, semaphore })
    }
}

impl DeviceSemaphore for Semaphore {}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
