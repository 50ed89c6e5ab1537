/// Frame pacing state: the frame state machine and its synchronization objects
///
/// Fences and image-acquired semaphores exist once per frame-in-flight slot,
/// render-finished semaphores once per swapchain image. Acquire pacing is per
/// slot while present must signal per actual image, so a semaphore is never
/// signaled again before the present that waits on it has consumed it.

use crate::error::{Error, Result};
use crate::graphics_device::{Fence, GraphicsDevice, Semaphore};

/// Orchestrator frame state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    Rebuilding,
}

pub struct FrameSync {
    fences: Vec<Box<dyn Fence>>,
    image_acquired: Vec<Box<dyn Semaphore>>,
    render_finished: Vec<Box<dyn Semaphore>>,
    current: usize,
}

impl FrameSync {
    /// Create signaled fences so the first wait on every slot returns at once
    pub fn new(device: &mut dyn GraphicsDevice, frames_in_flight: usize, image_count: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InitializationFailed("no frame-in-flight slots".to_string()));
        }
        let mut fences = Vec::with_capacity(frames_in_flight);
        let mut image_acquired = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            fences.push(device.create_fence(true)?);
            image_acquired.push(device.create_semaphore()?);
        }

        let mut sync = Self {
            fences,
            image_acquired,
            render_finished: Vec::new(),
            current: 0,
        };
        sync.rebuild_render_finished(device, image_count)?;
        Ok(sync)
    }

    /// Replace the per-image semaphores (swapchain image count changed)
    ///
    /// The device must be idle.
    pub fn rebuild_render_finished(&mut self, device: &mut dyn GraphicsDevice, image_count: usize) -> Result<()> {
        self.render_finished = (0..image_count)
            .map(|_| device.create_semaphore())
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Current frame-in-flight slot
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.fences.len();
    }

    pub fn frames_in_flight(&self) -> usize {
        self.fences.len()
    }

    pub fn render_finished_count(&self) -> usize {
        self.render_finished.len()
    }

    pub fn fence(&self, slot: usize) -> Result<&dyn Fence> {
        self.fences
            .get(slot)
            .map(|f| f.as_ref())
            .ok_or_else(|| Error::InvalidResource(format!("no fence for slot {}", slot)))
    }

    pub fn image_acquired(&self, slot: usize) -> Result<&dyn Semaphore> {
        self.image_acquired
            .get(slot)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::InvalidResource(format!("no image-acquired semaphore for slot {}", slot)))
    }

    pub fn render_finished(&self, image_index: usize) -> Result<&dyn Semaphore> {
        self.render_finished
            .get(image_index)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::InvalidResource(format!("no render-finished semaphore for image {}", image_index)))
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
