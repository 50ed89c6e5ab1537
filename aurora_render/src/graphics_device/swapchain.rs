/// Swapchain trait - presentable images cycled between rendering and display

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{ImageFormat, ImageView, Semaphore};

/// Result of an image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image ready once the semaphore signals; `suboptimal` asks for a rebuild after present
    Acquired { image_index: u32, suboptimal: bool },
    /// Surface changed, nothing was acquired
    OutOfDate,
}

/// Result of a present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain must be rebuilt
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Swapchain for presenting rendered images to a window
///
/// Staleness is reported through the outcome enums. Any other failure is an
/// `Err` and is fatal for the render loop.
pub trait Swapchain: Send + Sync {
    /// Acquire the next image; `signal` is signaled when it is ready for writing
    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> Result<AcquireOutcome>;

    /// Queue the image for display once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: &dyn Semaphore) -> Result<PresentOutcome>;

    /// Rebuild images and views at a new extent, retiring the old swapchain
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    /// Get the number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Get the width of the swapchain images in pixels
    fn width(&self) -> u32;

    /// Get the height of the swapchain images in pixels
    fn height(&self) -> u32;

    /// Get the pixel format of the swapchain images
    fn format(&self) -> ImageFormat;

    /// Name of the present mode in use (for logs)
    fn present_mode(&self) -> &str;

    /// View over swapchain image `index`
    fn image_view(&self, index: usize) -> Result<Arc<dyn ImageView>>;
}
