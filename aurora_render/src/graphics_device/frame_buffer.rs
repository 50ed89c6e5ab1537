/// Framebuffer trait - binds image views to a render pass at a fixed extent
///
/// Views must be supplied in the attachment order used at pass creation.
/// Recreated when the attachments change (window resize), never mutated.

use std::sync::Arc;
use crate::graphics_device::{RenderPass, ImageView};

/// Framebuffer
pub trait Framebuffer: Send + Sync {
    /// Get the width in pixels
    fn width(&self) -> u32;

    /// Get the height in pixels
    fn height(&self) -> u32;

    /// Number of bound attachments
    fn attachment_count(&self) -> usize;
}

/// Descriptor for creating a framebuffer
pub struct FramebufferDesc<'a> {
    /// The render pass this framebuffer is compatible with
    pub render_pass: &'a Arc<dyn RenderPass>,
    /// Attachments, in pass attachment order
    pub attachments: Vec<Arc<dyn ImageView>>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Layer count
    pub layers: u32,
}
