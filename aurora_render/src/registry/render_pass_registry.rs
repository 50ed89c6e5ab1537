/// Render-pass registry
///
/// A `RenderPassEntry` is an immutable render pass plus everything needed to
/// use it: the derived subpass references, one clear value per attachment, and
/// a framebuffer factory that checks views against the attachment list. A
/// window resize rebuilds framebuffers only; the entries themselves live as
/// long as the renderer.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, AttachmentDesc, AttachmentKind, AttachmentRef, ClearValue, CommandList,
    DependencyDirection, Framebuffer, FramebufferDesc, GraphicsDevice, ImageView,
    PipelineStages, RenderPass, RenderPassDesc, SubpassDependency, Viewport,
};
use crate::engine_debug;

/// Immutable named render pass
pub struct RenderPassEntry {
    name: String,
    render_pass: Arc<dyn RenderPass>,
    desc: RenderPassDesc,
    clear_values: Vec<ClearValue>,
}

impl RenderPassEntry {
    /// Derive the pass description and create the device render pass
    ///
    /// # Arguments
    ///
    /// * `name` - Registry name ("scene", "post", ...)
    /// * `attachments` - Attachments in framebuffer order
    /// * `dependencies` - Edges to the work before and after the pass
    /// * `clear_color` - Clear value for color attachments (depth clears to 1.0)
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        attachments: Vec<AttachmentDesc>,
        dependencies: Vec<SubpassDependency>,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        let desc = Self::describe(name, attachments, dependencies)?;
        let clear_values = Self::clear_values_for(&desc.attachments, clear_color);
        let render_pass = device.create_render_pass(&desc)?;

        engine_debug!("aurora::RenderPassRegistry",
            "Render pass '{}' created ({} attachments, {} dependencies)",
            name, desc.attachments.len(), desc.dependencies.len());

        Ok(Self {
            name: name.to_string(),
            render_pass,
            desc,
            clear_values,
        })
    }

    /// Build subpass references from attachment kinds in declaration order
    ///
    /// Color and swapchain attachments become color references, the depth
    /// attachment becomes the depth reference. Every attachment a later pass
    /// samples must have a matching write-then-read dependency.
    pub fn describe(
        name: &str,
        attachments: Vec<AttachmentDesc>,
        dependencies: Vec<SubpassDependency>,
    ) -> Result<RenderPassDesc> {
        let mut color_refs = Vec::new();
        let mut depth_ref = None;

        for (index, attachment) in attachments.iter().enumerate() {
            let reference = AttachmentRef {
                index: index as u32,
                layout: attachment.subpass_layout(),
            };
            match attachment.kind {
                AttachmentKind::Color | AttachmentKind::Swapchain => color_refs.push(reference),
                AttachmentKind::Depth => {
                    if depth_ref.is_some() {
                        return Err(Error::InvalidResource(format!(
                            "render pass '{}' declares more than one depth attachment", name
                        )));
                    }
                    depth_ref = Some(reference);
                }
            }

            if attachment.is_sampled_later() {
                let write = match attachment.kind {
                    AttachmentKind::Depth => AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                    _ => AccessFlags::COLOR_ATTACHMENT_WRITE,
                };
                let covered = dependencies.iter().any(|dep| {
                    dep.direction == DependencyDirection::Outgoing
                        && dep.src_access.contains(write)
                        && dep.dst_access.contains(AccessFlags::SHADER_READ)
                });
                if !covered {
                    return Err(Error::InvalidResource(format!(
                        "render pass '{}': attachment {} is sampled later but no write-then-read dependency is declared",
                        name, index
                    )));
                }

                // Frames in flight share the image: the previous frame's reads must finish first
                if attachment.overwrites_contents() {
                    let guarded = dependencies.iter().any(|dep| {
                        dep.direction == DependencyDirection::Incoming
                            && dep.src_stages.contains(PipelineStages::FRAGMENT_SHADER)
                            && dep.dst_access.contains(write)
                    });
                    if !guarded {
                        return Err(Error::InvalidResource(format!(
                            "render pass '{}': attachment {} is overwritten while earlier frames may sample it; no read-then-write dependency is declared",
                            name, index
                        )));
                    }
                }
            }
        }

        Ok(RenderPassDesc {
            attachments,
            color_refs,
            depth_ref,
            dependencies,
        })
    }

    fn clear_values_for(attachments: &[AttachmentDesc], clear_color: [f32; 4]) -> Vec<ClearValue> {
        attachments
            .iter()
            .map(|a| match a.kind {
                AttachmentKind::Depth => ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
                _ => ClearValue::Color(clear_color),
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    pub fn clear_values(&self) -> &[ClearValue] {
        &self.clear_values
    }

    /// Create a framebuffer over `views` (one per attachment, same order)
    pub fn create_framebuffer(
        &self,
        device: &mut dyn GraphicsDevice,
        views: Vec<Arc<dyn ImageView>>,
        width: u32,
        height: u32,
    ) -> Result<Arc<dyn Framebuffer>> {
        if views.len() != self.desc.attachments.len() {
            return Err(Error::InvalidResource(format!(
                "render pass '{}' has {} attachments, framebuffer got {} views",
                self.name, self.desc.attachments.len(), views.len()
            )));
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!(
                "render pass '{}': framebuffer extent {}x{} has zero area",
                self.name, width, height
            )));
        }
        device.create_framebuffer(&FramebufferDesc {
            render_pass: &self.render_pass,
            attachments: views,
            width,
            height,
            layers: 1,
        })
    }

    /// Begin the pass, run `body`, end the pass
    ///
    /// Viewport and scissor are set to the framebuffer extent. Once the pass
    /// has begun it is always ended, even when `body` fails; the first error
    /// is returned.
    pub fn record<F>(
        &self,
        cmd: &mut dyn CommandList,
        framebuffer: &Arc<dyn Framebuffer>,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut dyn CommandList) -> Result<()>,
    {
        cmd.begin_render_pass(&self.render_pass, framebuffer, &self.clear_values)?;

        let viewport = Viewport::full(framebuffer.width(), framebuffer.height());
        let mut result = cmd.set_viewport(viewport);
        if result.is_ok() {
            result = cmd.set_scissor(viewport.scissor());
        }
        if result.is_ok() {
            result = body(cmd);
        }

        let end = cmd.end_render_pass();
        result.and(end)
    }
}

/// Named render passes
pub struct RenderPassRegistry {
    passes: FxHashMap<String, Arc<RenderPassEntry>>,
}

impl RenderPassRegistry {
    pub fn new() -> Self {
        Self {
            passes: FxHashMap::default(),
        }
    }

    /// Register a pass under its name
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` if the name is taken (passes are immutable).
    pub fn register(&mut self, entry: RenderPassEntry) -> Result<Arc<RenderPassEntry>> {
        if self.passes.contains_key(entry.name()) {
            return Err(Error::InvalidResource(format!(
                "render pass '{}' is already registered", entry.name()
            )));
        }
        let entry = Arc::new(entry);
        self.passes.insert(entry.name().to_string(), entry.clone());
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Result<&Arc<RenderPassEntry>> {
        self.passes
            .get(name)
            .ok_or_else(|| Error::ResourceNotFound(format!("render pass '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.passes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.passes.keys().map(|k| k.as_str()).collect()
    }
}

impl Default for RenderPassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "render_pass_registry_tests.rs"]
mod tests;
