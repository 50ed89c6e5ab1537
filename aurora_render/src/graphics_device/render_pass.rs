/// Render pass trait and descriptors
///
/// Describes attachment load/store policies, layouts and the dependency edges
/// between a pass and the work outside of it.

use crate::graphics_device::{ImageFormat, SampleCount};

/// Role of an attachment inside the single subpass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// Offscreen color target
    Color,
    /// Depth/stencil target
    Depth,
    /// Swapchain image, presented after the pass
    Swapchain,
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferDst,
    PresentSrc,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDesc {
    pub kind: AttachmentKind,
    pub format: ImageFormat,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    fn new(kind: AttachmentKind, format: ImageFormat, final_layout: ImageLayout) -> Self {
        Self {
            kind,
            format,
            samples: SampleCount::S1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout,
        }
    }

    /// Color attachment, cleared and stored, ends in `ColorAttachment` layout
    pub fn color(format: ImageFormat) -> Self {
        Self::new(AttachmentKind::Color, format, ImageLayout::ColorAttachment)
    }

    /// Depth attachment, cleared and stored, ends in `DepthStencilAttachment` layout
    pub fn depth(format: ImageFormat) -> Self {
        Self::new(AttachmentKind::Depth, format, ImageLayout::DepthStencilAttachment)
    }

    /// Swapchain attachment, ends in `PresentSrc` layout
    pub fn swapchain(format: ImageFormat) -> Self {
        Self::new(AttachmentKind::Swapchain, format, ImageLayout::PresentSrc)
    }

    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    pub fn with_layouts(mut self, initial: ImageLayout, final_layout: ImageLayout) -> Self {
        self.initial_layout = initial;
        self.final_layout = final_layout;
        self
    }

    /// Layout the attachment is in while the subpass runs
    pub fn subpass_layout(&self) -> ImageLayout {
        match self.kind {
            AttachmentKind::Color | AttachmentKind::Swapchain => ImageLayout::ColorAttachment,
            AttachmentKind::Depth => {
                if self.load_op == LoadOp::Load && self.final_layout == ImageLayout::DepthStencilReadOnly {
                    ImageLayout::DepthStencilReadOnly
                } else {
                    ImageLayout::DepthStencilAttachment
                }
            }
        }
    }

    /// Whether a later pass samples what this attachment holds
    pub fn is_sampled_later(&self) -> bool {
        self.store_op == StoreOp::Store
            && matches!(self.final_layout, ImageLayout::ShaderReadOnly | ImageLayout::DepthStencilReadOnly)
    }

    /// Whether the pass discards what the attachment held before it
    pub fn overwrites_contents(&self) -> bool {
        self.load_op != LoadOp::Load || self.initial_layout == ImageLayout::Undefined
    }
}

bitflags::bitflags! {
    /// Pipeline stages used in dependency edges
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const BOTTOM_OF_PIPE = 1 << 6;
    }
}

bitflags::bitflags! {
    /// Memory access kinds used in dependency edges
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const COLOR_ATTACHMENT_READ = 1 << 1;
        const COLOR_ATTACHMENT_WRITE = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 4;
    }
}

/// Which side of the pass a dependency edge connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyDirection {
    /// Work before the pass -> the pass
    Incoming,
    /// The pass -> work after the pass
    Outgoing,
}

/// Execution and memory dependency between the pass and external work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubpassDependency {
    pub direction: DependencyDirection,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub by_region: bool,
}

impl SubpassDependency {
    pub fn incoming(
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        src_access: AccessFlags,
        dst_access: AccessFlags,
    ) -> Self {
        Self {
            direction: DependencyDirection::Incoming,
            src_stages,
            dst_stages,
            src_access,
            dst_access,
            by_region: true,
        }
    }

    pub fn outgoing(
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        src_access: AccessFlags,
        dst_access: AccessFlags,
    ) -> Self {
        Self {
            direction: DependencyDirection::Outgoing,
            src_stages,
            dst_stages,
            src_access,
            dst_access,
            by_region: true,
        }
    }

    /// Write-then-sample edge for a depth attachment read by a later fragment shader
    pub fn depth_write_then_sample() -> Self {
        Self::outgoing(
            PipelineStages::LATE_FRAGMENT_TESTS,
            PipelineStages::FRAGMENT_SHADER,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            AccessFlags::SHADER_READ,
        )
    }

    /// Write-then-sample edge for a color attachment read by a later fragment shader
    pub fn color_write_then_sample() -> Self {
        Self::outgoing(
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            PipelineStages::FRAGMENT_SHADER,
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            AccessFlags::SHADER_READ,
        )
    }

    /// Sample-then-write edge: earlier frames still reading the depth image
    /// finish before this pass clears it
    ///
    /// Not by-region, readers sample texels outside their own fragment.
    pub fn sample_then_depth_write() -> Self {
        Self::incoming(
            PipelineStages::FRAGMENT_SHADER
                | PipelineStages::EARLY_FRAGMENT_TESTS
                | PipelineStages::LATE_FRAGMENT_TESTS,
            PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
            AccessFlags::empty(),
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .whole_image()
    }

    /// Sample-then-write edge: earlier frames still reading the color image
    /// finish before this pass overwrites it
    pub fn sample_then_color_write() -> Self {
        Self::incoming(
            PipelineStages::FRAGMENT_SHADER,
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::empty(),
            AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
        .whole_image()
    }

    fn whole_image(mut self) -> Self {
        self.by_region = false;
        self
    }
}

/// Reference from the subpass to an attachment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    pub index: u32,
    pub layout: ImageLayout,
}

/// Descriptor for creating a render pass with one graphics subpass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    pub attachments: Vec<AttachmentDesc>,
    pub color_refs: Vec<AttachmentRef>,
    pub depth_ref: Option<AttachmentRef>,
    pub dependencies: Vec<SubpassDependency>,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Render pass
///
/// Immutable once created; framebuffers reference it by handle.
pub trait RenderPass: Send + Sync {
    fn attachment_count(&self) -> usize;
}
