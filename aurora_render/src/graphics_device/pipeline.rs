/// Graphics pipeline trait, fixed-function state and the mesh vertex format

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use crate::graphics_device::RenderPass;

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
    /// Tessellation patches (3 control points)
    PatchList,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    S1,
    S2,
    S4,
    S8,
}

impl SampleCount {
    pub fn count(&self) -> u32 {
        match self {
            SampleCount::S1 => 1,
            SampleCount::S2 => 2,
            SampleCount::S4 => 4,
            SampleCount::S8 => 8,
        }
    }
}

/// Where vertices come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInput {
    /// Bound vertex buffer in the `Vertex` layout
    Mesh,
    /// Generated from the vertex index in the shader (fullscreen triangle, skybox cube)
    Procedural,
}

/// Fixed-function state of a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedFunctionState {
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub color_blend: bool,
    pub samples: SampleCount,
    pub vertex_input: VertexInput,
}

impl FixedFunctionState {
    /// Opaque scene geometry drawn over the depth prepass result
    pub fn scene(topology: PrimitiveTopology) -> Self {
        Self {
            topology,
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: false,
            depth_compare: CompareOp::Equal,
            color_blend: false,
            samples: SampleCount::S1,
            vertex_input: VertexInput::Mesh,
        }
    }

    /// Depth-only geometry pass (prepass, shadow maps)
    pub fn depth_only() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            color_blend: false,
            samples: SampleCount::S1,
            vertex_input: VertexInput::Mesh,
        }
    }

    /// Cube drawn behind everything else
    pub fn skybox() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_test: true,
            depth_write: false,
            depth_compare: CompareOp::LessOrEqual,
            color_blend: false,
            samples: SampleCount::S1,
            vertex_input: VertexInput::Procedural,
        }
    }

    /// Fullscreen triangle without depth
    pub fn fullscreen() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_test: false,
            depth_write: false,
            depth_compare: CompareOp::Always,
            color_blend: false,
            samples: SampleCount::S1,
            vertex_input: VertexInput::Procedural,
        }
    }
}

/// Shader stage of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
}

/// Source paths of the five graphics stages (empty string = stage unused)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderStages {
    pub vertex: String,
    pub fragment: String,
    pub tessellation_control: String,
    pub tessellation_evaluation: String,
    pub geometry: String,
}

impl ShaderStages {
    /// Vertex + fragment program
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            ..Default::default()
        }
    }

    /// Stages in pipeline order, skipping unused ones
    pub fn active(&self) -> Vec<(ShaderStage, &str)> {
        [
            (ShaderStage::Vertex, self.vertex.as_str()),
            (ShaderStage::TessellationControl, self.tessellation_control.as_str()),
            (ShaderStage::TessellationEvaluation, self.tessellation_evaluation.as_str()),
            (ShaderStage::Geometry, self.geometry.as_str()),
            (ShaderStage::Fragment, self.fragment.as_str()),
        ]
        .into_iter()
        .filter(|(_, path)| !path.is_empty())
        .collect()
    }
}

/// Descriptor for compiling a graphics pipeline
pub struct PipelineDesc<'a> {
    pub shaders: &'a ShaderStages,
    pub state: &'a FixedFunctionState,
    /// Render pass the pipeline is compatible with
    pub render_pass: &'a Arc<dyn RenderPass>,
}

/// Compiled graphics pipeline
pub trait Pipeline: Send + Sync {
    /// Number of descriptor sets in the pipeline layout
    fn descriptor_set_count(&self) -> u32;

    /// Bytes of push constants declared by the shaders
    fn push_constant_size(&self) -> u32;
}

/// Mesh vertex layout shared by the model loader and mesh pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 3],
    pub tangent: [f32; 4],
}

/// Attribute format of the `Vertex` layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float2,
    Float3,
    Float4,
}

impl Vertex {
    /// (location, format, byte offset) of every attribute
    pub const ATTRIBUTES: [(u32, VertexFormat, u32); 5] = [
        (0, VertexFormat::Float3, 0),
        (1, VertexFormat::Float3, 12),
        (2, VertexFormat::Float2, 24),
        (3, VertexFormat::Float3, 32),
        (4, VertexFormat::Float4, 44),
    ];

    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
