/// Frame commands and per-frame statistics

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, ClearValue, CommandList, DescriptorSet, Framebuffer, IndexType, Pipeline, Rect2D,
    RenderPass, ShaderStageFlags, Viewport,
};
use crate::renderer::FrameState;

/// Edge-triggered request handled at the start of `Renderer::update`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    /// Recompile every pipeline from its shader files
    ReloadPipelines,
    /// Log the resource allocator report
    AnalyzeMemory,
}

/// What one `update` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Last state reached before returning to `Idle`
    pub state: FrameState,
    pub draw_calls: u32,
    pub pipeline_binds: u32,
    pub shadow_passes: u32,
    /// Directional, point and spot lights written to the lighting buffer
    pub light_counts: [u32; 3],
    pub presented: bool,
    /// The swapchain was rebuilt during this call
    pub rebuilt: bool,
}

/// Command list wrapper counting draws and pipeline binds
pub struct CountingCommandList<'a> {
    inner: &'a mut dyn CommandList,
    pub draw_calls: u32,
    pub pipeline_binds: u32,
}

impl<'a> CountingCommandList<'a> {
    pub fn new(inner: &'a mut dyn CommandList) -> Self {
        Self {
            inner,
            draw_calls: 0,
            pipeline_binds: 0,
        }
    }
}

impl CommandList for CountingCommandList<'_> {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn end(&mut self) -> Result<()> {
        self.inner.end()
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.inner.begin_render_pass(render_pass, framebuffer, clear_values)
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.inner.end_render_pass()
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.inner.set_viewport(viewport)
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.inner.set_scissor(scissor)
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.pipeline_binds += 1;
        self.inner.bind_pipeline(pipeline)
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        self.inner.bind_descriptor_set(pipeline, set_index, descriptor_set)
    }

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.inner.push_constants(pipeline, stages, offset, data)
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.inner.bind_vertex_buffer(buffer, offset)
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.inner.bind_index_buffer(buffer, offset, index_type)
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.draw_calls += 1;
        self.inner.draw(vertex_count, first_vertex)
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.draw_calls += 1;
        self.inner.draw_indexed(index_count, first_index, vertex_offset)
    }
}
