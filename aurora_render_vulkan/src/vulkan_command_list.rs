/// CommandList - Vulkan implementation of the CommandList trait

use aurora_render::aurora::{Error, Result};
use aurora_render::aurora::device::{
    Buffer as DeviceBuffer, ClearValue, CommandList as DeviceCommandList,
    DescriptorSet as DeviceDescriptorSet, Framebuffer as DeviceFramebuffer, IndexType,
    Pipeline as DevicePipeline, Rect2D, RenderPass as DeviceRenderPass, ShaderStageFlags, Viewport,
};
use aurora_render::{engine_bail, engine_error};
use ash::vk;
use std::sync::Arc;

use crate::vulkan::shader_stage_flags_to_vk;
use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorSet;
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;

/// Vulkan command list implementation
///
/// Owns its command pool and a single primary command buffer.
pub struct CommandList {
    ctx: Arc<GpuContext>,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a render pass
    in_render_pass: bool,
}

impl CommandList {
    /// Create a new command list on the graphics queue family
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to create command pool: {:?}", e);
                    Error::BackendError(format!("Failed to create command pool: {:?}", e))
                })?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_error!("aurora::vulkan", "Failed to allocate command buffer: {:?}", e);
                    return Err(Error::BackendError(format!("Failed to allocate command buffers: {:?}", e)));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    fn ensure_recording(&self) -> Result<()> {
        if !self.is_recording {
            engine_bail!("aurora::vulkan", "Command list not recording");
        }
        Ok(())
    }

    fn ensure_in_render_pass(&self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!("aurora::vulkan", "Not inside a render pass");
        }
        Ok(())
    }
}

impl DeviceCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!("aurora::vulkan", "Command list already recording");
        }

        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!("aurora::vulkan", "Render pass not ended before ending command list");
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn DeviceRenderPass>,
        framebuffer: &Arc<dyn DeviceFramebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!("aurora::vulkan", "Already inside a render pass");
        }

        // Downcast to Vulkan types
        let vk_render_pass = unsafe { &*(Arc::as_ptr(render_pass) as *const RenderPass) };
        let vk_framebuffer = unsafe { &*(Arc::as_ptr(framebuffer) as *const Framebuffer) };

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|cv| match cv {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: *color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: *depth,
                        stencil: *stencil,
                    },
                },
            })
            .collect();

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: framebuffer.width(),
                    height: framebuffer.height(),
                },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }

        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_in_render_pass()?;

        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording()?;

        let vk_viewport = vk::Viewport::default()
            .x(viewport.x)
            .y(viewport.y)
            .width(viewport.width)
            .height(viewport.height)
            .min_depth(viewport.min_depth)
            .max_depth(viewport.max_depth);

        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording()?;

        let vk_scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x: scissor.x, y: scissor.y })
            .extent(vk::Extent2D { width: scissor.width, height: scissor.height });

        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()> {
        self.ensure_recording()?;

        let vk_pipeline = unsafe { &*(Arc::as_ptr(pipeline) as *const Pipeline) };
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn DevicePipeline>,
        set_index: u32,
        descriptor_set: &Arc<dyn DeviceDescriptorSet>,
    ) -> Result<()> {
        self.ensure_recording()?;

        let vk_pipeline = unsafe { &*(Arc::as_ptr(pipeline) as *const Pipeline) };
        if set_index as usize >= vk_pipeline.descriptor_set_layouts.len() {
            engine_bail!("aurora::vulkan",
                "bind_descriptor_set: set_index {} out of range (pipeline has {} sets)",
                set_index, vk_pipeline.descriptor_set_layouts.len());
        }
        let vk_descriptor_set = unsafe { &*(Arc::as_ptr(descriptor_set) as *const DescriptorSet) };

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline_layout,
                set_index,
                &[vk_descriptor_set.descriptor_set],
                &[], // dynamic_offsets
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn DevicePipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_recording()?;

        let vk_pipeline = unsafe { &*(Arc::as_ptr(pipeline) as *const Pipeline) };
        let Some(range) = vk_pipeline.reflection.push_constant else {
            engine_bail!("aurora::vulkan", "push_constants: pipeline declares no push constants");
        };
        if offset as usize + data.len() > range.size as usize {
            engine_bail!("aurora::vulkan",
                "push_constants: {} bytes at offset {} exceed the {} byte range",
                data.len(), offset, range.size);
        }
        // The range is declared once for all stages, so every update names all of them
        let requested = shader_stage_flags_to_vk(stages);
        if !range.stages.contains(requested) {
            engine_bail!("aurora::vulkan",
                "push_constants: stages {:?} not in the declared range {:?}", requested, range.stages);
        }

        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk_pipeline.pipeline_layout,
                range.stages,
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn DeviceBuffer>, offset: u64) -> Result<()> {
        self.ensure_recording()?;

        let vk_buffer = unsafe { &*(Arc::as_ptr(buffer) as *const Buffer) };
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                0,
                &[vk_buffer.buffer],
                &[offset],
            );
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn DeviceBuffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording()?;

        let vk_buffer = unsafe { &*(Arc::as_ptr(buffer) as *const Buffer) };
        let vk_index_type = match index_type {
            IndexType::U16 => vk::IndexType::UINT16,
            IndexType::U32 => vk::IndexType::UINT32,
        };
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(self.command_buffer, vk_buffer.buffer, offset, vk_index_type);
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.ensure_in_render_pass()?;

        unsafe {
            self.ctx.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                1, // instance_count
                first_vertex,
                0, // first_instance
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.ensure_in_render_pass()?;

        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                1, // instance_count
                first_index,
                vertex_offset,
                0, // first_instance
            );
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Command buffer is freed with its pool
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
