/// Pipeline - Vulkan implementation of the Pipeline trait
///
/// Layouts are derived from SPIR-V reflection of the active stages: one
/// descriptor set layout per set index (empty layouts fill the gaps) and at
/// most one push constant range.

use aurora_render::aurora::Result;
use aurora_render::aurora::device::{
    Pipeline as DevicePipeline, PipelineDesc, PrimitiveTopology, Vertex, VertexInput,
};
use aurora_render::{engine_debug, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan::{
    compare_op_to_vk, cull_mode_to_vk, sample_count_to_vk, topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_shader::{load_spirv, reflect, ShaderModule, ShaderReflection};

/// Control points per patch for `PrimitiveTopology::PatchList`
const PATCH_CONTROL_POINTS: u32 = 3;

/// Vulkan pipeline implementation
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    /// Vulkan graphics pipeline
    pub(crate) pipeline: vk::Pipeline,
    /// Pipeline layout (descriptor set binding, push constants)
    pub(crate) pipeline_layout: vk::PipelineLayout,
    /// One layout per set index
    pub(crate) descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Merged reflection of all stages
    pub(crate) reflection: ShaderReflection,
}

impl Pipeline {
    /// Load, reflect and compile the stages of `desc`
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        let stages = desc.shaders.active();

        let mut reflection = ShaderReflection::default();
        let mut modules = Vec::with_capacity(stages.len());
        for (stage, path) in &stages {
            let code = load_spirv(path)?;
            reflection.merge(&reflect(&code, *stage)?)?;
            modules.push(ShaderModule::new(ctx, &code, *stage)?);
        }

        // Layout objects are owned from here on; an early return cleans them up
        let mut result = Self {
            ctx: Arc::clone(ctx),
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            descriptor_set_layouts: Vec::new(),
            reflection,
        };

        for set in 0..result.reflection.set_count() {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = result
                .reflection
                .set_bindings(set)
                .into_iter()
                .map(|binding| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.binding)
                        .descriptor_type(binding.descriptor_type)
                        .descriptor_count(binding.count)
                        .stage_flags(binding.stages)
                })
                .collect();

            let layout_create = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let ds_layout = unsafe { ctx.device.create_descriptor_set_layout(&layout_create, None) }
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to create descriptor set layout: {:?}", e))?;
            result.descriptor_set_layouts.push(ds_layout);
        }

        let push_constant_ranges: Vec<vk::PushConstantRange> = result
            .reflection
            .push_constant
            .iter()
            .filter(|pc| pc.size > 0)
            .map(|pc| vk::PushConstantRange {
                stage_flags: pc.stages,
                offset: 0,
                size: pc.size,
            })
            .collect();

        let layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&result.descriptor_set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        result.pipeline_layout = unsafe { ctx.device.create_pipeline_layout(&layout_create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create pipeline layout: {:?}", e))?;

        // SAFETY: every render pass handed out by VulkanDevice is a vulkan_render_pass::RenderPass
        let vk_render_pass = unsafe { &*(Arc::as_ptr(desc.render_pass) as *const RenderPass) };

        let entry_point = c"main";
        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = modules
            .iter()
            .map(|module| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(module.stage)
                    .module(module.module)
                    .name(entry_point)
            })
            .collect();

        let state = desc.state;

        // Vertex input state
        let vertex_bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: Vertex::STRIDE,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = Vertex::ATTRIBUTES
            .iter()
            .map(|&(location, format, offset)| vk::VertexInputAttributeDescription {
                location,
                binding: 0,
                format: vertex_format_to_vk(format),
                offset,
            })
            .collect();
        let vertex_input_state = match state.vertex_input {
            VertexInput::Mesh => vk::PipelineVertexInputStateCreateInfo::default()
                .vertex_binding_descriptions(&vertex_bindings)
                .vertex_attribute_descriptions(&vertex_attributes),
            VertexInput::Procedural => vk::PipelineVertexInputStateCreateInfo::default(),
        };

        // Input assembly state
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(state.topology))
            .primitive_restart_enable(false);

        let tessellation_state = vk::PipelineTessellationStateCreateInfo::default()
            .patch_control_points(PATCH_CONTROL_POINTS);

        // Viewport state (dynamic)
        let viewports = [vk::Viewport::default()];
        let scissors = [vk::Rect2D::default()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        // Rasterization state
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(state.cull_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        // Depth/stencil state
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth_test)
            .depth_write_enable(state.depth_write)
            .depth_compare_op(compare_op_to_vk(state.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Multisample state
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(sample_count_to_vk(state.samples));

        // Color blend state, one entry per color attachment of the subpass
        let color_blend_attachment = {
            let attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(state.color_blend);
            if state.color_blend {
                attachment
                    .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(vk::BlendFactor::ONE)
                    .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                    .alpha_blend_op(vk::BlendOp::ADD)
            } else {
                attachment
            }
        };
        let color_blend_attachments = vec![color_blend_attachment; vk_render_pass.color_count];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        // Dynamic state
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let mut pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(result.pipeline_layout)
            .render_pass(vk_render_pass.render_pass)
            .subpass(0);
        if state.topology == PrimitiveTopology::PatchList {
            pipeline_create_info = pipeline_create_info.tessellation_state(&tessellation_state);
        }

        let pipelines = unsafe {
            ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        }
        .map_err(|(_, e)| engine_err!("aurora::vulkan",
            "Failed to create graphics pipeline ({}): {:?}", desc.shaders.vertex, e))?;
        result.pipeline = pipelines[0];

        engine_debug!("aurora::vulkan",
            "Created pipeline for '{}' ({} stage(s), {} set(s))",
            desc.shaders.vertex, stages.len(), result.descriptor_set_layouts.len());

        // Shader modules are no longer needed once the pipeline exists
        drop(modules);
        Ok(result)
    }
}

impl DevicePipeline for Pipeline {
    fn descriptor_set_count(&self) -> u32 {
        self.descriptor_set_layouts.len() as u32
    }

    fn push_constant_size(&self) -> u32 {
        self.reflection.push_constant.map_or(0, |pc| pc.size)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            for layout in self.descriptor_set_layouts.drain(..) {
                self.ctx.device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}
