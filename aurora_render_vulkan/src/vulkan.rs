/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait

use aurora_render::aurora::{Error, RendererConfig, Result};
use aurora_render::aurora::device::{
    AccessFlags, AddressMode, BorderColor, Buffer as DeviceBuffer, BufferDesc, BufferUsage,
    CommandList as DeviceCommandList, CompareOp, CullMode, DependencyDirection,
    DescriptorSet as DeviceDescriptorSet, DescriptorWrite, Fence as DeviceFence, Filter,
    Framebuffer as DeviceFramebuffer, FramebufferDesc, GraphicsDevice, Image as DeviceImage,
    ImageDesc, ImageFormat, ImageLayout, ImageView as DeviceImageView, LoadOp,
    Pipeline as DevicePipeline, PipelineDesc, PipelineStages, PrimitiveTopology,
    RenderPass as DeviceRenderPass, RenderPassDesc, SampleCount, Sampler as DeviceSampler,
    SamplerDesc, Semaphore as DeviceSemaphore, ShaderStage, ShaderStageFlags, StoreOp,
    Swapchain as DeviceSwapchain, VertexFormat, validate_image_desc,
};
use aurora_render::{engine_bail, engine_err, engine_error, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{GpuContext, QueueInfo};
use crate::vulkan_descriptor_set::{create_descriptor_set, DescriptorAllocator};
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_image::{memory_location, Image, ImageView};
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::{Fence, Semaphore};

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan device implementation
///
/// Central object for creating resources and submitting commands. The window
/// surface is created with the device; swapchains are built on it.
pub struct VulkanDevice {
    /// Shared GPU context for all resources
    /// Owns device, instance, surface and debug messenger destruction
    ctx: Arc<GpuContext>,
    /// Descriptor pools (grow dynamically when exhausted)
    descriptor_allocator: Arc<DescriptorAllocator>,
    /// Sampler cache (one VkSampler per distinct description)
    sampler_cache: SamplerCache,
    /// Offscreen color target format
    color_format: ImageFormat,
    /// Depth target format
    depth_format: ImageFormat,
    /// Whether the validation layer is active
    validation_enabled: bool,
}

impl VulkanDevice {
    /// Create a new Vulkan device for a window
    ///
    /// # Arguments
    ///
    /// * `window` - Window the surface is created for
    /// * `config` - Renderer configuration (application name/version, validation)
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| Error::InitializationFailed(format!("Invalid application name: {}", e)))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Aurora")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            // Required extensions
            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            let validation_requested = config.enable_validation || cfg!(feature = "vulkan-validation");
            let validation_enabled = validation_requested && validation_layer_available(&entry);
            if validation_requested && !validation_enabled {
                engine_warn!("aurora::vulkan", "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
            }

            if validation_enabled {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation_enabled {
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            // Debug messenger
            let debug_messenger = if validation_enabled {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                crate::debug::init_debug_config();

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(
                        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
                    )
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                let messenger = debug_utils
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| {
                        engine_error!("aurora::vulkan", "Failed to create debug messenger: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                    })?;
                Some((debug_utils, messenger))
            } else {
                None
            };

            // Surface
            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("aurora::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // Physical device with graphics + present support, discrete GPUs first
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to enumerate physical devices: {:?}", e);
                    Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
                })?;

            let (physical_device, graphics_family, present_family) = physical_devices
                .iter()
                .filter_map(|&pd| {
                    let families = instance.get_physical_device_queue_family_properties(pd);
                    let graphics = families
                        .iter()
                        .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;
                    let supports_present = |i: u32| {
                        surface_loader
                            .get_physical_device_surface_support(pd, i, surface)
                            .unwrap_or(false)
                    };
                    let present = if supports_present(graphics) {
                        graphics
                    } else {
                        (0..families.len() as u32).find(|&i| supports_present(i))?
                    };
                    Some((pd, graphics, present))
                })
                .max_by_key(|(pd, _, _)| {
                    device_type_score(instance.get_physical_device_properties(*pd).device_type)
                })
                .ok_or_else(|| {
                    engine_error!("aurora::vulkan", "No GPU with graphics and present support found");
                    Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            engine_info!("aurora::vulkan", "Using GPU: {} ({:?})", device_name, properties.device_type);

            // Logical device
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(graphics_family)
                    .queue_priorities(&queue_priorities),
            ];
            if present_family != graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            // Optional features are enabled only when the GPU has them
            let supported = instance.get_physical_device_features(physical_device);
            let anisotropy = supported.sampler_anisotropy == vk::TRUE;
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(anisotropy)
                .tessellation_shader(supported.tessellation_shader == vk::TRUE)
                .geometry_shader(supported.geometry_shader == vk::TRUE);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let queues = QueueInfo {
                graphics_queue: device.get_device_queue(graphics_family, 0),
                graphics_family,
                present_queue: device.get_device_queue(present_family, 0),
                present_family,
            };

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("aurora::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            // Upload command pool (TRANSIENT + RESET for reusable one-shot uploads)
            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device.create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to create upload command pool: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
                })?;

            let color_format = pick_color_format(&instance, physical_device);
            let depth_format = pick_depth_format(&instance, physical_device).ok_or_else(|| {
                engine_error!("aurora::vulkan", "No supported depth format");
                Error::InitializationFailed("No supported depth format".to_string())
            })?;

            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                allocator,
                queues,
                surface,
                surface_loader,
                upload_command_pool,
                debug_messenger,
            ));

            let descriptor_allocator = Arc::new(DescriptorAllocator::new(Arc::clone(&ctx))?);
            let sampler_cache = SamplerCache::new(Arc::clone(&ctx), anisotropy);

            engine_info!("aurora::vulkan",
                "Vulkan device ready (validation: {}, color: {:?}, depth: {:?})",
                validation_enabled, color_format, depth_format);

            Ok(Self {
                ctx,
                descriptor_allocator,
                sampler_cache,
                color_format,
                depth_format,
                validation_enabled,
            })
        }
    }

    /// Whether the Khronos validation layer is active
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// Number of distinct samplers created so far
    pub fn sampler_count(&self) -> usize {
        self.sampler_cache.len()
    }
}

impl GraphicsDevice for VulkanDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("buffer size must be greater than zero".to_string()));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.ctx.device.create_buffer(&buffer_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create buffer: {:?}", e))?;

        let requirements = unsafe { self.ctx.device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.ctx.allocate("buffer", requirements, memory_location(desc.memory), true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.ctx.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let bind = unsafe {
            self.ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        // The wrapper frees the memory and the buffer if binding failed
        let result = Buffer::new(Arc::clone(&self.ctx), buffer, allocation, desc.size);
        bind.map_err(|e| engine_err!("aurora::vulkan", "Failed to bind buffer memory: {:?}", e))?;

        Ok(Arc::new(result))
    }

    fn create_image(&mut self, desc: ImageDesc) -> Result<Arc<dyn DeviceImage>> {
        validate_image_desc(&desc)?;
        Ok(Arc::new(Image::create(&self.ctx, &desc)?))
    }

    fn create_image_view(&mut self, image: &Arc<dyn DeviceImage>) -> Result<Arc<dyn DeviceImageView>> {
        Ok(Arc::new(ImageView::create(image)?))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Arc<dyn DeviceSampler>> {
        let sampler: Arc<dyn DeviceSampler> = self.sampler_cache.get(desc)?;
        Ok(sampler)
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<Arc<dyn DeviceRenderPass>> {
        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments
            .iter()
            .map(|attachment| {
                vk::AttachmentDescription::default()
                    .format(format_to_vk(attachment.format))
                    .samples(sample_count_to_vk(attachment.samples))
                    .load_op(load_op_to_vk(attachment.load_op))
                    .store_op(store_op_to_vk(attachment.store_op))
                    .stencil_load_op(load_op_to_vk(attachment.stencil_load_op))
                    .stencil_store_op(store_op_to_vk(attachment.stencil_store_op))
                    .initial_layout(image_layout_to_vk(attachment.initial_layout))
                    .final_layout(image_layout_to_vk(attachment.final_layout))
            })
            .collect();

        for reference in desc.color_refs.iter().chain(desc.depth_ref.iter()) {
            if reference.index as usize >= attachments.len() {
                return Err(Error::InvalidResource(format!(
                    "attachment reference {} out of range ({} attachments)",
                    reference.index,
                    attachments.len()
                )));
            }
        }

        let color_attachment_refs: Vec<vk::AttachmentReference> = desc
            .color_refs
            .iter()
            .map(|reference| {
                vk::AttachmentReference::default()
                    .attachment(reference.index)
                    .layout(image_layout_to_vk(reference.layout))
            })
            .collect();
        let depth_attachment_ref = desc.depth_ref.map(|reference| {
            vk::AttachmentReference::default()
                .attachment(reference.index)
                .layout(image_layout_to_vk(reference.layout))
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs);
        if let Some(depth_ref) = depth_attachment_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let dependencies: Vec<vk::SubpassDependency> = desc
            .dependencies
            .iter()
            .map(|dependency| {
                let (src_subpass, dst_subpass) = match dependency.direction {
                    DependencyDirection::Incoming => (vk::SUBPASS_EXTERNAL, 0),
                    DependencyDirection::Outgoing => (0, vk::SUBPASS_EXTERNAL),
                };
                let flags = if dependency.by_region {
                    vk::DependencyFlags::BY_REGION
                } else {
                    vk::DependencyFlags::empty()
                };
                vk::SubpassDependency::default()
                    .src_subpass(src_subpass)
                    .dst_subpass(dst_subpass)
                    .src_stage_mask(pipeline_stages_to_vk(dependency.src_stages))
                    .dst_stage_mask(pipeline_stages_to_vk(dependency.dst_stages))
                    .src_access_mask(access_flags_to_vk(dependency.src_access))
                    .dst_access_mask(access_flags_to_vk(dependency.dst_access))
                    .dependency_flags(flags)
            })
            .collect();

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe { self.ctx.device.create_render_pass(&render_pass_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create render pass: {:?}", e))?;

        Ok(Arc::new(RenderPass::new(
            Arc::clone(&self.ctx),
            render_pass,
            desc.attachments.len(),
            desc.color_refs.len(),
        )))
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<Arc<dyn DeviceFramebuffer>> {
        if desc.attachments.len() != desc.render_pass.attachment_count() {
            return Err(Error::InvalidResource(format!(
                "framebuffer has {} attachment(s), render pass expects {}",
                desc.attachments.len(),
                desc.render_pass.attachment_count()
            )));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "framebuffer extent {}x{} has zero area",
                desc.width, desc.height
            )));
        }

        // Downcast to Vulkan types
        let vk_render_pass = unsafe { &*(Arc::as_ptr(desc.render_pass) as *const RenderPass) };
        let views: Vec<vk::ImageView> = desc
            .attachments
            .iter()
            .map(|view| unsafe { (*(Arc::as_ptr(view) as *const ImageView)).view })
            .collect();

        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers.max(1));

        let framebuffer = unsafe { self.ctx.device.create_framebuffer(&framebuffer_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create framebuffer: {:?}", e))?;

        Ok(Arc::new(Framebuffer::new(
            Arc::clone(&self.ctx),
            framebuffer,
            desc.width,
            desc.height,
            desc.attachments.clone(),
        )))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<Arc<dyn DevicePipeline>> {
        Ok(Arc::new(Pipeline::create(&self.ctx, desc)?))
    }

    fn create_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn DevicePipeline>,
        set_index: u32,
        writes: &[DescriptorWrite],
    ) -> Result<Arc<dyn DeviceDescriptorSet>> {
        // Downcast pipeline to access stored descriptor set layouts
        let vk_pipeline = unsafe { &*(Arc::as_ptr(pipeline) as *const Pipeline) };

        let Some(&layout) = vk_pipeline.descriptor_set_layouts.get(set_index as usize) else {
            engine_bail!("aurora::vulkan",
                "create_descriptor_set: set_index {} out of range (pipeline has {} layouts)",
                set_index, vk_pipeline.descriptor_set_layouts.len());
        };
        let bindings = vk_pipeline.reflection.set_bindings(set_index);

        let set = create_descriptor_set(&self.descriptor_allocator, layout, set_index, &bindings, writes)?;
        Ok(Arc::new(set))
    }

    fn create_command_list(&mut self) -> Result<Box<dyn DeviceCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.ctx))?))
    }

    fn create_swapchain(&mut self, width: u32, height: u32, vsync: bool) -> Result<Box<dyn DeviceSwapchain>> {
        Ok(Box::new(Swapchain::new(Arc::clone(&self.ctx), width, height, vsync)?))
    }

    fn create_fence(&mut self, signaled: bool) -> Result<Box<dyn DeviceFence>> {
        Ok(Box::new(Fence::new(Arc::clone(&self.ctx), signaled)?))
    }

    fn create_semaphore(&mut self) -> Result<Box<dyn DeviceSemaphore>> {
        Ok(Box::new(Semaphore::new(Arc::clone(&self.ctx))?))
    }

    fn submit(
        &mut self,
        commands: &dyn DeviceCommandList,
        wait: &[(&dyn DeviceSemaphore, PipelineStages)],
        signal: &[&dyn DeviceSemaphore],
        fence: Option<&dyn DeviceFence>,
    ) -> Result<()> {
        let vk_cmd = unsafe { &*(commands as *const dyn DeviceCommandList as *const CommandList) };
        let command_buffers = [vk_cmd.command_buffer];

        let wait_semaphores: Vec<vk::Semaphore> = wait
            .iter()
            .map(|(semaphore, _)| unsafe { (*(*semaphore as *const dyn DeviceSemaphore as *const Semaphore)).semaphore })
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = wait
            .iter()
            .map(|(_, stages)| pipeline_stages_to_vk(*stages))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = signal
            .iter()
            .map(|semaphore| unsafe { (*(*semaphore as *const dyn DeviceSemaphore as *const Semaphore)).semaphore })
            .collect();
        let vk_fence = match fence {
            Some(fence) => unsafe { (*(fence as *const dyn DeviceFence as *const Fence)).fence },
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], vk_fence) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to submit commands to GPU queue: {:?}", e))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to wait for device idle: {:?}", e))
    }

    fn color_format(&self) -> ImageFormat {
        self.color_format
    }

    fn depth_format(&self) -> ImageFormat {
        self.depth_format
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        // Remaining objects are released by GpuContext once every resource is gone
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
    }
}

/// Whether VK_LAYER_KHRONOS_validation is installed
fn validation_layer_available(entry: &ash::Entry) -> bool {
    let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(_) => return false,
    };
    layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().map_or(false, |name| name == VALIDATION_LAYER))
}

/// Preference of a physical device type (higher is better)
pub(crate) fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

/// HDR color target when it can be rendered to and sampled, RGBA8 otherwise
fn pick_color_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> ImageFormat {
    let required = vk::FormatFeatureFlags::COLOR_ATTACHMENT | vk::FormatFeatureFlags::SAMPLED_IMAGE;
    let properties = unsafe {
        instance.get_physical_device_format_properties(physical_device, vk::Format::R16G16B16A16_SFLOAT)
    };
    if properties.optimal_tiling_features.contains(required) {
        ImageFormat::R16G16B16A16_SFLOAT
    } else {
        ImageFormat::R8G8B8A8_UNORM
    }
}

/// First depth format usable as attachment and sampled image
fn pick_depth_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Option<ImageFormat> {
    let required = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT | vk::FormatFeatureFlags::SAMPLED_IMAGE;
    [ImageFormat::D32_SFLOAT, ImageFormat::D32_SFLOAT_S8_UINT, ImageFormat::D24_UNORM_S8_UINT]
        .into_iter()
        .find(|&format| {
            let properties = unsafe {
                instance.get_physical_device_format_properties(physical_device, format_to_vk(format))
            };
            properties.optimal_tiling_features.contains(required)
        })
}

// ============================================================================
// Conversions
// ============================================================================

/// Convert ImageFormat to Vulkan format
pub(crate) fn format_to_vk(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::R8_UNORM => vk::Format::R8_UNORM,
        ImageFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        ImageFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        ImageFormat::R16_SFLOAT => vk::Format::R16_SFLOAT,
        ImageFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        ImageFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        ImageFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
        ImageFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        ImageFormat::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Convert a Vulkan format back to ImageFormat (None for formats the engine does not use)
pub(crate) fn vk_format_to_format(format: vk::Format) -> Option<ImageFormat> {
    match format {
        vk::Format::R8_UNORM => Some(ImageFormat::R8_UNORM),
        vk::Format::R8G8B8A8_UNORM => Some(ImageFormat::R8G8B8A8_UNORM),
        vk::Format::R8G8B8A8_SRGB => Some(ImageFormat::R8G8B8A8_SRGB),
        vk::Format::B8G8R8A8_UNORM => Some(ImageFormat::B8G8R8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Some(ImageFormat::B8G8R8A8_SRGB),
        vk::Format::R16_SFLOAT => Some(ImageFormat::R16_SFLOAT),
        vk::Format::R16G16B16A16_SFLOAT => Some(ImageFormat::R16G16B16A16_SFLOAT),
        vk::Format::R32_SFLOAT => Some(ImageFormat::R32_SFLOAT),
        vk::Format::D32_SFLOAT => Some(ImageFormat::D32_SFLOAT),
        vk::Format::D24_UNORM_S8_UINT => Some(ImageFormat::D24_UNORM_S8_UINT),
        vk::Format::D32_SFLOAT_S8_UINT => Some(ImageFormat::D32_SFLOAT_S8_UINT),
        _ => None,
    }
}

pub(crate) fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    match usage {
        BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
        BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
    }
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub(crate) fn load_op_to_vk(load_op: LoadOp) -> vk::AttachmentLoadOp {
    match load_op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op_to_vk(store_op: StoreOp) -> vk::AttachmentStoreOp {
    match store_op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub(crate) fn pipeline_stages_to_vk(stages: PipelineStages) -> vk::PipelineStageFlags {
    let mut flags = vk::PipelineStageFlags::empty();
    if stages.contains(PipelineStages::TOP_OF_PIPE) {
        flags |= vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if stages.contains(PipelineStages::VERTEX_SHADER) {
        flags |= vk::PipelineStageFlags::VERTEX_SHADER;
    }
    if stages.contains(PipelineStages::FRAGMENT_SHADER) {
        flags |= vk::PipelineStageFlags::FRAGMENT_SHADER;
    }
    if stages.contains(PipelineStages::EARLY_FRAGMENT_TESTS) {
        flags |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    }
    if stages.contains(PipelineStages::LATE_FRAGMENT_TESTS) {
        flags |= vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    }
    if stages.contains(PipelineStages::COLOR_ATTACHMENT_OUTPUT) {
        flags |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    }
    if stages.contains(PipelineStages::BOTTOM_OF_PIPE) {
        flags |= vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }
    flags
}

pub(crate) fn access_flags_to_vk(access: AccessFlags) -> vk::AccessFlags {
    let mut flags = vk::AccessFlags::empty();
    if access.contains(AccessFlags::SHADER_READ) {
        flags |= vk::AccessFlags::SHADER_READ;
    }
    if access.contains(AccessFlags::COLOR_ATTACHMENT_READ) {
        flags |= vk::AccessFlags::COLOR_ATTACHMENT_READ;
    }
    if access.contains(AccessFlags::COLOR_ATTACHMENT_WRITE) {
        flags |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ) {
        flags |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE) {
        flags |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    flags
}

pub(crate) fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::PatchList => vk::PrimitiveTopology::PATCH_LIST,
    }
}

pub(crate) fn sample_count_to_vk(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
    }
}

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub(crate) fn border_color_to_vk(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
    }
}

pub(crate) fn shader_stage_flags_to_vk(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStageFlags::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStageFlags::TESSELLATION_CONTROL) {
        flags |= vk::ShaderStageFlags::TESSELLATION_CONTROL;
    }
    if stages.contains(ShaderStageFlags::TESSELLATION_EVALUATION) {
        flags |= vk::ShaderStageFlags::TESSELLATION_EVALUATION;
    }
    if stages.contains(ShaderStageFlags::GEOMETRY) {
        flags |= vk::ShaderStageFlags::GEOMETRY;
    }
    flags
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
