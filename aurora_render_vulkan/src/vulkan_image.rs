/// Image and ImageView - Vulkan implementations of the Image / ImageView traits
///
/// Images own their memory; views keep their image alive. Swapchain views
/// have no owning image (the swapchain owns those).

use aurora_render::aurora::{Error, Result};
use aurora_render::aurora::device::{
    Image as DeviceImage, ImageView as DeviceImageView, ImageDesc, ImageFormat, ImageUsage,
};
use aurora_render::aurora::resource::MemoryFlags;
use aurora_render::engine_err;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan::{format_to_vk, sample_count_to_vk};
use crate::vulkan_context::GpuContext;

/// Vulkan image implementation
pub struct Image {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    allocation: Option<Allocation>,
    width: u32,
    height: u32,
    format: ImageFormat,
    mip_levels: u32,
    pub(crate) array_layers: u32,
}

impl Image {
    /// Create the image, upload `desc.data` and leave sampled images in their read layout
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        let format = format_to_vk(desc.format);
        let mip_levels = desc.mip_levels.max(1);
        let array_layers = desc.array_layers.max(1);
        let aspect_mask = aspect_mask(desc.format);

        let mut usage = image_usage_to_vk(desc.usage);
        if desc.data.is_some() {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        // Depth maps sampled before their first render are cleared at creation
        if desc.format.is_depth() && desc.usage.contains(ImageUsage::SAMPLED) {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }

        let flags = if array_layers == 6 {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let image_create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(array_layers)
            .samples(sample_count_to_vk(desc.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan",
                "Failed to create image {}x{} ({:?}): {:?}", desc.width, desc.height, desc.format, e))?;

        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = match ctx.allocate("image", requirements, memory_location(desc.memory), false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on a failure drops `result`, which frees the memory and the image
        let result = Self {
            ctx: Arc::clone(ctx),
            image,
            allocation: Some(allocation),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels,
            array_layers,
        };

        if let Some(allocation) = &result.allocation {
            unsafe { ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to bind image memory: {:?}", e))?;
        }

        let range = vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: array_layers,
        };

        if let Some(data) = &desc.data {
            result.upload(data, range)?;
        } else if desc.usage.contains(ImageUsage::SAMPLED) {
            result.initialize_for_sampling(range)?;
        }

        Ok(result)
    }

    /// Copy `data` into mip 0 of every layer through a staging buffer, then
    /// move the image to SHADER_READ_ONLY
    fn upload(&self, data: &[u8], range: vk::ImageSubresourceRange) -> Result<()> {
        let ctx = &self.ctx;
        let staging_create_info = vk::BufferCreateInfo::default()
            .size(data.len() as u64)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let staging_buffer = unsafe { ctx.device.create_buffer(&staging_create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create staging buffer: {:?}", e))?;
        let requirements = unsafe { ctx.device.get_buffer_memory_requirements(staging_buffer) };

        let allocation = match ctx.allocate("image_staging_buffer", requirements, MemoryLocation::CpuToGpu, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { ctx.device.destroy_buffer(staging_buffer, None) };
                return Err(e);
            }
        };

        let result = self.copy_from_staging(staging_buffer, &allocation, data, range);

        // The one-shot submit waits for the queue, so the staging buffer is idle here
        ctx.free(allocation);
        unsafe { ctx.device.destroy_buffer(staging_buffer, None) };
        result
    }

    fn copy_from_staging(
        &self,
        staging_buffer: vk::Buffer,
        allocation: &Allocation,
        data: &[u8],
        range: vk::ImageSubresourceRange,
    ) -> Result<()> {
        let ctx = &self.ctx;
        unsafe { ctx.device.bind_buffer_memory(staging_buffer, allocation.memory(), allocation.offset()) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to bind staging buffer memory: {:?}", e))?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("aurora::vulkan", "Staging buffer is not mapped"))?
            .as_ptr() as *mut u8;
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr, data.len()) };

        submit_one_shot(ctx, |cb| unsafe {
            transition(ctx, cb, self.image, range,
                vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TRANSFER);

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: range.aspect_mask,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: range.layer_count,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width: self.width,
                    height: self.height,
                    depth: 1,
                });
            ctx.device.cmd_copy_buffer_to_image(
                cb,
                staging_buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            transition(ctx, cb, self.image, range,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER);
        })
    }

    /// Move a sampled image without contents to its read layout
    ///
    /// Depth images are cleared to 1.0 first so that an unrendered shadow map
    /// reads as fully lit.
    fn initialize_for_sampling(&self, range: vk::ImageSubresourceRange) -> Result<()> {
        let ctx = &self.ctx;
        if self.format.is_depth() {
            submit_one_shot(ctx, |cb| unsafe {
                transition(ctx, cb, self.image, range,
                    vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE,
                    vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TRANSFER);
                ctx.device.cmd_clear_depth_stencil_image(
                    cb,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                    &[range],
                );
                transition(ctx, cb, self.image, range,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
                    vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ,
                    vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER);
            })
        } else {
            submit_one_shot(ctx, |cb| unsafe {
                transition(ctx, cb, self.image, range,
                    vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::AccessFlags::empty(), vk::AccessFlags::SHADER_READ,
                    vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::FRAGMENT_SHADER);
            })
        }
    }

    pub(crate) fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }
}

impl DeviceImage for Image {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

/// Vulkan image view implementation
pub struct ImageView {
    ctx: Arc<GpuContext>,
    pub(crate) view: vk::ImageView,
    format: ImageFormat,
    width: u32,
    height: u32,
    /// Owning image (None for swapchain images)
    _image: Option<Arc<dyn DeviceImage>>,
}

impl ImageView {
    /// Create a view over the whole of `image` (cube view for 6 layers)
    pub(crate) fn create(image: &Arc<dyn DeviceImage>) -> Result<Self> {
        // SAFETY: every image handed out by VulkanDevice is a vulkan_image::Image
        let vk_image = unsafe { &*(Arc::as_ptr(image) as *const Image) };
        let ctx = vk_image.context();

        let view_type = match vk_image.array_layers {
            1 => vk::ImageViewType::TYPE_2D,
            6 => vk::ImageViewType::CUBE,
            _ => vk::ImageViewType::TYPE_2D_ARRAY,
        };

        let view = Self::create_raw(
            ctx,
            vk_image.image,
            view_type,
            format_to_vk(vk_image.format),
            vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(vk_image.format),
                base_mip_level: 0,
                level_count: vk_image.mip_levels,
                base_array_layer: 0,
                layer_count: vk_image.array_layers,
            },
        )?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            view,
            format: vk_image.format,
            width: vk_image.width,
            height: vk_image.height,
            _image: Some(Arc::clone(image)),
        })
    }

    /// View over a swapchain image
    pub(crate) fn for_swapchain(
        ctx: &Arc<GpuContext>,
        image: vk::Image,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let view = Self::create_raw(
            ctx,
            image,
            vk::ImageViewType::TYPE_2D,
            format_to_vk(format),
            vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
        )?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            view,
            format,
            width,
            height,
            _image: None,
        })
    }

    fn create_raw(
        ctx: &GpuContext,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        range: vk::ImageSubresourceRange,
    ) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(range);

        unsafe { ctx.device.create_image_view(&create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create image view: {:?}", e))
    }

    /// Layout the view is sampled in
    pub(crate) fn read_layout(&self) -> vk::ImageLayout {
        if self.format.is_depth() {
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        }
    }
}

impl DeviceImageView for ImageView {
    fn format(&self) -> ImageFormat {
        self.format
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
        }
    }
}

/// Aspect of a format (depth formats with stencil still only expose depth to views)
pub(crate) fn aspect_mask(format: ImageFormat) -> vk::ImageAspectFlags {
    if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Convert ImageUsage to Vulkan usage flags
pub(crate) fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

/// Memory location for the requested memory properties
pub(crate) fn memory_location(flags: MemoryFlags) -> MemoryLocation {
    if flags.contains(MemoryFlags::HOST_VISIBLE) {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

/// Record a whole-range layout transition
#[allow(clippy::too_many_arguments)]
unsafe fn transition(
    ctx: &GpuContext,
    cb: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    unsafe {
        ctx.device.cmd_pipeline_barrier(
            cb,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

/// Record commands into a command buffer from the upload pool, submit them
/// and wait for the graphics queue
pub(crate) fn submit_one_shot<F>(ctx: &GpuContext, record: F) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let pool = ctx
        .upload_command_pool
        .lock()
        .map_err(|_| Error::BackendError("upload command pool lock poisoned".to_string()))?;

    unsafe {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = ctx.device.allocate_command_buffers(&allocate_info)
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to allocate upload command buffer: {:?}", e))?;
        let cb = command_buffers[0];

        let result = (|| {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            ctx.device.begin_command_buffer(cb, &begin_info)
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

            record(cb);

            ctx.device.end_command_buffer(cb)
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to end upload command buffer: {:?}", e))?;

            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            ctx.device.queue_submit(ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to submit upload commands: {:?}", e))?;
            ctx.device.queue_wait_idle(ctx.graphics_queue)
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to wait for upload commands: {:?}", e))
        })();

        ctx.device.free_command_buffers(*pool, &command_buffers);
        result
    }
}
