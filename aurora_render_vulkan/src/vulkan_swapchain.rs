/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Presents to the surface owned by the device context. Handles image
/// acquisition, presentation and recreation on resize; staleness is reported
/// through `AcquireOutcome` / `PresentOutcome`, never as an error.

use aurora_render::aurora::{Error, Result};
use aurora_render::aurora::device::{
    AcquireOutcome, ImageFormat, ImageView as DeviceImageView, PresentOutcome,
    Semaphore as DeviceSemaphore, Swapchain as DeviceSwapchain,
};
use aurora_render::{engine_bail, engine_err, engine_error, engine_info};
use ash::vk;
use std::sync::Arc;

use crate::vulkan::vk_format_to_format;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::ImageView;
use crate::vulkan_sync::Semaphore;

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<Arc<ImageView>>,
    surface_format: vk::SurfaceFormatKHR,
    format: ImageFormat,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    vsync: bool,
}

impl Swapchain {
    /// Create the swapchain for the context surface
    ///
    /// # Arguments
    ///
    /// * `ctx` - Device context owning the surface
    /// * `width` - Window width, used when the surface extent is not fixed
    /// * `height` - Window height, used when the surface extent is not fixed
    /// * `vsync` - FIFO when true, MAILBOX preferred otherwise
    pub(crate) fn new(ctx: Arc<GpuContext>, width: u32, height: u32, vsync: bool) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let formats = unsafe {
            ctx.surface_loader.get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
        }
        .map_err(|e| {
            engine_error!("aurora::vulkan", "Failed to query surface formats: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
        })?;

        let Some((surface_format, format)) = choose_surface_format(&formats) else {
            engine_error!("aurora::vulkan", "No supported surface format among {:?}", formats);
            return Err(Error::InitializationFailed("no supported surface format".to_string()));
        };

        let present_modes = unsafe {
            ctx.surface_loader.get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
        }
        .map_err(|e| {
            engine_error!("aurora::vulkan", "Failed to query present modes: {:?}", e);
            Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
        })?;
        let present_mode = choose_present_mode(&present_modes, vsync);

        let mut swapchain = Self {
            ctx,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            surface_format,
            format,
            extent: vk::Extent2D { width: 0, height: 0 },
            present_mode,
            vsync,
        };
        swapchain.build(width, height).map_err(|e| match e {
            Error::BackendError(message) => Error::InitializationFailed(message),
            other => other,
        })?;

        engine_info!("aurora::vulkan",
            "Swapchain created: {} images, {:?}, {}x{}, {}",
            swapchain.images.len(), swapchain.format, swapchain.extent.width,
            swapchain.extent.height, present_mode_name(present_mode));

        Ok(swapchain)
    }

    /// (Re)build the swapchain, retiring the current one
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let capabilities = unsafe {
            ctx.surface_loader.get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
        }
        .map_err(|e| engine_err!("aurora::vulkan", "Failed to get surface capabilities: {:?}", e))?;

        let extent = choose_extent(&capabilities, width, height);
        if extent.width == 0 || extent.height == 0 {
            engine_bail!("aurora::vulkan", "Cannot build a swapchain with zero extent {}x{}", extent.width, extent.height);
        }

        let queue_family_indices = [ctx.graphics_queue_family, ctx.present_queue_family];
        let old_swapchain = self.swapchain;

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        create_info = if ctx.split_present_family() {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create swapchain: {:?}", e))?;

        // Views of the old images go before the old swapchain
        self.views.clear();
        self.images.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        self.images = unsafe { self.loader.get_swapchain_images(swapchain) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to get swapchain images: {:?}", e))?;

        for &image in &self.images {
            let view = ImageView::for_swapchain(&ctx, image, self.format, extent.width, extent.height)?;
            self.views.push(Arc::new(view));
        }
        Ok(())
    }
}

impl DeviceSwapchain for Swapchain {
    fn acquire_next_image(&mut self, signal: &dyn DeviceSemaphore) -> Result<AcquireOutcome> {
        let vk_semaphore = unsafe { &*(signal as *const dyn DeviceSemaphore as *const Semaphore) };

        let result = unsafe {
            self.loader.acquire_next_image(self.swapchain, u64::MAX, vk_semaphore.semaphore, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(engine_err!("aurora::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32, wait: &dyn DeviceSemaphore) -> Result<PresentOutcome> {
        if image_index as usize >= self.images.len() {
            engine_bail!("aurora::vulkan",
                "present: image_index {} out of range (count: {})", image_index, self.images.len());
        }
        let vk_semaphore = unsafe { &*(wait as *const dyn DeviceSemaphore as *const Semaphore) };

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [vk_semaphore.semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(self.ctx.present_queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(engine_err!("aurora::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;

        self.build(width, height)?;

        engine_info!("aurora::vulkan",
            "Swapchain recreated: {} images, {}x{} (vsync: {})",
            self.images.len(), self.extent.width, self.extent.height, self.vsync);
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn present_mode(&self) -> &str {
        present_mode_name(self.present_mode)
    }

    fn image_view(&self, index: usize) -> Result<Arc<dyn DeviceImageView>> {
        match self.views.get(index) {
            Some(view) => Ok(Arc::clone(view) as Arc<dyn DeviceImageView>),
            None => Err(Error::InvalidResource(format!(
                "swapchain image {} out of range (count: {})",
                index,
                self.views.len()
            ))),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        self.views.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Prefer B8G8R8A8_SRGB / SRGB_NONLINEAR, else the first format the engine knows
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, ImageFormat)> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(f) = preferred {
        return Some((*f, ImageFormat::B8G8R8A8_SRGB));
    }
    formats
        .iter()
        .find_map(|f| vk_format_to_format(f.format).map(|format| (*f, format)))
}

/// FIFO for vsync, otherwise MAILBOX when available (FIFO is always supported)
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface extent when fixed, otherwise the window extent clamped to the surface limits
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One more than the surface minimum, clamped to the maximum (0 = no maximum)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

pub(crate) fn present_mode_name(mode: vk::PresentModeKHR) -> &'static str {
    match mode {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
