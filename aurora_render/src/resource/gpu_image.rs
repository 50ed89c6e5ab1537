/// Scoped GPU image: image + view + optional sampler + allocation id.
///
/// Destruction releases the sampler, then the view, then the allocation, then
/// the image. `destroy` is idempotent and also runs on drop, so an image that
/// was never fully created or was already destroyed is safe to release again.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, Image, ImageDesc, ImageFormat, ImageView, Sampler, SamplerDesc,
};
use crate::memory::{AllocationId, SharedAllocator};

pub struct GpuImage {
    image: Option<Arc<dyn Image>>,
    view: Option<Arc<dyn ImageView>>,
    sampler: Option<Arc<dyn Sampler>>,
    allocation: Option<AllocationId>,
    allocator: SharedAllocator,
    width: u32,
    height: u32,
    mip_levels: u32,
    format: ImageFormat,
}

impl GpuImage {
    /// Create the image, its view and (optionally) a sampler
    ///
    /// A zero extent is rejected before any allocation or device call.
    pub fn create(
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        desc: ImageDesc,
        sampler: Option<SamplerDesc>,
    ) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "image extent {}x{} has zero area", desc.width, desc.height
            )));
        }

        let allocation = allocator
            .lock()
            .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?
            .allocate(desc.byte_size(), desc.memory)?;

        // From here on a failure drops `image`, which returns the allocation
        let mut image = Self {
            image: None,
            view: None,
            sampler: None,
            allocation: Some(allocation),
            allocator: allocator.clone(),
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
            format: desc.format,
        };

        let handle = device.create_image(desc)?;
        image.view = Some(device.create_image_view(&handle)?);
        image.image = Some(handle);
        if let Some(sampler_desc) = sampler {
            image.sampler = Some(device.create_sampler(sampler_desc)?);
        }
        Ok(image)
    }

    pub fn is_created(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Result<&Arc<dyn Image>> {
        self.image.as_ref().ok_or_else(|| Error::InvalidResource("image was destroyed".to_string()))
    }

    pub fn view(&self) -> Result<&Arc<dyn ImageView>> {
        self.view.as_ref().ok_or_else(|| Error::InvalidResource("image view was destroyed".to_string()))
    }

    pub fn sampler(&self) -> Result<&Arc<dyn Sampler>> {
        self.sampler.as_ref().ok_or_else(|| Error::InvalidResource("image has no sampler".to_string()))
    }

    /// View and sampler pair for a combined image sampler binding
    pub fn binding(&self) -> Result<(Arc<dyn ImageView>, Arc<dyn Sampler>)> {
        Ok((self.view()?.clone(), self.sampler()?.clone()))
    }

    pub fn allocation(&self) -> Option<AllocationId> {
        self.allocation
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn mip_levels(&self) -> u32 { self.mip_levels }
    pub fn format(&self) -> ImageFormat { self.format }

    /// Release sampler, view, allocation and image (in that order)
    pub fn destroy(&mut self) {
        self.sampler.take();
        self.view.take();
        if let Some(id) = self.allocation.take() {
            if let Ok(mut allocator) = self.allocator.lock() {
                let _ = allocator.deallocate(id);
            }
        }
        self.image.take();
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "gpu_image_tests.rs"]
mod tests;
