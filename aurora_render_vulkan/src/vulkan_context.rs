/// GpuContext - Shared GPU objects for all Vulkan resources
///
/// Contains everything a resource needs to create or release itself:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics and present queues
/// - Command pool for one-shot upload operations
/// - The window surface swapchains are built on
///
/// Every resource holds an `Arc<GpuContext>`, so the device and instance are
/// destroyed only once the last resource has released its objects.

use aurora_render::aurora::{Error, Result};
use aurora_render::{engine_err, engine_error, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

/// Shared GPU context
pub struct GpuContext {
    /// Vulkan entry (must outlive the instance)
    _entry: ash::Entry,

    /// Vulkan instance
    pub(crate) instance: ash::Instance,

    /// Selected physical device
    pub(crate) physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so its memory blocks are freed BEFORE the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Present queue (may be the graphics queue)
    pub(crate) present_queue: vk::Queue,

    /// Present queue family index
    pub(crate) present_queue_family: u32,

    /// Window surface, created with the device
    pub(crate) surface: vk::SurfaceKHR,

    /// Surface extension loader
    pub(crate) surface_loader: ash::khr::surface::Instance,

    /// Reusable command pool for one-shot upload operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Debug utils loader and messenger (validation enabled only)
    pub(crate) debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    /// Bundle the objects created by `VulkanDevice::new`
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queues: QueueInfo,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        upload_command_pool: vk::CommandPool,
        debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ) -> Self {
        Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue: queues.graphics_queue,
            graphics_queue_family: queues.graphics_family,
            present_queue: queues.present_queue,
            present_queue_family: queues.present_family,
            surface,
            surface_loader,
            upload_command_pool: Mutex::new(upload_command_pool),
            debug_messenger,
        }
    }

    /// Lock the allocator, mapping a poisoned lock to a backend error
    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("aurora::vulkan", "GPU allocator lock poisoned"))
    }

    /// Allocate device memory for the given requirements
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.allocator()?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("aurora::vulkan",
                    "Out of GPU memory for {} ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation; failures are logged, never propagated (used from Drop)
    pub(crate) fn free(&self, allocation: Allocation) {
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    engine_warn!("aurora::vulkan", "Failed to free GPU allocation: {:?}", e);
                }
            }
            Err(_) => engine_warn!("aurora::vulkan", "GPU allocator lock poisoned, allocation leaked"),
        }
    }

    /// Whether graphics and present run on different queue families
    pub(crate) fn split_present_family(&self) -> bool {
        self.graphics_queue_family != self.present_queue_family
    }
}

/// Queues picked during device creation
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueInfo {
    pub graphics_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_queue: vk::Queue,
    pub present_family: u32,
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(mut pool) = self.upload_command_pool.lock() {
                if *pool != vk::CommandPool::null() {
                    self.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // Free VkDeviceMemory blocks before the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            self.surface_loader.destroy_surface(self.surface, None);

            // Stop callbacks before the messenger is destroyed
            crate::debug::cleanup_debug_config();
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
