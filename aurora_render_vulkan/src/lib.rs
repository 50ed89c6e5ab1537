/*!
# Aurora Render - Vulkan Backend

Vulkan implementation of the `aurora_render` graphics device traits.

Uses Ash for the Vulkan bindings, gpu-allocator for device memory and spirq
for SPIR-V reflection of pipeline layouts.

```no_run
use aurora_render::aurora::RendererConfig;
use aurora_render_vulkan::VulkanDevice;
# fn run(window: &winit::window::Window) -> aurora_render::aurora::Result<()> {
let device = VulkanDevice::new(window, &RendererConfig::default())?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan;
mod vulkan_context;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_descriptor_set;
mod vulkan_command_list;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_swapchain;
mod vulkan_sync;

pub use vulkan::VulkanDevice;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
