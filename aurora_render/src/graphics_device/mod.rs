/// Graphics device module - backend-agnostic GPU traits and descriptors

pub mod graphics_device;
pub mod buffer;
pub mod image;
pub mod pipeline;
pub mod command_list;
pub mod render_pass;
pub mod frame_buffer;
pub mod descriptor_set;
pub mod swapchain;
pub mod sync;

pub use graphics_device::*;
pub use buffer::*;
pub use image::*;
pub use pipeline::*;
pub use command_list::*;
pub use render_pass::*;
pub use frame_buffer::*;
pub use descriptor_set::*;
pub use swapchain::*;
pub use sync::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
