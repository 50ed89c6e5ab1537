//! Scoped GPU resources
//!
//! Owners hold these wrappers instead of raw device objects; dropping a
//! wrapper releases its parts in dependency order and returns its allocation.

pub mod gpu_image;
pub mod gpu_buffer;

pub use gpu_image::GpuImage;
pub use gpu_buffer::{GpuBuffer, PerFrameUniform};
