/// Named render passes with their framebuffer factory, and the pipeline cache

pub mod render_pass_registry;
pub mod pipeline_cache;

pub use render_pass_registry::{RenderPassEntry, RenderPassRegistry};
pub use pipeline_cache::{PipelineCache, PipelineKey};
