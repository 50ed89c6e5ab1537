/// Descriptor set trait - immutable group of resource bindings read by a pipeline

use std::sync::Arc;
use crate::graphics_device::{Buffer, ImageView, Sampler};

/// One binding written into a descriptor set at creation
///
/// The set keeps every referenced resource alive.
#[derive(Clone)]
pub enum DescriptorWrite {
    UniformBuffer {
        binding: u32,
        buffer: Arc<dyn Buffer>,
    },
    CombinedImageSampler {
        binding: u32,
        view: Arc<dyn ImageView>,
        sampler: Arc<dyn Sampler>,
    },
    /// Array binding (one shadow map per light)
    CombinedImageSamplerArray {
        binding: u32,
        images: Vec<(Arc<dyn ImageView>, Arc<dyn Sampler>)>,
    },
}

impl DescriptorWrite {
    pub fn binding(&self) -> u32 {
        match self {
            DescriptorWrite::UniformBuffer { binding, .. }
            | DescriptorWrite::CombinedImageSampler { binding, .. }
            | DescriptorWrite::CombinedImageSamplerArray { binding, .. } => *binding,
        }
    }
}

/// Descriptor set
pub trait DescriptorSet: Send + Sync {
    /// Set index in the pipeline layout this set was allocated for
    fn set_index(&self) -> u32;
}
