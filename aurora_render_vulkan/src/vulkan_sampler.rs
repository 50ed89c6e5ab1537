/// SamplerCache - VkSampler management for the Vulkan backend
///
/// Samplers are created on first request and shared afterwards: a frame only
/// ever uses a handful of distinct sampler descriptions.

use aurora_render::aurora::Result;
use aurora_render::aurora::device::{Filter, Sampler as DeviceSampler, SamplerDesc};
use aurora_render::engine_err;
use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan::{address_mode_to_vk, border_color_to_vk, compare_op_to_vk, filter_to_vk};
use crate::vulkan_context::GpuContext;

/// Maximum anisotropy used when the feature is enabled
const MAX_ANISOTROPY: f32 = 16.0;

/// Vulkan sampler implementation
pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl DeviceSampler for Sampler {
    fn desc(&self) -> SamplerDesc {
        self.desc
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Sampler cache keyed by description
pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    anisotropy: bool,
    cache: FxHashMap<SamplerDesc, Arc<Sampler>>,
}

impl SamplerCache {
    /// `anisotropy` tells whether the device enabled `samplerAnisotropy`
    pub(crate) fn new(ctx: Arc<GpuContext>, anisotropy: bool) -> Self {
        Self {
            ctx,
            anisotropy,
            cache: FxHashMap::default(),
        }
    }

    /// Get or create the sampler for `desc`
    pub(crate) fn get(&mut self, desc: SamplerDesc) -> Result<Arc<Sampler>> {
        if let Some(sampler) = self.cache.get(&desc) {
            return Ok(Arc::clone(sampler));
        }

        let sampler = Arc::new(self.create_sampler(desc)?);
        self.cache.insert(desc, Arc::clone(&sampler));
        Ok(sampler)
    }

    /// Number of distinct samplers created so far
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    fn create_sampler(&self, desc: SamplerDesc) -> Result<Sampler> {
        let filter = filter_to_vk(desc.filter);
        let mipmap_mode = match desc.filter {
            Filter::Linear => vk::SamplerMipmapMode::LINEAR,
            Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        };
        let address = address_mode_to_vk(desc.address_mode);

        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(desc.mip_levels.max(1) as f32)
            .border_color(border_color_to_vk(desc.border_color))
            .unnormalized_coordinates(false);

        create_info = match desc.compare {
            Some(op) => create_info.compare_enable(true).compare_op(compare_op_to_vk(op)),
            None => create_info.compare_enable(false).compare_op(vk::CompareOp::ALWAYS),
        };

        if self.anisotropy && desc.filter == Filter::Linear {
            create_info = create_info
                .anisotropy_enable(true)
                .max_anisotropy(MAX_ANISOTROPY);
        } else {
            create_info = create_info
                .anisotropy_enable(false)
                .max_anisotropy(1.0);
        }

        let sampler = unsafe { self.ctx.device.create_sampler(&create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create sampler {:?}: {:?}", desc, e))?;

        Ok(Sampler {
            ctx: Arc::clone(&self.ctx),
            sampler,
            desc,
        })
    }
}
