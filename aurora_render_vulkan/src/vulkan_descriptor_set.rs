/// Descriptor sets and the pools they are allocated from
///
/// Pools are created with FREE_DESCRIPTOR_SET so that each set can return
/// itself on drop. A new pool is added whenever the current ones run dry.

use aurora_render::aurora::{Error, Result};
use aurora_render::aurora::device::{
    Buffer as DeviceBuffer, DescriptorSet as DeviceDescriptorSet, DescriptorWrite,
    ImageView as DeviceImageView, Sampler as DeviceSampler,
};
use aurora_render::{engine_bail, engine_err, engine_error, engine_info};
use ash::vk;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::ImageView;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_shader::ReflectedBinding;

/// Sets per pool
const SETS_PER_POOL: u32 = 1024;

/// Grow-on-demand descriptor pool allocator
pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

impl DescriptorAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool = Self::create_pool(&ctx)?;
        Ok(Self {
            ctx,
            pools: Mutex::new(vec![pool]),
        })
    }

    /// Create a descriptor pool with fixed capacity
    fn create_pool(ctx: &GpuContext) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: SETS_PER_POOL * 4,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: SETS_PER_POOL * 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: SETS_PER_POOL,
            },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(SETS_PER_POOL);

        unsafe { ctx.device.create_descriptor_pool(&info, None) }.map_err(|e| {
            engine_error!("aurora::vulkan", "Failed to create descriptor pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
        })
    }

    /// Allocate one set with `layout`, returning it with the pool it came from
    pub(crate) fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let mut pools = self
            .pools
            .lock()
            .map_err(|_| engine_err!("aurora::vulkan", "Descriptor pool lock poisoned"))?;
        let layouts = [layout];

        // Freed sets make room in older pools too
        for &pool in pools.iter().rev() {
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok((pool, sets[0])),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => continue,
                Err(e) => {
                    return Err(engine_err!("aurora::vulkan", "Failed to allocate descriptor set: {:?}", e));
                }
            }
        }

        let new_pool = Self::create_pool(&self.ctx)?;
        pools.push(new_pool);
        engine_info!("aurora::vulkan",
            "Descriptor pools exhausted, created new pool (total: {})", pools.len());

        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(new_pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(|e| engine_err!("aurora::vulkan",
                "Failed to allocate descriptor set after pool growth: {:?}", e))?;
        Ok((new_pool, sets[0]))
    }

    fn free(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        // The pool vector is only appended to, so holding the lock keeps `pool` alive
        if let Ok(_pools) = self.pools.lock() {
            unsafe {
                self.ctx.device.free_descriptor_sets(pool, &[set]).ok();
            }
        }
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        if let Ok(pools) = self.pools.get_mut() {
            for pool in pools.drain(..) {
                unsafe {
                    self.ctx.device.destroy_descriptor_pool(pool, None);
                }
            }
        }
    }
}

/// Vulkan descriptor set implementation
///
/// Holds the resources it was written with so that they outlive every
/// command buffer the set is bound in.
pub struct DescriptorSet {
    allocator: Arc<DescriptorAllocator>,
    pool: vk::DescriptorPool,
    pub(crate) descriptor_set: vk::DescriptorSet,
    set_index: u32,
    _resources: Vec<DescriptorWrite>,
}

impl DeviceDescriptorSet for DescriptorSet {
    fn set_index(&self) -> u32 {
        self.set_index
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        self.allocator.free(self.pool, self.descriptor_set);
    }
}

/// Allocate a set for `layout` and write `writes` into it
///
/// # Arguments
///
/// * `allocator` - Pool allocator the set returns to on drop
/// * `layout` - Set layout from the pipeline
/// * `set_index` - Set index in the pipeline layout
/// * `bindings` - Reflected bindings of that set
/// * `writes` - Resources to bind
pub(crate) fn create_descriptor_set(
    allocator: &Arc<DescriptorAllocator>,
    layout: vk::DescriptorSetLayout,
    set_index: u32,
    bindings: &[&ReflectedBinding],
    writes: &[DescriptorWrite],
) -> Result<DescriptorSet> {
    // Validate before allocating
    for write in writes {
        let Some(binding) = bindings.iter().find(|b| b.binding == write.binding()) else {
            engine_bail!("aurora::vulkan",
                "Descriptor write to binding {} of set {}: not declared by the shaders", write.binding(), set_index);
        };
        let (expected, len) = match write {
            DescriptorWrite::UniformBuffer { .. } => (vk::DescriptorType::UNIFORM_BUFFER, 1),
            DescriptorWrite::CombinedImageSampler { .. } => (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1),
            DescriptorWrite::CombinedImageSamplerArray { images, .. } => {
                (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, images.len() as u32)
            }
        };
        if binding.descriptor_type != expected {
            engine_bail!("aurora::vulkan",
                "Descriptor write to binding {} of set {}: shader expects {:?}, got {:?}",
                binding.binding, set_index, binding.descriptor_type, expected);
        }
        if len == 0 || len > binding.count {
            return Err(Error::LimitExceeded(format!(
                "binding {} of set {} holds {} descriptor(s), {} written",
                binding.binding, set_index, binding.count, len
            )));
        }
    }

    let (pool, descriptor_set) = allocator.allocate(layout)?;
    let set = DescriptorSet {
        allocator: Arc::clone(allocator),
        pool,
        descriptor_set,
        set_index,
        _resources: writes.to_vec(),
    };

    // Info arrays must stay put until update_descriptor_sets
    let mut buffer_infos: Vec<Vec<vk::DescriptorBufferInfo>> = Vec::with_capacity(writes.len());
    let mut image_infos: Vec<Vec<vk::DescriptorImageInfo>> = Vec::with_capacity(writes.len());

    for write in writes {
        match write {
            DescriptorWrite::UniformBuffer { buffer, .. } => {
                buffer_infos.push(vec![buffer_info(buffer)]);
                image_infos.push(Vec::new());
            }
            DescriptorWrite::CombinedImageSampler { view, sampler, .. } => {
                buffer_infos.push(Vec::new());
                image_infos.push(vec![image_info(view, sampler)]);
            }
            DescriptorWrite::CombinedImageSamplerArray { binding, images } => {
                let count = bindings
                    .iter()
                    .find(|b| b.binding == *binding)
                    .map_or(images.len() as u32, |b| b.count);
                let mut infos: Vec<_> = images.iter().map(|(view, sampler)| image_info(view, sampler)).collect();
                // Unused slots repeat the first image so the whole array is valid
                let first = infos[0];
                infos.resize(count as usize, first);
                buffer_infos.push(Vec::new());
                image_infos.push(infos);
            }
        }
    }

    let vk_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .enumerate()
        .map(|(i, write)| {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(write.binding())
                .dst_array_element(0);
            match write {
                DescriptorWrite::UniformBuffer { .. } => base
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_infos[i]),
                DescriptorWrite::CombinedImageSampler { .. }
                | DescriptorWrite::CombinedImageSamplerArray { .. } => base
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos[i]),
            }
        })
        .collect();

    unsafe {
        allocator.ctx.device.update_descriptor_sets(&vk_writes, &[]);
    }

    Ok(set)
}

fn buffer_info(buffer: &Arc<dyn DeviceBuffer>) -> vk::DescriptorBufferInfo {
    let vk_buffer = unsafe { &*(Arc::as_ptr(buffer) as *const Buffer) };
    vk::DescriptorBufferInfo::default()
        .buffer(vk_buffer.buffer)
        .offset(0)
        .range(vk::WHOLE_SIZE)
}

fn image_info(view: &Arc<dyn DeviceImageView>, sampler: &Arc<dyn DeviceSampler>) -> vk::DescriptorImageInfo {
    let vk_view = unsafe { &*(Arc::as_ptr(view) as *const ImageView) };
    let vk_sampler = unsafe { &*(Arc::as_ptr(sampler) as *const Sampler) };
    vk::DescriptorImageInfo::default()
        .image_layout(vk_view.read_layout())
        .image_view(vk_view.view)
        .sampler(vk_sampler.sampler)
}
