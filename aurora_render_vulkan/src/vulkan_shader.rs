/// Shader loading and SPIR-V reflection
///
/// Pipelines are described by shader paths. Each path names a compiled
/// SPIR-V file (`<path>.spv`); descriptor bindings and push constant ranges
/// are reflected from the bytecode instead of being declared by hand.

use aurora_render::aurora::{Error, Result};
use aurora_render::aurora::device::ShaderStage;
use aurora_render::{engine_bail, engine_err, engine_error};
use ash::vk;
use std::io::Cursor;
use std::path::PathBuf;

use crate::vulkan::shader_stage_to_vk;
use crate::vulkan_context::GpuContext;

/// Descriptor binding declared by one or more stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    /// Array length (1 for plain bindings)
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

/// Push constant block visible to one or more stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReflectedPushConstant {
    pub size: u32,
    pub stages: vk::ShaderStageFlags,
}

/// Reflection of one shader stage, or of a whole pipeline once merged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
    pub push_constant: Option<ReflectedPushConstant>,
}

impl ShaderReflection {
    /// Fold another stage's reflection into this one
    ///
    /// Bindings are keyed by (set, binding): stages are OR'd and the larger
    /// array length wins. A binding declared with two different types is an error.
    pub(crate) fn merge(&mut self, other: &ShaderReflection) -> Result<()> {
        for binding in &other.bindings {
            match self
                .bindings
                .iter_mut()
                .find(|b| b.set == binding.set && b.binding == binding.binding)
            {
                Some(existing) => {
                    if existing.descriptor_type != binding.descriptor_type {
                        engine_bail!("aurora::vulkan",
                            "Binding (set={}, binding={}) declared as {:?} and {:?}",
                            binding.set, binding.binding, existing.descriptor_type, binding.descriptor_type);
                    }
                    existing.stages |= binding.stages;
                    existing.count = existing.count.max(binding.count);
                }
                None => self.bindings.push(binding.clone()),
            }
        }

        if let Some(pc) = other.push_constant {
            self.push_constant = Some(match self.push_constant {
                Some(existing) => ReflectedPushConstant {
                    size: existing.size.max(pc.size),
                    stages: existing.stages | pc.stages,
                },
                None => pc,
            });
        }
        Ok(())
    }

    /// Number of set layouts the pipeline layout needs (highest set + 1)
    pub(crate) fn set_count(&self) -> u32 {
        self.bindings.iter().map(|b| b.set + 1).max().unwrap_or(0)
    }

    /// Bindings of one set, sorted by binding number
    pub(crate) fn set_bindings(&self, set: u32) -> Vec<&ReflectedBinding> {
        let mut bindings: Vec<_> = self.bindings.iter().filter(|b| b.set == set).collect();
        bindings.sort_by_key(|b| b.binding);
        bindings
    }
}

/// File holding the SPIR-V for a shader path
///
/// Paths are given without extension; a path that already ends in `.spv` is
/// used as is.
pub(crate) fn spirv_path(path: &str) -> PathBuf {
    if path.ends_with(".spv") {
        PathBuf::from(path)
    } else {
        PathBuf::from(format!("{}.spv", path))
    }
}

/// Read SPIR-V words from a file
pub(crate) fn load_spirv(path: &str) -> Result<Vec<u32>> {
    let file = spirv_path(path);
    let bytes = std::fs::read(&file).map_err(|e| {
        engine_error!("aurora::vulkan", "Failed to read shader '{}': {}", file.display(), e);
        Error::InitializationFailed(format!("shader '{}' could not be read: {}", file.display(), e))
    })?;
    parse_spirv(&bytes).map_err(|e| {
        engine_error!("aurora::vulkan", "Invalid SPIR-V in '{}': {}", file.display(), e);
        Error::InitializationFailed(format!("shader '{}' is not valid SPIR-V: {}", file.display(), e))
    })
}

/// Decode SPIR-V bytes into words (checks alignment and magic number)
pub(crate) fn parse_spirv(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
}

/// Reflect descriptor bindings and push constants of one stage
pub(crate) fn reflect(code: &[u32], stage: ShaderStage) -> Result<ShaderReflection> {
    let stages = shader_stage_to_vk(stage);
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("aurora::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let mut reflection = ShaderReflection::default();
    for entry_point in &entry_points {
        let mut stage_reflection = ShaderReflection::default();
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { desc_bind, desc_ty, nbind, .. } => {
                    stage_reflection.bindings.push(ReflectedBinding {
                        set: desc_bind.set(),
                        binding: desc_bind.bind(),
                        descriptor_type: descriptor_type_to_vk(desc_ty)?,
                        count: (*nbind).max(1),
                        stages,
                    });
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    stage_reflection.merge(&ShaderReflection {
                        bindings: Vec::new(),
                        push_constant: Some(ReflectedPushConstant {
                            size: ty.nbyte().unwrap_or(0) as u32,
                            stages,
                        }),
                    })?;
                }
                _ => {}
            }
        }
        reflection.merge(&stage_reflection)?;
    }
    Ok(reflection)
}

/// Map a reflected descriptor type to Vulkan
fn descriptor_type_to_vk(desc_ty: &spirq::ty::DescriptorType) -> Result<vk::DescriptorType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::UniformBuffer() => Ok(vk::DescriptorType::UNIFORM_BUFFER),
        DescriptorType::StorageBuffer(..) => Ok(vk::DescriptorType::STORAGE_BUFFER),
        DescriptorType::CombinedImageSampler() => Ok(vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
        other => {
            engine_bail!("aurora::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

/// Shader module destroyed on drop
pub(crate) struct ShaderModule<'a> {
    ctx: &'a GpuContext,
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
}

impl<'a> ShaderModule<'a> {
    pub(crate) fn new(ctx: &'a GpuContext, code: &[u32], stage: ShaderStage) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| engine_err!("aurora::vulkan", "Failed to create shader module: {:?}", e))?;
        Ok(Self {
            ctx,
            module,
            stage: shader_stage_to_vk(stage),
        })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
