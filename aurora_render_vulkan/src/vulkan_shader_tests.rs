use super::*;

fn binding(set: u32, binding: u32, descriptor_type: vk::DescriptorType, stages: vk::ShaderStageFlags) -> ReflectedBinding {
    ReflectedBinding { set, binding, descriptor_type, count: 1, stages }
}

// ============================================================================
// SHADER PATHS
// ============================================================================

#[test]
fn test_spirv_path_appends_extension() {
    assert_eq!(spirv_path("shaders/scene.vert"), PathBuf::from("shaders/scene.vert.spv"));
}

#[test]
fn test_spirv_path_keeps_spv_extension() {
    assert_eq!(spirv_path("shaders/scene.vert.spv"), PathBuf::from("shaders/scene.vert.spv"));
}

#[test]
fn test_load_missing_shader_is_initialization_failure() {
    let result = load_spirv("definitely/not/a/shader");
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_parse_spirv_rejects_truncated_words() {
    assert!(parse_spirv(&[0x03, 0x02, 0x23]).is_err());
}

#[test]
fn test_parse_spirv_reads_words() {
    let bytes = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
    let words = parse_spirv(&bytes).unwrap();
    assert_eq!(words, vec![0x0723_0203, 0x0001_0000]);
}

// ============================================================================
// REFLECTION MERGE
// ============================================================================

#[test]
fn test_merge_ors_stages_of_shared_binding() {
    let mut vertex = ShaderReflection {
        bindings: vec![binding(0, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)],
        push_constant: None,
    };
    let fragment = ShaderReflection {
        bindings: vec![
            binding(0, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::FRAGMENT),
            binding(1, 2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT),
        ],
        push_constant: None,
    };

    vertex.merge(&fragment).unwrap();

    assert_eq!(vertex.bindings.len(), 2);
    let shared = vertex.set_bindings(0)[0];
    assert_eq!(shared.stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(vertex.set_count(), 2);
}

#[test]
fn test_merge_keeps_largest_array_count() {
    let mut a = ShaderReflection::default();
    a.bindings.push(ReflectedBinding {
        count: 2,
        ..binding(2, 1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT)
    });
    let b = ShaderReflection {
        bindings: vec![ReflectedBinding {
            count: 8,
            ..binding(2, 1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT)
        }],
        push_constant: None,
    };

    a.merge(&b).unwrap();
    let merged = a.set_bindings(2);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].count, 8);
}

#[test]
fn test_merge_rejects_conflicting_types() {
    let mut a = ShaderReflection {
        bindings: vec![binding(0, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)],
        push_constant: None,
    };
    let b = ShaderReflection {
        bindings: vec![binding(0, 0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT)],
        push_constant: None,
    };
    assert!(a.merge(&b).is_err());
}

#[test]
fn test_merge_push_constants_takes_max_size() {
    let mut a = ShaderReflection {
        bindings: Vec::new(),
        push_constant: Some(ReflectedPushConstant { size: 64, stages: vk::ShaderStageFlags::VERTEX }),
    };
    let b = ShaderReflection {
        bindings: Vec::new(),
        push_constant: Some(ReflectedPushConstant { size: 80, stages: vk::ShaderStageFlags::FRAGMENT }),
    };

    a.merge(&b).unwrap();

    let pc = a.push_constant.unwrap();
    assert_eq!(pc.size, 80);
    assert_eq!(pc.stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
}

#[test]
fn test_set_bindings_sorted_and_filtered() {
    let reflection = ShaderReflection {
        bindings: vec![
            binding(1, 3, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT),
            binding(0, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
            binding(1, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::FRAGMENT),
        ],
        push_constant: None,
    };

    let set1: Vec<u32> = reflection.set_bindings(1).iter().map(|b| b.binding).collect();
    assert_eq!(set1, vec![0, 3]);
    assert!(reflection.set_bindings(2).is_empty());
}

#[test]
fn test_empty_reflection_has_no_sets() {
    assert_eq!(ShaderReflection::default().set_count(), 0);
}
