use super::*;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, count_events};
use crate::graphics_device::{AttachmentDesc, ImageFormat, PrimitiveTopology};
use crate::registry::RenderPassEntry;

fn setup() -> (MockGraphicsDevice, RenderPassRegistry) {
    let mut device = MockGraphicsDevice::new();
    let mut passes = RenderPassRegistry::new();
    let entry = RenderPassEntry::new(
        &mut device,
        "scene",
        vec![AttachmentDesc::color(ImageFormat::R16G16B16A16_SFLOAT)],
        Vec::new(),
        [0.0; 4],
    ).unwrap();
    passes.register(entry).unwrap();
    (device, passes)
}

fn key(vertex: &str) -> PipelineKey {
    PipelineKey::new(
        ShaderStages::new(vertex, "lit.frag"),
        FixedFunctionState::scene(PrimitiveTopology::TriangleList),
        "scene",
    )
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_same_key_returns_same_pipeline() {
    let (mut device, passes) = setup();
    let mut cache = PipelineCache::new();

    let first = cache.get_or_create(&mut device, &passes, &key("lit.vert")).unwrap();
    let second = cache.get_or_create(&mut device, &passes, &key("lit.vert")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(count_events(&device.log, "create_pipeline"), 1);
}

#[test]
fn test_distinct_shaders_distinct_pipelines() {
    let (mut device, passes) = setup();
    let mut cache = PipelineCache::new();

    let a = cache.get_or_create(&mut device, &passes, &key("a.vert")).unwrap();
    let b = cache.get_or_create(&mut device, &passes, &key("b.vert")).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_state_is_part_of_key() {
    let (mut device, passes) = setup();
    let mut cache = PipelineCache::new();
    let mut lines = key("lit.vert");
    lines.state = FixedFunctionState::scene(PrimitiveTopology::LineList);

    cache.get_or_create(&mut device, &passes, &key("lit.vert")).unwrap();
    cache.get_or_create(&mut device, &passes, &lines).unwrap();

    assert_eq!(cache.len(), 2);
}

#[test]
fn test_unknown_render_pass_is_lookup_miss() {
    let (mut device, passes) = setup();
    let mut cache = PipelineCache::new();
    let mut orphan = key("lit.vert");
    orphan.render_pass = "nowhere".to_string();

    let result = cache.get_or_create(&mut device, &passes, &orphan);
    assert!(matches!(result, Err(Error::ResourceNotFound(_))));
    assert!(cache.is_empty());
}

// ============================================================================
// Hot reload
// ============================================================================

#[test]
fn test_reload_all_keeps_keys_and_replaces_pipelines() {
    let (mut device, passes) = setup();
    let mut cache = PipelineCache::new();
    let before = cache.get_or_create(&mut device, &passes, &key("lit.vert")).unwrap();

    assert_eq!(cache.reload_all(&mut device, &passes).unwrap(), 1);

    let after = cache.get(&key("lit.vert")).unwrap();
    assert!(!Arc::ptr_eq(&before, after));
    assert_eq!(cache.len(), 1);
}
