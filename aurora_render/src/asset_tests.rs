use super::*;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, count_events, first_event};
use crate::graphics_device::{
    AttachmentDesc, FixedFunctionState, PipelineDesc, PrimitiveTopology, RenderPassDesc,
    ShaderStages,
};
use crate::memory::ResourceAllocator;
use crate::mock_collaborators::MockModelLoader;

fn scene_key() -> PipelineKey {
    PipelineKey::new(
        ShaderStages::new("lit.vert", "lit.frag"),
        FixedFunctionState::scene(PrimitiveTopology::TriangleList),
        "scene",
    )
}

fn pipeline(device: &mut MockGraphicsDevice, key: &PipelineKey) -> Arc<dyn Pipeline> {
    let render_pass = device.create_render_pass(&RenderPassDesc {
        attachments: vec![AttachmentDesc::color(ImageFormat::R8G8B8A8_UNORM)],
        color_refs: Vec::new(),
        depth_ref: None,
        dependencies: Vec::new(),
    }).unwrap();
    device.create_pipeline(&PipelineDesc {
        shaders: &key.shaders,
        state: &key.state,
        render_pass: &render_pass,
    }).unwrap()
}

fn load(device: &mut MockGraphicsDevice, allocator: &SharedAllocator) -> (DefaultTextures, Model) {
    let defaults = DefaultTextures::create(device, allocator).unwrap();
    let model = MockModelLoader::default()
        .load_model(device, allocator, "cube.gltf", &defaults)
        .unwrap();
    (defaults, model)
}

// ============================================================================
// Default textures
// ============================================================================

#[test]
fn test_default_textures_are_single_texel() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();

    let defaults = DefaultTextures::create(&mut device, &allocator).unwrap();

    assert_eq!(count_events(&device.log, "create_image 1x1"), 5);
    assert_eq!(defaults.diffuse.format(), ImageFormat::R8G8B8A8_SRGB);
    assert_eq!(allocator.lock().unwrap().live_count(), 5);
}

#[test]
fn test_default_material_bindings_are_sequential() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let defaults = DefaultTextures::create(&mut device, &allocator).unwrap();

    let writes = defaults.material_writes().unwrap();

    let bindings: Vec<u32> = writes.iter().map(|w| w.binding()).collect();
    assert_eq!(bindings, vec![0, 1, 2, 3, 4]);
}

// ============================================================================
// Model
// ============================================================================

#[test]
fn test_model_geometry_goes_through_allocator() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();

    let (_defaults, model) = load(&mut device, &allocator);

    assert_eq!(model.path(), "cube.gltf");
    assert_eq!(model.meshes.len(), 2);
    assert_eq!(allocator.lock().unwrap().live_count(), 7);

    drop(model);
    assert_eq!(allocator.lock().unwrap().live_count(), 5);
}

#[test]
fn test_model_without_geometry_rejected() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();

    let result = Model::from_geometry(&mut device, &allocator, "empty", &[], &[], Vec::new());

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(allocator.lock().unwrap().live_count(), 0);
}

#[test]
fn test_missing_model_reports_path() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let defaults = DefaultTextures::create(&mut device, &allocator).unwrap();

    let result = MockModelLoader::default().load_model(&mut device, &allocator, "missing.gltf", &defaults);

    match result {
        Err(Error::ResourceNotFound(message)) => assert!(message.contains("missing.gltf")),
        _ => panic!("expected ResourceNotFound"),
    }
}

#[test]
fn test_draw_records_one_indexed_draw_per_mesh() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let (_defaults, model) = load(&mut device, &allocator);
    let key = scene_key();
    let pipeline = pipeline(&mut device, &key);
    let mut cmd = device.create_command_list().unwrap();

    let draws = model.draw(cmd.as_mut(), &pipeline, None).unwrap();

    assert_eq!(draws, 2);
    assert_eq!(count_events(&device.log, "draw_indexed"), 2);
    assert_eq!(count_events(&device.log, "bind_descriptor_set"), 0);
    assert!(first_event(&device.log, "bind_index_buffer") < first_event(&device.log, "draw_indexed"));
}

// ============================================================================
// Material descriptor sets
// ============================================================================

#[test]
fn test_material_sets_created_once_per_key() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let (_defaults, mut model) = load(&mut device, &allocator);
    let key = scene_key();
    let pipeline = pipeline(&mut device, &key);

    model.create_descriptor_sets(&mut device, &key, &pipeline).unwrap();
    model.create_descriptor_sets(&mut device, &key, &pipeline).unwrap();

    assert!(model.has_descriptor_sets(&key));
    assert_eq!(count_events(&device.log, "create_descriptor_set 1"), 2);
}

#[test]
fn test_material_sets_bound_before_each_draw() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let (_defaults, mut model) = load(&mut device, &allocator);
    let key = scene_key();
    let pipeline = pipeline(&mut device, &key);
    model.create_descriptor_sets(&mut device, &key, &pipeline).unwrap();
    let mut cmd = device.create_command_list().unwrap();

    model.draw(cmd.as_mut(), &pipeline, Some(&key)).unwrap();

    let log = device.log.lock().unwrap();
    let recorded: Vec<&str> = log
        .iter()
        .filter(|e| e.starts_with("bind_descriptor_set") || e.starts_with("draw_indexed"))
        .map(|e| e.as_str())
        .collect();
    assert_eq!(recorded, vec![
        "bind_descriptor_set 1", "draw_indexed 6",
        "bind_descriptor_set 1", "draw_indexed 3",
    ]);
}

#[test]
fn test_pipeline_without_material_slot_gets_no_sets() {
    let mut device = MockGraphicsDevice::new();
    device.pipeline_set_count = 1;
    let allocator = ResourceAllocator::new().shared();
    let (_defaults, mut model) = load(&mut device, &allocator);
    let key = scene_key();
    let pipeline = pipeline(&mut device, &key);

    model.create_descriptor_sets(&mut device, &key, &pipeline).unwrap();

    assert!(!model.has_descriptor_sets(&key));
    assert_eq!(count_events(&device.log, "create_descriptor_set"), 0);
}

#[test]
fn test_clear_descriptor_sets_forces_recreation() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let (_defaults, mut model) = load(&mut device, &allocator);
    let key = scene_key();
    let pipeline = pipeline(&mut device, &key);
    model.create_descriptor_sets(&mut device, &key, &pipeline).unwrap();

    model.clear_descriptor_sets();
    assert!(!model.has_descriptor_sets(&key));

    model.create_descriptor_sets(&mut device, &key, &pipeline).unwrap();
    assert_eq!(count_events(&device.log, "create_descriptor_set 1"), 4);
}
