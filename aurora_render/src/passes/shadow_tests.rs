use super::*;
use glam::Mat4;
use crate::asset::{DefaultTextures, ModelLoader};
use crate::graphics_device::mock_graphics_device::count_events;
use crate::passes::test_support::PassFixture;
use crate::mock_collaborators::MockModelLoader;
use crate::scene::LightKind;

fn renderer(fx: &mut PassFixture) -> ShadowRenderer {
    fx.config.shadow_map_size = 256;
    ShadowRenderer::register_render_pass(&mut fx.device, &mut fx.render_passes, [0.0; 4]).unwrap();
    ShadowRenderer::new(&mut fx.ctx()).unwrap()
}

fn casters(directional: u32, spot: u32) -> Vec<ShadowCaster> {
    (0..directional)
        .map(|_| LightKind::Directional)
        .chain((0..spot).map(|_| LightKind::Spot))
        .enumerate()
        .map(|(i, kind)| ShadowCaster { kind, caster_index: i as u32, light_space: Mat4::IDENTITY })
        .collect()
}

// ============================================================================
// Maps
// ============================================================================

#[test]
fn test_new_creates_fallback_and_uniforms() {
    let mut fx = PassFixture::new();
    let shadow = renderer(&mut fx);

    assert_eq!(shadow.map_count(), 0);
    assert_eq!(count_events(&fx.device.log, "create_image 1x1"), 1);
    assert!(shadow.uniform_buffer(2).is_ok());
    assert!(shadow.uniform_buffer(3).is_err());
}

#[test]
fn test_one_map_per_caster() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    shadow.set_casters(casters(1, 2));

    shadow.create_resources(&mut fx.ctx(), Viewport::full(800, 600)).unwrap();

    assert_eq!(shadow.map_count(), 3);
    assert_eq!(count_events(&fx.device.log, "create_image 256x256"), 3);
    assert_eq!(count_events(&fx.device.log, "create_framebuffer 256x256"), 3);
}

#[test]
fn test_map_bindings_padded_with_fallback() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    shadow.set_casters(casters(1, 0));
    shadow.create_resources(&mut fx.ctx(), Viewport::full(8, 8)).unwrap();

    let bindings = shadow.map_bindings().unwrap();

    assert_eq!(bindings.len(), MAX_SHADOW_MAPS);
    assert_eq!(bindings[0].0.width(), 256);
    assert!(bindings[1..].iter().all(|(view, _)| view.width() == 1));
}

#[test]
fn test_too_many_casters_rejected() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    shadow.set_casters(casters(MAX_SHADOW_MAPS as u32 + 1, 0));

    let result = shadow.create_resources(&mut fx.ctx(), Viewport::full(8, 8));

    assert!(matches!(result, Err(Error::LimitExceeded(_))));
    assert_eq!(count_events(&fx.device.log, "create_image 256x256"), 0);
}

#[test]
fn test_rebuild_releases_previous_maps() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    shadow.set_casters(casters(2, 0));
    shadow.create_resources(&mut fx.ctx(), Viewport::full(8, 8)).unwrap();

    shadow.set_casters(casters(1, 0));
    shadow.create_resources(&mut fx.ctx(), Viewport::full(8, 8)).unwrap();

    assert_eq!(shadow.map_count(), 1);
    assert_eq!(count_events(&fx.device.log, "destroy_framebuffer"), 2);
    assert_eq!(fx.allocator.lock().unwrap().live_count(), 1 + 3 + 1);
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn test_one_pass_per_caster_with_index_constant() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    shadow.set_casters(casters(1, 1));
    shadow.create_resources(&mut fx.ctx(), Viewport::full(8, 8)).unwrap();

    let defaults = DefaultTextures::create(&mut fx.device, &fx.allocator).unwrap();
    let model = MockModelLoader::default()
        .load_model(&mut fx.device, &fx.allocator, "cube.gltf", &defaults)
        .unwrap();
    let set = fx.device.create_descriptor_set(shadow.pipeline(), 0, &[]).unwrap();
    let draws = [PassDraw { model: &model, descriptor_set: &set }];
    let mut cmd = fx.device.create_command_list().unwrap();

    let count = shadow.draw(cmd.as_mut(), 0, &draws).unwrap();

    assert_eq!(count, 4);
    assert_eq!(count_events(&fx.device.log, "begin_render_pass 256x256"), 2);
    let log = fx.device.log.lock().unwrap();
    let pushes: Vec<&String> = log.iter().filter(|e| e.starts_with("push_constants")).collect();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0], &format!("push_constants {:?}", 0u32.to_ne_bytes()));
    assert_eq!(pushes[1], &format!("push_constants {:?}", 1u32.to_ne_bytes()));
}

#[test]
fn test_no_casters_records_nothing() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    let mut cmd = fx.device.create_command_list().unwrap();

    assert_eq!(shadow.draw(cmd.as_mut(), 0, &[]).unwrap(), 0);
    assert_eq!(count_events(&fx.device.log, "begin_render_pass"), 0);
}

#[test]
fn test_draw_with_stale_maps_rejected() {
    let mut fx = PassFixture::new();
    let mut shadow = renderer(&mut fx);
    shadow.set_casters(casters(1, 0));
    let mut cmd = fx.device.create_command_list().unwrap();

    assert!(matches!(shadow.draw(cmd.as_mut(), 0, &[]), Err(Error::InvalidResource(_))));
}
