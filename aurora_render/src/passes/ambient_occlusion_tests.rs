use super::*;
use crate::config::MAX_FRAMES_IN_FLIGHT;
use crate::graphics_device::mock_graphics_device::count_events;
use crate::passes::test_support::PassFixture;
use crate::passes::{DepthPrepass, SharedBindings};

fn ambient_occlusion(fx: &mut PassFixture) -> AmbientOcclusion {
    AmbientOcclusion::register_render_passes(&mut fx.device, &mut fx.render_passes).unwrap();
    AmbientOcclusion::new(&mut fx.ctx()).unwrap()
}

/// Camera buffers and a prepass depth image for `create_resources`
fn with_shared_bindings(fx: &mut PassFixture) -> DepthPrepass {
    DepthPrepass::register_render_pass(&mut fx.device, &mut fx.render_passes, [0.0; 4]).unwrap();
    let mut prepass = DepthPrepass::new(&mut fx.ctx()).unwrap();
    prepass.create_resources(&mut fx.ctx(), Viewport::full(640, 480)).unwrap();

    let camera = (0..MAX_FRAMES_IN_FLIGHT)
        .map(|_| fx.device.create_buffer(BufferDesc::uniform(144)).unwrap())
        .collect();
    fx.shared = SharedBindings {
        camera,
        depth: Some(prepass.depth_binding().unwrap()),
    };
    prepass
}

// ============================================================================
// Kernel and noise
// ============================================================================

#[test]
fn test_kernel_in_upper_hemisphere() {
    let kernel = generate_kernel(64);

    assert_eq!(kernel.len(), 64);
    assert!(kernel.iter().all(|s| s.z >= 0.0 && s.truncate().length() <= 1.0 && s.w == 0.0));
}

#[test]
fn test_kernel_is_deterministic() {
    assert_eq!(generate_kernel(16), generate_kernel(16));
}

#[test]
fn test_noise_is_four_by_four_rgba() {
    let noise = generate_noise();

    assert_eq!(noise.len(), 4 * 4 * 4);
    assert!(noise.chunks(4).all(|texel| texel[2] == 0 && texel[3] == 255));
}

#[test]
fn test_uniform_packs_settings() {
    let mut fx = PassFixture::new();
    fx.config.ssao.kernel_size = 32;
    let ao = ambient_occlusion(&mut fx);

    let uniform = ao.uniform(Viewport::full(800, 600));

    assert_eq!(uniform.params, Vec4::new(32.0, 0.5, 0.025, 0.0));
    assert_eq!(uniform.noise_scale, Vec4::new(200.0, 150.0, 0.0, 0.0));
    assert_eq!(uniform.samples[32], Vec4::ZERO);
    assert_ne!(uniform.samples[31], Vec4::ZERO);
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_registers_two_passes_and_pipelines() {
    let mut fx = PassFixture::new();
    ambient_occlusion(&mut fx);

    assert!(fx.render_passes.contains(SSAO_PASS));
    assert!(fx.render_passes.contains(SSAO_BLUR_PASS));
    assert_eq!(fx.pipelines.len(), 2);
}

#[test]
fn test_create_resources_requires_depth() {
    let mut fx = PassFixture::new();
    let mut ao = ambient_occlusion(&mut fx);

    let result = ao.create_resources(&mut fx.ctx(), Viewport::full(640, 480));

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(ao.blurred_binding().is_err());
}

#[test]
fn test_create_resources_builds_sets_per_frame() {
    let mut fx = PassFixture::new();
    let mut ao = ambient_occlusion(&mut fx);
    let _prepass = with_shared_bindings(&mut fx);

    ao.create_resources(&mut fx.ctx(), Viewport::full(640, 480)).unwrap();

    assert_eq!(count_events(&fx.device.log, "create_descriptor_set 0"), MAX_FRAMES_IN_FLIGHT + 1);
    assert_eq!(count_events(&fx.device.log, "create_framebuffer 640x480"), 3);
    assert_eq!(ao.blurred_binding().unwrap().0.width(), 640);
}

#[test]
fn test_draw_records_occlusion_then_blur() {
    let mut fx = PassFixture::new();
    let mut ao = ambient_occlusion(&mut fx);
    let _prepass = with_shared_bindings(&mut fx);
    ao.create_resources(&mut fx.ctx(), Viewport::full(640, 480)).unwrap();
    let mut cmd = fx.device.create_command_list().unwrap();
    fx.device.log.lock().unwrap().clear();

    let count = ao.draw(cmd.as_mut(), 1, &[]).unwrap();

    assert_eq!(count, 2);
    let log = fx.device.log.lock().unwrap();
    let recorded: Vec<&str> = log.iter().map(|e| e.as_str()).collect();
    assert_eq!(recorded, vec![
        "begin_render_pass 640x480", "set_viewport", "set_scissor",
        "bind_pipeline", "bind_descriptor_set 0", "draw 3", "end_render_pass",
        "begin_render_pass 640x480", "set_viewport", "set_scissor",
        "bind_pipeline", "bind_descriptor_set 0", "draw 3", "end_render_pass",
    ]);
}

#[test]
fn test_draw_rejects_unknown_frame() {
    let mut fx = PassFixture::new();
    let mut ao = ambient_occlusion(&mut fx);
    let _prepass = with_shared_bindings(&mut fx);
    ao.create_resources(&mut fx.ctx(), Viewport::full(64, 64)).unwrap();
    let mut cmd = fx.device.create_command_list().unwrap();

    assert!(ao.draw(cmd.as_mut(), MAX_FRAMES_IN_FLIGHT, &[]).is_err());
}

#[test]
fn test_resolve_pipelines_rebuilds_live_sets() {
    let mut fx = PassFixture::new();
    let mut ao = ambient_occlusion(&mut fx);
    let _prepass = with_shared_bindings(&mut fx);
    ao.create_resources(&mut fx.ctx(), Viewport::full(64, 64)).unwrap();
    fx.pipelines.reload_all(&mut fx.device, &fx.render_passes).unwrap();

    ao.resolve_pipelines(&mut fx.ctx()).unwrap();

    assert_eq!(count_events(&fx.device.log, "create_descriptor_set 0"), 2 * (MAX_FRAMES_IN_FLIGHT + 1));
    assert!(ao.blurred_binding().is_ok());
}
