//! Integration tests for the scoped GPU resources and the frame orchestrator
//! with the real Vulkan backend
//!
//! All tests require a GPU and are marked with #[ignore]. The renderer tests
//! also need the built-in shaders compiled to SPIR-V under `shaders/`.
//!
//! Run with: cargo test --test gpu_integration_tests -- --ignored

mod gpu_test_utils;

use aurora_render::aurora::{FrameCommand, FrameState, Renderer, RendererConfig};
use aurora_render::aurora::device::{BufferDesc, ImageDesc, ImageFormat, ImageUsage, SamplerDesc};
use aurora_render::aurora::resource::{GpuBuffer, GpuImage, ResourceAllocator};
use aurora_render::aurora::scene::Light;
use aurora_render::glam::Vec3;
use gpu_test_utils::{get_test_device, FixedWindow, LightsOnlyScene, NoAssets, TEST_HEIGHT, TEST_WIDTH};
use serial_test::serial;
use std::sync::Arc;

// ============================================================================
// SCOPED RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_gpu_image_returns_allocation_on_destroy() {
    let device = get_test_device();
    let mut guard = device.lock().unwrap();
    let allocator = ResourceAllocator::new().shared();

    let desc = ImageDesc::attachment(256, 256, ImageFormat::R8G8B8A8_UNORM, ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED);
    let mut image = GpuImage::create(&mut *guard, &allocator, desc, Some(SamplerDesc::linear_repeat(1))).unwrap();
    assert!(image.is_created());
    assert!(image.binding().is_ok());
    assert_eq!(allocator.lock().unwrap().live_count(), 1);

    image.destroy();
    image.destroy();
    assert!(!image.is_created());
    assert_eq!(allocator.lock().unwrap().live_count(), 0);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_gpu_buffer_write_and_drop() {
    let device = get_test_device();
    let mut guard = device.lock().unwrap();
    let allocator = ResourceAllocator::new().shared();

    {
        let buffer = GpuBuffer::create(&mut *guard, &allocator, BufferDesc::uniform(64)).unwrap();
        buffer.write(0, &[7u8; 64]).unwrap();
        assert!(buffer.write(32, &[7u8; 64]).is_err());
        assert_eq!(allocator.lock().unwrap().live_count(), 1);
    }
    assert_eq!(allocator.lock().unwrap().live_count(), 0);
}

// ============================================================================
// RENDERER
// ============================================================================

fn create_renderer(lights: Vec<Light>) -> Renderer {
    Renderer::new(
        get_test_device(),
        Box::new(FixedWindow::new()),
        Arc::new(LightsOnlyScene { lights }),
        Box::new(NoAssets),
        RendererConfig::default(),
    )
    .unwrap()
}

#[test]
#[ignore] // Requires GPU and compiled shaders
#[serial]
fn test_renderer_sync_object_counts() {
    let mut renderer = create_renderer(Vec::new());

    assert_eq!(renderer.frames_in_flight(), 3);
    assert_eq!(renderer.render_finished_count(), renderer.swapchain_image_count());
    assert_eq!(renderer.swapchain_extent(), Some((TEST_WIDTH, TEST_HEIGHT)));

    renderer.destroy().unwrap();
}

#[test]
#[ignore] // Requires GPU and compiled shaders
#[serial]
fn test_renderer_frames_without_lights_skip_shadow_passes() {
    let mut renderer = create_renderer(Vec::new());

    for _ in 0..5 {
        let stats = renderer.update(&[]).unwrap();
        assert_eq!(stats.shadow_passes, 0);
        assert_eq!(stats.light_counts, [0, 0, 0]);
    }
    assert_eq!(renderer.state(), FrameState::Idle);

    renderer.destroy().unwrap();
}

#[test]
#[ignore] // Requires GPU and compiled shaders
#[serial]
fn test_renderer_shadow_pass_per_caster() {
    let lights = vec![
        Light::directional(Vec3::new(-1.0, -1.0, 0.0), Vec3::ONE),
        Light::point(Vec3::new(0.0, 2.0, 0.0), Vec3::ONE),
    ];
    let mut renderer = create_renderer(lights);

    let stats = renderer.update(&[]).unwrap();
    assert_eq!(stats.shadow_passes, 1);
    assert_eq!(stats.light_counts, [1, 1, 0]);
    assert_eq!(renderer.shadow_map_count(), 1);

    renderer.destroy().unwrap();
}

#[test]
#[ignore] // Requires GPU and compiled shaders
#[serial]
fn test_renderer_rebuild_and_reload() {
    let mut renderer = create_renderer(Vec::new());

    renderer.reload_on_resize().unwrap();
    let first = renderer.swapchain_extent();
    renderer.reload_on_resize().unwrap();
    assert_eq!(renderer.swapchain_extent(), first);

    renderer.update(&[FrameCommand::ReloadPipelines, FrameCommand::AnalyzeMemory]).unwrap();

    renderer.destroy().unwrap();
}
