#![allow(dead_code)]
//! GPU test utilities - shared Vulkan device and collaborators for integration tests
//!
//! A single `VulkanDevice` (and its window surface) is shared by every GPU
//! test of a test binary: ash-window refuses to create a second surface for the
//! same window on some platforms, and one device per process is also what a
//! real application does.

use aurora_render::aurora::{Error, RendererConfig, Result};
use aurora_render::aurora::device::GraphicsDevice;
use aurora_render::aurora::resource::{GpuImage, SharedAllocator};
use aurora_render::aurora::scene::{
    Camera, DefaultTextures, Light, Model, ModelLoader, Renderable, SceneView, WindowSurface,
};
use aurora_render_vulkan::VulkanDevice;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::EventLoop;
use winit::window::Window;

#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;

pub const TEST_WIDTH: u32 = 800;
pub const TEST_HEIGHT: u32 = 600;

/// Global device (initialized once)
static GPU_DEVICE: OnceLock<Arc<Mutex<dyn GraphicsDevice>>> = OnceLock::new();

/// Global Window (kept alive for the device surface)
static GPU_WINDOW: OnceLock<Window> = OnceLock::new();

/// Get the shared device for GPU tests
///
/// The EventLoop is leaked with mem::forget to keep the Window valid; it
/// cannot live in a static because it is not Sync.
pub fn get_test_device() -> Arc<Mutex<dyn GraphicsDevice>> {
    GPU_DEVICE
        .get_or_init(|| {
            let (window, event_loop) = create_test_window();
            let device = VulkanDevice::new(&window, &RendererConfig::default())
                .expect("Failed to create VulkanDevice for tests");

            std::mem::forget(event_loop);
            GPU_WINDOW.set(window).ok();

            let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(device));
            device
        })
        .clone()
}

/// Create a hidden test window
///
/// On Windows the EventLoop needs any_thread support since cargo test runs
/// tests outside the main thread.
#[allow(deprecated)]
pub fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = {
        #[cfg(target_os = "windows")]
        {
            EventLoop::builder().with_any_thread(true).build().unwrap()
        }
        #[cfg(not(target_os = "windows"))]
        {
            EventLoop::new().unwrap()
        }
    };

    let window_attrs = Window::default_attributes()
        .with_title("Aurora GPU Test Window")
        .with_inner_size(winit::dpi::PhysicalSize::new(TEST_WIDTH, TEST_HEIGHT))
        .with_visible(false);

    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Window collaborator reporting a fixed extent
pub struct FixedWindow {
    pub extent: (u32, u32),
}

impl FixedWindow {
    pub fn new() -> Self {
        Self { extent: (TEST_WIDTH, TEST_HEIGHT) }
    }
}

impl WindowSurface for FixedWindow {
    fn current_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn resize_requested(&mut self) -> bool {
        false
    }

    fn close_requested(&self) -> bool {
        false
    }

    fn poll_events(&mut self) {}

    fn wait_events(&mut self) {}
}

/// Scene with a camera, the given lights and no renderables
pub struct LightsOnlyScene {
    pub lights: Vec<Light>,
}

impl SceneView for LightsOnlyScene {
    fn renderables(&self) -> Vec<Renderable> {
        Vec::new()
    }

    fn lights(&self) -> Vec<Light> {
        self.lights.clone()
    }

    fn camera(&self) -> Option<Camera> {
        Some(Camera::default())
    }
}

/// Model loader without assets
pub struct NoAssets;

impl ModelLoader for NoAssets {
    fn load_model(
        &mut self,
        _device: &mut dyn GraphicsDevice,
        _allocator: &SharedAllocator,
        path: &str,
        _defaults: &DefaultTextures,
    ) -> Result<Model> {
        Err(Error::ResourceNotFound(format!("model '{}'", path)))
    }

    fn load_environment(
        &mut self,
        _device: &mut dyn GraphicsDevice,
        _allocator: &SharedAllocator,
        path: &str,
    ) -> Result<GpuImage> {
        Err(Error::ResourceNotFound(format!("environment '{}'", path)))
    }
}
