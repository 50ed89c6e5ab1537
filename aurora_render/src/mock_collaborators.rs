/// Mock window, scene and model loader for renderer tests (no GPU, no OS window)

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use glam::{Vec2, Vec3};
use crate::asset::{DefaultTextures, Mesh, Model, ModelLoader};
use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, ImageDesc, ImageFormat, ImageUsage, PrimitiveTopology, SampleCount,
    SamplerDesc, ShaderStages, Vertex,
};
use crate::memory::{MemoryFlags, SharedAllocator};
use crate::resource::GpuImage;
use crate::scene::{Camera, EntityId, Light, Renderable, SceneView, Transform};
use crate::window::WindowSurface;

// ============================================================================
// Mock window
// ============================================================================

#[derive(Debug, Default)]
pub struct MockWindowState {
    pub extent: (u32, u32),
    pub resized: bool,
    pub close: bool,
    /// Extents applied one per `wait_events` call
    pub pending_extents: VecDeque<(u32, u32)>,
    pub wait_calls: usize,
    pub poll_calls: usize,
}

/// Window whose state is shared with the test through `state`
#[derive(Clone)]
pub struct MockWindow {
    pub state: Arc<Mutex<MockWindowState>>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockWindowState {
                extent: (width, height),
                ..Default::default()
            })),
        }
    }

    /// Simulate a resize event
    pub fn resize(&self, width: u32, height: u32) {
        let mut state = self.state.lock().unwrap();
        state.extent = (width, height);
        state.resized = true;
    }
}

impl WindowSurface for MockWindow {
    fn current_extent(&self) -> (u32, u32) {
        self.state.lock().unwrap().extent
    }

    fn resize_requested(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().unwrap().resized)
    }

    fn close_requested(&self) -> bool {
        self.state.lock().unwrap().close
    }

    fn poll_events(&mut self) {
        self.state.lock().unwrap().poll_calls += 1;
    }

    /// Applies the next scripted extent; with none left the window closes
    fn wait_events(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.wait_calls += 1;
        match state.pending_extents.pop_front() {
            Some(extent) => {
                state.extent = extent;
                state.resized = true;
            }
            None => state.close = true,
        }
    }
}

// ============================================================================
// Mock scene
// ============================================================================

#[derive(Default)]
pub struct MockScene {
    pub renderables: Mutex<Vec<Renderable>>,
    pub lights: Mutex<Vec<Light>>,
    pub camera: Mutex<Option<Camera>>,
}

impl MockScene {
    pub fn new() -> Self {
        Self {
            camera: Mutex::new(Some(test_camera())),
            ..Default::default()
        }
    }

    pub fn add(&self, renderable: Renderable) {
        self.renderables.lock().unwrap().push(renderable);
    }

    pub fn remove(&self, id: EntityId) {
        self.renderables.lock().unwrap().retain(|r| r.id != id);
    }

    pub fn add_light(&self, light: Light) {
        self.lights.lock().unwrap().push(light);
    }
}

impl SceneView for MockScene {
    fn renderables(&self) -> Vec<Renderable> {
        self.renderables.lock().unwrap().clone()
    }

    fn lights(&self) -> Vec<Light> {
        self.lights.lock().unwrap().clone()
    }

    fn camera(&self) -> Option<Camera> {
        self.camera.lock().unwrap().clone()
    }
}

pub fn test_camera() -> Camera {
    Camera {
        fov: 60.0,
        near: 0.1,
        far: 100.0,
        position: Vec3::new(0.0, 1.0, 5.0),
        forward: Vec3::NEG_Z,
        environment: None,
    }
}

pub fn cube(id: u64, shaders: &ShaderStages) -> Renderable {
    Renderable {
        id: EntityId(id),
        transform: Transform::default(),
        model_path: "cube.gltf".to_string(),
        shaders: shaders.clone(),
        topology: PrimitiveTopology::TriangleList,
    }
}

pub fn sun() -> Light {
    Light::directional(Vec3::new(-0.3, -1.0, -0.2), Vec3::ONE)
}

pub fn flashlight() -> Light {
    Light::spot(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, Vec3::ONE, Vec2::new(12.5, 17.5))
}

// ============================================================================
// Mock model loader
// ============================================================================

/// Loads a two-mesh quad pair for any path except those starting with "missing"
#[derive(Clone, Default)]
pub struct MockModelLoader {
    pub loaded: Arc<Mutex<Vec<String>>>,
}

impl ModelLoader for MockModelLoader {
    fn load_model(
        &mut self,
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        path: &str,
        defaults: &DefaultTextures,
    ) -> Result<Model> {
        if path.starts_with("missing") {
            return Err(Error::ResourceNotFound(format!("model '{}'", path)));
        }
        self.loaded.lock().unwrap().push(path.to_string());

        let vertex = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [x, y],
            color: [1.0, 1.0, 1.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
        };
        let vertices = [vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(1.0, 1.0), vertex(0.0, 1.0)];
        let indices = [0, 1, 2, 2, 3, 0, 0, 2, 1];
        let meshes = vec![
            Mesh::new(0, 6, 0, defaults.material_writes()?),
            Mesh::new(6, 3, 0, defaults.material_writes()?),
        ];
        Model::from_geometry(device, allocator, path, &vertices, &indices, meshes)
    }

    fn load_environment(
        &mut self,
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        path: &str,
    ) -> Result<GpuImage> {
        if path.starts_with("missing") {
            return Err(Error::ResourceNotFound(format!("environment '{}'", path)));
        }
        let desc = ImageDesc {
            width: 1,
            height: 1,
            mip_levels: 1,
            array_layers: 6,
            format: ImageFormat::R8G8B8A8_SRGB,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
            samples: SampleCount::S1,
            memory: MemoryFlags::DEVICE_LOCAL,
            data: Some(vec![255u8; 24]),
        };
        GpuImage::create(device, allocator, desc, Some(SamplerDesc::linear_clamp()))
    }
}
