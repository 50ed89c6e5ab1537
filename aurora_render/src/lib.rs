/*!
# Aurora Render

Core of the Aurora frame renderer.

This crate holds the backend-agnostic part of the renderer: the graphics
device traits every GPU backend implements, the frame orchestrator that drives
acquire / record / submit / present for each frame, and the passes of the
frame graph (depth prepass, shadow maps, scene, ambient occlusion, post
composite). The Vulkan backend lives in the `aurora_render_vulkan` crate.

## Architecture

- **GraphicsDevice**: Factory trait for GPU resources, queues and swapchains
- **Renderer**: Frame orchestrator owning the frame graph
- **RenderPassRegistry / PipelineCache**: Named render passes and deduplicated pipelines
- **ResourceAllocator**: Device memory bookkeeping behind `GpuImage` / `GpuBuffer`
- **SceneView / ModelLoader / WindowSurface**: Collaborators injected by the application
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod memory;
pub mod resource;
pub mod registry;
pub mod uniforms;
pub mod scene;
pub mod window;
pub mod asset;
pub mod passes;
pub mod renderer;

#[cfg(test)]
mod mock_collaborators;

// Main aurora namespace module
pub mod aurora {
    // Error types
    pub use crate::error::{Error, Result};

    // Global logger slot
    pub use crate::engine::Engine;

    // Frame orchestrator
    pub use crate::renderer::{FrameCommand, FrameState, FrameStats, Renderer};

    // Configuration
    pub use crate::config::*;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, LogBridge};
    }

    // Backend interface sub-module
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Memory and scoped resources
    pub mod resource {
        pub use crate::memory::*;
        pub use crate::resource::*;
    }

    // Application-side collaborators
    pub mod scene {
        pub use crate::scene::*;
        pub use crate::window::*;
        pub use crate::asset::*;
    }
}

// Re-export math library at crate root
pub use glam;
