/// Frame orchestration
///
/// `Renderer` owns the frame graph and runs one frame per `update`. The other
/// modules hold the pieces it is built from: frame-slot synchronization,
/// per-entity GPU resources, the skybox and the per-frame statistics.

pub mod frame_sync;
pub mod frame_stats;
pub mod entity_resources;
pub mod skybox;
#[allow(clippy::module_inception)]
pub mod renderer;

pub use frame_sync::*;
pub use frame_stats::*;
pub use entity_resources::*;
pub use skybox::*;
pub use renderer::*;
