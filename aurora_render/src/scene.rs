/// Read-only view over the entity/component store
///
/// The renderer receives a `SceneView` at construction and queries it every
/// tick: renderables with their transform and shader set, lights, and the
/// single active camera. It never mutates the store.

use glam::{Mat4, Vec2, Vec3};
use crate::graphics_device::{PrimitiveTopology, ShaderStages};

/// Stable entity identifier assigned by the component store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Position, Euler rotation in degrees, scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// T * Rx * Ry * Rz * S
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_scale(self.scale)
    }
}

/// Renderable entity
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub id: EntityId,
    pub transform: Transform,
    /// Model asset path, resolved by the model loader
    pub model_path: String,
    /// Shader program; entities with equal stages share a pipeline
    pub shaders: ShaderStages,
    pub topology: PrimitiveTopology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// Light entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    /// Directional and spot lights
    pub direction: Vec3,
    /// Point and spot lights
    pub position: Vec3,
    /// Inner and outer cone angles in degrees (spot lights)
    pub cutoffs: Vec2,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Self { kind: LightKind::Directional, color, direction, position: Vec3::ZERO, cutoffs: Vec2::ZERO }
    }

    pub fn point(position: Vec3, color: Vec3) -> Self {
        Self { kind: LightKind::Point, color, direction: Vec3::ZERO, position, cutoffs: Vec2::ZERO }
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, cutoffs: Vec2) -> Self {
        Self { kind: LightKind::Spot, color, direction, position, cutoffs }
    }

    /// Point lights do not cast shadows
    pub fn casts_shadow(&self) -> bool {
        matches!(self.kind, LightKind::Directional | LightKind::Spot)
    }
}

/// The active camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// Viewing direction
    pub forward: Vec3,
    /// Environment cubemap drawn as skybox
    pub environment: Option<String>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            environment: None,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, Vec3::Y)
    }

    /// Perspective projection with Y flipped for Vulkan clip space
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut projection = Mat4::perspective_rh(self.fov.to_radians(), aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }
}

/// Query interface over the component store
pub trait SceneView: Send + Sync {
    /// Renderable entities in draw order
    fn renderables(&self) -> Vec<Renderable>;

    /// Lights in declaration order
    fn lights(&self) -> Vec<Light>;

    /// The active camera (None when the scene has none)
    fn camera(&self) -> Option<Camera>;

    /// Look up one renderable
    fn renderable(&self, id: EntityId) -> Option<Renderable> {
        self.renderables().into_iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
