/// Per-frame uniform layouts and the light gathering step
///
/// All layouts are `#[repr(C)]` Pod types made of 16-byte aligned members so
/// they match std140 without manual padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use crate::config::{LightLimits, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS};
use crate::error::{Error, Result};
use crate::scene::{Camera, Light, LightKind};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec4,
}

impl CameraUniform {
    pub fn new(camera: &Camera, projection: Mat4) -> Self {
        Self {
            view: camera.view_matrix(),
            projection,
            position: camera.position.extend(0.0),
        }
    }
}

/// Light arrays; `num_lights` = (directional, point, spot, 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniform {
    pub num_lights: [u32; 4],
    pub dir_direction: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    pub dir_color: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    pub point_position: [Vec4; MAX_POINT_LIGHTS],
    pub point_color: [Vec4; MAX_POINT_LIGHTS],
    pub spot_position: [Vec4; MAX_SPOT_LIGHTS],
    pub spot_direction: [Vec4; MAX_SPOT_LIGHTS],
    pub spot_color: [Vec4; MAX_SPOT_LIGHTS],
    /// cos(inner), cos(outer), 0, 0
    pub spot_cutoffs: [Vec4; MAX_SPOT_LIGHTS],
}

/// Light-space transforms for shadow mapping
///
/// The shadow pass push constant is a caster index `i`: casters
/// `0..num_lights[0]` are directional lights, the rest are spot lights at
/// `i - num_lights[0]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowUniform {
    pub num_lights: [u32; 4],
    pub dir_light_spaces: [Mat4; MAX_DIRECTIONAL_LIGHTS],
    pub spot_light_spaces: [Mat4; MAX_SPOT_LIGHTS],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TimeUniform {
    pub seconds: f32,
    pub _pad: [f32; 3],
}

impl TimeUniform {
    pub fn new(seconds: f32) -> Self {
        Self { seconds, _pad: [0.0; 3] }
    }
}

/// One shadow map to render this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCaster {
    pub kind: LightKind,
    /// Index pushed to the shadow pipeline
    pub caster_index: u32,
    pub light_space: Mat4,
}

/// Result of gathering the scene lights for one frame
pub struct LightingData {
    pub lighting: LightingUniform,
    pub shadow: ShadowUniform,
    /// Directional casters first, then spot casters
    pub shadow_casters: Vec<ShadowCaster>,
}

/// Up vector for a look-at along `axis`, avoiding the degenerate +/-Y case
fn light_up(axis: Vec3) -> Vec3 {
    if axis.normalize_or_zero().cross(Vec3::Y).length_squared() < 1e-8 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

/// Light-space transform of a directional light, centred 3 units ahead of the camera
pub fn directional_light_space(direction: Vec3, camera: &Camera) -> Mat4 {
    let eye = -direction;
    let focus = camera.position + camera.forward * 3.0;
    let projection = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, -10.0, 20.0);
    let view = Mat4::look_at_rh(eye + focus, focus, light_up(eye));
    projection * view
}

/// Light-space transform of a spot light (120 degree square frustum)
pub fn spot_light_space(position: Vec3, direction: Vec3) -> Mat4 {
    let projection = Mat4::perspective_rh(120f32.to_radians(), 1.0, 0.1, 20.0);
    let view = Mat4::look_at_rh(position, position + direction, light_up(-direction));
    projection * view
}

impl LightingData {
    /// Pack the lights into the uniform layouts
    ///
    /// # Errors
    ///
    /// `LimitExceeded` when a light type has more lights than `limits` allows.
    /// Nothing is truncated.
    pub fn gather(lights: &[Light], camera: &Camera, limits: &LightLimits) -> Result<Self> {
        let count = |kind: LightKind| lights.iter().filter(|l| l.kind == kind).count();
        let checks = [
            ("directional", count(LightKind::Directional), limits.directional.min(MAX_DIRECTIONAL_LIGHTS)),
            ("point", count(LightKind::Point), limits.point.min(MAX_POINT_LIGHTS)),
            ("spot", count(LightKind::Spot), limits.spot.min(MAX_SPOT_LIGHTS)),
        ];
        for (kind, found, limit) in checks {
            if found > limit {
                return Err(Error::LimitExceeded(format!(
                    "{} {} lights, limit is {}", found, kind, limit
                )));
            }
        }

        let mut lighting = LightingUniform::zeroed();
        let mut shadow = ShadowUniform::zeroed();
        let (mut dir, mut point, mut spot) = (0usize, 0usize, 0usize);

        for light in lights {
            match light.kind {
                LightKind::Directional => {
                    lighting.dir_direction[dir] = light.direction.extend(0.0);
                    lighting.dir_color[dir] = light.color.extend(0.0);
                    shadow.dir_light_spaces[dir] = directional_light_space(light.direction, camera);
                    dir += 1;
                }
                LightKind::Point => {
                    lighting.point_position[point] = light.position.extend(0.0);
                    lighting.point_color[point] = light.color.extend(0.0);
                    point += 1;
                }
                LightKind::Spot => {
                    lighting.spot_position[spot] = light.position.extend(0.0);
                    lighting.spot_direction[spot] = light.direction.extend(0.0);
                    lighting.spot_color[spot] = light.color.extend(0.0);
                    lighting.spot_cutoffs[spot] = Vec4::new(
                        light.cutoffs.x.to_radians().cos(),
                        light.cutoffs.y.to_radians().cos(),
                        0.0,
                        0.0,
                    );
                    shadow.spot_light_spaces[spot] = spot_light_space(light.position, light.direction);
                    spot += 1;
                }
            }
        }

        let counts = [dir as u32, point as u32, spot as u32, 0];
        lighting.num_lights = counts;
        shadow.num_lights = counts;

        let shadow_casters = (0..dir)
            .map(|i| ShadowCaster {
                kind: LightKind::Directional,
                caster_index: i as u32,
                light_space: shadow.dir_light_spaces[i],
            })
            .chain((0..spot).map(|i| ShadowCaster {
                kind: LightKind::Spot,
                caster_index: (dir + i) as u32,
                light_space: shadow.spot_light_spaces[i],
            }))
            .collect();

        Ok(Self { lighting, shadow, shadow_casters })
    }
}

#[cfg(test)]
#[path = "uniforms_tests.rs"]
mod tests;
