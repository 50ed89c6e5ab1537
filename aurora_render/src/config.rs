/// Renderer configuration
///
/// Process-wide knobs of the rendering core. Passed by value to `Renderer::new`
/// and to the backend constructor.

use crate::error::{Error, Result};

/// Number of concurrently outstanding frame submissions
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Width and height of every shadow map
pub const SHADOW_MAP_SIZE: u32 = 2048;

/// Capacity of the directional light arrays in the lighting uniform
pub const MAX_DIRECTIONAL_LIGHTS: usize = 8;

/// Capacity of the point light arrays in the lighting uniform
pub const MAX_POINT_LIGHTS: usize = 16;

/// Capacity of the spot light arrays in the lighting uniform
pub const MAX_SPOT_LIGHTS: usize = 8;

/// Capacity of the ambient occlusion sample kernel uniform
pub const MAX_SSAO_KERNEL_SIZE: usize = 64;

/// Hard limits on the number of lights of each type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightLimits {
    pub directional: usize,
    pub point: usize,
    pub spot: usize,
}

impl Default for LightLimits {
    fn default() -> Self {
        Self {
            directional: MAX_DIRECTIONAL_LIGHTS,
            point: MAX_POINT_LIGHTS,
            spot: MAX_SPOT_LIGHTS,
        }
    }
}

/// Screen-space ambient occlusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsaoConfig {
    /// Number of hemisphere samples per fragment
    pub kernel_size: usize,
    /// Sampling radius in view space
    pub radius: f32,
    /// Depth comparison bias
    pub bias: f32,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            kernel_size: MAX_SSAO_KERNEL_SIZE,
            radius: 0.5,
            bias: 0.025,
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Frames in flight (fence / image-acquired semaphore count)
    pub frames_in_flight: usize,
    /// Shadow map resolution (square)
    pub shadow_map_size: u32,
    /// Maximum supported lights per type
    pub light_limits: LightLimits,
    /// Clear color of the scene color attachment
    pub clear_color: [f32; 4],
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Wait for vertical blank (FIFO present mode)
    pub vsync: bool,
    /// Ambient occlusion parameters
    pub ssao: SsaoConfig,
    /// Directory prefix for the built-in shaders
    pub shader_root: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            shadow_map_size: SHADOW_MAP_SIZE,
            light_limits: LightLimits::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            enable_validation: cfg!(debug_assertions),
            app_name: "Aurora Application".to_string(),
            app_version: (1, 0, 0),
            vsync: true,
            ssao: SsaoConfig::default(),
            shader_root: "shaders".to_string(),
        }
    }
}

impl RendererConfig {
    /// Check every knob against the capacities compiled into the uniform layouts
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.shadow_map_size == 0 {
            return Err(Error::InitializationFailed(
                "shadow_map_size must be positive".to_string(),
            ));
        }
        let limits = [
            ("directional", self.light_limits.directional, MAX_DIRECTIONAL_LIGHTS),
            ("point", self.light_limits.point, MAX_POINT_LIGHTS),
            ("spot", self.light_limits.spot, MAX_SPOT_LIGHTS),
        ];
        for (kind, limit, capacity) in limits {
            if limit > capacity {
                return Err(Error::InitializationFailed(format!(
                    "{} light limit {} exceeds uniform capacity {}",
                    kind, limit, capacity
                )));
            }
        }
        if self.ssao.kernel_size == 0 || self.ssao.kernel_size > MAX_SSAO_KERNEL_SIZE {
            return Err(Error::InitializationFailed(format!(
                "ssao kernel size {} outside 1..={}",
                self.ssao.kernel_size, MAX_SSAO_KERNEL_SIZE
            )));
        }
        Ok(())
    }

    /// Resolve a built-in shader file name against `shader_root`
    pub fn shader_path(&self, file: &str) -> String {
        if self.shader_root.is_empty() {
            file.to_string()
        } else {
            format!("{}/{}", self.shader_root.trim_end_matches('/'), file)
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
