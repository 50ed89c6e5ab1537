/// Pipeline cache - at most one compiled pipeline per structural key
///
/// Two materials that resolve to the same key share one pipeline; that is
/// deliberate reuse, not a collision.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{
    FixedFunctionState, GraphicsDevice, Pipeline, PipelineDesc, ShaderStages,
};
use crate::registry::RenderPassRegistry;
use crate::{engine_debug, engine_info};

/// Structural pipeline identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shaders: ShaderStages,
    pub state: FixedFunctionState,
    /// Registry name of the render pass the pipeline targets
    pub render_pass: String,
}

impl PipelineKey {
    pub fn new(shaders: ShaderStages, state: FixedFunctionState, render_pass: &str) -> Self {
        Self {
            shaders,
            state,
            render_pass: render_pass.to_string(),
        }
    }
}

/// Pipeline cache
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, Arc<dyn Pipeline>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            pipelines: FxHashMap::default(),
        }
    }

    /// Return the cached pipeline for `key`, compiling it on first request
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` if the key names an unregistered render pass, or
    /// the backend's compilation error.
    pub fn get_or_create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        passes: &RenderPassRegistry,
        key: &PipelineKey,
    ) -> Result<Arc<dyn Pipeline>> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return Ok(pipeline.clone());
        }

        let pipeline = Self::compile(device, passes, key)?;
        engine_debug!("aurora::PipelineCache", "Compiled pipeline '{}' for pass '{}'",
            key.shaders.vertex, key.render_pass);
        self.pipelines.insert(key.clone(), pipeline.clone());
        Ok(pipeline)
    }

    fn compile(
        device: &mut dyn GraphicsDevice,
        passes: &RenderPassRegistry,
        key: &PipelineKey,
    ) -> Result<Arc<dyn Pipeline>> {
        let pass = passes.get(&key.render_pass)?;
        device.create_pipeline(&PipelineDesc {
            shaders: &key.shaders,
            state: &key.state,
            render_pass: pass.render_pass(),
        })
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&Arc<dyn Pipeline>> {
        self.pipelines.get(key)
    }

    pub fn contains(&self, key: &PipelineKey) -> bool {
        self.pipelines.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Recompile every cached pipeline in place (shader hot reload)
    ///
    /// Keys are unchanged; holders of the previous pipelines must re-resolve
    /// them. The device must be idle. If any pipeline fails to compile the
    /// cache is left untouched.
    pub fn reload_all(
        &mut self,
        device: &mut dyn GraphicsDevice,
        passes: &RenderPassRegistry,
    ) -> Result<usize> {
        let mut reloaded = FxHashMap::default();
        for key in self.pipelines.keys() {
            reloaded.insert(key.clone(), Self::compile(device, passes, key)?);
        }
        let count = reloaded.len();
        self.pipelines = reloaded;
        engine_info!("aurora::PipelineCache", "Reloaded {} pipelines", count);
        Ok(count)
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;
