use crate::{
    error::{SurfaceError, SurfaceResult},
    math::MAXIMUM_LEVEL,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// The policy constants of the surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// A tile is refined while its screen space error in pixels exceeds this value.
    pub maximum_screen_space_error: f64,
    /// The number of imagery textures a single draw command may bind.
    pub max_textures_per_command: usize,
    /// The number of requests dispatched to the providers per update.
    pub max_requests_per_frame: usize,
    /// The number of requests that may be in flight at once.
    pub max_concurrent_requests: usize,
    /// The deepest level the quadtree is ever refined into.
    pub maximum_level: u32,
    /// The number of tiles above which unvisited subtrees are collapsed.
    pub tile_cache_size: usize,
    /// The number of unreferenced imagery tiles kept per layer.
    pub imagery_cache_size: usize,
    /// The number of geometry results of evicted tiles kept for reuse.
    pub geometry_cache_size: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            maximum_screen_space_error: 2.0,
            max_textures_per_command: 8,
            max_requests_per_frame: 16,
            max_concurrent_requests: 64,
            maximum_level: 18,
            tile_cache_size: 256,
            imagery_cache_size: 128,
            geometry_cache_size: 64,
        }
    }
}

impl SurfaceConfig {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let encoded = fs::read_to_string(path)?;
        let config: Self = ron::from_str(&encoded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn validate(&self) -> SurfaceResult<()> {
        let error = self.maximum_screen_space_error;

        if error.is_nan() || error <= 0.0 {
            return Err(SurfaceError::InvalidConfig(format!(
                "maximum_screen_space_error must be positive, got {error}"
            )));
        }

        for (name, value) in [
            ("max_textures_per_command", self.max_textures_per_command),
            ("max_requests_per_frame", self.max_requests_per_frame),
            ("max_concurrent_requests", self.max_concurrent_requests),
        ] {
            if value == 0 {
                return Err(SurfaceError::InvalidConfig(format!(
                    "{name} must not be zero"
                )));
            }
        }

        if self.maximum_level > MAXIMUM_LEVEL {
            return Err(SurfaceError::InvalidConfig(format!(
                "maximum_level must not exceed {MAXIMUM_LEVEL}, got {}",
                self.maximum_level
            )));
        }

        Ok(())
    }
}
