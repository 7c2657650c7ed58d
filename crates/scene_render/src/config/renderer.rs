//! Settings for the render-list builder and the transform cache

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::scene::ProfileMask;

/// # Transform Cache Configuration
///
/// Controls whether `TransformCache::update` fans out across a worker pool.
/// Parallel evaluation only kicks in for passes holding at least
/// `parallel_threshold` items; smaller passes are cheaper to run inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformCacheConfig {
    /// Evaluate large passes on a worker pool
    pub parallel: bool,
    /// Worker pool size
    pub worker_threads: usize,
    /// Items claimed by a worker at a time
    pub chunk_size: usize,
    /// Minimum pass size before work is split across workers
    pub parallel_threshold: usize,
}

impl TransformCacheConfig {
    /// Check for values the cache cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "transform_cache.worker_threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "transform_cache.chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for TransformCacheConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            worker_threads: 4,
            chunk_size: 100,
            parallel_threshold: 512,
        }
    }
}

/// Render list traversal settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderListConfig {
    /// Profiles the executor can run; techniques from other profiles are skipped
    pub active_profiles: ProfileMask,
    /// Attach a bounding-box visibility value to local coordinate systems
    pub frustum_culling: bool,
}

impl Default for RenderListConfig {
    fn default() -> Self {
        Self {
            active_profiles: ProfileMask::all(),
            frustum_culling: true,
        }
    }
}

/// Top-level renderer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Transform cache settings
    pub transform_cache: TransformCacheConfig,
    /// Render list settings
    pub render_list: RenderListConfig,
}

impl RendererConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transform_cache.validate()?;
        if self.render_list.active_profiles.is_empty() {
            return Err(ConfigError::Invalid {
                field: "render_list.active_profiles",
                reason: "no profile enabled".to_string(),
            });
        }
        Ok(())
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.transform_cache.parallel);
        assert_eq!(config.transform_cache.worker_threads, 4);
        assert_eq!(config.transform_cache.chunk_size, 100);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let mut config = RendererConfig::default();
        config.transform_cache.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "transform_cache.chunk_size", .. })
        ));
    }

    #[test]
    fn test_toml_partial_document_uses_defaults() {
        let config: RendererConfig = toml::from_str(
            "[transform_cache]\nparallel = true\nworker_threads = 8\n",
        )
        .unwrap();
        assert!(config.transform_cache.parallel);
        assert_eq!(config.transform_cache.worker_threads, 8);
        assert_eq!(config.transform_cache.chunk_size, 100);
        assert!(config.render_list.frustum_culling);
    }

    #[test]
    fn test_ron_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("scene_render_cfg_{}.ron", std::process::id()));
        let mut config = RendererConfig::default();
        config.render_list.frustum_culling = false;
        config.save_to_file(&path).unwrap();
        let loaded = RendererConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = RendererConfig::default().save_to_file("renderer.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
