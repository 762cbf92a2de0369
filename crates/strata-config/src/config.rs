//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Per-block storage encodings and deflation.
    pub block_data: BlockDataConfig,
    /// Chunk provider threading and cache limits.
    pub provider: ProviderConfig,
    /// World shape and generator selection.
    pub world: WorldConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Encodings used for the four primary per-block arrays of every new chunk.
///
/// Encoding names refer to entries of the tera array registry
/// (`dense4`, `dense8`, `dense16`, `sparse8`, `null`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlockDataConfig {
    /// Encoding of the block id array.
    pub block_encoding: String,
    /// Encoding of the sunlight array.
    pub sunlight_encoding: String,
    /// Encoding of the block light array.
    pub light_encoding: String,
    /// Encoding of the liquid/extra array.
    pub extra_encoding: String,
    /// Re-encode completed chunks into the smallest lossless representation.
    pub deflation_enabled: bool,
    /// Log per-array size reductions after every deflation.
    pub deflation_logging_enabled: bool,
}

/// Chunk provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Worker threads handling review/produce requests.
    pub review_threads: usize,
    /// Worker threads running generation, lighting and deflation tasks.
    pub processing_threads: usize,
    /// Memory budget in megabytes. The near cache holds at most twice this many chunks.
    pub max_memory_mb: usize,
    /// How many chunk rings beyond an observed region are produced.
    pub prefetch_margin: i32,
    /// Time each worker pool gets to stop during shutdown.
    pub shutdown_timeout_ms: u64,
}

/// Chunk shape selection, mirrored by `ChunkType` in the voxel crate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChunkTypeName {
    Classic,
    Small,
    Tall,
    Stackable,
    Miniature,
}

/// Which first-pass generator fills new chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Flat terrain with a grass surface at `ground_level`.
    Flat,
    /// Layered test terrain by chunk height (stackable chunk types).
    Stackable,
}

/// World configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunk type of the world.
    pub chunk_type: ChunkTypeName,
    /// First-pass generator.
    pub generator: GeneratorKind,
    /// Surface height used by the flat generator.
    pub ground_level: i32,
    /// Place lanterns during the second generation pass.
    pub lanterns: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for BlockDataConfig {
    fn default() -> Self {
        Self {
            block_encoding: "dense8".to_string(),
            sunlight_encoding: "dense8".to_string(),
            light_encoding: "dense8".to_string(),
            extra_encoding: "dense8".to_string(),
            deflation_enabled: true,
            deflation_logging_enabled: false,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            review_threads: 4,
            processing_threads: 8,
            max_memory_mb: 1024,
            prefetch_margin: 4,
            shutdown_timeout_ms: 1000,
        }
    }
}

impl ProviderConfig {
    /// Maximum number of chunks kept in the near cache before eviction runs.
    pub fn cache_capacity(&self) -> usize {
        self.max_memory_mb.saturating_mul(2)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_type: ChunkTypeName::Classic,
            generator: GeneratorKind::Flat,
            ground_level: 64,
            lanterns: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Default directory for `config.ron` (`<platform config dir>/strata`).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
}

// --- Load / Save / Reload ---

const CONFIG_FILE: &str = "config.ron";

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let write_error = |source| ConfigError::Write {
            path: config_path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_error)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(write_error)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE))?;
        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Rejects values no world can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.prefetch_margin < 0 {
            return Err(ConfigError::Invalid {
                field: "provider.prefetch_margin",
                reason: format!("must not be negative, got {}", self.provider.prefetch_margin),
            });
        }
        if self.provider.review_threads == 0 || self.provider.processing_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "provider",
                reason: "both worker pools need at least one thread".to_string(),
            });
        }
        let is_stackable = matches!(self.world.chunk_type, ChunkTypeName::Stackable);
        if matches!(self.world.generator, GeneratorKind::Stackable) && !is_stackable {
            return Err(ConfigError::Invalid {
                field: "world.generator",
                reason: format!(
                    "the stackable generator needs stackable chunks, not {:?}",
                    self.world.chunk_type
                ),
            });
        }
        Ok(())
    }

    fn read(config_path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("block_encoding: \"dense8\""));
        assert!(ron_str.contains("deflation_enabled: true"));
        assert!(ron_str.contains("review_threads: 4"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(block_data: (deflation_enabled: false))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert!(!config.block_data.deflation_enabled);
        assert_eq!(config.block_data.block_encoding, "dense8");
        assert_eq!(config.provider, ProviderConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_cache_capacity_is_twice_memory_budget() {
        let provider = ProviderConfig {
            max_memory_mb: 300,
            ..ProviderConfig::default()
        };
        assert_eq!(provider.cache_capacity(), 600);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.world.chunk_type = ChunkTypeName::Stackable;
        config.world.generator = GeneratorKind::Stackable;
        config.provider.processing_threads = 2;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.block_data.deflation_logging_enabled = true;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.unwrap().block_data.deflation_logging_enabled);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.ron"));
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.provider.prefetch_margin = -1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "provider.prefetch_margin", .. })
        ));

        let mut config = Config::default();
        config.world.generator = GeneratorKind::Stackable;
        assert!(config.validate().is_err());
        config.world.chunk_type = ChunkTypeName::Stackable;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
