//! Shared, read-mostly services every chunk needs.

use strata_config::BlockDataConfig;

use crate::block::BlockRegistry;
use crate::events::ChunkMonitor;
use crate::extensions::ExtensionRegistry;
use crate::tera::{DENSE8, TeraArrayEntry, TeraArrayRegistry, dense8_entry};

/// Registries, the chunk monitor and the resolved storage encodings.
///
/// Built once per world and shared as `Arc<ChunkContext>`.
#[derive(Debug)]
pub struct ChunkContext {
    pub blocks: BlockRegistry,
    pub arrays: TeraArrayRegistry,
    pub extensions: ExtensionRegistry,
    pub monitor: ChunkMonitor,
    pub(crate) block_encoding: TeraArrayEntry,
    pub(crate) sunlight_encoding: TeraArrayEntry,
    pub(crate) light_encoding: TeraArrayEntry,
    pub(crate) extra_encoding: TeraArrayEntry,
    pub deflation_enabled: bool,
    pub deflation_logging: bool,
}

impl ChunkContext {
    pub fn new(
        blocks: BlockRegistry,
        arrays: TeraArrayRegistry,
        extensions: ExtensionRegistry,
        config: &BlockDataConfig,
    ) -> Self {
        let block_encoding = resolve_encoding(&arrays, "block", &config.block_encoding);
        let sunlight_encoding = resolve_encoding(&arrays, "sunlight", &config.sunlight_encoding);
        let light_encoding = resolve_encoding(&arrays, "light", &config.light_encoding);
        let extra_encoding = resolve_encoding(&arrays, "extra", &config.extra_encoding);
        Self {
            blocks,
            arrays,
            extensions,
            monitor: ChunkMonitor::new(),
            block_encoding,
            sunlight_encoding,
            light_encoding,
            extra_encoding,
            deflation_enabled: config.deflation_enabled,
            deflation_logging: config.deflation_logging_enabled,
        }
    }

    /// Default blocks and encodings, no extensions.
    pub fn with_defaults() -> Self {
        Self::new(
            BlockRegistry::with_defaults(),
            TeraArrayRegistry::with_defaults(),
            ExtensionRegistry::new(),
            &BlockDataConfig::default(),
        )
    }

    /// Encoding ids used for new block, sunlight, light and extra arrays.
    pub fn encodings(&self) -> [&'static str; 4] {
        [
            self.block_encoding.id,
            self.sunlight_encoding.id,
            self.light_encoding.id,
            self.extra_encoding.id,
        ]
    }
}

fn resolve_encoding(arrays: &TeraArrayRegistry, array: &str, id: &str) -> TeraArrayEntry {
    if let Some(entry) = arrays.get(id) {
        return entry.clone();
    }
    tracing::warn!(array, encoding = id, "unknown encoding, falling back to {DENSE8}");
    arrays.get(DENSE8).cloned().unwrap_or_else(dense8_entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_encodings() {
        let config = BlockDataConfig {
            block_encoding: "dense16".to_string(),
            light_encoding: "sparse8".to_string(),
            ..BlockDataConfig::default()
        };
        let context = ChunkContext::new(
            BlockRegistry::with_defaults(),
            TeraArrayRegistry::with_defaults(),
            ExtensionRegistry::new(),
            &config,
        );
        assert_eq!(context.encodings(), ["dense16", "dense8", "sparse8", "dense8"]);
        assert!(context.deflation_enabled);
    }

    #[test]
    fn test_unknown_encoding_falls_back() {
        let config = BlockDataConfig {
            sunlight_encoding: "rle".to_string(),
            ..BlockDataConfig::default()
        };
        let context = ChunkContext::new(
            BlockRegistry::with_defaults(),
            TeraArrayRegistry::with_defaults(),
            ExtensionRegistry::new(),
            &config,
        );
        assert_eq!(context.encodings()[1], DENSE8);
    }
}
