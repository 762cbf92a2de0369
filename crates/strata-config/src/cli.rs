//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;
use crate::config::{ChunkTypeName, GeneratorKind};

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "strata", about = "Strata chunk world")]
pub struct CliArgs {
    /// Chunk type (classic, small, tall, stackable, miniature).
    #[arg(long, value_parser = parse_chunk_type)]
    pub chunk_type: Option<ChunkTypeName>,

    /// First-pass generator (flat, stackable).
    #[arg(long, value_parser = parse_generator)]
    pub generator: Option<GeneratorKind>,

    /// Processing worker threads.
    #[arg(long)]
    pub processing_threads: Option<usize>,

    /// Memory budget in megabytes.
    #[arg(long)]
    pub max_memory_mb: Option<usize>,

    /// Disable chunk deflation.
    #[arg(long)]
    pub no_deflation: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_chunk_type(value: &str) -> Result<ChunkTypeName, String> {
    match value.to_ascii_lowercase().as_str() {
        "classic" => Ok(ChunkTypeName::Classic),
        "small" => Ok(ChunkTypeName::Small),
        "tall" => Ok(ChunkTypeName::Tall),
        "stackable" => Ok(ChunkTypeName::Stackable),
        "miniature" => Ok(ChunkTypeName::Miniature),
        other => Err(format!("unknown chunk type: {other}")),
    }
}

fn parse_generator(value: &str) -> Result<GeneratorKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "flat" => Ok(GeneratorKind::Flat),
        "stackable" => Ok(GeneratorKind::Stackable),
        other => Err(format!("unknown generator: {other}")),
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(chunk_type) = args.chunk_type {
            self.world.chunk_type = chunk_type;
        }
        if let Some(generator) = args.generator {
            self.world.generator = generator;
        }
        if let Some(threads) = args.processing_threads {
            self.provider.processing_threads = threads;
        }
        if let Some(mb) = args.max_memory_mb {
            self.provider.max_memory_mb = mb;
        }
        if args.no_deflation {
            self.block_data.deflation_enabled = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            chunk_type: None,
            generator: None,
            processing_threads: None,
            max_memory_mb: None,
            no_deflation: false,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            chunk_type: Some(ChunkTypeName::Stackable),
            no_deflation: true,
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.world.chunk_type, ChunkTypeName::Stackable);
        assert!(!config.block_data.deflation_enabled);
        // Non-overridden fields retain defaults
        assert_eq!(config.provider.processing_threads, 8);
        assert_eq!(config.world.generator, GeneratorKind::Flat);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = CliArgs::parse_from([
            "strata",
            "--chunk-type",
            "Stackable",
            "--generator",
            "stackable",
            "--max-memory-mb",
            "64",
        ]);
        assert_eq!(args.chunk_type, Some(ChunkTypeName::Stackable));
        assert_eq!(args.generator, Some(GeneratorKind::Stackable));
        assert_eq!(args.max_memory_mb, Some(64));
    }

    #[test]
    fn test_unknown_chunk_type_rejected() {
        let result = CliArgs::try_parse_from(["strata", "--chunk-type", "huge"]);
        assert!(result.is_err());
    }
}
