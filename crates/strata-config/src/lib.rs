//! Configuration system for the Strata chunk world.
//!
//! Settings persist to disk as RON files, accept CLI overrides via clap, and
//! stay forward/backward compatible through `#[serde(default)]`.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BlockDataConfig, ChunkTypeName, Config, DebugConfig, GeneratorKind, ProviderConfig,
    WorldConfig, default_config_dir,
};
pub use error::ConfigError;
