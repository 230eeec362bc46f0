//! Shared types, error model, and configuration for c2md.
//!
//! This crate is the foundation depended on by all other c2md crates.
//! It provides:
//! - [`C2mdError`], the unified error type
//! - Domain types ([`Record`], [`RunManifest`], [`ManifestFile`])
//! - Configuration ([`AppConfig`], [`ConvertOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConvertOptions, IndexConfig, NamingConfig, OutputConfig, config_dir,
    config_file_path, load_config, load_config_from,
};
pub use error::{C2mdError, Result};
pub use types::{CURRENT_SCHEMA_VERSION, ManifestFile, Record, RunManifest};
