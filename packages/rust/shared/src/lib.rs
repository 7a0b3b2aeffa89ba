//! Shared types, error model, and configuration for arxivflat.
//!
//! This crate is the foundation depended on by all other arxivflat crates.
//! It provides:
//! - [`ArxivFlatError`] and [`ErrorKind`], the unified error model
//! - Domain types ([`SubmissionId`], [`SourceBundle`], [`CacheManifest`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod identifier;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssemblyConfig, AssemblySection, CacheSection, FetchConfig, FetchSection,
    cache_dir, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ArxivFlatError, ErrorKind, Result};
pub use identifier::SubmissionId;
pub use types::{CURRENT_SCHEMA_VERSION, CacheManifest, SourceBundle, is_contained, normalize_relative};
