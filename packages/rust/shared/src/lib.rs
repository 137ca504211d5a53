//! Shared types, error model, and configuration for docs-cloner.
//!
//! This crate is the foundation depended on by all other docs-cloner crates.
//! It provides:
//! - [`DocsClonerError`] — the unified error type
//! - [`RunConfig`] — the immutable per-run configuration, plus file config loading
//! - [`PageFetcher`] — the fetch capability consumed by the resolver and workers
//! - [`PageOutcome`] — the per-page record handed from workers to the collector

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConvertMode, DEFAULT_MD_PATTERN, DEFAULT_USER_AGENT, DefaultsConfig,
    FiltersConfig, RunConfig, RunOverrides, config_dir, config_file_path, load_config,
    load_config_from,
};
pub use error::{DocsClonerError, Result};
pub use types::{PageFetcher, PageOutcome};
