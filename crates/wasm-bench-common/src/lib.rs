//! Common types, errors, and configuration for wasm-bench.
//!
//! This crate provides shared functionality used across the wasm-bench workspace:
//! - Error taxonomy using `thiserror`, one variant per benchmark phase
//! - Configuration structures and TOML config-file loading
//! - Engine variant descriptions shared by the runner and the adapters

pub mod config;
pub mod config_file;
pub mod error;
pub mod variant;

pub use config::{BenchConfig, EngineConfig, VariantConfig};
pub use config_file::{ConfigFile, ConfigFileError, ReportConfig, ReportFormat};
pub use error::{BenchError, ErrorKind};
pub use variant::{BackendKind, EngineSettings, EngineVariant};
