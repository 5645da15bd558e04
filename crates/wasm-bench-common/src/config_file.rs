//! Configuration file structures for wasm-bench.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ReportConfig`]: How the comparison report is rendered

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BenchConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [bench]
/// iteration_count = 10_000
///
/// [bench.engine]
/// memory_limit_pages = 62
/// cache_dir = "./cache"
///
/// [[bench.variants]]
/// backend = "interpreter"
///
/// [[bench.variants]]
/// name = "cranelift"
/// backend = "aot-cached"
///
/// [report]
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Benchmark configuration.
    #[serde(default)]
    pub bench: BenchConfig,

    /// Report rendering options.
    #[serde(default)]
    pub report: ReportConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Report rendering options.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Output format of the final report.
    #[serde(default)]
    pub format: ReportFormat,
}

/// Output format of the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable sections.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
