//! Configuration structures for wasm-bench.
//!
//! This module defines configuration options for a benchmark invocation:
//! - [`BenchConfig`]: Top-level configuration (iteration count, engines, variants)
//! - [`EngineConfig`]: Settings shared by every engine (memory cap, cache directory)
//! - [`VariantConfig`]: One configured benchmarking target

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{BackendKind, BenchError, EngineSettings, EngineVariant};

/// Top-level benchmark configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchConfig {
    /// Number of steady-state calls after the first (cold) call.
    #[serde(default = "defaults::iteration_count")]
    pub iteration_count: u32,

    /// Engine settings applied to every variant unless overridden.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Variants to benchmark, in run order.
    #[serde(default = "defaults::variants")]
    pub variants: Vec<VariantConfig>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iteration_count: defaults::iteration_count(),
            engine: EngineConfig::default(),
            variants: defaults::variants(),
        }
    }
}

/// Settings shared by all engines.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum linear memory per instance, in 64 KiB pages.
    #[serde(default = "defaults::memory_limit_pages")]
    pub memory_limit_pages: u32,

    /// Directory for persisted compilation artifacts.
    ///
    /// When absent, cached variants use an in-memory cache that lives
    /// for the duration of the process.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit_pages: defaults::memory_limit_pages(),
            cache_dir: None,
        }
    }
}

/// A single configured variant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VariantConfig {
    /// Display label. Defaults to the backend's label.
    #[serde(default)]
    pub name: Option<String>,

    /// Backend to run.
    pub backend: BackendKind,

    /// Per-variant override of [`EngineConfig::memory_limit_pages`].
    #[serde(default)]
    pub memory_limit_pages: Option<u32>,
}

impl VariantConfig {
    /// A variant with default label and settings.
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            name: None,
            backend,
            memory_limit_pages: None,
        }
    }
}

impl BenchConfig {
    /// Check the configuration for values that make a comparison meaningless.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.iteration_count == 0 {
            return Err(BenchError::configuration(
                "iteration_count must be at least 1",
            ));
        }

        if self.variants.is_empty() {
            return Err(BenchError::configuration("no engine variants configured"));
        }

        let mut seen = HashSet::new();
        for variant in self.resolve() {
            if variant.settings.memory_limit_pages == 0 {
                return Err(BenchError::configuration(format!(
                    "memory_limit_pages must be at least 1 (variant '{}')",
                    variant.name
                )));
            }
            if !seen.insert(variant.name.clone()) {
                return Err(BenchError::configuration(format!(
                    "duplicate variant name '{}'",
                    variant.name
                )));
            }
        }

        Ok(())
    }

    /// Validate and resolve the configured variants.
    pub fn variants(&self) -> Result<Vec<EngineVariant>, BenchError> {
        self.validate()?;
        Ok(self.resolve())
    }

    /// Keep only variants whose backend is listed.
    ///
    /// Backends that are listed but not configured are added with defaults.
    pub fn restrict_to(&mut self, backends: &[BackendKind]) {
        self.variants.retain(|v| backends.contains(&v.backend));
        for backend in backends {
            if !self.variants.iter().any(|v| v.backend == *backend) {
                self.variants.push(VariantConfig::for_backend(*backend));
            }
        }
    }

    fn resolve(&self) -> Vec<EngineVariant> {
        self.variants
            .iter()
            .map(|v| {
                let name = v
                    .name
                    .clone()
                    .unwrap_or_else(|| v.backend.default_label().to_string());
                let settings = EngineSettings {
                    memory_limit_pages: v
                        .memory_limit_pages
                        .unwrap_or(self.engine.memory_limit_pages),
                    cache_dir: self.engine.cache_dir.clone(),
                };
                EngineVariant::new(name, v.backend, settings)
            })
            .collect()
    }
}

/// Default value functions for serde.
mod defaults {
    use super::VariantConfig;
    use crate::BackendKind;

    pub const fn iteration_count() -> u32 {
        10_000
    }

    pub const fn memory_limit_pages() -> u32 {
        62
    }

    pub fn variants() -> Vec<VariantConfig> {
        BackendKind::ALL
            .into_iter()
            .map(VariantConfig::for_backend)
            .collect()
    }
}
