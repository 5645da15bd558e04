//! Default engine factory.
//!
//! Maps each [`BackendKind`] to a freshly constructed adapter. The factory
//! owns the compilation cache, so cached artifacts survive across variants
//! and repeated comparisons within one process.

use std::sync::Arc;

use tracing::debug;

use wasm_bench_common::{BackendKind, BenchError, EngineConfig, EngineVariant};
use wasm_bench_core::{BenchmarkRunner, EngineFactory, ModuleSource, RunOutcome};

use crate::cache::CompilationCache;
use crate::tinywasm_backend::TinywasmEngine;
use crate::wasmi_backend::WasmiEngine;
use crate::wasmtime_backend::{Compiler, WasmtimeEngine};

/// Builds the real engine adapters.
#[derive(Debug)]
pub struct DefaultEngineFactory {
    cache: Arc<CompilationCache>,
}

impl DefaultEngineFactory {
    /// Create a factory around an existing cache.
    pub fn new(cache: CompilationCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Create a factory from engine configuration.
    ///
    /// # Errors
    ///
    /// Fails if a cache directory is configured but unusable. This must abort
    /// the comparison before any variant runs.
    pub fn from_config(config: &EngineConfig) -> Result<Self, BenchError> {
        CompilationCache::from_dir(config.cache_dir.as_deref()).map(Self::new)
    }

    /// The shared compilation cache.
    pub fn cache(&self) -> &CompilationCache {
        &self.cache
    }
}

impl EngineFactory for DefaultEngineFactory {
    fn run_variant(
        &self,
        runner: &BenchmarkRunner,
        variant: &EngineVariant,
        module: &ModuleSource,
    ) -> RunOutcome {
        let settings = &variant.settings;
        let bytes = module.bytes();
        debug!(variant = %variant.name, backend = %variant.backend, "Constructing engine");

        match variant.backend {
            BackendKind::Interpreter => runner.run(variant, bytes, || WasmiEngine::new(settings)),
            BackendKind::Aot => runner.run(variant, bytes, || {
                WasmtimeEngine::new(Compiler::Cranelift, settings, None)
            }),
            BackendKind::AotCached => runner.run(variant, bytes, || {
                WasmtimeEngine::new(
                    Compiler::Cranelift,
                    settings,
                    Some(Arc::clone(&self.cache)),
                )
            }),
            BackendKind::Tinywasm => runner.run(variant, bytes, || TinywasmEngine::new(settings)),
            BackendKind::Winch => runner.run(variant, bytes, || {
                WasmtimeEngine::new(Compiler::Winch, settings, None)
            }),
        }
    }
}
