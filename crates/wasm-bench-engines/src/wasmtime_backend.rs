//! Wasmtime adapter.
//!
//! One adapter covers three variants:
//! - **Cranelift, no cache**: every run compiles from bytes
//! - **Cranelift, cached**: artifacts are reused through [`CompilationCache`]
//! - **Winch**: Wasmtime's single-pass baseline compiler
//!
//! Each adapter owns its own [`Engine`]; stores are created per instance and
//! capped with [`StoreLimits`].

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};
use wasmtime::{
    Config, Engine, Func, Instance, Linker, Module, OptLevel, Store, StoreLimits,
    StoreLimitsBuilder, Strategy, Val,
};

use wasm_bench_common::{BenchError, EngineSettings};
use wasm_bench_core::WasmEngine;

use crate::cache::CompilationCache;

/// Code generator used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compiler {
    /// Optimizing compiler.
    Cranelift,
    /// Baseline compiler.
    Winch,
}

/// Wasmtime engine behind the benchmark protocol.
pub struct WasmtimeEngine {
    engine: Engine,
    compiler: Compiler,
    settings: EngineSettings,
    cache: Option<Arc<CompilationCache>>,
}

/// A live instance with its store.
pub struct WasmtimeInstance {
    store: Store<StoreLimits>,
    instance: Instance,
    results: Vec<Val>,
}

/// The resolved `program` function.
#[derive(Debug, Clone, Copy)]
pub struct WasmtimeExport {
    func: Func,
}

impl WasmtimeEngine {
    /// Create a fresh engine.
    ///
    /// # Errors
    ///
    /// Returns a compile error if Wasmtime rejects the configuration, for
    /// example when Winch is unavailable on the host architecture.
    pub fn new(
        compiler: Compiler,
        settings: &EngineSettings,
        cache: Option<Arc<CompilationCache>>,
    ) -> Result<Self, BenchError> {
        let mut config = Config::new();

        match compiler {
            Compiler::Cranelift => {
                config.strategy(Strategy::Cranelift);
                config.cranelift_opt_level(OptLevel::Speed);
            }
            Compiler::Winch => {
                config.strategy(Strategy::Winch);
            }
        }

        let engine = Engine::new(&config).map_err(|e| {
            BenchError::compile(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        debug!(?compiler, cached = cache.is_some(), "Wasmtime engine initialized");

        Ok(Self {
            engine,
            compiler,
            settings: settings.clone(),
            cache,
        })
    }

    /// The code generator in use.
    pub fn compiler(&self) -> Compiler {
        self.compiler
    }

    /// Cache key: module content plus engine compatibility.
    fn cache_key(&self, bytes: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        self.engine.precompile_compatibility_hash().hash(&mut hasher);
        format!("{}-{:016x}", sha256::digest(bytes), hasher.finish())
    }

    fn compile_fresh(&self, bytes: &[u8]) -> Result<Module, BenchError> {
        Module::new(&self.engine, bytes)
            .map_err(|e| BenchError::compile(format!("Core module compilation failed: {e:#}")))
    }

    #[allow(unsafe_code)]
    fn deserialize(&self, artifact: &[u8]) -> Result<Module, BenchError> {
        // SAFETY: cache entries are written only by `Module::serialize` in this
        // adapter and are keyed by the engine's compatibility hash.
        unsafe { Module::deserialize(&self.engine, artifact) }.map_err(|e| {
            BenchError::compile(format!("Failed to load cached artifact: {e:#}"))
        })
    }

    fn compile_cached(&self, cache: &CompilationCache, bytes: &[u8]) -> Result<Module, BenchError> {
        let key = self.cache_key(bytes);

        if let Some(artifact) = cache.get(&key) {
            match self.deserialize(&artifact) {
                Ok(module) => {
                    cache.record_hit();
                    debug!(key = %key, "Compilation cache hit");
                    return Ok(module);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding unusable cached artifact");
                    cache.remove(&key);
                }
            }
        }

        cache.record_miss();
        let module = self.compile_fresh(bytes)?;

        match module.serialize() {
            Ok(artifact) => {
                if let Err(e) = cache.insert(&key, &artifact) {
                    warn!(key = %key, error = %e, "Failed to store compiled artifact");
                }
            }
            Err(e) => warn!(error = %e, "Module serialization failed"),
        }

        debug!(key = %key, "Compilation cache miss");
        Ok(module)
    }
}

impl WasmEngine for WasmtimeEngine {
    type Artifact = Module;
    type Instance = WasmtimeInstance;
    type Export = WasmtimeExport;

    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len(), compiler = ?self.compiler))]
    fn compile(&mut self, bytes: &[u8]) -> Result<Module, BenchError> {
        let start = Instant::now();

        let module = match self.cache.as_deref() {
            Some(cache) => self.compile_cached(cache, bytes)?,
            None => self.compile_fresh(bytes)?,
        };

        debug!(duration_us = start.elapsed().as_micros(), "Module ready");
        Ok(module)
    }

    #[instrument(skip_all)]
    fn instantiate(&mut self, module: &Module) -> Result<WasmtimeInstance, BenchError> {
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.settings.memory_limit_bytes())
            .build();
        let mut store = Store::new(&self.engine, limits);
        store.limiter(|limits| limits);

        let linker = Linker::new(&self.engine);
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| BenchError::instantiation(format!("{e:#}")))?;

        Ok(WasmtimeInstance {
            store,
            instance,
            results: Vec::new(),
        })
    }

    fn lookup_export(
        &mut self,
        instance: &mut WasmtimeInstance,
        name: &str,
    ) -> Result<WasmtimeExport, BenchError> {
        let func = instance
            .instance
            .get_func(&mut instance.store, name)
            .ok_or_else(|| BenchError::export_not_found(name))?;

        let ty = func.ty(&instance.store);
        if ty.params().next().is_some() {
            return Err(BenchError::export_not_found(name));
        }

        instance.results = vec![Val::I64(0); ty.results().len()];
        Ok(WasmtimeExport { func })
    }

    fn call(
        &mut self,
        instance: &mut WasmtimeInstance,
        export: &WasmtimeExport,
    ) -> Result<i64, BenchError> {
        export
            .func
            .call(&mut instance.store, &[], &mut instance.results)
            .map_err(|e| BenchError::call(format!("{e:#}")))?;

        match instance.results.first() {
            None => Ok(0),
            Some(Val::I32(v)) => Ok(i64::from(*v)),
            Some(Val::I64(v)) => Ok(*v),
            Some(other) => Err(crate::unsupported_result(format!("{other:?}"))),
        }
    }

    fn release(&mut self, instance: Option<WasmtimeInstance>, module: Option<Module>) {
        drop(instance);
        drop(module);
        debug!(compiler = ?self.compiler, "Wasmtime resources released");
    }
}

impl std::fmt::Debug for WasmtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmtimeEngine")
            .field("compiler", &self.compiler)
            .field("memory_limit_pages", &self.settings.memory_limit_pages)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EngineSettings {
        EngineSettings {
            memory_limit_pages: 62,
            cache_dir: None,
        }
    }

    #[test]
    fn test_engine_creation() {
        let engine = WasmtimeEngine::new(Compiler::Cranelift, &settings(), None).unwrap();
        assert_eq!(engine.compiler(), Compiler::Cranelift);

        let debug_str = format!("{engine:?}");
        assert!(debug_str.contains("WasmtimeEngine"));
        assert!(debug_str.contains("Cranelift"));
    }

    #[test]
    fn test_cache_key_depends_on_content() {
        let engine = WasmtimeEngine::new(Compiler::Cranelift, &settings(), None).unwrap();

        let a = engine.cache_key(b"\0asm\x01\0\0\0");
        let b = engine.cache_key(b"\0asm\x01\0\0\0");
        let c = engine.cache_key(b"\0asm\x01\0\0\x01");

        assert_eq!(a, b);
        assert_ne!(a, c);
        // sha256 hex, dash, 64-bit hex
        assert_eq!(a.len(), 64 + 1 + 16);
    }

    #[test]
    fn test_compile_rejects_garbage() {
        let mut engine = WasmtimeEngine::new(Compiler::Cranelift, &settings(), None).unwrap();
        let err = engine.compile(b"not wasm").unwrap_err();
        assert!(err.to_string().starts_with("Compilation failed"));
    }
}
