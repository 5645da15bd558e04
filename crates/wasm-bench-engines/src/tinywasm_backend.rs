//! tinywasm adapter.
//!
//! tinywasm has no resource limiter, so the configured page limit is not
//! enforced for this backend. Instantiation consumes a module by value; the
//! clone it needs is part of the measured instantiate cost.
//!
//! Modules are parsed into [`TinyWasmModule`] so the adapter can see the start
//! section and export signatures. `ModuleInstance::start` also runs an exported
//! `_start` when no start section exists, which other engines do not do, so it
//! is only invoked for modules that declare one.

use std::collections::HashMap;
use std::sync::Arc;

use tinywasm::parser::Parser;
use tinywasm::types::{ExternalKind, ImportKind, TinyWasmModule, WasmValue};
use tinywasm::{FuncHandle, Module, ModuleInstance, Store};
use tracing::{debug, instrument, warn};

use wasm_bench_common::{BenchError, EngineSettings};
use wasm_bench_core::WasmEngine;

/// tinywasm behind the benchmark protocol.
#[derive(Debug)]
pub struct TinywasmEngine {
    settings: EngineSettings,
}

/// A parsed module plus the parameter count of each exported function.
pub struct TinywasmArtifact {
    module: TinyWasmModule,
    export_params: Arc<HashMap<Box<str>, usize>>,
}

/// A live tinywasm instance with its store.
pub struct TinywasmInstance {
    store: Store,
    instance: ModuleInstance,
    export_params: Arc<HashMap<Box<str>, usize>>,
}

impl TinywasmEngine {
    /// Create a fresh engine.
    pub fn new(settings: &EngineSettings) -> Result<Self, BenchError> {
        debug!(
            memory_limit_pages = settings.memory_limit_pages,
            "tinywasm does not enforce memory limits"
        );
        Ok(Self {
            settings: settings.clone(),
        })
    }

    /// Settings this engine was created with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

impl WasmEngine for TinywasmEngine {
    type Artifact = TinywasmArtifact;
    type Instance = TinywasmInstance;
    type Export = FuncHandle;

    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    fn compile(&mut self, bytes: &[u8]) -> Result<TinywasmArtifact, BenchError> {
        let module = Parser::new()
            .parse_module_bytes(bytes)
            .map_err(|e| BenchError::compile(e.to_string()))?;

        Ok(TinywasmArtifact {
            export_params: Arc::new(export_params(&module)),
            module,
        })
    }

    #[instrument(skip_all)]
    fn instantiate(&mut self, artifact: &TinywasmArtifact) -> Result<TinywasmInstance, BenchError> {
        let mut store = Store::default();
        let instance = ModuleInstance::instantiate(&mut store, Module::from(&artifact.module), None)
            .map_err(|e| BenchError::instantiation(e.to_string()))?;

        if artifact.module.start_func.is_some() {
            instance
                .start(&mut store)
                .map_err(|e| BenchError::instantiation(format!("start function failed: {e}")))?;
        }

        Ok(TinywasmInstance {
            store,
            instance,
            export_params: Arc::clone(&artifact.export_params),
        })
    }

    fn lookup_export(
        &mut self,
        instance: &mut TinywasmInstance,
        name: &str,
    ) -> Result<FuncHandle, BenchError> {
        if instance.export_params.get(name).is_some_and(|params| *params > 0) {
            return Err(BenchError::export_not_found(name));
        }

        instance
            .instance
            .exported_func_untyped(&instance.store, name)
            .map_err(|e| {
                warn!(error = %e, "tinywasm export lookup failed");
                BenchError::export_not_found(name)
            })
    }

    fn call(&mut self, instance: &mut TinywasmInstance, func: &FuncHandle) -> Result<i64, BenchError> {
        let results = func
            .call(&mut instance.store, &[])
            .map_err(|e| BenchError::call(e.to_string()))?;

        match results.first() {
            None => Ok(0),
            Some(WasmValue::I32(v)) => Ok(i64::from(*v)),
            Some(WasmValue::I64(v)) => Ok(*v),
            Some(other) => Err(crate::unsupported_result(format!("{other:?}"))),
        }
    }
}

/// Parameter count of every exported function, by export name.
///
/// Function indices cover imported functions first, then local ones.
fn export_params(module: &TinyWasmModule) -> HashMap<Box<str>, usize> {
    let imported = module.imports.iter().filter_map(|import| match import.kind {
        ImportKind::Function(ty) => Some(
            module
                .func_types
                .get(ty as usize)
                .map_or(0, |ty| ty.params.len()),
        ),
        _ => None,
    });
    let params: Vec<usize> = imported
        .chain(module.funcs.iter().map(|func| func.ty.params.len()))
        .collect();

    module
        .exports
        .iter()
        .filter(|export| export.kind == ExternalKind::Func)
        .filter_map(|export| {
            params
                .get(export.index as usize)
                .map(|count| (export.name.clone(), *count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TinywasmEngine {
        TinywasmEngine::new(&EngineSettings {
            memory_limit_pages: 62,
            cache_dir: None,
        })
        .unwrap()
    }

    #[test]
    fn test_call_through_protocol() {
        let bytes = wat::parse_str(
            r#"(module (func (export "program") (result i32) i32.const -5))"#,
        )
        .unwrap();

        let mut engine = engine();
        assert_eq!(engine.settings().memory_limit_pages, 62);

        let module = engine.compile(&bytes).unwrap();
        let mut instance = engine.instantiate(&module).unwrap();
        let func = engine.lookup_export(&mut instance, "program").unwrap();

        assert_eq!(engine.call(&mut instance, &func).unwrap(), -5);
    }

    #[test]
    fn test_export_params_account_for_imports() {
        let bytes = wat::parse_str(
            r#"
            (module
                (import "env" "f" (func (param i32 i32)))
                (func (export "program") (result i32) i32.const 1)
                (func (export "add") (param i32) (result i32) local.get 0)
                (export "imported" (func 0)))
            "#,
        )
        .unwrap();

        let artifact = engine().compile(&bytes).unwrap();
        let params = &artifact.export_params;

        assert_eq!(params.get("program"), Some(&0));
        assert_eq!(params.get("add"), Some(&1));
        assert_eq!(params.get("imported"), Some(&2));
    }

    #[test]
    fn test_exported_start_symbol_is_not_run() {
        // Only a start section runs at instantiation.
        let bytes = wat::parse_str(
            r#"
            (module
                (func (export "_start") unreachable)
                (func (export "program") (result i32) i32.const 3))
            "#,
        )
        .unwrap();

        let mut engine = engine();
        let module = engine.compile(&bytes).unwrap();
        let mut instance = engine.instantiate(&module).unwrap();
        let func = engine.lookup_export(&mut instance, "program").unwrap();

        assert_eq!(engine.call(&mut instance, &func).unwrap(), 3);
    }
}
