//! wasmi interpreter adapter.

use tracing::{debug, instrument};
use wasmi::{Engine, Func, Instance, Linker, Module, Store, StoreLimits, StoreLimitsBuilder, Val};

use wasm_bench_common::{BenchError, EngineSettings};
use wasm_bench_core::WasmEngine;

/// The wasmi interpreter behind the benchmark protocol.
pub struct WasmiEngine {
    engine: Engine,
    settings: EngineSettings,
}

/// A live wasmi instance with its store.
pub struct WasmiInstance {
    store: Store<StoreLimits>,
    instance: Instance,
    results: Vec<Val>,
}

impl WasmiEngine {
    /// Create a fresh interpreter engine.
    pub fn new(settings: &EngineSettings) -> Result<Self, BenchError> {
        Ok(Self {
            engine: Engine::default(),
            settings: settings.clone(),
        })
    }
}

impl WasmEngine for WasmiEngine {
    type Artifact = Module;
    type Instance = WasmiInstance;
    type Export = Func;

    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    fn compile(&mut self, bytes: &[u8]) -> Result<Module, BenchError> {
        Module::new(&self.engine, bytes).map_err(|e| BenchError::compile(e.to_string()))
    }

    #[instrument(skip_all)]
    fn instantiate(&mut self, module: &Module) -> Result<WasmiInstance, BenchError> {
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.settings.memory_limit_bytes())
            .build();
        let mut store = Store::new(&self.engine, limits);
        store.limiter(|limits| limits);

        let linker = <Linker<StoreLimits>>::new(&self.engine);
        let instance = linker
            .instantiate(&mut store, module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| BenchError::instantiation(e.to_string()))?;

        debug!("wasmi module instantiated");
        Ok(WasmiInstance {
            store,
            instance,
            results: Vec::new(),
        })
    }

    fn lookup_export(
        &mut self,
        instance: &mut WasmiInstance,
        name: &str,
    ) -> Result<Func, BenchError> {
        let func = instance
            .instance
            .get_func(&instance.store, name)
            .ok_or_else(|| BenchError::export_not_found(name))?;

        let ty = func.ty(&instance.store);
        if !ty.params().is_empty() {
            return Err(BenchError::export_not_found(name));
        }

        instance.results = ty.results().iter().copied().map(Val::default).collect();
        Ok(func)
    }

    fn call(&mut self, instance: &mut WasmiInstance, func: &Func) -> Result<i64, BenchError> {
        func.call(&mut instance.store, &[], &mut instance.results)
            .map_err(|e| BenchError::call(e.to_string()))?;

        match instance.results.first() {
            None => Ok(0),
            Some(Val::I32(v)) => Ok(i64::from(*v)),
            Some(Val::I64(v)) => Ok(*v),
            Some(other) => Err(crate::unsupported_result(format!("{other:?}"))),
        }
    }
}

impl std::fmt::Debug for WasmiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmiEngine")
            .field("memory_limit_pages", &self.settings.memory_limit_pages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(memory_limit_pages: u32) -> WasmiEngine {
        WasmiEngine::new(&EngineSettings {
            memory_limit_pages,
            cache_dir: None,
        })
        .unwrap()
    }

    #[test]
    fn test_call_through_protocol() {
        let bytes = wat::parse_str(
            r#"(module (func (export "program") (result i64) i64.const 42))"#,
        )
        .unwrap();

        let mut engine = engine(62);
        let module = engine.compile(&bytes).unwrap();
        let mut instance = engine.instantiate(&module).unwrap();
        let func = engine.lookup_export(&mut instance, "program").unwrap();

        assert_eq!(engine.call(&mut instance, &func).unwrap(), 42);
        assert_eq!(engine.call(&mut instance, &func).unwrap(), 42);
    }

    #[test]
    fn test_non_function_export_is_not_found() {
        let bytes = wat::parse_str(r#"(module (memory (export "program") 1))"#).unwrap();

        let mut engine = engine(62);
        let module = engine.compile(&bytes).unwrap();
        let mut instance = engine.instantiate(&module).unwrap();

        let err = engine.lookup_export(&mut instance, "program").unwrap_err();
        assert!(err.is_export_not_found());
    }

    #[test]
    fn test_memory_limit_applies_to_declared_minimum() {
        let bytes = wat::parse_str("(module (memory 2))").unwrap();

        let mut engine = engine(1);
        let module = engine.compile(&bytes).unwrap();
        let Err(err) = engine.instantiate(&module) else {
            panic!("instantiation should exceed the page limit");
        };
        assert!(err.to_string().starts_with("Instantiation failed"));
    }
}
