//! Engine adapters for wasm-bench.
//!
//! Each adapter wraps one execution engine behind
//! [`WasmEngine`](wasm_bench_core::WasmEngine):
//!
//! - [`WasmiEngine`]: the wasmi interpreter
//! - [`WasmtimeEngine`]: Wasmtime with Cranelift (optionally cached) or Winch
//! - [`TinywasmEngine`]: the tinywasm interpreter
//!
//! [`DefaultEngineFactory`] selects the adapter for a variant and owns the
//! [`CompilationCache`] used by the cached AOT variant.

pub mod cache;
pub mod factory;
pub mod tinywasm_backend;
pub mod wasmi_backend;
pub mod wasmtime_backend;

pub use cache::CompilationCache;
pub use factory::DefaultEngineFactory;
pub use tinywasm_backend::TinywasmEngine;
pub use wasmi_backend::WasmiEngine;
pub use wasmtime_backend::{Compiler, WasmtimeEngine};

use wasm_bench_common::BenchError;

/// Error for a `program` result that is not an integer.
pub(crate) fn unsupported_result(value: impl std::fmt::Display) -> BenchError {
    BenchError::call(format!(
        "unsupported result type: expected i32 or i64, got {value}"
    ))
}
