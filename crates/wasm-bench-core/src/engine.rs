//! The engine capability every backend adapter implements.
//!
//! [`WasmEngine`] hides the API shape of a concrete execution engine behind
//! four phase operations plus an explicit teardown. Adapters own all of their
//! engine-specific state; the runner only ever sees the associated types.

use wasm_bench_common::BenchError;

/// Name of the export every benchmarked module must provide.
pub const PROGRAM_EXPORT: &str = "program";

/// A WebAssembly execution engine wrapped behind the benchmark protocol.
///
/// # Contract
///
/// - `compile` must only touch state owned by `self`. Adapters are created
///   fresh for each run and never share an engine with another adapter.
/// - `instantiate` failures are reported as [`BenchError::Instantiation`],
///   never as compile failures.
/// - `lookup_export` resolves a zero-parameter function. A missing export,
///   a non-function export or a function with parameters is
///   [`BenchError::ExportNotFound`].
/// - `call` normalizes the engine's native results: the first result if
///   present, else `0`. Signed 32-bit results are sign-extended.
/// - `release` frees the instance before the artifact. The runner calls it
///   exactly once per run, on every exit path.
pub trait WasmEngine {
    /// Backend representation of a compiled module.
    type Artifact;

    /// A live instantiation, owning its store and linear memory.
    type Instance;

    /// A resolved callable export.
    type Export;

    /// Translate raw module bytes into the backend's compiled form.
    fn compile(&mut self, bytes: &[u8]) -> Result<Self::Artifact, BenchError>;

    /// Link and initialize a compiled module.
    fn instantiate(&mut self, artifact: &Self::Artifact) -> Result<Self::Instance, BenchError>;

    /// Resolve the exported function `name`.
    fn lookup_export(
        &mut self,
        instance: &mut Self::Instance,
        name: &str,
    ) -> Result<Self::Export, BenchError>;

    /// Invoke the export once.
    fn call(
        &mut self,
        instance: &mut Self::Instance,
        export: &Self::Export,
    ) -> Result<i64, BenchError>;

    /// Tear down whatever was acquired, instance first.
    ///
    /// The default drops both in reverse-acquisition order.
    fn release(&mut self, instance: Option<Self::Instance>, artifact: Option<Self::Artifact>) {
        drop(instance);
        drop(artifact);
    }
}
