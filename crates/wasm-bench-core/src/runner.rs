//! Benchmark runner.
//!
//! [`BenchmarkRunner`] drives one [`WasmEngine`] through the fixed protocol:
//!
//! ```text
//! Created ─compile─▶ Compiled ─instantiate─▶ Instantiated ─lookup─▶ Ready
//!    ─first call─▶ WarmedUp ─N steady-state calls─▶ Completed
//! ```
//!
//! Any error moves the run to `Failed` and skips the remaining phases.
//! Compiled artifacts and instances are held by a guard that calls
//! [`WasmEngine::release`] exactly once, on success, on error and while
//! unwinding from a panic.

use std::hint::black_box;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use wasm_bench_common::{BenchError, EngineVariant, ErrorKind};

use crate::engine::{PROGRAM_EXPORT, WasmEngine};
use crate::timer::{Phase, PhaseTimer, PhaseTiming};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing acquired yet.
    Created,
    /// Module compiled.
    Compiled,
    /// Module instantiated.
    Instantiated,
    /// `program` export resolved.
    Ready,
    /// First call done.
    WarmedUp,
    /// Steady-state block done.
    Completed,
    /// A phase failed.
    Failed,
}

impl RunState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::{Compiled, Completed, Created, Failed, Instantiated, Ready, WarmedUp};

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Created, Compiled)
            | (Compiled, Instantiated)
            | (Instantiated, Ready)
            | (Ready, WarmedUp)
            | (WarmedUp, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Return value and error of one run.
///
/// An empty `error_message` means the run succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramReturn {
    /// Value returned by `program`, `0` on failure.
    pub return_value: i64,
    /// Error text, empty on success.
    pub error_message: String,
}

impl ProgramReturn {
    /// A successful result.
    pub fn success(return_value: i64) -> Self {
        Self {
            return_value,
            error_message: String::new(),
        }
    }

    /// A failed result carrying the error's message.
    pub fn failure(error: &BenchError) -> Self {
        Self {
            return_value: 0,
            error_message: error.to_string(),
        }
    }

    /// Returns `true` if the run succeeded.
    pub fn is_success(&self) -> bool {
        self.error_message.is_empty()
    }
}

/// Everything one run produced for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The variant that was run.
    pub variant: EngineVariant,
    /// Return value or error.
    pub program_return: ProgramReturn,
    /// Phase durations of the phases that completed.
    pub timing: PhaseTiming,
    /// Terminal state: `Completed` or `Failed`.
    pub state: RunState,
    /// State the run was in when it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_from: Option<RunState>,
    /// Kind of the error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl RunOutcome {
    /// An outcome for a run that failed before any phase was timed.
    pub fn from_error(variant: EngineVariant, error: &BenchError) -> Self {
        Self {
            variant,
            program_return: ProgramReturn::failure(error),
            timing: PhaseTiming::default(),
            state: RunState::Failed,
            failed_from: Some(RunState::Created),
            error_kind: Some(error.kind()),
        }
    }

    /// Returns `true` if the run completed.
    pub fn is_success(&self) -> bool {
        self.program_return.is_success()
    }
}

/// Drives engines through the benchmark protocol.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkRunner {
    iterations: NonZeroU32,
}

impl BenchmarkRunner {
    /// Create a runner performing `iteration_count` steady-state calls.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `iteration_count` is zero.
    pub fn new(iteration_count: u32) -> Result<Self, BenchError> {
        NonZeroU32::new(iteration_count)
            .map(|iterations| Self { iterations })
            .ok_or_else(|| BenchError::configuration("iteration_count must be at least 1"))
    }

    /// Number of steady-state calls. The first call is not included.
    pub fn iterations(&self) -> NonZeroU32 {
        self.iterations
    }

    /// Run the full protocol for `variant` on a fresh engine from `create`.
    ///
    /// Engine construction is not timed. The engine is dropped after its
    /// resources have been released.
    #[instrument(skip_all, fields(variant = %variant.name, backend = %variant.backend))]
    pub fn run<E, F>(&self, variant: &EngineVariant, module: &[u8], create: F) -> RunOutcome
    where
        E: WasmEngine,
        F: FnOnce() -> Result<E, BenchError>,
    {
        let mut timer = PhaseTimer::new();
        let mut state = RunState::Created;

        let result = create().and_then(|mut engine| {
            self.drive(&mut engine, module, &mut timer, &mut state)
        });

        let timing = timer.finish();
        match result {
            Ok(value) => {
                info!(
                    return_value = value,
                    first_call_ns = nanos(&timing, Phase::FirstCall),
                    per_iteration_ns = nanos(&timing, Phase::SteadyStatePerIteration),
                    "Run completed"
                );
                RunOutcome {
                    variant: variant.clone(),
                    program_return: ProgramReturn::success(value),
                    timing,
                    state,
                    failed_from: None,
                    error_kind: None,
                }
            }
            Err(error) => {
                warn!(failed_from = %state, error = %error, "Run failed");
                RunOutcome {
                    variant: variant.clone(),
                    program_return: ProgramReturn::failure(&error),
                    timing,
                    state: RunState::Failed,
                    failed_from: Some(state),
                    error_kind: Some(error.kind()),
                }
            }
        }
    }

    fn drive<E: WasmEngine>(
        &self,
        engine: &mut E,
        module: &[u8],
        timer: &mut PhaseTimer,
        state: &mut RunState,
    ) -> Result<i64, BenchError> {
        let mut resources = Resources::new(engine);

        let export = timer.measure(Phase::LoadToLookup, || {
            resources.compile(module)?;
            transition(state, RunState::Compiled);
            resources.instantiate()?;
            transition(state, RunState::Instantiated);
            let export = resources.lookup(PROGRAM_EXPORT)?;
            transition(state, RunState::Ready);
            Ok::<_, BenchError>(export)
        })?;

        let value = timer.measure(Phase::FirstCall, || resources.call(&export))?;
        transition(state, RunState::WarmedUp);

        let mut last = value;
        timer.measure_steady_state(self.iterations, || {
            for _ in 0..self.iterations.get() {
                last = black_box(resources.call(&export)?);
            }
            Ok::<_, BenchError>(())
        })?;
        transition(state, RunState::Completed);

        if last != value {
            warn!(
                first = value,
                last, "program returned different values across calls"
            );
        }

        resources.release();
        Ok(value)
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "State transition");
    *state = next;
}

fn nanos(timing: &PhaseTiming, phase: Phase) -> u128 {
    timing.get(phase).map_or(0, |d| d.as_nanos())
}

/// Owns the per-run engine resources and releases them exactly once.
struct Resources<'e, E: WasmEngine> {
    engine: &'e mut E,
    artifact: Option<E::Artifact>,
    instance: Option<E::Instance>,
    released: bool,
}

impl<'e, E: WasmEngine> Resources<'e, E> {
    fn new(engine: &'e mut E) -> Self {
        Self {
            engine,
            artifact: None,
            instance: None,
            released: false,
        }
    }

    fn compile(&mut self, module: &[u8]) -> Result<(), BenchError> {
        self.artifact = Some(self.engine.compile(module)?);
        Ok(())
    }

    fn instantiate(&mut self) -> Result<(), BenchError> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| BenchError::instantiation("module has not been compiled"))?;
        self.instance = Some(self.engine.instantiate(artifact)?);
        Ok(())
    }

    fn lookup(&mut self, name: &str) -> Result<E::Export, BenchError> {
        let instance = self
            .instance
            .as_mut()
            .ok_or_else(|| BenchError::export_not_found(name))?;
        self.engine.lookup_export(instance, name)
    }

    fn call(&mut self, export: &E::Export) -> Result<i64, BenchError> {
        let instance = self
            .instance
            .as_mut()
            .ok_or_else(|| BenchError::call("module has not been instantiated"))?;
        self.engine.call(instance, export)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.engine.release(self.instance.take(), self.artifact.take());
    }
}

impl<E: WasmEngine> Drop for Resources<'_, E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_rejects_zero_iterations() {
        let err = BenchmarkRunner::new(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert_eq!(BenchmarkRunner::new(1).unwrap().iterations().get(), 1);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(RunState::Created.can_transition_to(RunState::Compiled));
        assert!(RunState::WarmedUp.can_transition_to(RunState::Completed));
        assert!(RunState::Ready.can_transition_to(RunState::Failed));
        assert!(!RunState::Created.can_transition_to(RunState::Ready));
        assert!(!RunState::Completed.can_transition_to(RunState::Failed));
        assert!(!RunState::Failed.can_transition_to(RunState::Failed));
    }

    #[test]
    fn test_program_return_success_flag() {
        assert!(ProgramReturn::success(7).is_success());

        let failed = ProgramReturn::failure(&BenchError::export_not_found("program"));
        assert!(!failed.is_success());
        assert_eq!(failed.return_value, 0);
        assert_eq!(failed.error_message, "the program wasm function is not found");
    }
}
