//! Measurement protocol and runtime abstraction for wasm-bench.
//!
//! This crate is engine-agnostic. It provides:
//! - [`WasmEngine`]: The capability every backend adapter implements
//! - [`PhaseTimer`]: Monotonic timing of protocol phases
//! - [`BenchmarkRunner`]: The per-variant phase state machine
//! - [`Comparator`]: Runs all variants and checks return-value agreement
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Comparator                         │
//! │  (One pass over the configured variants, sequential)    │
//! └─────────────────────────────────────────────────────────┘
//!                            │  EngineFactory
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   BenchmarkRunner                       │
//! │  load → compile → instantiate → lookup                  │
//! │  → first call → N steady-state calls                    │
//! └─────────────────────────────────────────────────────────┘
//!                            │  WasmEngine
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Engine adapter                       │
//! │  (Fresh per run: artifact + instance, released on exit) │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compare;
pub mod engine;
pub mod module;
pub mod report;
pub mod runner;
pub mod timer;

pub use compare::{Comparator, ComparisonReport, EngineFactory, Verdict};
pub use engine::{PROGRAM_EXPORT, WasmEngine};
pub use module::ModuleSource;
pub use report::{render_json, render_text};
pub use runner::{BenchmarkRunner, ProgramReturn, RunOutcome, RunState};
pub use timer::{Phase, PhaseEntry, PhaseTimer, PhaseTiming};
