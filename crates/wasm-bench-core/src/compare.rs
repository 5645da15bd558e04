//! Cross-engine comparison.
//!
//! The [`Comparator`] runs every configured variant one after another through
//! an [`EngineFactory`], then folds the outcomes into a [`ComparisonReport`].
//! Variants never run concurrently and share no mutable state; a failure or
//! panic in one variant is recorded against that variant only.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use wasm_bench_common::{BenchError, EngineVariant};

use crate::module::ModuleSource;
use crate::runner::{BenchmarkRunner, RunOutcome};

/// Runs one variant on a freshly constructed engine adapter.
pub trait EngineFactory {
    /// Run the full protocol for `variant`.
    fn run_variant(
        &self,
        runner: &BenchmarkRunner,
        variant: &EngineVariant,
        module: &ModuleSource,
    ) -> RunOutcome;
}

/// Overall result of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every variant succeeded and returned the same value.
    Agreement,
    /// At least one variant failed.
    Failures,
    /// Every variant succeeded but the values differ.
    Divergence,
}

impl Verdict {
    /// Process exit code for this verdict.
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Agreement => 0,
            Verdict::Failures => 1,
            Verdict::Divergence => 2,
        }
    }
}

/// Aggregated results of one harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Identifier of this invocation, for correlating logs.
    pub run_id: Uuid,
    /// SHA-256 of the module bytes.
    pub module_hash: String,
    /// Module size in bytes.
    pub module_size: usize,
    /// Steady-state calls per variant.
    pub iteration_count: u32,
    /// One outcome per variant, in run order.
    pub results: Vec<RunOutcome>,
    /// Every variant succeeded.
    pub all_succeeded: bool,
    /// Every variant succeeded and all return values are equal.
    pub values_agree: bool,
}

impl ComparisonReport {
    /// Build a report, deriving the agreement flags from `results`.
    pub fn new(
        run_id: Uuid,
        module: &ModuleSource,
        iteration_count: u32,
        results: Vec<RunOutcome>,
    ) -> Self {
        let all_succeeded = results.iter().all(RunOutcome::is_success);
        let values_agree = all_succeeded
            && results
                .windows(2)
                .all(|pair| pair[0].program_return.return_value == pair[1].program_return.return_value);

        Self {
            run_id,
            module_hash: module.content_hash().to_string(),
            module_size: module.len(),
            iteration_count,
            results,
            all_succeeded,
            values_agree,
        }
    }

    /// Classify the outcome.
    pub fn verdict(&self) -> Verdict {
        if !self.all_succeeded {
            Verdict::Failures
        } else if self.values_agree {
            Verdict::Agreement
        } else {
            Verdict::Divergence
        }
    }

    /// Return values of successful runs, mapped to the variants that produced them.
    ///
    /// Failed runs are excluded.
    pub fn distinct_values(&self) -> BTreeMap<i64, Vec<&str>> {
        let mut values: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
        for outcome in self.results.iter().filter(|o| o.is_success()) {
            values
                .entry(outcome.program_return.return_value)
                .or_default()
                .push(outcome.variant.name.as_str());
        }
        values
    }

    /// Outcomes of variants that failed.
    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.results.iter().filter(|o| !o.is_success())
    }
}

/// Runs all variants and builds the report.
#[derive(Debug)]
pub struct Comparator<F> {
    factory: F,
    runner: BenchmarkRunner,
}

impl<F: EngineFactory> Comparator<F> {
    /// Create a comparator.
    pub fn new(factory: F, runner: BenchmarkRunner) -> Self {
        Self { factory, runner }
    }

    /// The factory used to construct engines.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Run every variant in order and compare their results.
    #[instrument(skip_all, fields(module_hash = %module.content_hash(), variants = variants.len()))]
    pub fn compare(&self, variants: &[EngineVariant], module: &ModuleSource) -> ComparisonReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, iterations = self.runner.iterations().get(), "Starting comparison");

        let results = variants
            .iter()
            .map(|variant| self.run_isolated(variant, module))
            .collect();

        let report = ComparisonReport::new(run_id, module, self.runner.iterations().get(), results);

        match report.verdict() {
            Verdict::Agreement => info!(
                return_value = report.results.first().map(|o| o.program_return.return_value),
                "All engines agree"
            ),
            Verdict::Failures => warn!(
                failed = report.failures().count(),
                "Comparison incomplete: some engines failed"
            ),
            Verdict::Divergence => error!(
                values = ?report.distinct_values(),
                "Engines returned different values"
            ),
        }

        report
    }

    fn run_isolated(&self, variant: &EngineVariant, module: &ModuleSource) -> RunOutcome {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.factory.run_variant(&self.runner, variant, module)
        }))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            let err = BenchError::panicked(message);
            error!(variant = %variant.name, error = %err, "Engine panicked");
            RunOutcome::from_error(variant.clone(), &err)
        })
    }
}
