//! Report rendering.
//!
//! Two renderings of a [`ComparisonReport`]:
//! - [`render_text`]: one labeled section per variant, then a comparison section
//!   (also available through the report's `Display` impl)
//! - [`render_json`]: the full report as pretty-printed JSON

use std::fmt;
use std::time::Duration;

use crate::compare::{ComparisonReport, Verdict};
use crate::runner::RunOutcome;
use crate::timer::Phase;

/// Render the report as human-readable text.
pub fn render_text(report: &ComparisonReport) -> String {
    report.to_string()
}

/// Render the report as pretty-printed JSON.
pub fn render_json(report: &ComparisonReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.results {
            writeln!(f, "{}", VariantSection::new(outcome, self.iteration_count))?;
        }

        writeln!(f, "=== Comparison ===")?;
        writeln!(f, "Module: {} ({} bytes)", self.module_hash, self.module_size)?;
        writeln!(f, "Variants: {}", self.results.len())?;
        writeln!(f, "All succeeded: {}", self.all_succeeded)?;
        writeln!(f, "Values agree: {}", self.values_agree)?;

        match self.verdict() {
            Verdict::Agreement => {}
            Verdict::Failures => {
                let failed: Vec<_> = self.failures().map(|o| o.variant.name.as_str()).collect();
                writeln!(f, "Failed variants: {}", failed.join(", "))?;
            }
            Verdict::Divergence => {
                writeln!(
                    f,
                    "!!! DIVERGENCE: engines returned different values for the same module"
                )?;
                for (value, variants) in self.distinct_values() {
                    writeln!(f, "  {value}: {}", variants.join(", "))?;
                }
            }
        }

        Ok(())
    }
}

/// One variant's section of the text report.
struct VariantSection<'a> {
    outcome: &'a RunOutcome,
    iterations: u32,
}

impl<'a> VariantSection<'a> {
    fn new(outcome: &'a RunOutcome, iterations: u32) -> Self {
        Self {
            outcome,
            iterations,
        }
    }
}

impl fmt::Display for VariantSection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = self.outcome;
        let timing = &outcome.timing;

        writeln!(
            f,
            "=== {} [{}] ===",
            outcome.variant.name, outcome.variant.backend
        )?;
        writeln!(
            f,
            "Load to lookup time: {}",
            Elapsed(timing.get(Phase::LoadToLookup))
        )?;
        writeln!(f, "First call time: {}", Elapsed(timing.get(Phase::FirstCall)))?;
        writeln!(
            f,
            "Steady state per iteration: {}",
            Elapsed(timing.get(Phase::SteadyStatePerIteration))
        )?;
        writeln!(
            f,
            "Steady state total ({} iterations): {}",
            self.iterations,
            Elapsed(timing.get(Phase::SteadyStateTotal))
        )?;
        writeln!(
            f,
            "Program return value: {}",
            outcome.program_return.return_value
        )?;
        writeln!(
            f,
            "Program error message: {}",
            outcome.program_return.error_message
        )?;

        if let (Some(from), Some(kind)) = (outcome.failed_from, outcome.error_kind) {
            writeln!(f, "Failed in state: {from} ({kind})")?;
        }

        Ok(())
    }
}

/// A phase duration in nanoseconds and milliseconds, or `n/a` if not recorded.
struct Elapsed(Option<Duration>);

impl fmt::Display for Elapsed {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(
                f,
                "{} nanoseconds ({:.3} ms)",
                d.as_nanos(),
                d.as_nanos() as f64 / 1_000_000.0
            ),
            None => f.write_str("n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleSource;
    use crate::runner::{ProgramReturn, RunState};
    use crate::timer::PhaseTimer;
    use std::num::NonZeroU32;
    use uuid::Uuid;
    use wasm_bench_common::{BackendKind, BenchError, EngineSettings, EngineVariant};

    fn variant(name: &str) -> EngineVariant {
        EngineVariant::new(
            name,
            BackendKind::Aot,
            EngineSettings {
                memory_limit_pages: 62,
                cache_dir: None,
            },
        )
    }

    fn completed(name: &str, value: i64) -> RunOutcome {
        let mut timer = PhaseTimer::new();
        timer
            .measure::<_, ()>(Phase::LoadToLookup, || Ok(()))
            .unwrap();
        timer.measure::<_, ()>(Phase::FirstCall, || Ok(())).unwrap();
        timer.record_steady_state(Duration::from_micros(5), NonZeroU32::new(5).unwrap());

        RunOutcome {
            variant: variant(name),
            program_return: ProgramReturn::success(value),
            timing: timer.finish(),
            state: RunState::Completed,
            failed_from: None,
            error_kind: None,
        }
    }

    fn report(results: Vec<RunOutcome>) -> ComparisonReport {
        let module = ModuleSource::new(b"\0asm\x01\0\0\0".to_vec());
        ComparisonReport::new(Uuid::nil(), &module, 5, results)
    }

    #[test]
    fn test_elapsed_display() {
        assert_eq!(
            Elapsed(Some(Duration::from_nanos(1_500_000))).to_string(),
            "1500000 nanoseconds (1.500 ms)"
        );
        assert_eq!(Elapsed(None).to_string(), "n/a");
    }

    #[test]
    fn test_display_matches_render_text() {
        let report = report(vec![completed("one", 7), completed("two", 8)]);
        let text = render_text(&report);

        assert_eq!(format!("{report}"), text);
        assert!(text.starts_with("=== one [aot] ===\n"));
        assert!(text.contains("Program error message: \n\n=== two [aot] ==="));
        assert!(text.ends_with("  8: two\n"));
    }

    #[test]
    fn test_render_text_sections() {
        let text = render_text(&report(vec![completed("one", 7), completed("two", 7)]));

        assert!(text.contains("=== one [aot] ==="));
        assert!(text.contains("=== two [aot] ==="));
        assert!(text.contains("Steady state per iteration: 1000 nanoseconds (0.001 ms)"));
        assert!(text.contains("Steady state total (5 iterations): 5000 nanoseconds"));
        assert!(text.contains("Program return value: 7"));
        assert!(text.contains("All succeeded: true"));
        assert!(text.contains("Values agree: true"));
        assert!(!text.contains("DIVERGENCE"));
    }

    #[test]
    fn test_render_text_divergence() {
        let text = render_text(&report(vec![completed("one", 7), completed("two", 8)]));

        assert!(text.contains("All succeeded: true"));
        assert!(text.contains("Values agree: false"));
        assert!(text.contains("DIVERGENCE"));
        assert!(text.contains("  7: one"));
        assert!(text.contains("  8: two"));
    }

    #[test]
    fn test_render_text_failure() {
        let failed = RunOutcome::from_error(variant("broken"), &BenchError::compile("bad magic"));
        let text = render_text(&report(vec![completed("one", 7), failed]));

        assert!(text.contains("Load to lookup time: n/a"));
        assert!(text.contains("Program error message: Compilation failed: bad magic"));
        assert!(text.contains("Failed in state: Created (CompileFailure)"));
        assert!(text.contains("Failed variants: broken"));
        assert!(!text.contains("DIVERGENCE"));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&report(vec![completed("one", 7)])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["all_succeeded"], true);
        assert_eq!(value["values_agree"], true);
        assert_eq!(value["iteration_count"], 5);
        assert_eq!(value["results"][0]["program_return"]["return_value"], 7);
        assert_eq!(value["results"][0]["variant"]["backend"], "aot");
        assert_eq!(value["results"][0]["state"], "completed");
    }
}
