//! Phase timing.
//!
//! [`PhaseTimer`] wraps protocol phases with a monotonic [`Instant`] and
//! appends the elapsed time to a [`PhaseTiming`]. A phase is recorded only
//! when its operation succeeds; failed phases leave no entry behind.

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Labels of the recorded phases, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Compile, instantiate and export lookup.
    LoadToLookup,
    /// The first (cold) call.
    FirstCall,
    /// All steady-state calls, timed as one block.
    SteadyStateTotal,
    /// `SteadyStateTotal` divided by the iteration count.
    SteadyStatePerIteration,
}

impl Phase {
    /// Stable label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::LoadToLookup => "load_to_lookup",
            Phase::FirstCall => "first_call",
            Phase::SteadyStateTotal => "steady_state_total",
            Phase::SteadyStatePerIteration => "steady_state_per_iteration",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEntry {
    /// Phase label.
    pub phase: Phase,
    /// Elapsed time.
    #[serde(with = "duration_nanos")]
    pub elapsed: Duration,
}

/// Ordered, append-only record of phase durations for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseTiming {
    entries: Vec<PhaseEntry>,
}

impl PhaseTiming {
    /// Duration recorded for `phase`, if it completed.
    pub fn get(&self, phase: Phase) -> Option<Duration> {
        self.entries
            .iter()
            .find(|e| e.phase == phase)
            .map(|e| e.elapsed)
    }

    /// All entries in recording order.
    pub fn entries(&self) -> &[PhaseEntry] {
        &self.entries
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, phase: Phase, elapsed: Duration) {
        self.entries.push(PhaseEntry { phase, elapsed });
    }
}

/// Records phase durations for a single run.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    timing: PhaseTiming,
}

impl PhaseTimer {
    /// Create an empty timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` and record its duration under `phase` if it succeeds.
    pub fn measure<T, E>(
        &mut self,
        phase: Phase,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let start = Instant::now();
        let value = op()?;
        self.timing.push(phase, start.elapsed());
        Ok(value)
    }

    /// Run `op` as the steady-state block of `iterations` calls.
    ///
    /// On success records both the total and the per-iteration duration.
    pub fn measure_steady_state<E>(
        &mut self,
        iterations: NonZeroU32,
        op: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        let start = Instant::now();
        op()?;
        self.record_steady_state(start.elapsed(), iterations);
        Ok(())
    }

    /// Record an externally measured steady-state total.
    pub fn record_steady_state(&mut self, total: Duration, iterations: NonZeroU32) {
        self.timing.push(Phase::SteadyStateTotal, total);
        self.timing
            .push(Phase::SteadyStatePerIteration, total / iterations.get());
    }

    /// Finish timing and hand out the immutable record.
    pub fn finish(self) -> PhaseTiming {
        self.timing
    }
}

/// Serialize a [`Duration`] as integer nanoseconds.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
