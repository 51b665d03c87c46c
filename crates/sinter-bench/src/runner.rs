//! Benchmark runner: executes scenarios in solver sessions and collects metrics.

use std::time::Instant;

use rayon::prelude::*;
use sinter_solver::{SessionBuilder, SimulationOutcome};
use sinter_types::SinterResult;

use crate::metrics::BenchmarkMetrics;
use crate::scenarios::{Scenario, ScenarioKind};

/// Runs benchmark scenarios and collects metrics.
pub struct BenchmarkRunner;

impl BenchmarkRunner {
    /// Run a single scenario.
    ///
    /// Errors only when the session cannot be built; a run that fails
    /// midway is reported through [`BenchmarkMetrics::success`].
    pub fn run(scenario: &Scenario) -> SinterResult<BenchmarkMetrics> {
        let (outcome, wall_time) = Self::run_outcome(scenario)?;
        let metrics = BenchmarkMetrics::from_outcome(scenario.kind.name(), &outcome, wall_time);
        tracing::info!(
            scenario = %metrics.scenario,
            success = metrics.success,
            accepted = metrics.accepted_steps,
            wall_time = metrics.total_wall_time,
            "benchmark finished"
        );
        Ok(metrics)
    }

    /// Run a single scenario and hand back the full outcome with its
    /// wall-clock time in seconds.
    pub fn run_outcome(scenario: &Scenario) -> SinterResult<(SimulationOutcome, f64)> {
        let session = SessionBuilder::new(scenario.session_input()?).build()?;
        let start = Instant::now();
        let outcome = session.run();
        Ok((outcome, start.elapsed().as_secs_f64()))
    }

    /// Run all stock scenarios in sequence.
    pub fn run_all() -> SinterResult<Vec<BenchmarkMetrics>> {
        let mut results = Vec::new();
        for &kind in ScenarioKind::all() {
            let scenario = Scenario::from_kind(kind)?;
            results.push(Self::run(&scenario)?);
        }
        Ok(results)
    }

    /// Run independent scenarios concurrently, one session per scenario.
    ///
    /// Results keep the order of `scenarios`.
    pub fn run_batch(scenarios: &[Scenario]) -> Vec<SinterResult<BenchmarkMetrics>> {
        scenarios.par_iter().map(Self::run).collect()
    }
}
