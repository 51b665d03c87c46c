//! Benchmark metrics: densification and solver statistics of one run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sinter_model::ring::neck_widths;
use sinter_model::{contact_pairs, SystemState};
use sinter_solver::SimulationOutcome;

/// Metrics collected from a benchmark scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// Scenario name.
    pub scenario: String,
    pub particle_count: usize,
    pub node_count: usize,
    pub success: bool,
    /// How the run ended, in `Debug` form.
    pub termination: String,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub recoveries: u64,
    /// Average root-finder iterations per accepted step.
    pub avg_iterations: f64,
    /// Simulated time covered (s).
    pub simulated_time: f64,
    /// Total wall-clock time (seconds).
    pub total_wall_time: f64,
    /// Average wall-clock time per accepted step (seconds).
    pub avg_step_time: f64,
    /// Relative growth of the mean neck width, `final / initial - 1`.
    pub neck_growth: f64,
    /// Relative approach of contacting centers, `1 - final / initial`.
    pub shrinkage: f64,
}

impl BenchmarkMetrics {
    /// Collects metrics from a finished run.
    pub fn from_outcome(scenario: &str, outcome: &SimulationOutcome, total_wall_time: f64) -> Self {
        let first = outcome.time_series.first();
        let last = outcome.final_state();
        let stats = outcome.statistics;

        let ratio = |measure: fn(&SystemState) -> Option<f64>| match (first, last) {
            (Some(a), Some(b)) => match (measure(a), measure(b)) {
                (Some(x), Some(y)) if x > 0.0 => y / x,
                _ => 1.0,
            },
            _ => 1.0,
        };

        let per_step = |total: f64| {
            if stats.accepted_steps > 0 {
                total / stats.accepted_steps as f64
            } else {
                0.0
            }
        };

        Self {
            scenario: scenario.to_string(),
            particle_count: first.map_or(0, SystemState::particle_count),
            node_count: first.map_or(0, SystemState::node_count),
            success: outcome.success,
            termination: format!("{:?}", outcome.termination),
            accepted_steps: stats.accepted_steps,
            rejected_steps: stats.rejected_steps,
            recoveries: stats.recoveries,
            avg_iterations: per_step(stats.root_iterations as f64),
            simulated_time: match (first, last) {
                (Some(a), Some(b)) => b.time() - a.time(),
                _ => 0.0,
            },
            total_wall_time,
            avg_step_time: per_step(total_wall_time),
            neck_growth: ratio(mean_neck_width) - 1.0,
            shrinkage: 1.0 - ratio(mean_center_distance),
        }
    }

    /// Format as a CSV row (header + data).
    pub fn to_csv_header() -> String {
        "scenario,particles,nodes,success,accepted,rejected,recoveries,avg_iterations,simulated_time_s,total_wall_time_s,avg_step_ms,neck_growth,shrinkage".to_string()
    }

    /// Format this metrics instance as a CSV data row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{:.2},{:.6e},{:.6},{:.4},{:.6e},{:.6e}",
            self.scenario,
            self.particle_count,
            self.node_count,
            self.success,
            self.accepted_steps,
            self.rejected_steps,
            self.recoveries,
            self.avg_iterations,
            self.simulated_time,
            self.total_wall_time,
            self.avg_step_time * 1000.0,
            self.neck_growth,
            self.shrinkage,
        )
    }

    /// Format multiple metrics as a complete CSV string.
    pub fn to_csv(metrics: &[BenchmarkMetrics]) -> String {
        let mut csv = Self::to_csv_header();
        for m in metrics {
            csv.push('\n');
            csv.push_str(&m.to_csv_row());
        }
        csv
    }
}

/// Mean distance between the two necks that bound each grain boundary,
/// or `None` when the state has no necks.
pub fn mean_neck_width(state: &SystemState) -> Option<f64> {
    let widths: Vec<f64> = state
        .particles()
        .iter()
        .flat_map(neck_widths)
        .map(|(_, width)| width)
        .collect();
    (!widths.is_empty()).then(|| widths.iter().sum::<f64>() / widths.len() as f64)
}

/// Mean center distance over all pairs of particles in contact, or `None`
/// when no particles touch.
pub fn mean_center_distance(state: &SystemState) -> Option<f64> {
    let mut pairs = BTreeSet::new();
    for pair in contact_pairs(state) {
        if let (Some(a), Some(b)) = (state.location(pair.primary), state.location(pair.secondary)) {
            let key = (a.particle.min(b.particle), a.particle.max(b.particle));
            pairs.insert(key);
        }
    }
    if pairs.is_empty() {
        return None;
    }
    let particles = state.particles();
    let total: f64 = pairs
        .iter()
        .map(|&(a, b)| {
            particles[a]
                .center_position()
                .distance(particles[b].center_position())
        })
        .sum();
    Some(total / pairs.len() as f64)
}
