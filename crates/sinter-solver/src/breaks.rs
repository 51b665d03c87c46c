//! Break conditions: predicates that end a run early and successfully.

use sinter_model::ring::surface_runs;
use sinter_model::SystemState;

/// What a break condition sees after an accepted step (normalized units).
#[derive(Debug, Clone, Copy)]
pub struct BreakContext<'a> {
    pub state: &'a SystemState,
    pub step_width: f64,
    pub accepted_steps: u64,
}

/// Trait for break conditions, evaluated after every accepted step.
pub trait BreakCondition: Send {
    /// True to end the run.
    fn should_break(&mut self, context: &BreakContext<'_>) -> bool;

    /// Returns the condition's name.
    fn name(&self) -> &str;
}

/// Ends the run once a pore between two necks has nearly closed.
///
/// Triggers when any surface run bounded by two necks is shorter than
/// `threshold` times `reference_length`.
#[derive(Debug, Clone, Copy)]
pub struct PoreClosureCondition {
    pub threshold: f64,
    pub reference_length: f64,
}

impl PoreClosureCondition {
    /// Threshold relative to the normalized reference length 1.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            reference_length: 1.0,
        }
    }
}

impl BreakCondition for PoreClosureCondition {
    fn should_break(&mut self, context: &BreakContext<'_>) -> bool {
        let limit = self.threshold * self.reference_length;
        context.state.particles().iter().any(|particle| {
            surface_runs(particle)
                .iter()
                .any(|run| run.length(particle) < limit)
        })
    }

    fn name(&self) -> &str {
        "pore_closure"
    }
}

/// Ends the run when the step width collapses relative to its history.
#[derive(Debug, Clone, Copy)]
pub struct StalledProgressCondition {
    pub ratio: f64,
    largest: f64,
}

impl StalledProgressCondition {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            largest: 0.0,
        }
    }

    /// Largest width seen so far.
    pub fn largest(&self) -> f64 {
        self.largest
    }
}

impl BreakCondition for StalledProgressCondition {
    fn should_break(&mut self, context: &BreakContext<'_>) -> bool {
        self.largest = self.largest.max(context.step_width);
        context.step_width < self.ratio * self.largest
    }

    fn name(&self) -> &str {
        "stalled_progress"
    }
}
