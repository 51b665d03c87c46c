//! Session event types.
//!
//! Structured events emitted by a solver session at fixed points of the
//! step loop. Events are lightweight value types carrying just enough data
//! to follow a run from a log.

use serde::{Deserialize, Serialize};

/// An event emitted by a solver session.
///
/// Events are tagged with the number of steps accepted so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Accepted-step counter at emission time (0 before the first step).
    pub timestep: u32,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Session initialized and about to step.
    SessionStarted {
        /// Number of particles in the initial state.
        particles: u32,
        /// Number of ring nodes over all particles.
        nodes: u32,
        /// Length of the unknown vector.
        unknowns: u32,
        /// Start time (seconds).
        start_time: f64,
        /// End time (seconds).
        end_time: f64,
    },

    /// A step passed every validator and became the current state.
    StepAccepted {
        /// Simulation time after the step (seconds).
        sim_time: f64,
        /// Step width (seconds).
        step_width: f64,
        /// Root-finder iterations summed over all stages.
        iterations: u32,
    },

    /// A step was rejected by a validator or by a recoverable numeric failure.
    StepRejected {
        /// Name of the rejecting validator or routine.
        validator: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The session rolled back to a remembered state.
    StateRecovered {
        /// Time of the restored state (seconds).
        sim_time: f64,
        /// Consecutive recoveries so far.
        attempts: u32,
        /// Step width cap after the rollback (seconds).
        step_width_cap: f64,
    },

    /// A break condition ended the run.
    BreakConditionMet {
        /// Name of the condition.
        condition: String,
    },

    /// The session finished.
    SessionFinished {
        /// Whether the run ended successfully.
        success: bool,
        /// Accepted steps over the run.
        accepted_steps: u32,
        /// Rejected steps over the run.
        rejected_steps: u32,
    },

    /// Custom event for extensibility.
    Custom {
        /// Arbitrary label.
        label: String,
        /// JSON-encoded payload.
        payload: String,
    },
}

impl SimulationEvent {
    /// Creates a new event for the given step counter.
    pub fn new(timestep: u32, kind: EventKind) -> Self {
        Self { timestep, kind }
    }

    /// Short machine-friendly name of the event kind.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::SessionStarted { .. } => "session_started",
            EventKind::StepAccepted { .. } => "step_accepted",
            EventKind::StepRejected { .. } => "step_rejected",
            EventKind::StateRecovered { .. } => "state_recovered",
            EventKind::BreakConditionMet { .. } => "break_condition_met",
            EventKind::SessionFinished { .. } => "session_finished",
            EventKind::Custom { .. } => "custom",
        }
    }
}
