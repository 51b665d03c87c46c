//! Step validators.
//!
//! Validators inspect proposed rates before a step is applied, and the
//! updated state after it. A rejection is a normal outcome, not an error:
//! the session rolls back and retries with a smaller width.

use std::fmt;

use std::collections::HashMap;

use sinter_model::ring::neck_widths;
use sinter_model::SystemState;
use sinter_types::constants::DEFAULT_INSTABILITY_WINDOW;

use crate::layout::NodeUnknown;
use crate::unknowns::UnknownVector;

/// Why a step was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidStep {
    /// Name of the rejecting validator or routine.
    pub validator: String,
    pub reason: String,
}

impl InvalidStep {
    pub fn new(validator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InvalidStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.validator, self.reason)
    }
}

/// Trait for step validators.
pub trait StepValidator: Send {
    /// Accepts or rejects `rates` proposed at `state`.
    fn validate(&self, state: &SystemState, rates: &UnknownVector) -> Result<(), InvalidStep>;

    /// Accepts or rejects the state `after` reached from `before`.
    fn validate_update(&self, before: &SystemState, after: &SystemState) -> Result<(), InvalidStep> {
        let _ = (before, after);
        Ok(())
    }

    /// Returns the validator's name.
    fn name(&self) -> &str;
}

/// Rejects rates with NaN or infinite entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct FiniteValuesValidator;

impl StepValidator for FiniteValuesValidator {
    fn validate(&self, _state: &SystemState, rates: &UnknownVector) -> Result<(), InvalidStep> {
        match rates.values().iter().position(|v| !v.is_finite()) {
            None => Ok(()),
            Some(index) => Err(InvalidStep::new(
                self.name(),
                format!("non-finite value at unknown {index}"),
            )),
        }
    }

    fn name(&self) -> &str {
        "finite_values"
    }
}

/// Detects sawtooth oscillation of the normal velocities along a ring.
///
/// For every particle the differences between consecutive normal
/// velocities around the ring are taken; a run of `window` differences
/// with strictly alternating signs marks the step as unstable. Differences
/// below `noise_floor` times the largest magnitude on the ring count as
/// zero and break a run.
#[derive(Debug, Clone, Copy)]
pub struct OscillationValidator {
    pub window: usize,
    pub noise_floor: f64,
}

impl OscillationValidator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            noise_floor: 1.0e-6,
        }
    }
}

impl Default for OscillationValidator {
    fn default() -> Self {
        Self::new(DEFAULT_INSTABILITY_WINDOW)
    }
}

/// Longest run of alternating-sign consecutive differences of a closed ring.
pub fn alternating_run(values: &[f64], noise_floor: f64) -> usize {
    let n = values.len();
    if n < 2 {
        return 0;
    }
    let scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let floor = noise_floor * scale;
    let signs: Vec<i8> = (0..n)
        .map(|k| {
            let d = values[(k + 1) % n] - values[k];
            if d.abs() <= floor {
                0
            } else if d > 0.0 {
                1
            } else {
                -1
            }
        })
        .collect();

    // Walk the ring twice so runs crossing the seam are seen whole.
    let mut best = 0;
    let mut run = 0;
    for k in 0..2 * n {
        let sign = signs[k % n];
        let previous = signs[(k + n - 1) % n];
        run = if sign == 0 {
            0
        } else if run > 0 && sign == -previous {
            run + 1
        } else {
            1
        };
        best = best.max(run.min(n));
    }
    best
}

impl StepValidator for OscillationValidator {
    fn validate(&self, state: &SystemState, rates: &UnknownVector) -> Result<(), InvalidStep> {
        let mut normals = rates.node_values(NodeUnknown::Normal);
        for particle in state.particles() {
            let ring: Vec<f64> = normals.by_ref().take(particle.node_count()).collect();
            let run = alternating_run(&ring, self.noise_floor);
            if run >= self.window {
                return Err(InvalidStep::new(
                    self.name(),
                    format!(
                        "particle {}: {run} alternating normal-velocity differences (window {})",
                        particle.id, self.window
                    ),
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "oscillation"
    }
}

/// Rejects steps that narrow a neck.
///
/// Necks are matched by the id of the neck node opening their grain
/// boundary; a neck may shrink by at most `tolerance` times its previous
/// width. Overshooting steps near the stability limit show up here first.
#[derive(Debug, Clone, Copy)]
pub struct NeckRetreatValidator {
    pub tolerance: f64,
}

impl NeckRetreatValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl Default for NeckRetreatValidator {
    fn default() -> Self {
        Self::new(1.0e-10)
    }
}

impl StepValidator for NeckRetreatValidator {
    fn validate(&self, _state: &SystemState, _rates: &UnknownVector) -> Result<(), InvalidStep> {
        Ok(())
    }

    fn validate_update(&self, before: &SystemState, after: &SystemState) -> Result<(), InvalidStep> {
        let previous: HashMap<_, f64> = before.particles().iter().flat_map(neck_widths).collect();
        for (neck, width) in after.particles().iter().flat_map(neck_widths) {
            let Some(&old) = previous.get(&neck) else {
                continue;
            };
            if width < old * (1.0 - self.tolerance) {
                return Err(InvalidStep::new(
                    self.name(),
                    format!("neck at node {neck} narrowed from {old:.6e} to {width:.6e}"),
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "neck_retreat"
    }
}
