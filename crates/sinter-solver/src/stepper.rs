//! Time steppers: the strategy that turns a state into rates for one step.
//!
//! The session calls, for every step:
//!
//! ```text
//! let proposal = stepper.step(&context)?;
//! let next = advance(state, &proposal.rates, proposal.step_width)?;
//! ```
//!
//! # Implementations
//!
//! - [`SingleStageStepper`]: one solve at the base state
//! - [`FourStageStepper`]: four solves combined with weights (1, 2, 2, 1)/6
//! - [`TrapezoidalStepper`]: one solve averaged with the previous rates

use std::cell::Cell;
use std::sync::Arc;

use sinter_math::RootFinder;
use sinter_model::SystemState;
use sinter_types::{SinterError, SinterResult};

use crate::config::{StepWidthConfig, StepWidthMode};
use crate::evaluator::TepEvaluator;
use crate::layout::{NodeUnknown, ParticleUnknown, UnknownLayout};
use crate::norm::NormalizedMaterials;
use crate::unknowns::UnknownVector;
use crate::update::advance;

/// Rates and width proposed for one step.
#[derive(Debug, Clone)]
pub struct StepProposal {
    pub rates: UnknownVector,
    pub step_width: f64,
    /// Root-finder iterations summed over all stages.
    pub iterations: u32,
}

/// Everything a stepper may use for one step.
pub struct StepContext<'a> {
    /// Base state of the step, normalized.
    pub state: &'a SystemState,
    /// Layout of the base state.
    pub layout: &'a Arc<UnknownLayout>,
    pub materials: &'a NormalizedMaterials,
    pub root_finder: &'a dyn RootFinder,
    pub widths: &'a StepWidthController,
    /// Rates of the last accepted step, if still valid.
    pub previous: Option<&'a UnknownVector>,
    pub friction: f64,
    /// Time left until the end of the run.
    pub remaining: f64,
    /// Width handed out by [`choose_width`](Self::choose_width), kept so a
    /// failing later stage still reports what it attempted.
    pub(crate) chosen: Cell<Option<f64>>,
}

impl StepContext<'_> {
    /// Solves for the rates at `stage_state`, starting from `guess` when its
    /// layout fits and from zero otherwise.
    ///
    /// Failures are wrapped in [`SinterError::StepFailed`] with the stage index.
    pub fn solve(
        &self,
        stage_state: &SystemState,
        guess: Option<&UnknownVector>,
        stage: u32,
    ) -> SinterResult<(UnknownVector, u32)> {
        let fail = |source: SinterError| SinterError::StepFailed {
            stage,
            source: Box::new(source),
        };
        let layout = if self.layout.matches(stage_state) {
            Arc::clone(self.layout)
        } else {
            Arc::new(UnknownLayout::from_state(stage_state).map_err(fail)?)
        };
        let evaluator =
            TepEvaluator::new(stage_state, Arc::clone(&layout), self.materials, self.friction)
                .map_err(fail)?;

        let initial = match guess {
            Some(g) if g.layout().as_ref() == layout.as_ref() => g.values().to_vec(),
            _ => vec![0.0; layout.len()],
        };
        let solution = self.root_finder.find_root(&evaluator, initial).map_err(fail)?;
        let rates = UnknownVector::from_values(layout, solution.x).map_err(fail)?;
        Ok((rates, solution.iterations))
    }

    /// Width for the given rates at the base state.
    pub fn choose_width(&self, rates: &UnknownVector) -> f64 {
        let width = self.widths.choose(self.state, rates, self.remaining);
        self.chosen.set(Some(width));
        width
    }

    /// Last width returned by [`choose_width`](Self::choose_width) for this step.
    pub fn chosen_width(&self) -> Option<f64> {
        self.chosen.get()
    }

    /// Intermediate state of a multi-stage scheme.
    pub fn stage_state(&self, rates: &UnknownVector, width: f64, stage: u32) -> SinterResult<SystemState> {
        advance(self.state, rates, width).map_err(|source| SinterError::StepFailed {
            stage,
            source: Box::new(source),
        })
    }
}

/// Trait for time-stepping schemes.
pub trait TimeStepper: Send {
    /// Proposes rates and a width for one step from `context.state`.
    fn step(&mut self, context: &StepContext<'_>) -> SinterResult<StepProposal>;

    /// Drops any cached data after a rollback.
    fn reset(&mut self) {}

    /// Returns the stepper's name.
    fn name(&self) -> &str;
}

/// One solve at the base state per step.
#[derive(Debug, Default)]
pub struct SingleStageStepper;

impl SingleStageStepper {
    pub fn new() -> Self {
        Self
    }
}

impl TimeStepper for SingleStageStepper {
    fn step(&mut self, context: &StepContext<'_>) -> SinterResult<StepProposal> {
        let (rates, iterations) = context.solve(context.state, context.previous, 0)?;
        let step_width = context.choose_width(&rates);
        Ok(StepProposal {
            rates,
            step_width,
            iterations,
        })
    }

    fn name(&self) -> &str {
        "single_stage"
    }
}

/// Classical four-stage scheme.
///
/// The width is chosen from the first stage and kept for the others.
#[derive(Debug, Default)]
pub struct FourStageStepper;

impl FourStageStepper {
    pub fn new() -> Self {
        Self
    }
}

impl TimeStepper for FourStageStepper {
    fn step(&mut self, context: &StepContext<'_>) -> SinterResult<StepProposal> {
        let (k1, i1) = context.solve(context.state, context.previous, 0)?;
        let width = context.choose_width(&k1);

        let s2 = context.stage_state(&k1, 0.5 * width, 1)?;
        let (k2, i2) = context.solve(&s2, Some(&k1), 1)?;
        let s3 = context.stage_state(&k2, 0.5 * width, 2)?;
        let (k3, i3) = context.solve(&s3, Some(&k2), 2)?;
        let s4 = context.stage_state(&k3, width, 3)?;
        let (k4, i4) = context.solve(&s4, Some(&k3), 3)?;

        let sixth = 1.0 / 6.0;
        let rates = UnknownVector::weighted_sum(&[
            (sixth, &k1),
            (2.0 * sixth, &k2),
            (2.0 * sixth, &k3),
            (sixth, &k4),
        ])?;
        Ok(StepProposal {
            rates,
            step_width: width,
            iterations: i1 + i2 + i3 + i4,
        })
    }

    fn name(&self) -> &str {
        "four_stage"
    }
}

/// Averages each fresh solve with the previous accepted rates.
///
/// Falls back to the fresh solve on the first step, after a rollback, or
/// when the population changed.
#[derive(Debug, Default)]
pub struct TrapezoidalStepper;

impl TrapezoidalStepper {
    pub fn new() -> Self {
        Self
    }
}

impl TimeStepper for TrapezoidalStepper {
    fn step(&mut self, context: &StepContext<'_>) -> SinterResult<StepProposal> {
        let (fresh, iterations) = context.solve(context.state, context.previous, 0)?;
        let rates = match context.previous {
            Some(previous) if previous.same_layout(&fresh) => {
                UnknownVector::weighted_sum(&[(0.5, &fresh), (0.5, previous)])?
            }
            _ => fresh,
        };
        let step_width = context.choose_width(&rates);
        Ok(StepProposal {
            rates,
            step_width,
            iterations,
        })
    }

    fn name(&self) -> &str {
        "trapezoidal"
    }
}

/// Chooses step widths and tracks the recovery cap.
#[derive(Debug, Clone)]
pub struct StepWidthController {
    config: StepWidthConfig,
    diffusivity: Option<f64>,
    cap: f64,
    last: Option<f64>,
    largest: f64,
}

impl StepWidthController {
    pub fn new(config: StepWidthConfig) -> Self {
        Self {
            cap: config.max,
            config,
            diffusivity: None,
            last: None,
            largest: 0.0,
        }
    }

    /// Enables the diffusive stability bound for the largest normalized
    /// `mobility·energy` product of the run.
    pub fn with_diffusivity(mut self, diffusivity: f64) -> Self {
        self.diffusivity = (diffusivity.is_finite() && diffusivity > 0.0).then_some(diffusivity);
        self
    }

    /// Current upper bound from rollbacks.
    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Width of the last accepted step.
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    /// Largest accepted width so far.
    pub fn largest(&self) -> f64 {
        self.largest
    }

    /// Width for `rates` at `state`, never past `remaining`.
    pub fn choose(&self, state: &SystemState, rates: &UnknownVector, remaining: f64) -> f64 {
        let upper = self.config.max.min(self.cap).max(self.config.min);
        let mut width = match self.config.mode {
            StepWidthMode::Fixed => self.config.fixed,
            StepWidthMode::Adaptive => {
                let speed = if rates.layout().matches(state) {
                    max_node_speed(state, rates)
                } else {
                    0.0
                };
                let length = state
                    .particles()
                    .iter()
                    .map(|p| p.min_segment_length())
                    .fold(f64::INFINITY, f64::min);
                let displacement = if speed > 0.0 && length.is_finite() {
                    self.config.max_displacement_fraction * length / speed
                } else {
                    upper
                };
                // Explicit surface diffusion is stable only below h⁴/(8B).
                match self.diffusivity {
                    Some(b) if length.is_finite() => {
                        displacement.min(self.config.stability_fraction * length.powi(4) / b)
                    }
                    _ => displacement,
                }
            }
        };
        if let Some(last) = self.last {
            width = width.min(self.config.growth_factor * last);
        }
        width = width.clamp(self.config.min, upper);
        if remaining > 0.0 {
            width = width.min(remaining);
        }
        width
    }

    /// Records an accepted width and relaxes the cap.
    pub fn on_accepted(&mut self, width: f64) {
        self.last = Some(width);
        self.largest = self.largest.max(width);
        self.cap = (self.cap * self.config.growth_factor).min(self.config.max);
    }

    /// Halves the cap after a rollback from a step of width `attempted`.
    pub fn on_recovered(&mut self, attempted: Option<f64>) {
        let base = attempted.unwrap_or(self.cap).min(self.cap);
        self.cap = (0.5 * base).max(self.config.min);
    }
}

/// Upper bound of any node speed: rigid motion plus normal velocity.
fn max_node_speed(state: &SystemState, rates: &UnknownVector) -> f64 {
    let mut speed: f64 = 0.0;
    let mut slot = 0;
    for (p, particle) in state.particles().iter().enumerate() {
        let rigid = rates
            .particle_at(p, ParticleUnknown::RadialDisplacement)
            .hypot(rates.particle_at(p, ParticleUnknown::AngularDisplacement))
            + rates.particle_at(p, ParticleUnknown::RotationDisplacement).abs()
                * particle.mean_node_radius();
        for _ in particle.nodes() {
            speed = speed.max(rigid + rates.node_at(slot, NodeUnknown::Normal).abs());
            slot += 1;
        }
    }
    speed
}
