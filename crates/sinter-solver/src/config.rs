//! Solver configuration.
//!
//! Parameters that control a session: root-finding tolerances, history
//! depth, step-width control, break thresholds and the routines to use.
//! Widths and lengths are in normalized units.

use serde::{Deserialize, Serialize};
use sinter_math::{BroydenRootFinder, NewtonRootFinder, RootFinder, RootFinderOptions};
use sinter_types::constants::{
    DEFAULT_ABSOLUTE_TOLERANCE, DEFAULT_FRICTION_COEFFICIENT, DEFAULT_INSTABILITY_WINDOW,
    DEFAULT_MAX_ITERATIONS, DEFAULT_REMEMBERED_STATES,
};
use sinter_types::{SinterError, SinterResult};

use crate::stepper::{FourStageStepper, SingleStageStepper, TimeStepper, TrapezoidalStepper};

/// Root-finding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootFinderKind {
    /// Damped Newton with sparse LU.
    #[default]
    Newton,
    /// Derivative-free Broyden.
    Broyden,
}

/// Time-stepping scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStepperKind {
    /// One solve per step.
    #[default]
    SingleStage,
    /// Classical four-stage scheme with weights (1, 2, 2, 1)/6.
    FourStage,
    /// One solve averaged with the previous accepted rates.
    Trapezoidal,
}

/// How the step width is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepWidthMode {
    /// Always `fixed` (still subject to the recovery cap and end time).
    Fixed,
    /// Displacement-limited width.
    #[default]
    Adaptive,
}

/// Step-width control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepWidthConfig {
    pub mode: StepWidthMode,

    /// Width used in [`StepWidthMode::Fixed`].
    pub fixed: f64,

    /// Smallest admissible width.
    pub min: f64,

    /// Largest admissible width.
    pub max: f64,

    /// Largest node displacement per step, as a fraction of the shortest segment.
    pub max_displacement_fraction: f64,

    /// Largest ratio between consecutive widths.
    pub growth_factor: f64,

    /// Adaptive widths stay below this multiple of `h⁴/B`, with `h` the
    /// shortest segment and `B` the largest normalized `mobility·energy`.
    pub stability_fraction: f64,
}

impl Default for StepWidthConfig {
    fn default() -> Self {
        Self {
            mode: StepWidthMode::Adaptive,
            fixed: 1.0e-4,
            min: 1.0e-12,
            max: 1.0e-1,
            max_displacement_fraction: 0.1,
            growth_factor: 2.0,
            stability_fraction: 0.05,
        }
    }
}

/// Configuration for a solver session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Convergence threshold on the residual norm.
    pub absolute_tolerance: f64,

    /// Root-finder iteration budget per solve.
    pub max_iteration_count: u32,

    /// Lower clamp of the line-search shrink factor.
    pub min_step_fraction: f64,

    /// Upper clamp of the line-search shrink factor.
    pub max_step_fraction: f64,

    /// Depth of the rollback history.
    pub remembered_state_count: usize,

    /// A step width below this fraction of the largest width seen stalls the run.
    pub break_ratio: f64,

    /// Surface runs shorter than this fraction of the reference length close the pore.
    pub neck_distance_threshold: f64,

    pub root_finder: RootFinderKind,

    pub time_stepper: TimeStepperKind,

    pub step_width: StepWidthConfig,

    /// Alternating differences in a row that mark an unstable step.
    pub instability_window: usize,

    /// Rigid-body friction regularization `c_f`.
    pub friction_coefficient: f64,

    /// Distance (fraction of the reference length) under which unreferenced
    /// neck and grain-boundary nodes are paired up.
    pub contact_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: DEFAULT_ABSOLUTE_TOLERANCE,
            max_iteration_count: DEFAULT_MAX_ITERATIONS,
            min_step_fraction: 0.1,
            max_step_fraction: 0.5,
            remembered_state_count: DEFAULT_REMEMBERED_STATES,
            break_ratio: 1.0e-4,
            neck_distance_threshold: 0.05,
            root_finder: RootFinderKind::Newton,
            time_stepper: TimeStepperKind::SingleStage,
            step_width: StepWidthConfig::default(),
            instability_window: DEFAULT_INSTABILITY_WINDOW,
            friction_coefficient: DEFAULT_FRICTION_COEFFICIENT,
            contact_tolerance: 1.0e-6,
        }
    }
}

impl SolverConfig {
    /// Creates a fast config (single stage, looser tolerance, larger steps).
    pub fn coarse() -> Self {
        Self {
            absolute_tolerance: 1.0e-7,
            max_iteration_count: 20,
            step_width: StepWidthConfig {
                max_displacement_fraction: 0.2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Creates an accurate config (four-stage, tighter tolerance, smaller steps).
    pub fn precise() -> Self {
        Self {
            absolute_tolerance: 1.0e-11,
            max_iteration_count: 100,
            time_stepper: TimeStepperKind::FourStage,
            remembered_state_count: 10,
            instability_window: 4,
            step_width: StepWidthConfig {
                max_displacement_fraction: 0.05,
                growth_factor: 1.5,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Root-finder options derived from this config.
    pub fn root_finder_options(&self) -> RootFinderOptions {
        RootFinderOptions {
            absolute_tolerance: self.absolute_tolerance,
            max_iterations: self.max_iteration_count,
            min_step_fraction: self.min_step_fraction,
            max_step_fraction: self.max_step_fraction,
        }
    }

    /// Instantiates the configured root finder.
    pub fn build_root_finder(&self) -> Box<dyn RootFinder> {
        let options = self.root_finder_options();
        match self.root_finder {
            RootFinderKind::Newton => Box::new(NewtonRootFinder::new(options)),
            RootFinderKind::Broyden => Box::new(BroydenRootFinder::new(options)),
        }
    }

    /// Instantiates the configured time stepper.
    pub fn build_stepper(&self) -> Box<dyn TimeStepper> {
        match self.time_stepper {
            TimeStepperKind::SingleStage => Box::new(SingleStageStepper::new()),
            TimeStepperKind::FourStage => Box::new(FourStageStepper::new()),
            TimeStepperKind::Trapezoidal => Box::new(TrapezoidalStepper::new()),
        }
    }

    /// Checks ranges and orderings of every parameter.
    pub fn validate(&self) -> SinterResult<()> {
        let positive = [
            ("absolute_tolerance", self.absolute_tolerance),
            ("friction_coefficient", self.friction_coefficient),
            ("contact_tolerance", self.contact_tolerance),
            ("step_width.fixed", self.step_width.fixed),
            ("step_width.min", self.step_width.min),
            ("step_width.max", self.step_width.max),
            (
                "step_width.max_displacement_fraction",
                self.step_width.max_displacement_fraction,
            ),
            (
                "step_width.stability_fraction",
                self.step_width.stability_fraction,
            ),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SinterError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        let fractions = [
            ("min_step_fraction", self.min_step_fraction),
            ("max_step_fraction", self.max_step_fraction),
            ("break_ratio", self.break_ratio),
            ("neck_distance_threshold", self.neck_distance_threshold),
        ];
        for (name, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(SinterError::InvalidConfig(format!(
                    "{name} must lie in [0, 1), got {value}"
                )));
            }
        }
        if self.min_step_fraction > self.max_step_fraction {
            return Err(SinterError::InvalidConfig(
                "min_step_fraction exceeds max_step_fraction".into(),
            ));
        }
        if self.step_width.min > self.step_width.max {
            return Err(SinterError::InvalidConfig(
                "step_width.min exceeds step_width.max".into(),
            ));
        }
        if !self.step_width.growth_factor.is_finite() || self.step_width.growth_factor < 1.0 {
            return Err(SinterError::InvalidConfig(format!(
                "step_width.growth_factor must be at least 1, got {}",
                self.step_width.growth_factor
            )));
        }
        if self.max_iteration_count == 0 {
            return Err(SinterError::InvalidConfig(
                "max_iteration_count must be positive".into(),
            ));
        }
        if self.remembered_state_count == 0 {
            return Err(SinterError::InvalidConfig(
                "remembered_state_count must be positive".into(),
            ));
        }
        if self.instability_window < 2 {
            return Err(SinterError::InvalidConfig(format!(
                "instability_window must be at least 2, got {}",
                self.instability_window
            )));
        }
        Ok(())
    }
}
