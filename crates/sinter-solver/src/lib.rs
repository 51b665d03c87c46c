//! # sinter-solver
//!
//! Solver for two-dimensional particle sintering by the thermodynamic
//! extremal principle. Each step solves the stationarity conditions of a
//! Lagrangian for the rates of every particle and surface node, then moves
//! the state along those rates.
//!
//! ## Key Types
//!
//! - [`SessionBuilder`] / [`SolverSession`]: the run loop with validation,
//!   rollback and break conditions
//! - [`TepEvaluator`]: residual and Jacobian of the Lagrangian
//! - [`UnknownLayout`] / [`UnknownVector`]: indexing of the solver unknowns
//! - [`TimeStepper`]: single-stage, four-stage and trapezoidal schemes
//! - [`Norm`]: characteristic scales and normalization
//! - [`SolverConfig`]: serde configuration with presets

pub mod breaks;
pub mod config;
pub mod evaluator;
pub mod geometry;
pub mod hooks;
pub mod layout;
pub mod norm;
pub mod recovery;
pub mod session;
pub mod stepper;
pub mod unknowns;
pub mod update;
pub mod validator;

pub use breaks::{BreakCondition, BreakContext, PoreClosureCondition, StalledProgressCondition};
pub use config::{RootFinderKind, SolverConfig, StepWidthConfig, StepWidthMode, TimeStepperKind};
pub use evaluator::TepEvaluator;
pub use hooks::{Progress, ProgressHook, SessionHook};
pub use layout::{GlobalUnknown, NodeUnknown, ParticleUnknown, UnknownKey, UnknownLayout};
pub use norm::{Kinetics, Norm, NormalizedMaterials};
pub use recovery::{Recoverer, StateHistory};
pub use session::{
    AcceptedStep, CancellationToken, SessionBuilder, SessionInput, SessionStatistics,
    SimulationOutcome, SolverSession, StepOutcome, Termination,
};
pub use stepper::{
    FourStageStepper, SingleStageStepper, StepContext, StepProposal, StepWidthController,
    TimeStepper, TrapezoidalStepper,
};
pub use unknowns::UnknownVector;
pub use update::{advance, step_record};
pub use validator::{
    FiniteValuesValidator, InvalidStep, NeckRetreatValidator, OscillationValidator, StepValidator,
};
