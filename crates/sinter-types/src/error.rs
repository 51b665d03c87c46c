//! Error types for the sinter solver.
//!
//! All crates return `SinterResult<T>` from fallible operations.
//! Errors fall into two families: numeric failures that a session may
//! recover from by rolling back to a remembered state, and structural
//! failures that are never retried.

use std::fmt;

use thiserror::Error;

/// Why an iterative loop was stopped before converging.
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptReason {
    /// The iteration budget was exhausted.
    MaxIterationsExceeded,
    /// The iterate or its residual became non-finite.
    InvalidState(String),
    /// The line search could not find an acceptable step fraction.
    LineSearchFailed,
    /// A nested routine (linear solve, evaluator) failed.
    Underlying(String),
}

impl fmt::Display for InterceptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxIterationsExceeded => write!(f, "maximum iteration count exceeded"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::LineSearchFailed => write!(f, "line search failed"),
            Self::Underlying(msg) => write!(f, "{msg}"),
        }
    }
}

/// Unified error type for the sinter solver.
#[derive(Debug, Error)]
pub enum SinterError {
    /// A particle's node ring is not a single closed, consistent cycle.
    #[error("Malformed ring: {0}")]
    MalformedRing(String),

    /// A contact reference is dangling, one-sided or joins incompatible nodes.
    #[error("Invalid contact: {0}")]
    InvalidContact(String),

    /// A particle or interface refers to material data that was not supplied.
    #[error("Missing material: {0}")]
    MissingMaterial(String),

    /// Material parameter is out of valid range.
    #[error("Invalid material parameter: {0}")]
    InvalidMaterial(String),

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An unknown vector was combined with a vector or state of another layout.
    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),

    /// Geometry or residual evaluation produced non-finite values.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Linear solve failed (singular or unfactorizable matrix).
    #[error("Linear solve failed: {0}")]
    LinearSolve(String),

    /// An iterative loop was stopped before reaching its tolerance.
    #[error("Loop '{loop_name}' intercepted after {iterations} iterations: {reason}")]
    IterationIntercepted {
        loop_name: String,
        iterations: u32,
        reason: InterceptReason,
    },

    /// A stage of a time step could not be solved.
    #[error("Step stage {stage} failed: {source}")]
    StepFailed {
        stage: u32,
        #[source]
        source: Box<SinterError>,
    },

    /// The state history was exhausted while recovering from invalid steps.
    #[error("Recovery failed at t = {time:.4e} after {attempts} consecutive invalid steps")]
    RecoveryFailed { time: f64, attempts: u32 },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SinterError {
    /// True for malformed input that no amount of retrying can fix.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::MalformedRing(_)
            | Self::InvalidContact(_)
            | Self::MissingMaterial(_)
            | Self::InvalidMaterial(_)
            | Self::InvalidConfig(_)
            | Self::LayoutMismatch(_) => true,
            Self::StepFailed { source, .. } => source.is_structural(),
            _ => false,
        }
    }

    /// True for numeric failures a session may answer with a state rollback.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidState(_) | Self::LinearSolve(_) | Self::IterationIntercepted { .. } => {
                true
            }
            Self::StepFailed { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Convenience alias for `Result<T, SinterError>`.
pub type SinterResult<T> = Result<T, SinterError>;
