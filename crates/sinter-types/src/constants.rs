//! Physical constants and solver defaults.

/// Universal gas constant (J/(mol·K)).
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// Default absolute tolerance on the residual norm of a root-finding solve.
pub const DEFAULT_ABSOLUTE_TOLERANCE: f64 = 1.0e-9;

/// Default iteration budget of a root-finding solve.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Default number of remembered states available for recovery.
pub const DEFAULT_REMEMBERED_STATES: usize = 5;

/// Default number of consecutive alternating-sign differences flagged as instability.
pub const DEFAULT_INSTABILITY_WINDOW: usize = 5;

/// Default friction coefficient regularizing rigid-body modes (normalized units).
pub const DEFAULT_FRICTION_COEFFICIENT: f64 = 1.0e-3;

/// Epsilon for floating-point comparisons.
pub const EPSILON: f64 = 1.0e-12;

/// Segments shorter than this (normalized units) are treated as degenerate.
pub const DEGENERATE_LENGTH_THRESHOLD: f64 = 1.0e-12;
