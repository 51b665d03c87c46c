//! # sinter-math
//!
//! Numeric primitives for the sinter TEP solver.
//!
//! Provides:
//! - Re-export of `glam::DVec2` as the planar vector type
//! - Polar/absolute coordinate transforms and angle normalization
//! - Sparse matrix representation (CSR) and an LU solver backed by `faer`
//! - Nonlinear root finders: damped Newton with line search, and Broyden

pub mod broyden;
pub mod faer_solver;
pub mod newton;
pub mod polar;
pub mod root;
pub mod sparse;

pub use glam::DVec2;

pub use broyden::{BroydenRootFinder, BroydenStart};
pub use faer_solver::FaerLuSolver;
pub use newton::NewtonRootFinder;
pub use polar::{normalize_angle, PolarCoordinates};
pub use root::{euclidean_norm, ResidualFunction, RootFinder, RootFinderOptions, RootSolution};
pub use sparse::{CsrMatrix, LinearSolver};
