//! Root-finding vocabulary shared by the Newton and Broyden strategies.
//!
//! A [`ResidualFunction`] is a square nonlinear system `F(x) = 0`.
//! A [`RootFinder`] drives `‖F(x)‖₂` below an absolute tolerance or fails
//! with [`SinterError::IterationIntercepted`]; it never hands back a
//! non-converged vector.

use serde::{Deserialize, Serialize};
use sinter_types::{InterceptReason, SinterError, SinterResult};

use crate::sparse::CsrMatrix;

/// A square nonlinear system of equations.
pub trait ResidualFunction: Sync {
    /// Number of unknowns (and residual rows).
    fn dimension(&self) -> usize;

    /// Evaluates `F(x)`.
    fn residual(&self, x: &[f64]) -> SinterResult<Vec<f64>>;

    /// Evaluates the Jacobian `∂F/∂x`.
    ///
    /// Defaults to forward finite differences of [`residual`](Self::residual).
    fn jacobian(&self, x: &[f64]) -> SinterResult<CsrMatrix> {
        finite_difference_jacobian(self, x)
    }
}

/// Tolerances and budgets of a root-finding solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootFinderOptions {
    /// Convergence threshold on the Euclidean residual norm.
    pub absolute_tolerance: f64,
    /// Maximum number of outer iterations.
    pub max_iterations: u32,
    /// Lower bound of the line-search shrink factor per backtrack.
    pub min_step_fraction: f64,
    /// Upper bound of the line-search shrink factor per backtrack.
    pub max_step_fraction: f64,
}

impl Default for RootFinderOptions {
    fn default() -> Self {
        Self {
            absolute_tolerance: sinter_types::constants::DEFAULT_ABSOLUTE_TOLERANCE,
            max_iterations: sinter_types::constants::DEFAULT_MAX_ITERATIONS,
            min_step_fraction: 0.1,
            max_step_fraction: 0.5,
        }
    }
}

/// A converged root.
#[derive(Debug, Clone)]
pub struct RootSolution {
    pub x: Vec<f64>,
    pub iterations: u32,
    pub residual_norm: f64,
}

/// Strategy for solving `F(x) = 0`.
pub trait RootFinder: Send + Sync {
    /// Human-readable strategy name, also used as the loop name in errors.
    fn name(&self) -> &str;

    /// Solves the system starting from `initial`.
    fn find_root(
        &self,
        function: &dyn ResidualFunction,
        initial: Vec<f64>,
    ) -> SinterResult<RootSolution>;
}

/// Euclidean norm of a vector.
pub fn euclidean_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Forward-difference Jacobian of `function` at `x`.
pub fn finite_difference_jacobian<F: ResidualFunction + ?Sized>(
    function: &F,
    x: &[f64],
) -> SinterResult<CsrMatrix> {
    let n = function.dimension();
    let base = function.residual(x)?;
    let sqrt_eps = f64::EPSILON.sqrt();

    let mut triplets = Vec::new();
    let mut perturbed = x.to_vec();
    for col in 0..n {
        let h = sqrt_eps * x[col].abs().max(1.0);
        perturbed[col] = x[col] + h;
        let shifted = function.residual(&perturbed)?;
        perturbed[col] = x[col];
        for (row, (&f1, &f0)) in shifted.iter().zip(base.iter()).enumerate() {
            let d = (f1 - f0) / h;
            if d != 0.0 {
                triplets.push((row, col, d));
            }
        }
    }
    Ok(CsrMatrix::from_triplets(n, n, &triplets))
}

pub(crate) fn intercepted(loop_name: &str, iterations: u32, reason: InterceptReason) -> SinterError {
    SinterError::IterationIntercepted {
        loop_name: loop_name.to_string(),
        iterations,
        reason,
    }
}

/// Maps evaluator failures into loop interceptions, keeping structural errors intact.
pub(crate) fn intercept_evaluation(loop_name: &str, iterations: u32, err: SinterError) -> SinterError {
    if err.is_structural() {
        return err;
    }
    let reason = match err {
        SinterError::InvalidState(msg) => InterceptReason::InvalidState(msg),
        other => InterceptReason::Underlying(other.to_string()),
    };
    intercepted(loop_name, iterations, reason)
}

pub(crate) fn check_dimension(function: &dyn ResidualFunction, x: &[f64]) -> SinterResult<()> {
    if x.len() != function.dimension() {
        return Err(SinterError::LayoutMismatch(format!(
            "initial guess has {} entries, system has {}",
            x.len(),
            function.dimension()
        )));
    }
    Ok(())
}

pub(crate) fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}
