//! Damped Newton root finder with backtracking line search.
//!
//! Each iteration solves `J·Δx = −F` with a sparse LU factorization and
//! then backtracks along `Δx` on the merit function `φ = ½‖F‖²`. Rejected
//! trial fractions are replaced by the minimizer of the quadratic model
//! through `φ(0)`, `φ'(0)` and `φ(α)`, clamped to
//! `[min_step_fraction·α, max_step_fraction·α]`.

use sinter_types::{InterceptReason, SinterResult};
use tracing::trace;

use crate::faer_solver::FaerLuSolver;
use crate::root::{
    all_finite, check_dimension, euclidean_norm, intercept_evaluation, intercepted,
    ResidualFunction, RootFinder, RootFinderOptions, RootSolution,
};
use crate::sparse::{CsrMatrix, LinearSolver};

const LOOP_NAME: &str = "newton";

/// Newton-type root finder.
#[derive(Debug, Clone)]
pub struct NewtonRootFinder {
    pub options: RootFinderOptions,
    /// Sufficient-decrease parameter of the Armijo test.
    pub armijo: f64,
    /// Smallest step fraction tried before the line search gives up.
    pub min_alpha: f64,
}

impl NewtonRootFinder {
    pub fn new(options: RootFinderOptions) -> Self {
        Self {
            options,
            armijo: 1.0e-4,
            min_alpha: 1.0e-10,
        }
    }

    fn solve_direction(
        jacobian: &CsrMatrix,
        residual: &[f64],
        iteration: u32,
    ) -> SinterResult<Vec<f64>> {
        let mut solver = FaerLuSolver::new();
        solver
            .factorize(jacobian)
            .map_err(|e| intercepted(LOOP_NAME, iteration, InterceptReason::Underlying(e)))?;

        let rhs: Vec<f64> = residual.iter().map(|r| -r).collect();
        let mut direction = vec![0.0; rhs.len()];
        solver
            .solve(&rhs, &mut direction)
            .map_err(|e| intercepted(LOOP_NAME, iteration, InterceptReason::Underlying(e)))?;
        Ok(direction)
    }
}

impl Default for NewtonRootFinder {
    fn default() -> Self {
        Self::new(RootFinderOptions::default())
    }
}

impl RootFinder for NewtonRootFinder {
    fn name(&self) -> &str {
        LOOP_NAME
    }

    fn find_root(
        &self,
        function: &dyn ResidualFunction,
        initial: Vec<f64>,
    ) -> SinterResult<RootSolution> {
        check_dimension(function, &initial)?;

        let mut x = initial;
        let mut residual = function
            .residual(&x)
            .map_err(|e| intercept_evaluation(LOOP_NAME, 0, e))?;
        if !all_finite(&residual) {
            return Err(intercepted(
                LOOP_NAME,
                0,
                InterceptReason::InvalidState("initial residual is not finite".into()),
            ));
        }

        let mut iteration = 0;
        loop {
            let norm = euclidean_norm(&residual);
            trace!(iteration, residual = norm, "newton iteration");
            if norm <= self.options.absolute_tolerance {
                return Ok(RootSolution {
                    x,
                    iterations: iteration,
                    residual_norm: norm,
                });
            }
            if iteration >= self.options.max_iterations {
                return Err(intercepted(
                    LOOP_NAME,
                    iteration,
                    InterceptReason::MaxIterationsExceeded,
                ));
            }

            let jacobian = function
                .jacobian(&x)
                .map_err(|e| intercept_evaluation(LOOP_NAME, iteration, e))?;
            let direction = Self::solve_direction(&jacobian, &residual, iteration)?;

            // Line search on φ = ½‖F‖²; along the Newton direction φ'(0) = −2φ(0).
            let phi0 = 0.5 * norm * norm;
            let slope = -2.0 * phi0;
            let mut alpha = 1.0;
            loop {
                let trial: Vec<f64> = x
                    .iter()
                    .zip(direction.iter())
                    .map(|(xi, di)| xi + alpha * di)
                    .collect();
                let trial_residual = match function.residual(&trial) {
                    Ok(r) if all_finite(&r) => Some(r),
                    Ok(_) => None,
                    Err(e) if e.is_structural() => return Err(e),
                    Err(_) => None,
                };

                let phi = trial_residual
                    .as_ref()
                    .map_or(f64::INFINITY, |r| 0.5 * euclidean_norm(r).powi(2));

                if phi <= phi0 + self.armijo * alpha * slope {
                    if let Some(r) = trial_residual {
                        x = trial;
                        residual = r;
                        break;
                    }
                }

                let model = if phi.is_finite() {
                    -slope * alpha * alpha / (2.0 * (phi - phi0 - slope * alpha))
                } else {
                    self.options.min_step_fraction * alpha
                };
                alpha = model.clamp(
                    self.options.min_step_fraction * alpha,
                    self.options.max_step_fraction * alpha,
                );

                if alpha < self.min_alpha {
                    return Err(intercepted(
                        LOOP_NAME,
                        iteration,
                        InterceptReason::LineSearchFailed,
                    ));
                }
            }

            iteration += 1;
        }
    }
}
