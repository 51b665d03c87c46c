//! Broyden quasi-Newton root finder.
//!
//! Derivative-free: the inverse Jacobian approximation `H ≈ J⁻¹` is
//! seeded from a finite-difference Jacobian (or the identity) and then
//! corrected by Broyden's rank-one update
//!
//! ```text
//! H ← H + (s − H·y)·(sᵀ·H) / (sᵀ·H·y)
//! ```
//!
//! with `s` the accepted step and `y` the change in residual.

use faer::linalg::solvers::Solve;
use serde::{Deserialize, Serialize};
use sinter_types::{InterceptReason, SinterResult};
use tracing::trace;

use crate::root::{
    all_finite, check_dimension, euclidean_norm, finite_difference_jacobian,
    intercept_evaluation, intercepted, ResidualFunction, RootFinder, RootFinderOptions,
    RootSolution,
};

const LOOP_NAME: &str = "broyden";

/// How the inverse Jacobian approximation is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroydenStart {
    /// Invert a forward-difference Jacobian at the initial guess.
    #[default]
    FiniteDifference,
    /// Start from the identity.
    Identity,
}

/// Quasi-Newton root finder.
#[derive(Debug, Clone)]
pub struct BroydenRootFinder {
    pub options: RootFinderOptions,
    pub start: BroydenStart,
    /// Number of step halvings tried when a step increases the residual.
    pub max_halvings: u32,
}

impl BroydenRootFinder {
    pub fn new(options: RootFinderOptions) -> Self {
        Self {
            options,
            start: BroydenStart::default(),
            max_halvings: 20,
        }
    }

    pub fn with_start(mut self, start: BroydenStart) -> Self {
        self.start = start;
        self
    }

    /// Dense row-major inverse Jacobian approximation at `x`.
    fn initial_inverse(&self, function: &dyn ResidualFunction, x: &[f64]) -> SinterResult<Vec<f64>> {
        let n = x.len();
        let mut inverse = vec![0.0; n * n];
        match self.start {
            BroydenStart::Identity => {
                for i in 0..n {
                    inverse[i * n + i] = 1.0;
                }
            }
            BroydenStart::FiniteDifference => {
                let jacobian = finite_difference_jacobian(function, x)
                    .map_err(|e| intercept_evaluation(LOOP_NAME, 0, e))?;
                let dense = faer::Mat::from_fn(n, n, |i, j| jacobian.get(i, j));
                let identity = faer::Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 });
                let lu = dense.partial_piv_lu();
                let solved = lu.solve(&identity);
                for i in 0..n {
                    for j in 0..n {
                        inverse[i * n + j] = solved[(i, j)];
                    }
                }
                if !all_finite(&inverse) {
                    return Err(intercepted(
                        LOOP_NAME,
                        0,
                        InterceptReason::Underlying("singular initial Jacobian".into()),
                    ));
                }
            }
        }
        Ok(inverse)
    }
}

impl Default for BroydenRootFinder {
    fn default() -> Self {
        Self::new(RootFinderOptions::default())
    }
}

fn mat_vec(m: &[f64], v: &[f64]) -> Vec<f64> {
    let n = v.len();
    (0..n)
        .map(|i| m[i * n..(i + 1) * n].iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

fn vec_mat(v: &[f64], m: &[f64]) -> Vec<f64> {
    let n = v.len();
    let mut out = vec![0.0; n];
    for (i, vi) in v.iter().enumerate() {
        for (j, slot) in out.iter_mut().enumerate() {
            *slot += vi * m[i * n + j];
        }
    }
    out
}

impl RootFinder for BroydenRootFinder {
    fn name(&self) -> &str {
        LOOP_NAME
    }

    fn find_root(
        &self,
        function: &dyn ResidualFunction,
        initial: Vec<f64>,
    ) -> SinterResult<RootSolution> {
        check_dimension(function, &initial)?;
        let n = initial.len();

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
        let mut inverse = self.initial_inverse(function, &x)?;

        let mut iteration = 0;
        loop {
            let norm = euclidean_norm(&residual);
            trace!(iteration, residual = norm, "broyden iteration");
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

            let direction: Vec<f64> = mat_vec(&inverse, &residual).iter().map(|d| -d).collect();

            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..=self.max_halvings {
                let trial: Vec<f64> = x
                    .iter()
                    .zip(direction.iter())
                    .map(|(xi, di)| xi + alpha * di)
                    .collect();
                match function.residual(&trial) {
                    Ok(r) if all_finite(&r) && euclidean_norm(&r) < norm => {
                        accepted = Some((trial, r));
                        break;
                    }
                    Err(e) if e.is_structural() => return Err(e),
                    _ => alpha *= 0.5,
                }
            }
            let Some((next_x, next_residual)) = accepted else {
                return Err(intercepted(
                    LOOP_NAME,
                    iteration,
                    InterceptReason::LineSearchFailed,
                ));
            };

            let s: Vec<f64> = next_x.iter().zip(&x).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = next_residual.iter().zip(&residual).map(|(a, b)| a - b).collect();
            let hy = mat_vec(&inverse, &y);
            let denominator: f64 = s.iter().zip(&hy).map(|(a, b)| a * b).sum();
            if denominator.abs() > 1.0e-14 {
                let st_h = vec_mat(&s, &inverse);
                for i in 0..n {
                    let coefficient = (s[i] - hy[i]) / denominator;
                    for j in 0..n {
                        inverse[i * n + j] += coefficient * st_h[j];
                    }
                }
            }

            x = next_x;
            residual = next_residual;
            iteration += 1;
        }
    }
}
