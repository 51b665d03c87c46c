//! Sparse LU solver backed by `faer`.
//!
//! Implements the [`LinearSolver`] trait using faer's sparse LU with
//! partial pivoting. The Lagrangian systems assembled by the solver are
//! symmetric but indefinite (saddle-point), so Cholesky does not apply.
//!
//! ## Workflow
//! 1. `factorize(matrix)`: converts CSR→CSC, computes symbolic + numeric LU
//! 2. `solve(rhs, solution)`: triangular solves with the cached factors

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::SparseColMat;
use faer::sparse::Triplet;

use crate::sparse::{CsrMatrix, LinearSolver};

/// Sparse LU solver using `faer`.
pub struct FaerLuSolver {
    factorization: Option<Lu<usize, f64>>,
    dimension: usize,
}

impl FaerLuSolver {
    /// Creates a new solver (unfactorized).
    pub fn new() -> Self {
        Self {
            factorization: None,
            dimension: 0,
        }
    }

    fn csr_to_csc(matrix: &CsrMatrix) -> Result<SparseColMat<usize, f64>, String> {
        let triplets: Vec<Triplet<usize, usize, f64>> = matrix
            .triplets()
            .map(|(row, col, val)| Triplet { row, col, val })
            .collect();

        SparseColMat::try_new_from_triplets(matrix.rows, matrix.cols, &triplets)
            .map_err(|e| format!("Failed to construct faer CSC matrix: {e:?}"))
    }
}

impl Default for FaerLuSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for FaerLuSolver {
    fn factorize(&mut self, matrix: &CsrMatrix) -> Result<(), String> {
        if matrix.rows != matrix.cols {
            return Err(format!(
                "Matrix must be square, got {}×{}",
                matrix.rows, matrix.cols
            ));
        }
        if matrix.rows == 0 {
            return Err("Cannot factorize empty matrix".into());
        }

        self.factorization = None;
        self.dimension = matrix.rows;

        let csc = Self::csr_to_csc(matrix)?;

        let symbolic = SymbolicLu::try_new(csc.symbolic())
            .map_err(|e| format!("Symbolic analysis failed: {e:?}"))?;

        let lu = Lu::try_new_with_symbolic(symbolic, csc.as_ref())
            .map_err(|e| format!("LU factorization failed: {e:?}"))?;

        self.factorization = Some(lu);
        Ok(())
    }

    fn solve(&self, rhs: &[f64], solution: &mut [f64]) -> Result<(), String> {
        let lu = self
            .factorization
            .as_ref()
            .ok_or_else(|| "Solver not factorized. Call factorize() first.".to_string())?;

        if rhs.len() != self.dimension || solution.len() != self.dimension {
            return Err(format!(
                "Vector lengths ({}, {}) != matrix dimension ({})",
                rhs.len(),
                solution.len(),
                self.dimension
            ));
        }

        let rhs_mat: faer::Mat<f64> = faer::Mat::from_fn(self.dimension, 1, |i, _| rhs[i]);
        let sol = lu.solve(&rhs_mat);

        for (i, slot) in solution.iter_mut().enumerate() {
            *slot = sol[(i, 0)];
        }

        if solution.iter().any(|v| !v.is_finite()) {
            return Err("LU solve produced non-finite values (singular matrix?)".into());
        }
        Ok(())
    }

    fn is_factorized(&self) -> bool {
        self.factorization.is_some()
    }
}
