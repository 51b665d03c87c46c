//! Sparse matrix representation and solver interface.
//!
//! Provides a CSR (Compressed Sparse Row) matrix built from
//! `(row, col, value)` triplets and a trait for sparse LU solvers.

use serde::{Deserialize, Serialize};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row pointer array (length = rows + 1).
    /// `row_ptr[i]..row_ptr[i+1]` are the indices into `col_idx` and `values`
    /// for non-zeros in row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices of non-zero entries, sorted within each row.
    pub col_idx: Vec<usize>,
    /// Non-zero values.
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Creates an empty CSR matrix with the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_ptr: vec![0; rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Returns the number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Creates a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries are summed. Entries outside the matrix bounds are
    /// a programming error and panic.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut per_row: Vec<Vec<(usize, f64)>> = vec![Vec::new(); rows];
        for &(r, c, v) in triplets {
            assert!(r < rows && c < cols, "triplet ({r}, {c}) outside {rows}×{cols}");
            per_row[r].push((c, v));
        }

        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        row_ptr.push(0);

        for mut entries in per_row {
            entries.sort_by_key(|&(c, _)| c);
            let mut last_col = None;
            for (c, v) in entries {
                if last_col == Some(c) {
                    if let Some(slot) = values.last_mut() {
                        *slot += v;
                    }
                } else {
                    col_idx.push(c);
                    values.push(v);
                    last_col = Some(c);
                }
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Returns the entry at `(row, col)`, zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        match self.col_idx[range.clone()].binary_search(&col) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => 0.0,
        }
    }

    /// Computes `y = A·x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.rows)
            .map(|row| {
                (self.row_ptr[row]..self.row_ptr[row + 1])
                    .map(|idx| self.values[idx] * x[self.col_idx[idx]])
                    .sum()
            })
            .collect()
    }

    /// Iterates all stored entries as `(row, col, value)`.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.rows).flat_map(move |row| {
            (self.row_ptr[row]..self.row_ptr[row + 1])
                .map(move |idx| (row, self.col_idx[idx], self.values[idx]))
        })
    }
}

/// Trait for sparse direct solvers of general (unsymmetric) square systems.
pub trait LinearSolver {
    /// Factorize the matrix.
    fn factorize(&mut self, matrix: &CsrMatrix) -> Result<(), String>;

    /// Solve Ax = b using the pre-computed factorization.
    /// Returns x in the provided output buffer.
    fn solve(&self, rhs: &[f64], solution: &mut [f64]) -> Result<(), String>;

    /// Returns true if the solver holds a valid factorization.
    fn is_factorized(&self) -> bool;
}
