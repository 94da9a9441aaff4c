//! Triplet lists produced by equation terms.
//!
//! Terms emit their matrix contribution as unordered (row, col, value)
//! triplets. Duplicates are legal and are summed when the list is
//! accumulated into a matrix with `add_at`.

use crate::error::{Error, Result};
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

/// Compressed Sparse Row matrix used as the interchange format between
/// backends and solvers.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Ephemeral (row, col, value) list with accumulate semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triplets {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl Triplets {
    /// Create an empty list for an `n_rows x n_cols` system.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::new(),
            cols: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Create with estimated capacity.
    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::with_capacity(nnz_estimate),
            cols: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Add a value at (row, col). Exact zeros are skipped.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows, "Row index out of bounds");
        debug_assert!(col < self.n_cols, "Column index out of bounds");

        if value != 0.0 {
            self.rows.push(row);
            self.cols.push(col);
            self.values.push(value);
        }
    }

    /// Add a value on the diagonal.
    pub fn add_diagonal(&mut self, index: usize, value: f64) {
        self.add(index, index, value);
    }

    /// Append every triplet of `other`.
    pub fn extend(&mut self, other: &Triplets) -> Result<()> {
        if other.shape() != self.shape() {
            return Err(Error::shape(format!(
                "cannot merge {:?} triplets into {:?}",
                other.shape(),
                self.shape()
            )));
        }
        self.rows.extend_from_slice(&other.rows);
        self.cols.extend_from_slice(&other.cols);
        self.values.extend_from_slice(&other.values);
        Ok(())
    }

    /// Declared (rows, cols) of the target system.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of stored triplets.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Whether no triplet has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Convert to CSR format, summing duplicate entries.
    pub fn to_csr(&self) -> Result<CsrMatrix> {
        let coo = CooMatrix::try_from_triplets(
            self.n_rows,
            self.n_cols,
            self.rows.clone(),
            self.cols.clone(),
            self.values.clone(),
        )
        .map_err(|e| Error::Backend(format!("invalid triplet data: {e}")))?;

        Ok(CsrMatrix::from(&coo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn test_triplets_to_csr() {
        let mut triplets = Triplets::new(3, 3);
        triplets.add(0, 0, 1.0);
        triplets.add(1, 1, 2.0);
        triplets.add(2, 2, 3.0);
        triplets.add(0, 1, 0.5);
        triplets.add(1, 0, 0.5);

        let csr = triplets.to_csr().unwrap();
        assert_eq!(csr.nrows(), 3);
        assert_eq!(csr.ncols(), 3);
        assert_eq!(csr.nnz(), 5);
    }

    #[test]
    fn test_duplicate_summation() {
        let mut triplets = Triplets::new(2, 2);
        triplets.add_diagonal(0, 1.0);
        triplets.add_diagonal(0, 2.0);
        triplets.add_diagonal(0, 3.0);

        let dense = DMatrix::from(&triplets.to_csr().unwrap());
        assert!((dense[(0, 0)] - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_values_skipped() {
        let mut triplets = Triplets::new(2, 2);
        triplets.add(0, 1, 0.0);
        triplets.add(1, 0, -0.0);
        assert!(triplets.is_empty());
    }

    #[test]
    fn test_extend_checks_shape() {
        let mut a = Triplets::new(2, 2);
        a.add(0, 0, 1.0);
        let mut b = Triplets::new(2, 2);
        b.add(1, 1, 4.0);
        a.extend(&b).unwrap();
        assert_eq!(a.nnz(), 2);
        assert_eq!(a.rows(), &[0, 1]);

        let c = Triplets::new(3, 3);
        assert!(matches!(a.extend(&c), Err(Error::ShapeMismatch(_))));
    }
}
