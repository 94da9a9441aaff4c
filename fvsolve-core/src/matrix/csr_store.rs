//! Single-owner backend holding one nalgebra-sparse CSR matrix.

use super::backend::{
    apply_writes, csr_entries, csr_from_sorted, csr_get, csr_mat_vec, csr_mat_vec_transpose,
    csr_row_entries, CsrWrite, MatrixConfig, SparseBackend,
};
use crate::error::Result;
use crate::sparse::CsrMatrix;

/// CSR-backed storage.
#[derive(Debug, Clone)]
pub struct CsrStore {
    matrix: CsrMatrix,
}

impl CsrStore {
    /// Borrow the underlying CSR matrix.
    pub fn as_csr(&self) -> &CsrMatrix {
        &self.matrix
    }
}

impl SparseBackend for CsrStore {
    const NAME: &'static str = "csr";

    fn with_shape(rows: usize, cols: usize, _config: &MatrixConfig) -> Self {
        Self {
            matrix: CsrMatrix::zeros(rows, cols),
        }
    }

    fn from_csr(matrix: CsrMatrix, _config: &MatrixConfig) -> Result<Self> {
        Ok(Self { matrix })
    }

    fn shape(&self) -> (usize, usize) {
        (self.matrix.nrows(), self.matrix.ncols())
    }

    fn set_values_csr(&mut self, writes: &[CsrWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut entries = csr_entries(&self.matrix);
        apply_writes(&mut entries, writes);
        let (rows, cols) = self.shape();
        self.matrix = csr_from_sorted(rows, cols, 0, entries)?;
        Ok(())
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        csr_get(&self.matrix, row, col)
    }

    fn row_entries(&self, row: usize) -> Vec<(usize, f64)> {
        csr_row_entries(&self.matrix, row)
    }

    fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    fn to_csr(&self) -> Result<CsrMatrix> {
        Ok(self.matrix.clone())
    }

    fn mat_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(csr_mat_vec(&self.matrix, x))
    }

    fn mat_vec_transpose(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(csr_mat_vec_transpose(&self.matrix, x))
    }
}
