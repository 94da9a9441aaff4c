//! Coordinate-list backend.
//!
//! Entries are kept as three parallel vectors in canonical (row, col) order
//! with no duplicates, so lookups are a binary search over position pairs.

use super::backend::{apply_writes, csr_from_sorted, CsrWrite, EntryMap, MatrixConfig, SparseBackend};
use crate::error::Result;
use crate::sparse::CsrMatrix;

/// COO-backed storage.
#[derive(Debug, Clone)]
pub struct CooStore {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl CooStore {
    fn position(&self, row: usize, col: usize) -> std::result::Result<usize, usize> {
        let begin = self.rows.partition_point(|&r| r < row);
        let end = self.rows.partition_point(|&r| r <= row);
        self.cols[begin..end]
            .binary_search(&col)
            .map(|pos| begin + pos)
            .map_err(|pos| begin + pos)
    }

    fn entries(&self) -> EntryMap {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((&r, &c), &v)| ((r, c), v))
            .collect()
    }
}

impl SparseBackend for CooStore {
    const NAME: &'static str = "coo";

    fn with_shape(rows: usize, cols: usize, config: &MatrixConfig) -> Self {
        let capacity = config.effective_bandwidth(rows, cols) * rows;
        Self {
            n_rows: rows,
            n_cols: cols,
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    fn from_csr(matrix: CsrMatrix, _config: &MatrixConfig) -> Result<Self> {
        let mut store = Self {
            n_rows: matrix.nrows(),
            n_cols: matrix.ncols(),
            rows: Vec::with_capacity(matrix.nnz()),
            cols: Vec::with_capacity(matrix.nnz()),
            values: Vec::with_capacity(matrix.nnz()),
        };
        for (row, col, &value) in matrix.triplet_iter() {
            store.rows.push(row);
            store.cols.push(col);
            store.values.push(value);
        }
        Ok(store)
    }

    fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    fn set_values_csr(&mut self, writes: &[CsrWrite]) -> Result<()> {
        let mut entries = self.entries();
        apply_writes(&mut entries, writes);

        self.rows.clear();
        self.cols.clear();
        self.values.clear();
        for ((row, col), value) in entries {
            self.rows.push(row);
            self.cols.push(col);
            self.values.push(value);
        }
        Ok(())
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        match self.position(row, col) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    fn row_entries(&self, row: usize) -> Vec<(usize, f64)> {
        let begin = self.rows.partition_point(|&r| r < row);
        let end = self.rows.partition_point(|&r| r <= row);
        (begin..end).map(|k| (self.cols[k], self.values[k])).collect()
    }

    fn nnz(&self) -> usize {
        self.values.len()
    }

    fn to_csr(&self) -> Result<CsrMatrix> {
        csr_from_sorted(self.n_rows, self.n_cols, 0, self.entries())
    }
}
