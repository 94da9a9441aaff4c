//! Row-distributed backend.
//!
//! Rows are split into contiguous ownership blocks, one per rank of the
//! [`Communicator`](super::backend::Communicator). Each block stores its rows
//! as a local CSR matrix spanning every column. Writes are routed to the
//! block whose range they were converted for, and block-local work (write
//! flushing, mat-vec) runs in parallel with Rayon.

use super::backend::{
    apply_writes, csr_entries, csr_from_sorted, csr_get, csr_mat_vec, csr_row_entries, CsrWrite,
    EntryMap, MatrixConfig, SparseBackend,
};
use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;
use rayon::prelude::*;
use std::ops::Range;

#[derive(Debug, Clone)]
struct RowBlock {
    range: Range<usize>,
    local: CsrMatrix,
}

impl RowBlock {
    fn flush(&mut self, writes: &[&CsrWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let n_cols = self.local.ncols();
        let mut entries: EntryMap = csr_entries(&self.local)
            .into_iter()
            .map(|((row, col), value)| ((row + self.range.start, col), value))
            .collect();
        for write in writes {
            apply_writes(&mut entries, std::slice::from_ref(*write));
        }
        self.local = csr_from_sorted(self.range.len(), n_cols, self.range.start, entries)?;
        Ok(())
    }
}

/// Storage split into per-rank row blocks.
#[derive(Debug, Clone)]
pub struct DistributedStore {
    n_rows: usize,
    n_cols: usize,
    blocks: Vec<RowBlock>,
}

impl DistributedStore {
    fn block_of(&self, row: usize) -> &RowBlock {
        let idx = self.blocks.partition_point(|b| b.range.end <= row);
        &self.blocks[idx.min(self.blocks.len() - 1)]
    }

    /// Number of row owners.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl SparseBackend for DistributedStore {
    const NAME: &'static str = "distributed";

    fn with_shape(rows: usize, cols: usize, config: &MatrixConfig) -> Self {
        let blocks = config
            .communicator
            .partition(rows)
            .into_iter()
            .map(|range| RowBlock {
                local: CsrMatrix::zeros(range.len(), cols),
                range,
            })
            .collect();
        Self {
            n_rows: rows,
            n_cols: cols,
            blocks,
        }
    }

    fn from_csr(matrix: CsrMatrix, config: &MatrixConfig) -> Result<Self> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        let offsets = matrix.row_offsets();
        let blocks = config
            .communicator
            .partition(rows)
            .into_iter()
            .map(|range| {
                let (begin, end) = (offsets[range.start], offsets[range.end]);
                let local_offsets = offsets[range.start..=range.end]
                    .iter()
                    .map(|&o| o - begin)
                    .collect();
                let local = CsrMatrix::try_from_csr_data(
                    range.len(),
                    cols,
                    local_offsets,
                    matrix.col_indices()[begin..end].to_vec(),
                    matrix.values()[begin..end].to_vec(),
                )
                .map_err(|e| Error::Backend(format!("invalid row block {range:?}: {e}")))?;
                Ok(RowBlock { range, local })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            n_rows: rows,
            n_cols: cols,
            blocks,
        })
    }

    fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    fn ownership_ranges(&self) -> Vec<Range<usize>> {
        self.blocks.iter().map(|b| b.range.clone()).collect()
    }

    fn set_values_csr(&mut self, writes: &[CsrWrite]) -> Result<()> {
        for write in writes {
            let owned = self
                .blocks
                .iter()
                .any(|b| b.range.start == write.block.row_start && b.range.len() == write.block.n_rows());
            if !owned {
                return Err(Error::Backend(format!(
                    "no owner for rows {}..{}",
                    write.block.row_start,
                    write.block.row_start + write.block.n_rows()
                )));
            }
        }
        self.blocks.par_iter_mut().try_for_each(|block| {
            let mine: Vec<&CsrWrite> = writes
                .iter()
                .filter(|w| w.block.row_start == block.range.start && w.block.n_rows() == block.range.len())
                .collect();
            block.flush(&mine)
        })
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        let block = self.block_of(row);
        csr_get(&block.local, row - block.range.start, col)
    }

    fn row_entries(&self, row: usize) -> Vec<(usize, f64)> {
        let block = self.block_of(row);
        csr_row_entries(&block.local, row - block.range.start)
    }

    fn nnz(&self) -> usize {
        self.blocks.iter().map(|b| b.local.nnz()).sum()
    }

    fn to_csr(&self) -> Result<CsrMatrix> {
        let entries = self.blocks.iter().flat_map(|b| {
            b.local
                .triplet_iter()
                .map(move |(row, col, &value)| ((row + b.range.start, col), value))
        });
        csr_from_sorted(self.n_rows, self.n_cols, 0, entries)
    }

    fn mat_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        let parts: Vec<Vec<f64>> = self
            .blocks
            .par_iter()
            .map(|b| csr_mat_vec(&b.local, x))
            .collect();
        Ok(parts.concat())
    }

    fn mat_vec_transpose(&self, x: &[f64]) -> Result<Vec<f64>> {
        let n_cols = self.n_cols;
        let partial = self
            .blocks
            .par_iter()
            .map(|b| {
                let mut y = vec![0.0; n_cols];
                for (row, col, &value) in b.local.triplet_iter() {
                    y[col] += value * x[row + b.range.start];
                }
                y
            })
            .reduce(
                || vec![0.0; n_cols],
                |mut acc, y| {
                    acc.iter_mut().zip(&y).for_each(|(a, b)| *a += b);
                    acc
                },
            );
        Ok(partial)
    }
}
