//! Storage backend interface and shared CSR kernels.
//!
//! A backend owns the numeric storage of one matrix. It only ever sees
//! writes that have already been converted to [`CsrBlock`]s for one of its
//! ownership ranges, and it is only read after the owning
//! [`SparseMatrix`](super::SparseMatrix) has flushed those writes.

use crate::csr::{CsrBlock, InsertMode};
use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Process layout handed to backends at construction.
///
/// Row-distributed backends split their rows into one contiguous block per
/// rank; single-owner backends ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Communicator {
    /// Number of row owners.
    pub n_ranks: usize,
}

impl Communicator {
    /// Single owner for every row.
    pub fn serial() -> Self {
        Self { n_ranks: 1 }
    }

    /// Communicator with `n_ranks` owners (at least one).
    pub fn new(n_ranks: usize) -> Self {
        Self {
            n_ranks: n_ranks.max(1),
        }
    }

    /// Contiguous row ranges, one per rank; the first `n_rows % n_ranks`
    /// ranks own one extra row.
    pub fn partition(&self, n_rows: usize) -> Vec<Range<usize>> {
        let n_ranks = self.n_ranks.max(1);
        let base = n_rows / n_ranks;
        let extra = n_rows % n_ranks;
        let mut start = 0;
        (0..n_ranks)
            .map(|rank| {
                let len = base + usize::from(rank < extra);
                let range = start..start + len;
                start += len;
                range
            })
            .collect()
    }
}

impl Default for Communicator {
    fn default() -> Self {
        Self::serial()
    }
}

/// Construction options shared by every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Row distribution.
    pub communicator: Communicator,
    /// Expected nonzeros per row, used for preallocation only.
    pub bandwidth: usize,
    /// Estimated total nonzeros; derives `bandwidth` when that is zero.
    pub size_hint: Option<usize>,
}

impl MatrixConfig {
    /// Bandwidth used for preallocating a `rows x cols` matrix.
    pub fn effective_bandwidth(&self, rows: usize, cols: usize) -> usize {
        match (self.bandwidth, self.size_hint) {
            (0, Some(hint)) => hint / rows.max(cols).max(1),
            (bandwidth, _) => bandwidth,
        }
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            communicator: Communicator::serial(),
            bandwidth: 0,
            size_hint: None,
        }
    }
}

/// One converted `put`/`add_at` call waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrWrite {
    pub mode: InsertMode,
    pub block: CsrBlock,
}

/// Numeric storage behind a [`SparseMatrix`](super::SparseMatrix).
///
/// Every implementation must give identical answers for the same sequence
/// of writes; the algebra layer relies on `to_csr`/`from_csr` round trips.
pub trait SparseBackend: Clone + fmt::Debug + Send + Sync {
    /// Short backend name for diagnostics.
    const NAME: &'static str;

    /// Empty `rows x cols` storage.
    fn with_shape(rows: usize, cols: usize, config: &MatrixConfig) -> Self;

    /// Storage holding the entries of an existing CSR matrix.
    fn from_csr(matrix: CsrMatrix, config: &MatrixConfig) -> Result<Self>;

    /// Logical (rows, cols).
    fn shape(&self) -> (usize, usize);

    /// Contiguous row blocks, one per owner.
    fn ownership_ranges(&self) -> Vec<Range<usize>> {
        vec![0..self.shape().0]
    }

    /// Apply converted writes in order.
    fn set_values_csr(&mut self, writes: &[CsrWrite]) -> Result<()>;

    /// Stored value at (row, col), zero when absent.
    fn get(&self, row: usize, col: usize) -> f64;

    /// Stored (col, value) pairs of one row in column order.
    fn row_entries(&self, row: usize) -> Vec<(usize, f64)>;

    /// Number of stored entries.
    fn nnz(&self) -> usize;

    /// Copy of the storage in CSR form.
    fn to_csr(&self) -> Result<CsrMatrix>;

    /// `A x`.
    fn mat_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(csr_mat_vec(&self.to_csr()?, x))
    }

    /// `Aᵀ x`.
    fn mat_vec_transpose(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(csr_mat_vec_transpose(&self.to_csr()?, x))
    }
}

pub(crate) type EntryMap = BTreeMap<(usize, usize), f64>;

pub(crate) fn apply_writes(entries: &mut EntryMap, writes: &[CsrWrite]) {
    for write in writes {
        for (row, col, value) in write.block.iter() {
            match write.mode {
                InsertMode::Insert => {
                    entries.insert((row, col), value);
                }
                InsertMode::Add => {
                    *entries.entry((row, col)).or_insert(0.0) += value;
                }
            }
        }
    }
}

pub(crate) fn csr_entries(csr: &CsrMatrix) -> EntryMap {
    csr.triplet_iter()
        .map(|(row, col, &value)| ((row, col), value))
        .collect()
}

/// Build a CSR matrix from entries sorted by (row, col), rows offset by
/// `row_offset` so local blocks can be built from global entries.
pub(crate) fn csr_from_sorted(
    n_rows: usize,
    n_cols: usize,
    row_offset: usize,
    entries: impl IntoIterator<Item = ((usize, usize), f64)>,
) -> Result<CsrMatrix> {
    let mut row_offsets = vec![0usize; n_rows + 1];
    let mut col_indices = Vec::new();
    let mut values = Vec::new();
    for ((row, col), value) in entries {
        row_offsets[row - row_offset + 1] += 1;
        col_indices.push(col);
        values.push(value);
    }
    for k in 0..n_rows {
        row_offsets[k + 1] += row_offsets[k];
    }
    CsrMatrix::try_from_csr_data(n_rows, n_cols, row_offsets, col_indices, values)
        .map_err(|e| Error::Backend(format!("invalid CSR layout: {e}")))
}

pub(crate) fn csr_get(csr: &CsrMatrix, row: usize, col: usize) -> f64 {
    let offsets = csr.row_offsets();
    let (begin, end) = (offsets[row], offsets[row + 1]);
    let cols = &csr.col_indices()[begin..end];
    match cols.binary_search(&col) {
        Ok(pos) => csr.values()[begin + pos],
        Err(_) => 0.0,
    }
}

pub(crate) fn csr_row_entries(csr: &CsrMatrix, row: usize) -> Vec<(usize, f64)> {
    let offsets = csr.row_offsets();
    let (begin, end) = (offsets[row], offsets[row + 1]);
    csr.col_indices()[begin..end]
        .iter()
        .copied()
        .zip(csr.values()[begin..end].iter().copied())
        .collect()
}

pub(crate) fn csr_mat_vec(csr: &CsrMatrix, x: &[f64]) -> Vec<f64> {
    let offsets = csr.row_offsets();
    let cols = csr.col_indices();
    let vals = csr.values();
    (0..csr.nrows())
        .map(|row| {
            (offsets[row]..offsets[row + 1])
                .map(|idx| vals[idx] * x[cols[idx]])
                .sum()
        })
        .collect()
}

pub(crate) fn csr_mat_vec_transpose(csr: &CsrMatrix, x: &[f64]) -> Vec<f64> {
    let offsets = csr.row_offsets();
    let cols = csr.col_indices();
    let vals = csr.values();
    let mut y = vec![0.0; csr.ncols()];
    for row in 0..csr.nrows() {
        for idx in offsets[row]..offsets[row + 1] {
            y[cols[idx]] += vals[idx] * x[row];
        }
    }
    y
}
