//! Triplet to compressed-row conversion.
//!
//! Writes into a [`SparseMatrix`](crate::matrix::SparseMatrix) arrive as
//! unordered `(row, col, value)` triplets. Before they reach a backend they
//! are converted, one ownership range at a time, into a [`CsrBlock`]:
//!
//! 1. Drop triplets whose row is owned by someone else.
//! 2. Stable-sort the rest by `(row, col)` so duplicate positions keep their
//!    input order (last-write-wins for `put` depends on it).
//! 3. `row_ptr[k]` is the first sorted position whose row is `>= start + k`.
//!
//! Indices are stored as `i32`, matching the 32-bit addressing of the
//! compressed format most distributed backends accept.

use crate::error::{Error, Result};
use std::ops::Range;

/// Whether a write overwrites or accumulates into existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Overwrite; for duplicate positions the last write in input order wins.
    Insert,
    /// Accumulate; all writes to one position are summed.
    Add,
}

/// Compressed-row view of the triplets owned by one row range.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrBlock {
    /// First global row of the ownership range.
    pub row_start: usize,
    /// Offsets into `cols`/`vals`, length = owned rows + 1.
    pub row_ptr: Vec<i32>,
    /// Column index of each stored value.
    pub cols: Vec<i32>,
    /// Stored values.
    pub vals: Vec<f64>,
}

impl CsrBlock {
    /// Number of rows in the ownership range.
    pub fn n_rows(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    /// Number of stored values.
    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    /// Iterate `(global_row, col, value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n_rows()).flat_map(move |k| {
            let begin = self.row_ptr[k] as usize;
            let end = self.row_ptr[k + 1] as usize;
            (begin..end).map(move |idx| (self.row_start + k, self.cols[idx] as usize, self.vals[idx]))
        })
    }
}

/// Convert index arrays and values into CSR for the rows in `ownership`.
///
/// `i` holds column indices and `j` row indices, mirroring the argument
/// order compressed-row setters expect.
pub fn ijv_to_csr(i: &[usize], j: &[usize], v: &[f64], ownership: Range<usize>) -> Result<CsrBlock> {
    if i.len() != j.len() || i.len() != v.len() {
        return Err(Error::shape(format!(
            "triplet arrays differ in length: {} columns, {} rows, {} values",
            i.len(),
            j.len(),
            v.len()
        )));
    }
    if ownership.start > ownership.end {
        return Err(Error::shape(format!(
            "ownership range {}..{} is reversed",
            ownership.start, ownership.end
        )));
    }
    to_i32(ownership.end)?;

    let mut order: Vec<usize> = (0..j.len())
        .filter(|&k| ownership.contains(&j[k]))
        .collect();
    // sort_by_key is stable: duplicates keep input order
    order.sort_by_key(|&k| (j[k], i[k]));

    let sorted_rows: Vec<usize> = order.iter().map(|&k| j[k]).collect();
    let cols = order
        .iter()
        .map(|&k| to_i32(i[k]))
        .collect::<Result<Vec<_>>>()?;
    let vals = order.iter().map(|&k| v[k]).collect();

    let row_ptr = (ownership.start..=ownership.end)
        .map(|row| to_i32(sorted_rows.partition_point(|&r| r < row)))
        .collect::<Result<Vec<_>>>()?;

    Ok(CsrBlock {
        row_start: ownership.start,
        row_ptr,
        cols,
        vals,
    })
}

fn to_i32(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| Error::IndexOverflow(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorts_by_row_then_column() {
        // put([3, 10, pi, 2.5], rows [0, 0, 1, 2], cols [2, 1, 1, 0])
        let pi = std::f64::consts::PI;
        let block = ijv_to_csr(&[2, 1, 1, 0], &[0, 0, 1, 2], &[3.0, 10.0, pi, 2.5], 0..3).unwrap();

        assert_eq!(block.row_ptr, vec![0, 2, 3, 4]);
        assert_eq!(block.cols, vec![1, 2, 1, 0]);
        assert_eq!(block.vals, vec![10.0, 3.0, pi, 2.5]);
    }

    #[test]
    fn test_empty_rows_repeat_pointer() {
        let block = ijv_to_csr(&[0, 3], &[0, 3], &[1.0, 2.0], 0..5).unwrap();

        assert_eq!(block.row_ptr, vec![0, 1, 1, 1, 2, 2]);
        assert!(block.row_ptr.windows(2).all(|w| w[0] <= w[1]));
        let entries: Vec<_> = block.iter().collect();
        assert_eq!(entries, vec![(0, 0, 1.0), (3, 3, 2.0)]);
    }

    #[test]
    fn test_duplicates_keep_input_order() {
        let block = ijv_to_csr(&[1, 0, 1], &[0, 0, 0], &[5.0, 1.0, 7.0], 0..1).unwrap();

        assert_eq!(block.cols, vec![0, 1, 1]);
        assert_eq!(block.vals, vec![1.0, 5.0, 7.0]);
    }

    #[test]
    fn test_ownership_range_filters_rows() {
        let rows = [0, 1, 2, 3, 4, 2];
        let cols = [0, 1, 2, 3, 4, 0];
        let vals = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let block = ijv_to_csr(&cols, &rows, &vals, 2..4).unwrap();

        assert_eq!(block.row_start, 2);
        assert_eq!(block.row_ptr, vec![0, 2, 3]);
        assert_eq!(*block.row_ptr.last().unwrap() as usize, block.nnz());
        let entries: Vec<_> = block.iter().collect();
        assert_eq!(entries, vec![(2, 0, 6.0), (2, 2, 3.0), (3, 3, 4.0)]);
    }

    #[test]
    fn test_empty_ownership_range() {
        let block = ijv_to_csr(&[0], &[0], &[1.0], 3..3).unwrap();
        assert_eq!(block.row_ptr, vec![0]);
        assert_eq!(block.n_rows(), 0);
        assert_eq!(block.nnz(), 0);
    }

    #[test]
    fn test_column_overflow_rejected() {
        let too_big = i32::MAX as usize + 1;
        let result = ijv_to_csr(&[too_big], &[0], &[1.0], 0..1);
        assert!(matches!(result, Err(Error::IndexOverflow(i)) if i == too_big));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = ijv_to_csr(&[0, 1], &[0], &[1.0], 0..1);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }
}
