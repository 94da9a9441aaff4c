//! Sparse matrix algebra over pluggable storage backends.
//!
//! [`SparseMatrix`] is the uniform algebraic front end. Writes (`put`,
//! `add_at` and their diagonal forms) are validated, converted to CSR per
//! ownership range and queued while the matrix is [`AssemblyState::Open`].
//! Any read flushes the queue into the backend first, moving the matrix to
//! [`AssemblyState::Assembled`]; flushing an assembled matrix is a no-op.
//!
//! Mixed-operand arithmetic goes through the [`Operand`] tagged union rather
//! than operator overloading, so every combination is an explicit match arm.
//!
//! # Backends
//!
//! - [`CsrStore`]: one nalgebra-sparse CSR matrix.
//! - [`CooStore`]: canonical coordinate triplets.
//! - [`DistributedStore`]: contiguous row blocks, one per rank.

pub mod backend;
pub mod coo_store;
pub mod csr_store;
pub mod distributed;
pub mod market;
pub mod mesh_matrix;

pub use backend::{Communicator, CsrWrite, MatrixConfig, SparseBackend};
pub use coo_store::CooStore;
pub use csr_store::CsrStore;
pub use distributed::DistributedStore;
pub use mesh_matrix::{MeshMatrix, MeshOperand, MeshProduct};

use crate::csr::{ijv_to_csr, InsertMode};
use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;
use nalgebra::DMatrix;
use std::borrow::Cow;
use std::ops::Range;

/// Whether queued writes still have to reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyState {
    /// Writes pending, in call order.
    Open(Vec<CsrWrite>),
    /// Backend up to date; reads allowed.
    Assembled,
}

/// Right-hand operand of an algebraic operation.
#[derive(Debug)]
pub enum Operand<'a, B: SparseBackend> {
    /// Additive identity.
    Zero,
    Scalar(f64),
    Vector(&'a [f64]),
    Matrix(&'a SparseMatrix<B>),
}

impl<'a, B: SparseBackend> From<f64> for Operand<'a, B> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl<'a, B: SparseBackend> From<&'a [f64]> for Operand<'a, B> {
    fn from(value: &'a [f64]) -> Self {
        Operand::Vector(value)
    }
}

impl<'a, B: SparseBackend> From<&'a SparseMatrix<B>> for Operand<'a, B> {
    fn from(value: &'a SparseMatrix<B>) -> Self {
        Operand::Matrix(value)
    }
}

impl<B: SparseBackend> Operand<'_, B> {
    fn kind(&self) -> &'static str {
        match self {
            Operand::Zero => "zero",
            Operand::Scalar(_) => "scalar",
            Operand::Vector(_) => "vector",
            Operand::Matrix(_) => "matrix",
        }
    }
}

/// Result of a multiplication.
#[derive(Debug, Clone)]
pub enum Product<B: SparseBackend> {
    Matrix(SparseMatrix<B>),
    Vector(Vec<f64>),
}

impl<B: SparseBackend> Product<B> {
    /// The matrix result, or a TypeMismatch error.
    pub fn into_matrix(self) -> Result<SparseMatrix<B>> {
        match self {
            Product::Matrix(m) => Ok(m),
            Product::Vector(_) => Err(Error::TypeMismatch("product is a vector".into())),
        }
    }

    /// The vector result, or a TypeMismatch error.
    pub fn into_vector(self) -> Result<Vec<f64>> {
        match self {
            Product::Vector(v) => Ok(v),
            Product::Matrix(_) => Err(Error::TypeMismatch("product is a matrix".into())),
        }
    }
}

/// Values written along the diagonal.
#[derive(Debug, Clone, Copy)]
pub enum Diagonal<'a> {
    /// Broadcast to every diagonal entry.
    Scalar(f64),
    /// One value per leading diagonal entry.
    Values(&'a [f64]),
}

/// Row or column selector for [`SparseMatrix::item`].
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Single(usize),
    Range(Range<usize>),
}

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Index::Single(value)
    }
}

impl From<Range<usize>> for Index {
    fn from(value: Range<usize>) -> Self {
        Index::Range(value)
    }
}

impl Index {
    fn span(&self) -> Range<usize> {
        match self {
            Index::Single(i) => *i..*i + 1,
            Index::Range(r) => r.clone(),
        }
    }
}

/// Result of [`SparseMatrix::item`].
#[derive(Debug, Clone)]
pub enum Item<B: SparseBackend> {
    Scalar(f64),
    Matrix(SparseMatrix<B>),
}

/// Sparse matrix with a fixed shape over backend `B`.
#[derive(Debug, Clone)]
pub struct SparseMatrix<B: SparseBackend = CsrStore> {
    store: B,
    config: MatrixConfig,
    state: AssemblyState,
}

impl<B: SparseBackend> SparseMatrix<B> {
    /// Empty `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize, config: &MatrixConfig) -> Self {
        Self {
            store: B::with_shape(rows, cols, config),
            config: config.clone(),
            state: AssemblyState::Assembled,
        }
    }

    /// `size x size` identity, written with `put`.
    pub fn identity(size: usize, config: &MatrixConfig) -> Result<Self> {
        let mut matrix = Self::new(size, size, config);
        matrix.put_diagonal(Diagonal::Scalar(1.0))?;
        Ok(matrix)
    }

    /// Wrap an existing CSR matrix.
    pub fn from_csr(matrix: CsrMatrix, config: &MatrixConfig) -> Result<Self> {
        Ok(Self {
            store: B::from_csr(matrix, config)?,
            config: config.clone(),
            state: AssemblyState::Assembled,
        })
    }

    /// Logical (rows, cols); fixed for the life of the matrix.
    pub fn shape(&self) -> (usize, usize) {
        self.store.shape()
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn state(&self) -> &AssemblyState {
        &self.state
    }

    /// Name of the storage backend.
    pub fn backend_name(&self) -> &'static str {
        B::NAME
    }

    /// Flush pending writes into the backend. Idempotent.
    pub fn assemble(&mut self) -> Result<()> {
        if let AssemblyState::Open(pending) = &self.state {
            self.store.set_values_csr(pending)?;
            self.state = AssemblyState::Assembled;
        }
        Ok(())
    }

    /// Number of stored entries.
    pub fn nnz(&mut self) -> Result<usize> {
        self.assemble()?;
        Ok(self.store.nnz())
    }

    /// Assembled backend storage.
    pub fn store(&mut self) -> Result<&B> {
        self.assemble()?;
        Ok(&self.store)
    }

    /// Assembled copy in CSR form.
    pub fn to_csr(&mut self) -> Result<CsrMatrix> {
        self.assemble()?;
        self.store.to_csr()
    }

    /// Backend with every pending write applied; borrowed when nothing is
    /// pending.
    fn assembled(&self) -> Result<Cow<'_, B>> {
        match &self.state {
            AssemblyState::Assembled => Ok(Cow::Borrowed(&self.store)),
            AssemblyState::Open(pending) => {
                let mut store = self.store.clone();
                store.set_values_csr(pending)?;
                Ok(Cow::Owned(store))
            }
        }
    }

    fn wrap(&self, matrix: CsrMatrix) -> Result<Self> {
        Self::from_csr(matrix, &self.config)
    }

    fn check_indices(&self, rows: &[usize], cols: &[usize]) -> Result<()> {
        if rows.len() != cols.len() {
            return Err(Error::shape(format!(
                "{} row indices but {} column indices",
                rows.len(),
                cols.len()
            )));
        }
        let (n_rows, n_cols) = self.shape();
        for (&row, &col) in rows.iter().zip(cols) {
            if row >= n_rows || col >= n_cols {
                return Err(Error::IndexOutOfRange {
                    row,
                    col,
                    rows: n_rows,
                    cols: n_cols,
                });
            }
        }
        Ok(())
    }

    fn queue(&mut self, mode: InsertMode, values: &[f64], rows: &[usize], cols: &[usize]) -> Result<()> {
        if values.len() != rows.len() {
            return Err(Error::shape(format!(
                "{} values for {} positions",
                values.len(),
                rows.len()
            )));
        }
        self.check_indices(rows, cols)?;

        let writes = self
            .store
            .ownership_ranges()
            .into_iter()
            .map(|range| ijv_to_csr(cols, rows, values, range).map(|block| CsrWrite { mode, block }))
            .collect::<Result<Vec<_>>>()?;

        match &mut self.state {
            AssemblyState::Open(pending) => pending.extend(writes),
            AssemblyState::Assembled => self.state = AssemblyState::Open(writes),
        }
        Ok(())
    }

    /// Overwrite entries; for a repeated position the last value wins.
    pub fn put(&mut self, values: &[f64], rows: &[usize], cols: &[usize]) -> Result<()> {
        self.queue(InsertMode::Insert, values, rows, cols)
    }

    /// Accumulate into entries; repeated positions are summed.
    pub fn add_at(&mut self, values: &[f64], rows: &[usize], cols: &[usize]) -> Result<()> {
        self.queue(InsertMode::Add, values, rows, cols)
    }

    fn diagonal_values(&self, diagonal: Diagonal<'_>) -> Result<Vec<f64>> {
        let (rows, cols) = self.shape();
        let len = rows.min(cols);
        match diagonal {
            Diagonal::Scalar(value) => Ok(vec![value; len]),
            Diagonal::Values(values) if values.len() <= len => Ok(values.to_vec()),
            Diagonal::Values(values) => Err(Error::shape(format!(
                "{} diagonal values for a {}x{} matrix",
                values.len(),
                rows,
                cols
            ))),
        }
    }

    /// `put` restricted to the diagonal.
    pub fn put_diagonal(&mut self, diagonal: Diagonal<'_>) -> Result<()> {
        let values = self.diagonal_values(diagonal)?;
        let ids: Vec<usize> = (0..values.len()).collect();
        self.put(&values, &ids, &ids)
    }

    /// `add_at` restricted to the diagonal.
    pub fn add_at_diagonal(&mut self, diagonal: Diagonal<'_>) -> Result<()> {
        let values = self.diagonal_values(diagonal)?;
        let ids: Vec<usize> = (0..values.len()).collect();
        self.add_at(&values, &ids, &ids)
    }

    /// One value per positional (row, col) pair.
    pub fn take(&mut self, rows: &[usize], cols: &[usize]) -> Result<Vec<f64>> {
        self.check_indices(rows, cols)?;
        self.assemble()?;
        Ok(rows
            .iter()
            .zip(cols)
            .map(|(&row, &col)| self.store.get(row, col))
            .collect())
    }

    /// Diagonal entries `0..rows`.
    pub fn take_diagonal(&mut self) -> Result<Vec<f64>> {
        let (rows, cols) = self.shape();
        let ids: Vec<usize> = (0..rows.min(cols)).collect();
        self.take(&ids, &ids)
    }

    /// Stored (col, value) pairs of one row.
    pub fn row_entries(&mut self, row: usize) -> Result<Vec<(usize, f64)>> {
        let (rows, cols) = self.shape();
        if row >= rows {
            return Err(Error::IndexOutOfRange { row, col: 0, rows, cols });
        }
        self.assemble()?;
        Ok(self.store.row_entries(row))
    }

    /// Dense copy. Intended for tests and small matrices.
    pub fn to_dense(&mut self) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from(&self.to_csr()?))
    }

    /// Scalar for a single position, otherwise the selected block.
    pub fn item(&mut self, rows: impl Into<Index>, cols: impl Into<Index>) -> Result<Item<B>> {
        let (rows, cols) = (rows.into(), cols.into());
        let (n_rows, n_cols) = self.shape();
        let (row_span, col_span) = (rows.span(), cols.span());
        if row_span.start > row_span.end
            || row_span.end > n_rows
            || col_span.start > col_span.end
            || col_span.end > n_cols
        {
            return Err(Error::IndexOutOfRange {
                row: row_span.end.saturating_sub(1),
                col: col_span.end.saturating_sub(1),
                rows: n_rows,
                cols: n_cols,
            });
        }
        self.assemble()?;

        if let (Index::Single(row), Index::Single(col)) = (&rows, &cols) {
            return Ok(Item::Scalar(self.store.get(*row, *col)));
        }

        let mut entries = Vec::new();
        for row in row_span.clone() {
            for (col, value) in self.store.row_entries(row) {
                if col_span.contains(&col) {
                    entries.push(((row, col - col_span.start), value));
                }
            }
        }
        let block = backend::csr_from_sorted(row_span.len(), col_span.len(), row_span.start, entries)?;
        Ok(Item::Matrix(self.wrap(block)?))
    }

    fn combine(&self, other: Operand<'_, B>, sign: f64) -> Result<Self> {
        match other {
            Operand::Zero => Ok(self.clone()),
            Operand::Scalar(s) if s == 0.0 => Ok(self.clone()),
            Operand::Matrix(other) => {
                if other.shape() != self.shape() {
                    return Err(Error::shape(format!(
                        "cannot combine {:?} and {:?} matrices",
                        self.shape(),
                        other.shape()
                    )));
                }
                let lhs = self.assembled()?.to_csr()?;
                let rhs = other.assembled()?.to_csr()?;
                let sum = if sign > 0.0 { &lhs + &rhs } else { &lhs - &rhs };
                self.wrap(sum)
            }
            other => Err(Error::TypeMismatch(format!(
                "cannot add a {} to a sparse matrix",
                other.kind()
            ))),
        }
    }

    /// Elementwise sum; a zero operand returns an unchanged copy.
    pub fn add(&self, other: Operand<'_, B>) -> Result<Self> {
        self.combine(other, 1.0)
    }

    /// Elementwise difference `self - other`.
    pub fn subtract(&self, other: Operand<'_, B>) -> Result<Self> {
        self.combine(other, -1.0)
    }

    /// `other - self`, computed as `-self + other`.
    pub fn reflected_subtract(&self, other: Operand<'_, B>) -> Result<Self> {
        self.negate()?.add(other)
    }

    /// `-self`.
    pub fn negate(&self) -> Result<Self> {
        self.scale(-1.0)
    }

    /// Every entry multiplied by `factor`.
    pub fn scale(&self, factor: f64) -> Result<Self> {
        let mut csr = self.assembled()?.to_csr()?;
        csr.values_mut().iter_mut().for_each(|v| *v *= factor);
        self.wrap(csr)
    }

    /// Sparse product `self * other`.
    pub fn mat_mul(&self, other: &SparseMatrix<B>) -> Result<Self> {
        let (rows, inner) = self.shape();
        let (other_rows, other_cols) = other.shape();
        if inner != other_rows {
            return Err(Error::shape(format!(
                "cannot multiply {:?} by {:?}",
                self.shape(),
                other.shape()
            )));
        }
        let lhs = self.assembled()?.to_csr()?;
        let rhs = other.assembled()?.to_csr()?;
        log::trace!("sparse product {rows}x{inner} * {other_rows}x{other_cols}");
        self.wrap(&lhs * &rhs)
    }

    /// `self * x` for a vector of length `cols`.
    pub fn mat_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        let (_, cols) = self.shape();
        if x.len() != cols {
            return Err(Error::shape(format!(
                "vector of length {} for a matrix with {} columns",
                x.len(),
                cols
            )));
        }
        self.assembled()?.mat_vec(x)
    }

    /// `selfᵀ * x` for a vector of length `rows`.
    pub fn vec_mat(&self, x: &[f64]) -> Result<Vec<f64>> {
        let (rows, _) = self.shape();
        if x.len() != rows {
            return Err(Error::shape(format!(
                "vector of length {} for a matrix with {} rows",
                x.len(),
                rows
            )));
        }
        self.assembled()?.mat_vec_transpose(x)
    }

    /// Dispatch `self * other` on the operand kind.
    pub fn multiply(&self, other: Operand<'_, B>) -> Result<Product<B>> {
        match other {
            Operand::Matrix(other) => self.mat_mul(other).map(Product::Matrix),
            Operand::Scalar(s) => self.scale(s).map(Product::Matrix),
            Operand::Vector(x) => self.mat_vec(x).map(Product::Vector),
            Operand::Zero => Err(Error::TypeMismatch(
                "multiplication by the additive identity is undefined".into(),
            )),
        }
    }

    /// `other * self`. A vector operand is a row vector, so the result is
    /// the transpose product `selfᵀ · other`.
    pub fn reflected_multiply(&self, other: Operand<'_, B>) -> Result<Product<B>> {
        match other {
            Operand::Vector(x) => self.vec_mat(x).map(Product::Vector),
            Operand::Matrix(other) => other.mat_mul(self).map(Product::Matrix),
            other => self.multiply(other),
        }
    }

    /// `‖self · x − b‖₂`.
    pub fn residual_norm(&mut self, x: &[f64], b: &[f64]) -> Result<f64> {
        self.assemble()?;
        let ax = self.mat_vec(x)?;
        if b.len() != ax.len() {
            return Err(Error::shape(format!(
                "right-hand side of length {} for {} rows",
                b.len(),
                ax.len()
            )));
        }
        Ok(ax
            .iter()
            .zip(b)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn example<B: SparseBackend>(config: &MatrixConfig) -> SparseMatrix<B> {
        let mut m = SparseMatrix::<B>::new(3, 3, config);
        m.put(&[3.0, 10.0, PI, 2.5], &[0, 0, 1, 2], &[2, 1, 1, 0]).unwrap();
        m
    }

    fn assert_dense_eq(actual: &DMatrix<f64>, expected: &[[f64; 3]; 3], eps: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(actual[(i, j)], expected[i][j], epsilon = eps);
            }
        }
    }

    fn put_then_add_at<B: SparseBackend>(config: &MatrixConfig) {
        let mut m = example::<B>(config);
        m.add_at(&[1.73, 2.2, 8.4, 3.9, 1.23], &[1, 2, 0, 0, 1], &[2, 2, 0, 0, 2])
            .unwrap();

        let dense = m.to_dense().unwrap();
        assert_dense_eq(
            &dense,
            &[[12.3, 10.0, 3.0], [0.0, PI, 2.96], [2.5, 0.0, 2.2]],
            1e-6,
        );
    }

    #[test]
    fn test_put_then_add_at_every_backend() {
        put_then_add_at::<CsrStore>(&MatrixConfig::default());
        put_then_add_at::<CooStore>(&MatrixConfig::default());
        put_then_add_at::<DistributedStore>(&MatrixConfig {
            communicator: Communicator::new(2),
            ..Default::default()
        });
    }

    #[test]
    fn test_writes_open_the_matrix_and_reads_assemble_it() {
        let mut m = SparseMatrix::<CsrStore>::new(2, 2, &MatrixConfig::default());
        assert_eq!(m.state(), &AssemblyState::Assembled);

        m.put(&[1.0], &[0], &[1]).unwrap();
        m.add_at(&[2.0], &[0], &[1]).unwrap();
        assert!(matches!(m.state(), AssemblyState::Open(pending) if pending.len() == 2));

        assert_eq!(m.take(&[0], &[1]).unwrap(), vec![3.0]);
        assert_eq!(m.state(), &AssemblyState::Assembled);

        m.assemble().unwrap();
        assert_eq!(m.take(&[0], &[1]).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_put_last_write_wins() {
        let mut m = SparseMatrix::<CsrStore>::new(2, 2, &MatrixConfig::default());
        m.put(&[1.0, 4.0, 7.0], &[1, 0, 1], &[0, 1, 0]).unwrap();
        assert_eq!(m.take(&[1, 0], &[0, 1]).unwrap(), vec![7.0, 4.0]);
    }

    #[test]
    fn test_add_at_accumulates_across_calls() {
        let mut m = SparseMatrix::<CooStore>::new(2, 2, &MatrixConfig::default());
        m.add_at(&[1.5], &[1], &[1]).unwrap();
        m.add_at(&[2.25], &[1], &[1]).unwrap();
        assert_eq!(m.take(&[1], &[1]).unwrap(), vec![3.75]);
    }

    #[test]
    fn test_take_is_positional() {
        let mut m = example::<CsrStore>(&MatrixConfig::default());
        let values = m.take(&[0, 2, 1], &[1, 0, 2]).unwrap();
        assert_eq!(values, vec![10.0, 2.5, 0.0]);
    }

    #[test]
    fn test_to_dense_matches_take() {
        let mut m = example::<DistributedStore>(&MatrixConfig {
            communicator: Communicator::new(3),
            ..Default::default()
        });
        let dense = m.to_dense().unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(dense[(i, j)], m.take(&[i], &[j]).unwrap()[0]);
            }
        }
    }

    #[test]
    fn test_add_zero_is_identity() {
        let mut m = example::<CsrStore>(&MatrixConfig::default());
        let mut sum = m.add(Operand::Zero).unwrap();
        assert_eq!(sum.to_dense().unwrap(), m.to_dense().unwrap());

        let mut sum = m.add(0.0.into()).unwrap();
        assert_eq!(sum.to_dense().unwrap(), m.to_dense().unwrap());
    }

    #[test]
    fn test_add_identity_matrix() {
        let config = MatrixConfig::default();
        let m = example::<CsrStore>(&config);
        let eye = SparseMatrix::<CsrStore>::identity(3, &config).unwrap();

        let mut sum = m.add(Operand::Matrix(&eye)).unwrap();
        assert_dense_eq(
            &sum.to_dense().unwrap(),
            &[[1.0, 10.0, 3.0], [0.0, PI + 1.0, 0.0], [2.5, 0.0, 1.0]],
            1e-12,
        );

        let mut reflected = eye.add(Operand::Matrix(&m)).unwrap();
        assert_eq!(reflected.to_dense().unwrap(), sum.to_dense().unwrap());
    }

    #[test]
    fn test_matrix_combined_with_itself() {
        let m = example::<CsrStore>(&MatrixConfig::default());
        assert!(matches!(m.state(), AssemblyState::Open(_)));

        let mut doubled = m.add(Operand::Matrix(&m)).unwrap();
        assert_eq!(doubled.take(&[0, 1, 2], &[1, 1, 0]).unwrap(), vec![20.0, 2.0 * PI, 5.0]);

        let mut zero = m.subtract(Operand::Matrix(&m)).unwrap();
        assert_eq!(zero.to_dense().unwrap(), DMatrix::zeros(3, 3));

        let mut square = m.multiply(Operand::Matrix(&m)).unwrap().into_matrix().unwrap();
        let mut dense = m.clone();
        let dense = dense.to_dense().unwrap();
        let expected = &dense * &dense;
        for (a, b) in square.to_dense().unwrap().iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10);
        }

        // Read-only algebra leaves pending writes queued.
        assert!(matches!(m.state(), AssemblyState::Open(_)));
    }

    #[test]
    fn test_add_nonzero_scalar_rejected() {
        let m = example::<CsrStore>(&MatrixConfig::default());
        assert!(matches!(m.add(3.0.into()), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_add_shape_mismatch() {
        let config = MatrixConfig::default();
        let a = SparseMatrix::<CsrStore>::new(2, 3, &config);
        let b = SparseMatrix::<CsrStore>::new(3, 2, &config);
        assert!(matches!(a.add(Operand::Matrix(&b)), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_subtract_and_reflected_subtract() {
        let config = MatrixConfig::default();
        let a = example::<CooStore>(&config);
        let eye = SparseMatrix::<CooStore>::identity(3, &config).unwrap();

        let mut diff = a.subtract(Operand::Matrix(&eye)).unwrap();
        let mut reflected = a.reflected_subtract(Operand::Matrix(&eye)).unwrap();
        let diff = diff.to_dense().unwrap();
        let reflected = reflected.to_dense().unwrap();

        assert_relative_eq!(diff[(1, 1)], PI - 1.0, epsilon = 1e-12);
        assert_relative_eq!(reflected[(1, 1)], 1.0 - PI, epsilon = 1e-12);
        assert_eq!(diff, -reflected);
    }

    #[test]
    fn test_matrix_product_matches_dense() {
        let config = MatrixConfig::default();
        let mut l1 = example::<CsrStore>(&config);
        let mut l2 = SparseMatrix::<CsrStore>::identity(3, &config).unwrap();
        l2.put(&[4.38, 12357.2, 1.1], &[2, 1, 0], &[1, 0, 2]).unwrap();

        let expected = l1.to_dense().unwrap() * l2.to_dense().unwrap();
        let mut product = l1.multiply(Operand::Matrix(&l2)).unwrap().into_matrix().unwrap();
        let product = product.to_dense().unwrap();

        assert_dense_eq(
            &product,
            &[
                [1.23572e5, 23.14, 3.0],
                [3.88212887e4, PI, 0.0],
                [2.5, 0.0, 2.75],
            ],
            1e-4,
        );
        for (a, b) in product.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rectangular_product_shape() {
        let config = MatrixConfig::default();
        let mut a = SparseMatrix::<CooStore>::new(2, 3, &config);
        a.put(&[1.0, 2.0], &[0, 1], &[2, 0]).unwrap();
        let mut b = SparseMatrix::<CooStore>::new(3, 4, &config);
        b.put(&[5.0, 7.0], &[2, 0], &[3, 1]).unwrap();

        let mut c = a.mat_mul(&b).unwrap();
        assert_eq!(c.shape(), (2, 4));
        assert_eq!(c.take(&[0, 1], &[3, 1]).unwrap(), vec![5.0, 14.0]);

        assert!(matches!(b.mat_mul(&a), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_vector_products() {
        let l1 = example::<CsrStore>(&MatrixConfig::default());
        let x = [1.0, 2.0, 3.0];

        let right = l1.multiply(Operand::Vector(&x)).unwrap().into_vector().unwrap();
        assert_relative_eq!(right[0], 29.0, epsilon = 1e-8);
        assert_relative_eq!(right[1], 2.0 * PI, epsilon = 1e-8);
        assert_relative_eq!(right[2], 2.5, epsilon = 1e-8);

        let left = l1.reflected_multiply(Operand::Vector(&x)).unwrap().into_vector().unwrap();
        assert_relative_eq!(left[0], 7.5, epsilon = 1e-8);
        assert_relative_eq!(left[1], 10.0 + 2.0 * PI, epsilon = 1e-8);
        assert_relative_eq!(left[2], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_vector_length_mismatch() {
        let l1 = example::<CsrStore>(&MatrixConfig::default());
        let x = [1.0, 2.0];
        assert!(matches!(l1.multiply(Operand::Vector(&x)), Err(Error::ShapeMismatch(_))));
        assert!(matches!(l1.multiply(Operand::Zero), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_scalar_multiply() {
        let l1 = example::<CooStore>(&MatrixConfig::default());
        let mut scaled = l1.multiply(2.0.into()).unwrap().into_matrix().unwrap();
        assert_eq!(scaled.take(&[0, 2], &[1, 0]).unwrap(), vec![20.0, 5.0]);
        assert_eq!(scaled.shape(), (3, 3));
    }

    #[test]
    fn test_diagonal_forms() {
        let mut m = SparseMatrix::<CsrStore>::new(3, 3, &MatrixConfig::default());
        m.put_diagonal(Diagonal::Values(&[3.0, 10.0, PI])).unwrap();
        m.put_diagonal(Diagonal::Values(&[10.0, 3.0])).unwrap();
        assert_eq!(m.take_diagonal().unwrap(), vec![10.0, 3.0, PI]);

        m.add_at_diagonal(Diagonal::Scalar(1.0)).unwrap();
        assert_eq!(m.take_diagonal().unwrap(), vec![11.0, 4.0, PI + 1.0]);

        let too_long = [1.0; 4];
        assert!(matches!(
            m.put_diagonal(Diagonal::Values(&too_long)),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_identity_diagonal_and_off_diagonal() {
        let mut eye = SparseMatrix::<DistributedStore>::identity(
            5,
            &MatrixConfig {
                communicator: Communicator::new(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(eye.take_diagonal().unwrap(), vec![1.0; 5]);
        assert_eq!(eye.take(&[0, 4, 2], &[1, 3, 0]).unwrap(), vec![0.0; 3]);
    }

    #[test]
    fn test_out_of_range_writes_fail_fast() {
        let mut m = SparseMatrix::<CsrStore>::new(2, 2, &MatrixConfig::default());
        let result = m.put(&[1.0], &[2], &[0]);
        assert!(matches!(result, Err(Error::IndexOutOfRange { row: 2, col: 0, .. })));
        assert!(matches!(m.add_at(&[1.0, 2.0], &[0], &[0]), Err(Error::ShapeMismatch(_))));
        assert_eq!(m.state(), &AssemblyState::Assembled);
    }

    #[test]
    fn test_item_scalar_and_block() {
        let mut m = example::<CsrStore>(&MatrixConfig::default());

        match m.item(0, 1).unwrap() {
            Item::Scalar(v) => assert_eq!(v, 10.0),
            Item::Matrix(_) => panic!("expected a scalar"),
        }

        match m.item(0..2, 1..3).unwrap() {
            Item::Matrix(mut block) => {
                assert_eq!(block.shape(), (2, 2));
                let dense = block.to_dense().unwrap();
                assert_eq!(dense[(0, 0)], 10.0);
                assert_eq!(dense[(0, 1)], 3.0);
                assert_eq!(dense[(1, 0)], PI);
                assert_eq!(dense[(1, 1)], 0.0);
            }
            Item::Scalar(_) => panic!("expected a block"),
        }

        match m.item(2, 0..3).unwrap() {
            Item::Matrix(mut row) => assert_eq!(row.take(&[0], &[0]).unwrap(), vec![2.5]),
            Item::Scalar(_) => panic!("expected a row"),
        }

        assert!(m.item(3, 0).is_err());
    }

    #[test]
    fn test_residual_norm() {
        let config = MatrixConfig::default();
        let mut eye = SparseMatrix::<CsrStore>::identity(2, &config).unwrap();
        let r = eye.residual_norm(&[1.0, 2.0], &[4.0, 6.0]).unwrap();
        assert_relative_eq!(r, 5.0, epsilon = 1e-12);
    }
}
