//! Matrices sized by a mesh.

use super::{CsrStore, Diagonal, MatrixConfig, Operand, Product, SparseBackend, SparseMatrix};
use crate::error::{Error, Result};
use crate::mesh::{Mesh, MeshHandle};
use crate::sparse::CsrMatrix;
use nalgebra::DMatrix;

/// Sparse matrix of shape `n_equations * n_cells x n_variables * n_cells`
/// tied to one mesh.
///
/// After [`flush`](Self::flush) the storage is gone unless `cache` was set,
/// and every access returns [`Error::Released`].
#[derive(Debug, Clone)]
pub struct MeshMatrix<B: SparseBackend = CsrStore> {
    mesh: MeshHandle,
    n_variables: usize,
    n_equations: usize,
    matrix: Option<SparseMatrix<B>>,
    /// Keep the storage alive across `flush`.
    pub cache: bool,
}

/// Right-hand operand of a mesh matrix operation.
#[derive(Debug)]
pub enum MeshOperand<'a, B: SparseBackend> {
    Mesh(&'a MeshMatrix<B>),
    Plain(Operand<'a, B>),
}

impl<'a, B: SparseBackend> From<&'a MeshMatrix<B>> for MeshOperand<'a, B> {
    fn from(value: &'a MeshMatrix<B>) -> Self {
        MeshOperand::Mesh(value)
    }
}

impl<'a, B: SparseBackend> From<Operand<'a, B>> for MeshOperand<'a, B> {
    fn from(value: Operand<'a, B>) -> Self {
        MeshOperand::Plain(value)
    }
}

/// Result of a mesh matrix product.
#[derive(Debug, Clone)]
pub enum MeshProduct<B: SparseBackend> {
    /// Both operands lived on the same mesh.
    Mesh(MeshMatrix<B>),
    Plain(Product<B>),
}

impl<B: SparseBackend> MeshMatrix<B> {
    pub fn new(mesh: &dyn Mesh, n_variables: usize, n_equations: usize, config: &MatrixConfig) -> Self {
        Self::with_handle(mesh.handle(), n_variables, n_equations, config)
    }

    pub fn with_handle(
        mesh: MeshHandle,
        n_variables: usize,
        n_equations: usize,
        config: &MatrixConfig,
    ) -> Self {
        let rows = n_equations * mesh.n_cells;
        let cols = n_variables * mesh.n_cells;
        Self {
            mesh,
            n_variables,
            n_equations,
            matrix: Some(SparseMatrix::new(rows, cols, config)),
            cache: false,
        }
    }

    /// Square identity over the cells of `mesh`, written with `put`.
    pub fn identity(mesh: &dyn Mesh, config: &MatrixConfig) -> Result<Self> {
        let mut matrix = Self::new(mesh, 1, 1, config);
        matrix.matrix_mut()?.put_diagonal(Diagonal::Scalar(1.0))?;
        Ok(matrix)
    }

    fn wrap(&self, matrix: SparseMatrix<B>) -> Self {
        Self {
            mesh: self.mesh,
            n_variables: self.n_variables,
            n_equations: self.n_equations,
            matrix: Some(matrix),
            cache: false,
        }
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn n_variables(&self) -> usize {
        self.n_variables
    }

    pub fn n_equations(&self) -> usize {
        self.n_equations
    }

    pub fn shape(&self) -> (usize, usize) {
        (
            self.n_equations * self.mesh.n_cells,
            self.n_variables * self.mesh.n_cells,
        )
    }

    pub fn is_released(&self) -> bool {
        self.matrix.is_none()
    }

    pub fn matrix(&self) -> Result<&SparseMatrix<B>> {
        self.matrix.as_ref().ok_or(Error::Released)
    }

    pub fn matrix_mut(&mut self) -> Result<&mut SparseMatrix<B>> {
        self.matrix.as_mut().ok_or(Error::Released)
    }

    /// Release the storage unless `cache` is set.
    pub fn flush(&mut self) {
        if self.cache {
            log::trace!("keeping cached {:?} matrix", self.shape());
        } else if self.matrix.take().is_none() {
            log::warn!("flushing an already released {:?} matrix", self.shape());
        }
    }

    pub fn put(&mut self, values: &[f64], rows: &[usize], cols: &[usize]) -> Result<()> {
        self.matrix_mut()?.put(values, rows, cols)
    }

    pub fn add_at(&mut self, values: &[f64], rows: &[usize], cols: &[usize]) -> Result<()> {
        self.matrix_mut()?.add_at(values, rows, cols)
    }

    pub fn take_diagonal(&mut self) -> Result<Vec<f64>> {
        self.matrix_mut()?.take_diagonal()
    }

    pub fn mat_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.matrix()?.mat_vec(x)
    }

    pub fn to_csr(&mut self) -> Result<CsrMatrix> {
        self.matrix_mut()?.to_csr()
    }

    pub fn to_dense(&mut self) -> Result<DMatrix<f64>> {
        self.matrix_mut()?.to_dense()
    }

    /// Elementwise sum; the result stays on this mesh.
    pub fn add(&self, other: MeshOperand<'_, B>) -> Result<Self> {
        let sum = match other {
            MeshOperand::Mesh(other) => self.matrix()?.add(Operand::Matrix(other.matrix()?))?,
            MeshOperand::Plain(other) => self.matrix()?.add(other)?,
        };
        Ok(self.wrap(sum))
    }

    /// Product `self * other`. Two matrices on the same mesh give a mesh
    /// matrix; anything else gives a plain result.
    pub fn multiply(&self, other: MeshOperand<'_, B>) -> Result<MeshProduct<B>> {
        match other {
            MeshOperand::Mesh(other) if other.mesh.id == self.mesh.id => {
                let product = self.matrix()?.mat_mul(other.matrix()?)?;
                let mut result = self.wrap(product);
                result.n_variables = other.n_variables;
                Ok(MeshProduct::Mesh(result))
            }
            MeshOperand::Mesh(other) => {
                let product = self.matrix()?.mat_mul(other.matrix()?)?;
                Ok(MeshProduct::Plain(Product::Matrix(product)))
            }
            MeshOperand::Plain(other) => self.matrix()?.multiply(other).map(MeshProduct::Plain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Grid2D;

    #[test]
    fn test_shape_from_mesh() {
        let mesh = Grid2D::line(4, 1.0);
        let m = MeshMatrix::<CsrStore>::new(&mesh, 2, 3, &MatrixConfig::default());
        assert_eq!(m.shape(), (12, 8));
        assert_eq!(m.matrix().unwrap().shape(), (12, 8));
        assert_eq!(m.mesh(), mesh.handle());
    }

    #[test]
    fn test_identity() {
        let mesh = Grid2D::new(2, 3, 1.0, 1.0);
        let mut eye = MeshMatrix::<CsrStore>::identity(&mesh, &MatrixConfig::default()).unwrap();
        assert_eq!(eye.take_diagonal().unwrap(), vec![1.0; 6]);
        assert_eq!(eye.to_dense().unwrap(), DMatrix::identity(6, 6));
    }

    #[test]
    fn test_same_mesh_product_keeps_mesh() {
        let mesh = Grid2D::line(3, 1.0);
        let config = MatrixConfig::default();
        let mut a = MeshMatrix::<CsrStore>::identity(&mesh, &config).unwrap();
        a.put(&[2.0], &[0], &[1]).unwrap();
        let b = MeshMatrix::<CsrStore>::identity(&mesh, &config).unwrap();

        match a.multiply(MeshOperand::Mesh(&b)).unwrap() {
            MeshProduct::Mesh(mut product) => {
                assert_eq!(product.mesh(), mesh.handle());
                assert_eq!(product.to_dense().unwrap(), a.to_dense().unwrap());
            }
            MeshProduct::Plain(_) => panic!("expected a mesh matrix"),
        }
    }

    #[test]
    fn test_foreign_mesh_product_is_plain() {
        let config = MatrixConfig::default();
        let a = MeshMatrix::<CsrStore>::identity(&Grid2D::line(3, 1.0), &config).unwrap();
        let b = MeshMatrix::<CsrStore>::identity(&Grid2D::line(3, 1.0), &config).unwrap();

        let product = a.multiply(MeshOperand::Mesh(&b)).unwrap();
        assert!(matches!(product, MeshProduct::Plain(Product::Matrix(_))));
    }

    #[test]
    fn test_vector_product_is_plain() {
        let mesh = Grid2D::line(3, 1.0);
        let a = MeshMatrix::<CsrStore>::identity(&mesh, &MatrixConfig::default()).unwrap();
        let x = [1.0, 2.0, 3.0];
        match a.multiply(MeshOperand::Plain(Operand::Vector(&x))).unwrap() {
            MeshProduct::Plain(Product::Vector(y)) => assert_eq!(y, x.to_vec()),
            other => panic!("unexpected product {other:?}"),
        }
    }

    #[test]
    fn test_add_stays_on_mesh() {
        let mesh = Grid2D::line(2, 1.0);
        let config = MatrixConfig::default();
        let a = MeshMatrix::<CsrStore>::identity(&mesh, &config).unwrap();

        let mut sum = a.add(MeshOperand::Mesh(&a)).unwrap();
        assert_eq!(sum.mesh(), mesh.handle());
        assert_eq!(sum.take_diagonal().unwrap(), vec![2.0, 2.0]);

        let mut same = a.add(MeshOperand::Plain(Operand::Zero)).unwrap();
        assert_eq!(same.take_diagonal().unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_flush_releases_storage() {
        let mesh = Grid2D::line(2, 1.0);
        let mut m = MeshMatrix::<CsrStore>::identity(&mesh, &MatrixConfig::default()).unwrap();
        m.flush();
        assert!(m.is_released());
        assert!(matches!(m.take_diagonal(), Err(Error::Released)));
        assert!(matches!(m.put(&[1.0], &[0], &[0]), Err(Error::Released)));
    }

    #[test]
    fn test_flush_keeps_cached_storage() {
        let mesh = Grid2D::line(2, 1.0);
        let mut m = MeshMatrix::<CsrStore>::identity(&mesh, &MatrixConfig::default()).unwrap();
        m.cache = true;
        m.flush();
        assert!(!m.is_released());
        assert_eq!(m.take_diagonal().unwrap(), vec![1.0, 1.0]);
    }
}
