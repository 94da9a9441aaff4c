//! Boundary conditions.
//!
//! Applied after every term has been summed into the matrix, on
//! scalar (one equation, one variable) systems.

use crate::error::{Error, Result};
use crate::matrix::{MeshMatrix, SparseBackend};
use crate::mesh::{FaceRegion, Mesh};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Condition on a set of boundary faces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// Dirichlet: the owning cell's row becomes `φ = value`.
    FixedValue { faces: Vec<usize>, value: f64 },
    /// Neumann: outward flux per unit area, moved to the right-hand side.
    FixedFlux { faces: Vec<usize>, value: f64 },
}

impl BoundaryCondition {
    pub fn fixed_value(mesh: &dyn Mesh, region: FaceRegion, value: f64) -> Self {
        BoundaryCondition::FixedValue {
            faces: mesh.faces(region),
            value,
        }
    }

    pub fn fixed_flux(mesh: &dyn Mesh, region: FaceRegion, value: f64) -> Self {
        BoundaryCondition::FixedFlux {
            faces: mesh.faces(region),
            value,
        }
    }

    pub fn faces(&self) -> &[usize] {
        match self {
            BoundaryCondition::FixedValue { faces, .. } | BoundaryCondition::FixedFlux { faces, .. } => faces,
        }
    }

    /// Owning cell of every face, failing on faces that are not on the
    /// boundary.
    fn cells(&self, mesh: &dyn Mesh) -> Result<Vec<(usize, usize)>> {
        self.faces()
            .iter()
            .map(|&face| {
                if face >= mesh.n_faces() {
                    return Err(Error::Mesh(format!(
                        "face {face} out of range for a mesh with {} faces",
                        mesh.n_faces()
                    )));
                }
                match mesh.face_cells(face) {
                    (cell, None) => Ok((face, cell)),
                    (_, Some(_)) => Err(Error::Mesh(format!("face {face} is not a boundary face"))),
                }
            })
            .collect()
    }

    /// Patch an assembled matrix and right-hand side.
    ///
    /// Fixed values turn each owning cell's row into an identity row and
    /// eliminate its column, moving `a_ic·value` to the right-hand side, so
    /// a symmetric system stays symmetric. They are idempotent. Fixed fluxes
    /// accumulate, so apply them once per assembly pass.
    pub fn apply_to<B: SparseBackend>(
        &self,
        mesh: &dyn Mesh,
        matrix: &mut MeshMatrix<B>,
        rhs: &mut [f64],
    ) -> Result<()> {
        let (n_rows, _) = matrix.shape();
        if rhs.len() != n_rows {
            return Err(Error::shape(format!(
                "right-hand side of length {} for {} rows",
                rhs.len(),
                n_rows
            )));
        }
        let cells = self.cells(mesh)?;
        match self {
            BoundaryCondition::FixedValue { value, .. } => {
                let fixed: BTreeSet<usize> = cells.into_iter().map(|(_, cell)| cell).collect();

                // One read of the assembled matrix, one batched write back.
                let csr = matrix.to_csr()?;
                let mut rows = Vec::new();
                let mut cols = Vec::new();
                for (row, col, &a) in csr.triplet_iter() {
                    let eliminated = fixed.contains(&col);
                    if row == col || !(eliminated || fixed.contains(&row)) {
                        continue;
                    }
                    if eliminated {
                        rhs[row] -= a * value;
                    }
                    rows.push(row);
                    cols.push(col);
                }
                let mut values = vec![0.0; rows.len()];
                for &cell in &fixed {
                    rows.push(cell);
                    cols.push(cell);
                    values.push(1.0);
                    rhs[cell] = *value;
                }
                matrix.put(&values, &rows, &cols)?;
            }
            BoundaryCondition::FixedFlux { value, .. } => {
                for (face, cell) in cells {
                    rhs[cell] -= value * mesh.face_area(face);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{AssemblyState, CsrStore, MatrixConfig};
    use crate::mesh::Grid2D;

    fn laplacian(mesh: &Grid2D) -> MeshMatrix<CsrStore> {
        let mut m = MeshMatrix::new(mesh, 1, 1, &MatrixConfig::default());
        let n = mesh.n_cells();
        for i in 0..n {
            m.add_at(&[2.0], &[i], &[i]).unwrap();
            if i + 1 < n {
                m.add_at(&[-1.0, -1.0], &[i, i + 1], &[i + 1, i]).unwrap();
            }
        }
        m
    }

    #[test]
    fn test_fixed_value_rewrites_row_and_column() {
        let mesh = Grid2D::line(3, 1.0);
        let mut m = laplacian(&mesh);
        let mut rhs = vec![0.0; 3];

        let bc = BoundaryCondition::fixed_value(&mesh, FaceRegion::Right, 5.0);
        bc.apply_to(&mesh, &mut m, &mut rhs).unwrap();

        let a = m.to_dense().unwrap();
        assert_eq!(a[(2, 2)], 1.0);
        assert_eq!(a[(2, 1)], 0.0);
        assert_eq!(a[(1, 2)], 0.0);
        assert_eq!(a[(1, 1)], 2.0);
        assert_eq!(a[(1, 0)], -1.0);
        assert_eq!(rhs, vec![0.0, 5.0, 5.0]);
    }

    #[test]
    fn test_fixed_values_keep_matrix_symmetric() {
        let mesh = Grid2D::new(4, 3, 1.0, 1.0);
        let mut m = laplacian(&mesh);
        let mut rhs = vec![1.0; mesh.n_cells()];

        BoundaryCondition::fixed_value(&mesh, FaceRegion::Left, 0.0)
            .apply_to(&mesh, &mut m, &mut rhs)
            .unwrap();
        BoundaryCondition::fixed_value(&mesh, FaceRegion::Right, 2.0)
            .apply_to(&mesh, &mut m, &mut rhs)
            .unwrap();

        let a = m.to_dense().unwrap();
        assert_eq!(a, a.transpose());
        for cell in [0, 3, 4, 7, 8, 11] {
            assert_eq!(a[(cell, cell)], 1.0);
        }
        assert_eq!(rhs[3], 2.0);
        assert_eq!(rhs[0], 0.0);
        // Cell 2 couples to cell 3 through the chain ordering of `laplacian`.
        assert_eq!(rhs[2], 3.0);
    }

    #[test]
    fn test_fixed_value_writes_back_in_one_batch() {
        let mesh = Grid2D::new(3, 3, 1.0, 1.0);
        let mut m = laplacian(&mesh);
        m.matrix_mut().unwrap().assemble().unwrap();
        let mut rhs = vec![0.0; mesh.n_cells()];

        BoundaryCondition::fixed_value(&mesh, FaceRegion::Top, 1.0)
            .apply_to(&mesh, &mut m, &mut rhs)
            .unwrap();

        match m.matrix().unwrap().state() {
            AssemblyState::Open(pending) => assert_eq!(pending.len(), 1),
            AssemblyState::Assembled => panic!("expected queued writes"),
        }
    }

    #[test]
    fn test_short_rhs_rejected() {
        let mesh = Grid2D::line(3, 1.0);
        let mut m = laplacian(&mesh);
        let mut rhs = vec![0.0; 2];

        let bc = BoundaryCondition::fixed_value(&mesh, FaceRegion::Right, 1.0);
        assert!(matches!(bc.apply_to(&mesh, &mut m, &mut rhs), Err(Error::ShapeMismatch(_))));
        let bc = BoundaryCondition::fixed_flux(&mesh, FaceRegion::Right, 1.0);
        assert!(matches!(bc.apply_to(&mesh, &mut m, &mut rhs), Err(Error::ShapeMismatch(_))));
        assert_eq!(rhs, vec![0.0, 0.0]);
    }

    #[test]
    fn test_fixed_value_idempotent() {
        let mesh = Grid2D::line(3, 1.0);
        let bc = BoundaryCondition::fixed_value(&mesh, FaceRegion::Left, 2.0);

        let mut once = laplacian(&mesh);
        let mut rhs_once = vec![0.0; 3];
        bc.apply_to(&mesh, &mut once, &mut rhs_once).unwrap();

        let mut twice = laplacian(&mesh);
        let mut rhs_twice = vec![0.0; 3];
        bc.apply_to(&mesh, &mut twice, &mut rhs_twice).unwrap();
        bc.apply_to(&mesh, &mut twice, &mut rhs_twice).unwrap();

        assert_eq!(once.to_dense().unwrap(), twice.to_dense().unwrap());
        assert_eq!(rhs_once, rhs_twice);
    }

    #[test]
    fn test_fixed_flux_touches_rhs_only() {
        let mesh = Grid2D::new(2, 1, 1.0, 3.0);
        let mut m = laplacian(&mesh);
        let before = m.to_dense().unwrap();
        let mut rhs = vec![1.0, 1.0];

        let bc = BoundaryCondition::fixed_flux(&mesh, FaceRegion::Left, 0.5);
        bc.apply_to(&mesh, &mut m, &mut rhs).unwrap();

        assert_eq!(m.to_dense().unwrap(), before);
        assert_eq!(rhs, vec![-0.5, 1.0]);
    }

    #[test]
    fn test_interior_face_rejected() {
        let mesh = Grid2D::line(3, 1.0);
        let mut m = laplacian(&mesh);
        let mut rhs = vec![0.0; 3];
        let bc = BoundaryCondition::FixedValue {
            faces: vec![1],
            value: 0.0,
        };
        assert!(matches!(bc.apply_to(&mesh, &mut m, &mut rhs), Err(Error::Mesh(_))));

        let bc = BoundaryCondition::FixedFlux {
            faces: vec![99],
            value: 0.0,
        };
        assert!(matches!(bc.apply_to(&mesh, &mut m, &mut rhs), Err(Error::Mesh(_))));
    }
}
