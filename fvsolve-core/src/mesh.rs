//! Mesh collaborator for finite-volume discretization.
//!
//! The solver core never builds meshes itself; it only needs cell/face
//! adjacency and the geometry of each face. [`Mesh`] is that interface and
//! [`Grid2D`] is a structured rectangular implementation used by the
//! examples and tests.

use crate::matrix::Communicator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use uuid::Uuid;

/// Identity of one mesh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshId(Uuid);

impl MeshId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MeshId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning reference to a mesh: its identity and cell count.
///
/// Matrices and variables hold a handle instead of the mesh itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    pub id: MeshId,
    pub n_cells: usize,
}

/// Named boundary face sets of a rectangular domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceRegion {
    Left,
    Right,
    Top,
    Bottom,
}

/// Geometry and connectivity a discretization needs from a mesh.
pub trait Mesh: fmt::Debug + Send + Sync {
    fn handle(&self) -> MeshHandle;

    fn n_cells(&self) -> usize {
        self.handle().n_cells
    }

    fn n_faces(&self) -> usize;

    /// Cells on either side of `face`. Boundary faces have no second cell.
    fn face_cells(&self, face: usize) -> (usize, Option<usize>);

    fn face_area(&self, face: usize) -> f64;

    /// Unit normal pointing from the first cell to the second, or outward
    /// on boundary faces.
    fn face_normal(&self, face: usize) -> [f64; 2];

    /// Center-to-center distance across an interior face; center-to-face
    /// distance on a boundary face.
    fn cell_distance(&self, face: usize) -> f64;

    fn cell_volume(&self, cell: usize) -> f64;

    fn cell_center(&self, cell: usize) -> [f64; 2];

    /// Boundary faces of one region.
    fn faces(&self, region: FaceRegion) -> Vec<usize>;

    fn is_boundary(&self, face: usize) -> bool {
        self.face_cells(face).1.is_none()
    }

    /// Cells owned by `rank` out of `n_ranks` contiguous owners.
    fn ownership_range(&self, rank: usize, n_ranks: usize) -> Range<usize> {
        Communicator::new(n_ranks)
            .partition(self.n_cells())
            .get(rank)
            .cloned()
            .unwrap_or(0..0)
    }

    fn cell_volumes(&self) -> Vec<f64> {
        (0..self.n_cells()).map(|c| self.cell_volume(c)).collect()
    }
}

/// Structured `nx x ny` grid of rectangular cells.
///
/// Cells are numbered `i + j * nx`. Faces normal to x come first, numbered
/// `i + j * (nx + 1)`, followed by faces normal to y, numbered
/// `i + j * nx` after that offset.
#[derive(Debug, Clone)]
pub struct Grid2D {
    id: MeshId,
    nx: usize,
    ny: usize,
    dx: f64,
    dy: f64,
}

impl Grid2D {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Self {
            id: MeshId::new(),
            nx,
            ny,
            dx,
            dy,
        }
    }

    /// One-dimensional grid: a single row of `nx` cells with unit depth.
    pub fn line(nx: usize, dx: f64) -> Self {
        Self::new(nx, 1, dx, 1.0)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    fn n_x_faces(&self) -> usize {
        (self.nx + 1) * self.ny
    }

    fn cell(&self, i: usize, j: usize) -> usize {
        i + j * self.nx
    }
}

impl Mesh for Grid2D {
    fn handle(&self) -> MeshHandle {
        MeshHandle {
            id: self.id,
            n_cells: self.nx * self.ny,
        }
    }

    fn n_faces(&self) -> usize {
        self.n_x_faces() + self.nx * (self.ny + 1)
    }

    fn face_cells(&self, face: usize) -> (usize, Option<usize>) {
        if face < self.n_x_faces() {
            let (i, j) = (face % (self.nx + 1), face / (self.nx + 1));
            match i {
                0 => (self.cell(0, j), None),
                i if i == self.nx => (self.cell(i - 1, j), None),
                i => (self.cell(i - 1, j), Some(self.cell(i, j))),
            }
        } else {
            let f = face - self.n_x_faces();
            let (i, j) = (f % self.nx, f / self.nx);
            match j {
                0 => (self.cell(i, 0), None),
                j if j == self.ny => (self.cell(i, j - 1), None),
                j => (self.cell(i, j - 1), Some(self.cell(i, j))),
            }
        }
    }

    fn face_area(&self, face: usize) -> f64 {
        if face < self.n_x_faces() {
            self.dy
        } else {
            self.dx
        }
    }

    fn face_normal(&self, face: usize) -> [f64; 2] {
        if face < self.n_x_faces() {
            if face % (self.nx + 1) == 0 {
                [-1.0, 0.0]
            } else {
                [1.0, 0.0]
            }
        } else if (face - self.n_x_faces()) / self.nx == 0 {
            [0.0, -1.0]
        } else {
            [0.0, 1.0]
        }
    }

    fn cell_distance(&self, face: usize) -> f64 {
        let spacing = if face < self.n_x_faces() { self.dx } else { self.dy };
        if self.is_boundary(face) {
            spacing / 2.0
        } else {
            spacing
        }
    }

    fn cell_volume(&self, _cell: usize) -> f64 {
        self.dx * self.dy
    }

    fn cell_center(&self, cell: usize) -> [f64; 2] {
        let (i, j) = (cell % self.nx, cell / self.nx);
        [(i as f64 + 0.5) * self.dx, (j as f64 + 0.5) * self.dy]
    }

    fn faces(&self, region: FaceRegion) -> Vec<usize> {
        let stride = self.nx + 1;
        let offset = self.n_x_faces();
        match region {
            FaceRegion::Left => (0..self.ny).map(|j| j * stride).collect(),
            FaceRegion::Right => (0..self.ny).map(|j| self.nx + j * stride).collect(),
            FaceRegion::Bottom => (0..self.nx).map(|i| offset + i).collect(),
            FaceRegion::Top => (0..self.nx).map(|i| offset + i + self.ny * self.nx).collect(),
        }
    }
}
