//! Discretized equation terms.
//!
//! The Term trait is the finite-volume counterpart of an element: each term
//! turns the current field snapshot into a matrix contribution and a
//! right-hand-side contribution for the linear system `A φ = b`. The
//! [`Equation`](crate::equation::Equation) sums contributions from all of
//! its terms with accumulate semantics.
//!
//! Sign convention: every term is written as it appears on the left-hand
//! side of the balance, so transient, diffusion and a sink all add positive
//! diagonal entries.
//!
//! # Submodules
//!
//! - [`transient`] - time derivative
//! - [`diffusion`] - face-conductance diffusion
//! - [`convection`] - upwind, central and power-law convection
//! - [`source`] - explicit and implicit sources

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::sparse::Triplets;
use std::fmt;

pub mod convection;
pub mod diffusion;
pub mod source;
pub mod transient;

pub use convection::{ConvectionScheme, ConvectionTerm};
pub use diffusion::DiffusionTerm;
pub use source::{ImplicitSourceTerm, SourceTerm};
pub use transient::TransientTerm;

/// Field snapshot a term is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct TermContext<'a> {
    pub mesh: &'a dyn Mesh,
    /// Current iterate.
    pub values: &'a [f64],
    /// Values at the start of the timestep.
    pub old_values: &'a [f64],
    /// Timestep, if the equation is transient.
    pub dt: Option<f64>,
}

impl TermContext<'_> {
    pub fn n_cells(&self) -> usize {
        self.mesh.n_cells()
    }
}

/// One term's share of the linear system.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub matrix: Triplets,
    pub rhs: Vec<f64>,
}

impl Contribution {
    pub fn zeros(n_cells: usize) -> Self {
        Self {
            matrix: Triplets::new(n_cells, n_cells),
            rhs: vec![0.0; n_cells],
        }
    }
}

/// Additive contributor to a discretized equation.
///
/// Terms are immutable once built; coefficients may still depend on the
/// field through [`Coefficient::Field`](crate::coefficient::Coefficient).
/// Terms must be thread-safe so equations can be moved across threads.
pub trait Term: fmt::Debug + Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Evaluate the term against one field snapshot.
    ///
    /// An error leaves nothing written; the caller discards the pass.
    fn contribution(&self, ctx: &TermContext<'_>) -> Result<Contribution>;
}

/// Face loop helper: interior faces with their two cells.
pub(crate) fn interior_faces(mesh: &dyn Mesh) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    (0..mesh.n_faces()).filter_map(move |face| match mesh.face_cells(face) {
        (p, Some(n)) => Some((face, p, n)),
        (_, None) => None,
    })
}

pub(crate) fn require_dt(ctx: &TermContext<'_>, term: &str) -> Result<f64> {
    match ctx.dt {
        Some(dt) if dt > 0.0 && dt.is_finite() => Ok(dt),
        Some(dt) => Err(Error::Domain(format!("{term} needs a positive timestep, got {dt}"))),
        None => Err(Error::Domain(format!("{term} needs a timestep"))),
    }
}
