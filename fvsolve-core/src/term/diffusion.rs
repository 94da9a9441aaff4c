//! Diffusion term.

use super::{interior_faces, Contribution, Term, TermContext};
use crate::coefficient::Coefficient;
use crate::error::Result;

/// `-∇·(Γ∇φ)` with a two-point flux across every interior face.
///
/// The face conductance is `g = Γ_f·A_f/d_f`. Boundary faces contribute
/// nothing, which is a zero-flux condition unless a boundary condition
/// says otherwise.
#[derive(Debug, Clone)]
pub struct DiffusionTerm {
    /// Γ, one value per face.
    coefficient: Coefficient,
}

impl DiffusionTerm {
    pub fn new(coefficient: impl Into<Coefficient>) -> Self {
        Self {
            coefficient: coefficient.into(),
        }
    }

    /// Γ_f·A_f/d_f for every face; zero on boundary faces.
    pub fn conductances(&self, ctx: &TermContext<'_>) -> Result<Vec<f64>> {
        let mesh = ctx.mesh;
        let gamma = self.coefficient.evaluate(mesh, ctx.values, mesh.n_faces())?;
        let mut g = vec![0.0; mesh.n_faces()];
        for (face, _, _) in interior_faces(mesh) {
            g[face] = gamma[face] * mesh.face_area(face) / mesh.cell_distance(face);
        }
        Ok(g)
    }
}

impl Term for DiffusionTerm {
    fn name(&self) -> &'static str {
        "diffusion"
    }

    fn contribution(&self, ctx: &TermContext<'_>) -> Result<Contribution> {
        let g = self.conductances(ctx)?;
        let mut out = Contribution::zeros(ctx.n_cells());
        for (face, p, n) in interior_faces(ctx.mesh) {
            let g = g[face];
            out.matrix.add(p, p, g);
            out.matrix.add(n, n, g);
            out.matrix.add(p, n, -g);
            out.matrix.add(n, p, -g);
        }
        Ok(out)
    }
}
