//! Time derivative term.

use super::{require_dt, Contribution, Term, TermContext};
use crate::coefficient::Coefficient;
use crate::error::Result;

/// `∂(cφ)/∂t` discretized with backward Euler.
///
/// Adds `c·V/dt` to each diagonal entry and `c·V/dt·φ_old` to the
/// right-hand side.
#[derive(Debug, Clone)]
pub struct TransientTerm {
    coefficient: Coefficient,
}

impl TransientTerm {
    pub fn new(coefficient: impl Into<Coefficient>) -> Self {
        Self {
            coefficient: coefficient.into(),
        }
    }
}

impl Default for TransientTerm {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Term for TransientTerm {
    fn name(&self) -> &'static str {
        "transient"
    }

    fn contribution(&self, ctx: &TermContext<'_>) -> Result<Contribution> {
        let dt = require_dt(ctx, self.name())?;
        let n = ctx.n_cells();
        let c = self.coefficient.evaluate(ctx.mesh, ctx.values, n)?;

        let mut out = Contribution::zeros(n);
        for cell in 0..n {
            let weight = c[cell] * ctx.mesh.cell_volume(cell) / dt;
            out.matrix.add_diagonal(cell, weight);
            out.rhs[cell] = weight * ctx.old_values[cell];
        }
        Ok(out)
    }
}
