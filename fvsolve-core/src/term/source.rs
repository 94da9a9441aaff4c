//! Source terms.

use super::{Contribution, Term, TermContext};
use crate::coefficient::Coefficient;
use crate::error::Result;

/// Explicit source `S`, evaluated on the current field and moved to the
/// right-hand side as `S·V`.
#[derive(Debug, Clone)]
pub struct SourceTerm {
    coefficient: Coefficient,
}

impl SourceTerm {
    pub fn new(coefficient: impl Into<Coefficient>) -> Self {
        Self {
            coefficient: coefficient.into(),
        }
    }
}

impl Term for SourceTerm {
    fn name(&self) -> &'static str {
        "source"
    }

    fn contribution(&self, ctx: &TermContext<'_>) -> Result<Contribution> {
        let n = ctx.n_cells();
        let s = self.coefficient.evaluate(ctx.mesh, ctx.values, n)?;
        let mut out = Contribution::zeros(n);
        for (cell, rhs) in out.rhs.iter_mut().enumerate() {
            *rhs = s[cell] * ctx.mesh.cell_volume(cell);
        }
        Ok(out)
    }
}

/// Linear source `c·φ` treated implicitly: `-c·V` on the diagonal.
///
/// A negative coefficient is a sink and strengthens the diagonal.
#[derive(Debug, Clone)]
pub struct ImplicitSourceTerm {
    coefficient: Coefficient,
}

impl ImplicitSourceTerm {
    pub fn new(coefficient: impl Into<Coefficient>) -> Self {
        Self {
            coefficient: coefficient.into(),
        }
    }
}

impl Term for ImplicitSourceTerm {
    fn name(&self) -> &'static str {
        "implicit source"
    }

    fn contribution(&self, ctx: &TermContext<'_>) -> Result<Contribution> {
        let n = ctx.n_cells();
        let c = self.coefficient.evaluate(ctx.mesh, ctx.values, n)?;
        let mut out = Contribution::zeros(n);
        for cell in 0..n {
            out.matrix.add_diagonal(cell, -c[cell] * ctx.mesh.cell_volume(cell));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Grid2D;
    use crate::term::test_support::{ctx, dense};

    #[test]
    fn test_explicit_source_on_rhs() {
        let mesh = Grid2D::line(2, 0.5);
        let values = [0.0; 2];
        let out = SourceTerm::new(vec![2.0, 4.0]).contribution(&ctx(&mesh, &values, None)).unwrap();
        assert_eq!(out.rhs, vec![1.0, 2.0]);
        assert!(out.matrix.is_empty());
    }

    #[test]
    fn test_sink_strengthens_diagonal() {
        let mesh = Grid2D::line(3, 1.0);
        let values = [0.0; 3];
        let out = ImplicitSourceTerm::new(vec![0.0, -1.0, 0.0])
            .contribution(&ctx(&mesh, &values, None))
            .unwrap();
        let a = dense(&out);
        assert_eq!(a[(1, 1)], 1.0);
        assert_eq!(a[(0, 0)], 0.0);
        assert_eq!(out.matrix.nnz(), 1);
    }
}
