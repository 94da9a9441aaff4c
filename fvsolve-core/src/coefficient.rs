//! Term coefficients.
//!
//! A coefficient is evaluated once per assembly pass against the current
//! field snapshot and yields one value per cell or per face.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use std::fmt;
use std::sync::Arc;

type FieldFn = dyn Fn(&dyn Mesh, &[f64]) -> Vec<f64> + Send + Sync;

/// Scalar coefficient of a term.
#[derive(Clone)]
pub enum Coefficient {
    Uniform(f64),
    /// One value per cell or face, depending on the term.
    Values(Vec<f64>),
    /// Computed from the mesh and the current field values.
    Field(Arc<FieldFn>),
}

impl Coefficient {
    pub fn field<F>(f: F) -> Self
    where
        F: Fn(&dyn Mesh, &[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        Coefficient::Field(Arc::new(f))
    }

    /// Evaluate to exactly `len` finite values.
    pub fn evaluate(&self, mesh: &dyn Mesh, values: &[f64], len: usize) -> Result<Vec<f64>> {
        let evaluated = match self {
            Coefficient::Uniform(c) => vec![*c; len],
            Coefficient::Values(v) => v.clone(),
            Coefficient::Field(f) => f(mesh, values),
        };
        if evaluated.len() != len {
            return Err(Error::shape(format!(
                "coefficient has {} values, expected {}",
                evaluated.len(),
                len
            )));
        }
        if let Some(pos) = evaluated.iter().position(|v| !v.is_finite()) {
            return Err(Error::Domain(format!(
                "coefficient is {} at entry {}",
                evaluated[pos], pos
            )));
        }
        Ok(evaluated)
    }
}

impl From<f64> for Coefficient {
    fn from(value: f64) -> Self {
        Coefficient::Uniform(value)
    }
}

impl From<Vec<f64>> for Coefficient {
    fn from(value: Vec<f64>) -> Self {
        Coefficient::Values(value)
    }
}

impl fmt::Debug for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Uniform(c) => f.debug_tuple("Uniform").field(c).finish(),
            Coefficient::Values(v) => f.debug_tuple("Values").field(&v.len()).finish(),
            Coefficient::Field(_) => f.write_str("Field(..)"),
        }
    }
}
