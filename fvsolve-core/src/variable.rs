//! Cell-centered field values.

use crate::error::{Error, Result};
use crate::mesh::{Mesh, MeshHandle};

/// One scalar value per mesh cell, plus the previous timestep's values.
#[derive(Debug, Clone)]
pub struct CellVariable {
    name: String,
    mesh: MeshHandle,
    value: Vec<f64>,
    old: Vec<f64>,
}

impl CellVariable {
    /// Variable filled with `initial` in every cell.
    pub fn new(name: impl Into<String>, mesh: &dyn Mesh, initial: f64) -> Self {
        let n = mesh.n_cells();
        Self {
            name: name.into(),
            mesh: mesh.handle(),
            value: vec![initial; n],
            old: vec![initial; n],
        }
    }

    pub fn from_values(name: impl Into<String>, mesh: &dyn Mesh, values: Vec<f64>) -> Result<Self> {
        if values.len() != mesh.n_cells() {
            return Err(Error::shape(format!(
                "{} values for a mesh of {} cells",
                values.len(),
                mesh.n_cells()
            )));
        }
        Ok(Self {
            name: name.into(),
            mesh: mesh.handle(),
            old: values.clone(),
            value: values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    /// Values at the start of the current timestep.
    pub fn old(&self) -> &[f64] {
        &self.old
    }

    pub fn set_value(&mut self, value: Vec<f64>) -> Result<()> {
        if value.len() != self.value.len() {
            return Err(Error::shape(format!(
                "cannot set {} values on '{}' with {} cells",
                value.len(),
                self.name,
                self.value.len()
            )));
        }
        self.value = value;
        Ok(())
    }

    /// Start a new timestep: the current values become the old ones.
    pub fn update_old(&mut self) {
        self.old.clone_from(&self.value);
    }
}
