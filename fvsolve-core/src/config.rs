//! Run configuration loaded from YAML.
//!
//! ```yaml
//! equation:
//!   matrix:
//!     communicator: { n_ranks: 2 }
//!     bandwidth: 5
//!   solver:
//!     solver_type: bi_cg_stab
//!     tolerance: 1.0e-12
//!   cache_matrix: false
//! time:
//!   dt: 1000.0
//!   steps: 10
//! sweeps:
//!   tolerance: 1.0e-8
//!   max_sweeps: 1
//! ```
//!
//! Every section is optional and falls back to its defaults.

use crate::equation::{Equation, EquationOptions, SweepReport};
use crate::error::{Error, Result};
use crate::matrix::SparseBackend;
use crate::mesh::Mesh;
use crate::variable::CellVariable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Timestepping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    pub dt: f64,
    pub steps: usize,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self { dt: 1.0, steps: 1 }
    }
}

/// Nonlinear sweeps within one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub tolerance: f64,
    pub max_sweeps: usize,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_sweeps: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub equation: EquationOptions,
    pub time: TimeSettings,
    pub sweeps: SweepSettings,
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading run config from {}", path.display());
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        if !(self.time.dt > 0.0) {
            return Err(Error::Domain(format!("timestep must be positive, got {}", self.time.dt)));
        }
        if self.sweeps.max_sweeps == 0 {
            return Err(Error::Domain("max_sweeps must be at least 1".into()));
        }
        Ok(())
    }

    /// Run `time.steps` timesteps, sweeping each one up to the sweep limits.
    pub fn advance<B: SparseBackend>(
        &self,
        equation: &mut Equation<B>,
        mesh: &dyn Mesh,
        var: &mut CellVariable,
    ) -> Result<Vec<SweepReport>> {
        (0..self.time.steps)
            .map(|step| {
                var.update_old();
                let report = equation.sweep_until(
                    mesh,
                    var,
                    Some(self.time.dt),
                    self.sweeps.tolerance,
                    self.sweeps.max_sweeps,
                )?;
                log::debug!("step {} done after {} sweeps", step + 1, report.sweeps);
                Ok(report)
            })
            .collect()
    }
}
