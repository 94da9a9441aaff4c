//! Equation assembly and the solve loop.
//!
//! An [`Equation`] owns an ordered list of terms, its boundary conditions
//! and a solver. Each sweep:
//! 1. Evaluates every term against the current field snapshot
//! 2. Sums the contributions into one mesh matrix with `add_at`
//! 3. Applies boundary conditions (fluxes first, then fixed values)
//! 4. Solves and writes the result back into the variable
//!
//! A failure in step 1 aborts the sweep before anything is written, so the
//! matrix and the field are left untouched.

use crate::boundary::BoundaryCondition;
use crate::error::{Error, Result};
use crate::matrix::{CsrStore, MatrixConfig, MeshMatrix, SparseBackend};
use crate::mesh::Mesh;
use crate::solver::{select_solver, Solver, SolverConfig};
use crate::term::{Contribution, Term, TermContext};
use crate::variable::CellVariable;
use serde::{Deserialize, Serialize};

/// Where an equation is in its assemble/solve cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationState {
    Idle,
    Assembling,
    Assembled,
    Solving,
}

/// Equation options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EquationOptions {
    pub matrix: MatrixConfig,
    pub solver: SolverConfig,
    /// Keep the last assembled matrix instead of releasing it after the solve.
    pub cache_matrix: bool,
}

/// Assembled system ready for solving.
#[derive(Debug, Clone)]
pub struct AssembledSystem<B: SparseBackend = CsrStore> {
    pub matrix: MeshMatrix<B>,
    pub rhs: Vec<f64>,
}

/// Outcome of [`Equation::sweep_until`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepReport {
    pub sweeps: usize,
    /// Residual measured before the last solve.
    pub residual: f64,
    pub converged: bool,
}

/// Discretized scalar transport equation.
#[derive(Debug)]
pub struct Equation<B: SparseBackend = CsrStore> {
    terms: Vec<Box<dyn Term>>,
    boundary_conditions: Vec<BoundaryCondition>,
    solver: Option<Box<dyn Solver>>,
    options: EquationOptions,
    state: EquationState,
    cached: Option<MeshMatrix<B>>,
}

impl<B: SparseBackend> Equation<B> {
    pub fn new(options: EquationOptions) -> Self {
        Self {
            terms: Vec::new(),
            boundary_conditions: Vec::new(),
            solver: None,
            options,
            state: EquationState::Idle,
            cached: None,
        }
    }

    pub fn with_term(mut self, term: impl Term + 'static) -> Self {
        self.terms.push(Box::new(term));
        self
    }

    pub fn with_boundary_condition(mut self, bc: BoundaryCondition) -> Self {
        self.boundary_conditions.push(bc);
        self
    }

    /// Use `solver` instead of the one chosen from the options.
    pub fn with_solver(mut self, solver: Box<dyn Solver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn state(&self) -> EquationState {
        self.state
    }

    pub fn options(&self) -> &EquationOptions {
        &self.options
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Last assembled matrix, kept only when `cache_matrix` is set.
    pub fn cached_matrix(&self) -> Option<&MeshMatrix<B>> {
        self.cached.as_ref()
    }

    fn transition(&mut self, next: EquationState) {
        log::debug!("equation {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Evaluate every term and boundary condition into one linear system.
    pub fn assemble(&mut self, mesh: &dyn Mesh, var: &CellVariable, dt: Option<f64>) -> Result<AssembledSystem<B>> {
        self.transition(EquationState::Assembling);
        match self.build(mesh, var, dt) {
            Ok(system) => {
                self.transition(EquationState::Assembled);
                Ok(system)
            }
            Err(e) => {
                self.transition(EquationState::Idle);
                Err(e)
            }
        }
    }

    fn build(&self, mesh: &dyn Mesh, var: &CellVariable, dt: Option<f64>) -> Result<AssembledSystem<B>> {
        if var.mesh() != mesh.handle() {
            return Err(Error::Mesh(format!(
                "variable '{}' lives on mesh {}, not {}",
                var.name(),
                var.mesh().id,
                mesh.handle().id
            )));
        }
        let ctx = TermContext {
            mesh,
            values: var.value(),
            old_values: var.old(),
            dt,
        };

        // Evaluate everything before writing anything.
        let contributions = self
            .terms
            .iter()
            .map(|term| {
                log::trace!("evaluating {} term", term.name());
                term.contribution(&ctx)
            })
            .collect::<Result<Vec<Contribution>>>()?;

        let n = mesh.n_cells();
        let mut matrix = MeshMatrix::new(mesh, 1, 1, &self.options.matrix);
        matrix.cache = self.options.cache_matrix;
        let mut rhs = vec![0.0; n];

        for c in &contributions {
            if c.rhs.len() != n || c.matrix.shape() != (n, n) {
                return Err(Error::shape(format!(
                    "term contribution of shape {:?} with {} rhs entries for {} cells",
                    c.matrix.shape(),
                    c.rhs.len(),
                    n
                )));
            }
            matrix.add_at(c.matrix.values(), c.matrix.rows(), c.matrix.cols())?;
            rhs.iter_mut().zip(&c.rhs).for_each(|(b, c)| *b += c);
        }

        let (fluxes, values): (Vec<_>, Vec<_>) = self
            .boundary_conditions
            .iter()
            .partition(|bc| matches!(bc, BoundaryCondition::FixedFlux { .. }));
        for bc in fluxes.into_iter().chain(values) {
            bc.apply_to(mesh, &mut matrix, &mut rhs)?;
        }

        Ok(AssembledSystem { matrix, rhs })
    }

    /// Assemble, solve once and update `var`. Returns the residual
    /// `‖A·φ − b‖₂` of the values going into the solve.
    ///
    /// On any error, including [`Error::Convergence`], `var` is unchanged.
    pub fn sweep(&mut self, mesh: &dyn Mesh, var: &mut CellVariable, dt: Option<f64>) -> Result<f64> {
        let AssembledSystem { mut matrix, rhs } = self.assemble(mesh, var, dt)?;

        self.transition(EquationState::Solving);
        let outcome = self.solve(&mut matrix, &rhs, var);
        self.transition(EquationState::Idle);

        matrix.flush();
        if !matrix.is_released() {
            self.cached = Some(matrix);
        }
        outcome
    }

    fn solve(&self, matrix: &mut MeshMatrix<B>, rhs: &[f64], var: &mut CellVariable) -> Result<f64> {
        let residual = matrix.matrix_mut()?.residual_norm(var.value(), rhs)?;
        let csr = matrix.to_csr()?;

        let selected;
        let solver: &dyn Solver = match &self.solver {
            Some(solver) => solver.as_ref(),
            None => {
                selected = select_solver(&self.options.solver, rhs.len());
                selected.as_ref()
            }
        };

        match solver.solve(&csr, rhs, var.value(), &self.options.solver.criteria()) {
            Ok(solution) => {
                log::debug!(
                    "{} solved {} unknowns in {} iterations (residual {:e})",
                    solver.name(),
                    rhs.len(),
                    solution.iterations,
                    solution.residual
                );
                var.set_value(solution.x)?;
                Ok(residual)
            }
            Err(e @ Error::Convergence { .. }) => {
                log::warn!("sweep of '{}' did not converge: {e}", var.name());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Advance one timestep: the current values become the old ones, then
    /// one sweep.
    pub fn step(&mut self, mesh: &dyn Mesh, var: &mut CellVariable, dt: f64) -> Result<f64> {
        var.update_old();
        self.sweep(mesh, var, Some(dt))
    }

    /// Sweep until the pre-solve residual drops below `tolerance` or
    /// `max_sweeps` is reached.
    pub fn sweep_until(
        &mut self,
        mesh: &dyn Mesh,
        var: &mut CellVariable,
        dt: Option<f64>,
        tolerance: f64,
        max_sweeps: usize,
    ) -> Result<SweepReport> {
        let mut residual = f64::INFINITY;
        for sweep in 1..=max_sweeps {
            residual = self.sweep(mesh, var, dt)?;
            if residual < tolerance {
                return Ok(SweepReport {
                    sweeps: sweep,
                    residual,
                    converged: true,
                });
            }
        }
        log::warn!(
            "'{}' still at residual {residual:e} after {max_sweeps} sweeps",
            var.name()
        );
        Ok(SweepReport {
            sweeps: max_sweeps,
            residual,
            converged: false,
        })
    }
}

impl<B: SparseBackend> Default for Equation<B> {
    fn default() -> Self {
        Self::new(EquationOptions::default())
    }
}
