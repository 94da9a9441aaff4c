//! fvsolve core - finite-volume transport solver
//!
//! Discretizes transient convection-diffusion-reaction equations into sparse
//! linear systems and iterates them to convergence:
//! - Sparse matrix algebra over pluggable storage backends
//! - Exact CSR conversion of unordered triplets per ownership range
//! - Term assembly with accumulate semantics
//! - Direct and iterative linear solvers
//!
//! # Architecture
//!
//! The solver is designed around these core abstractions:
//!
//! - [`SparseMatrix`]: algebra over a [`SparseBackend`] store
//! - [`MeshMatrix`]: matrix sized by a mesh, released after each solve
//! - [`Term`] trait: one additive contributor to an equation
//! - [`Equation`]: sums terms, applies boundary conditions, runs the solve loop
//! - [`Solver`] trait: linear system solution strategies
//! - [`Mesh`] trait: cell/face connectivity supplied by the caller

pub mod boundary;
pub mod coefficient;
pub mod config;
pub mod csr;
pub mod equation;
pub mod error;
pub mod matrix;
pub mod mesh;
pub mod solver;
pub mod sparse;
pub mod term;
pub mod variable;

pub use boundary::BoundaryCondition;
pub use coefficient::Coefficient;
pub use config::RunConfig;
pub use csr::{ijv_to_csr, CsrBlock, InsertMode};
pub use equation::{Equation, EquationOptions, EquationState, SweepReport};
pub use error::{Error, Result};
pub use matrix::{
    Communicator, CooStore, CsrStore, Diagonal, DistributedStore, Index, Item, MatrixConfig, MeshMatrix,
    MeshOperand, MeshProduct, Operand, Product, SparseBackend, SparseMatrix,
};
pub use mesh::{FaceRegion, Grid2D, Mesh, MeshHandle, MeshId};
pub use solver::{select_solver, Solver, SolverConfig, SolverType, StopCriteria};
pub use sparse::{CsrMatrix, Triplets};
pub use term::{
    ConvectionScheme, ConvectionTerm, DiffusionTerm, ImplicitSourceTerm, SourceTerm, Term, TransientTerm,
};
pub use variable::CellVariable;
