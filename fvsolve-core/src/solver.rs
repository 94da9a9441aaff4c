//! Linear system solvers.
//!
//! Every solver takes the assembled system `A x = b` in CSR form, an initial
//! guess and [`StopCriteria`], and returns a [`Solution`] carrying the final
//! residual. Iterative solvers that hit the iteration cap above tolerance
//! return [`Error::Convergence`] with their best iterate.
//!
//! # Solver Backends
//!
//! - [`DenseLuSolver`]: nalgebra dense LU. Any nonsingular matrix, small problems only.
//! - [`FaerCholeskySolver`]: faer sparse LLᵀ. Symmetric positive definite matrices.
//! - [`PcgSolver`]: Jacobi-preconditioned conjugate gradient. Symmetric positive definite.
//! - [`BiCgStabSolver`]: Jacobi-preconditioned BiCGSTAB. General nonsymmetric matrices,
//!   which is what convection and fixed-value rows produce.

use crate::error::{Error, Result};
use crate::matrix::backend::{csr_get, csr_mat_vec};
use crate::sparse::CsrMatrix;
use faer::linalg::cholesky::llt::factor::LltError;
use faer::prelude::*;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::linalg::LltError as SparseLltError;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// When an iterative solve may stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopCriteria {
    /// Relative residual `‖b − A x‖ / ‖b‖`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for StopCriteria {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
        }
    }
}

/// Solver output.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x: Vec<f64>,
    /// Absolute residual `‖b − A x‖₂`.
    pub residual: f64,
    pub iterations: usize,
}

/// Linear solver interface.
pub trait Solver: fmt::Debug + Send + Sync {
    /// Solve `A x = b` starting from `x0`.
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x0: &[f64], criteria: &StopCriteria) -> Result<Solution>;

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Solver selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverType {
    DenseLu,
    Cholesky,
    Pcg,
    BiCgStab,
    /// Dense LU below `auto_threshold` unknowns, BiCGSTAB above.
    #[default]
    Auto,
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub solver_type: SolverType,
    /// Relative tolerance for iterative solvers.
    pub tolerance: f64,
    /// Iteration cap for iterative solvers.
    pub max_iterations: usize,
    /// Problem size threshold for `Auto` (direct below, iterative above).
    pub auto_threshold: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_type: SolverType::Auto,
            tolerance: 1e-10,
            max_iterations: 1000,
            auto_threshold: 2000,
        }
    }
}

impl SolverConfig {
    pub fn criteria(&self) -> StopCriteria {
        StopCriteria {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

/// Select a solver for a system with `n_unknowns` rows.
pub fn select_solver(config: &SolverConfig, n_unknowns: usize) -> Box<dyn Solver> {
    match config.solver_type {
        SolverType::DenseLu => Box::new(DenseLuSolver),
        SolverType::Cholesky => Box::new(FaerCholeskySolver),
        SolverType::Pcg => Box::new(PcgSolver),
        SolverType::BiCgStab => Box::new(BiCgStabSolver),
        SolverType::Auto if n_unknowns < config.auto_threshold => Box::new(DenseLuSolver),
        SolverType::Auto => Box::new(BiCgStabSolver),
    }
}

fn check_system(matrix: &CsrMatrix, rhs: &[f64], x0: &[f64]) -> Result<usize> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::Solver(format!(
            "matrix must be square, got {}x{}",
            n,
            matrix.ncols()
        )));
    }
    if rhs.len() != n || x0.len() != n {
        return Err(Error::Solver(format!(
            "system of size {} with rhs of length {} and guess of length {}",
            n,
            rhs.len(),
            x0.len()
        )));
    }
    Ok(n)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn residual(matrix: &CsrMatrix, rhs: &[f64], x: &[f64]) -> Vec<f64> {
    csr_mat_vec(matrix, x)
        .iter()
        .zip(rhs)
        .map(|(ax, b)| b - ax)
        .collect()
}

fn direct_solution(matrix: &CsrMatrix, rhs: &[f64], x: Vec<f64>) -> Solution {
    let residual = norm(&residual(matrix, rhs, &x));
    Solution {
        x,
        residual,
        iterations: 1,
    }
}

/// Direct solver using nalgebra dense LU factorization.
///
/// Densifies the matrix, so it is only suitable for small systems and
/// tests. Handles nonsymmetric matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLuSolver;

impl Solver for DenseLuSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x0: &[f64], _criteria: &StopCriteria) -> Result<Solution> {
        use nalgebra::{DMatrix, DVector};

        let n = check_system(matrix, rhs, x0)?;
        if n == 0 {
            return Ok(direct_solution(matrix, rhs, vec![]));
        }

        let dense = DMatrix::from(matrix);
        let b = DVector::from_column_slice(rhs);
        let x = dense
            .lu()
            .solve(&b)
            .ok_or_else(|| Error::SingularMatrix("LU factorization failed".into()))?;

        Ok(direct_solution(matrix, rhs, x.as_slice().to_vec()))
    }

    fn name(&self) -> &str {
        "dense LU"
    }
}

/// Convert nalgebra-sparse CSR to a faer column-major matrix.
///
/// Entries are bucketed by column with a counting pass, so row indices
/// come out sorted within each column.
fn csr_to_faer_csc(csr: &CsrMatrix) -> SparseColMat<usize, f64> {
    let nrows = csr.nrows();
    let ncols = csr.ncols();
    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    let mut col_offsets = vec![0usize; ncols + 1];
    for &col in col_indices {
        col_offsets[col + 1] += 1;
    }
    for i in 0..ncols {
        col_offsets[i + 1] += col_offsets[i];
    }

    let nnz = values.len();
    let mut row_indices = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    let mut next = col_offsets[..ncols].to_vec();

    for row in 0..nrows {
        for idx in row_offsets[row]..row_offsets[row + 1] {
            let col = col_indices[idx];
            row_indices[next[col]] = row;
            csc_values[next[col]] = values[idx];
            next[col] += 1;
        }
    }

    // SAFETY: offsets are a prefix sum over column counts and every row
    // index is below nrows, sorted within its column.
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(nrows, ncols, col_offsets, None, row_indices),
            csc_values,
        )
    }
}

fn is_symmetric(csr: &CsrMatrix) -> bool {
    csr.triplet_iter().all(|(row, col, &value)| {
        let mirror = csr_get(csr, col, row);
        (value - mirror).abs() <= 1e-12 * value.abs().max(mirror.abs()).max(1.0)
    })
}

/// Sparse Cholesky solver using the faer library.
///
/// Diffusion systems are symmetric positive definite, fixed-value rows
/// included, since those are eliminated symmetrically. A
/// nonsymmetric matrix is rejected rather than silently using its lower
/// triangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerCholeskySolver;

impl Solver for FaerCholeskySolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x0: &[f64], _criteria: &StopCriteria) -> Result<Solution> {
        let n = check_system(matrix, rhs, x0)?;
        if n == 0 {
            return Ok(direct_solution(matrix, rhs, vec![]));
        }
        if !is_symmetric(matrix) {
            return Err(Error::Solver("Cholesky needs a symmetric matrix".into()));
        }

        let csc = csr_to_faer_csc(matrix);
        let csc_ref = csc.as_ref();

        let symbolic = SymbolicLlt::try_new(csc_ref.symbolic(), faer::Side::Lower)
            .map_err(|_| Error::Solver("symbolic Cholesky analysis failed".into()))?;

        let llt = Llt::try_new_with_symbolic(symbolic, csc_ref, faer::Side::Lower).map_err(|e| match e {
            SparseLltError::Generic(err) => Error::Solver(format!("sparse Cholesky error: {err:?}")),
            SparseLltError::Numeric(LltError::NonPositivePivot { index }) => {
                Error::SingularMatrix(format!("matrix is not positive definite at pivot {index}"))
            }
        })?;

        let mut x = faer::Mat::from_fn(n, 1, |i, _| rhs[i]);
        llt.solve_in_place(x.as_mut());

        Ok(direct_solution(matrix, rhs, (0..n).map(|i| x[(i, 0)]).collect()))
    }

    fn name(&self) -> &str {
        "faer sparse Cholesky (LLᵀ)"
    }
}

/// Inverse diagonal for Jacobi preconditioning.
fn jacobi(matrix: &CsrMatrix) -> Result<Vec<f64>> {
    (0..matrix.nrows())
        .map(|i| match csr_get(matrix, i, i) {
            d if d != 0.0 => Ok(1.0 / d),
            _ => Err(Error::SingularMatrix(format!("zero diagonal at row {i}"))),
        })
        .collect()
}

fn precondition(inv_diag: &[f64], r: &[f64]) -> Vec<f64> {
    inv_diag.iter().zip(r).map(|(d, r)| d * r).collect()
}

fn not_converged(name: &str, x: Vec<f64>, residual: f64, iterations: usize) -> Error {
    log::warn!("{name} stopped after {iterations} iterations at residual {residual:e}");
    Error::Convergence {
        solution: x,
        residual,
        iterations,
    }
}

/// Jacobi-preconditioned conjugate gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcgSolver;

impl Solver for PcgSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x0: &[f64], criteria: &StopCriteria) -> Result<Solution> {
        check_system(matrix, rhs, x0)?;
        let inv_diag = jacobi(matrix)?;
        let target = criteria.tolerance * norm(rhs);

        let mut x = x0.to_vec();
        let mut r = residual(matrix, rhs, &x);
        let mut z = precondition(&inv_diag, &r);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        for k in 0..criteria.max_iterations {
            let r_norm = norm(&r);
            if r_norm <= target {
                log::trace!("PCG converged in {k} iterations (residual {r_norm:e})");
                return Ok(Solution {
                    x,
                    residual: r_norm,
                    iterations: k,
                });
            }

            let ap = csr_mat_vec(matrix, &p);
            let pap = dot(&p, &ap);
            if pap == 0.0 {
                return Err(Error::Solver(format!("PCG breakdown at iteration {k}")));
            }
            let alpha = rz / pap;
            x.iter_mut().zip(&p).for_each(|(x, p)| *x += alpha * p);
            r.iter_mut().zip(&ap).for_each(|(r, ap)| *r -= alpha * ap);

            z = precondition(&inv_diag, &r);
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            p.iter_mut().zip(&z).for_each(|(p, z)| *p = z + beta * *p);
        }

        let r_norm = norm(&r);
        if r_norm <= target {
            return Ok(Solution {
                x,
                residual: r_norm,
                iterations: criteria.max_iterations,
            });
        }
        Err(not_converged(self.name(), x, r_norm, criteria.max_iterations))
    }

    fn name(&self) -> &str {
        "Jacobi PCG"
    }
}

/// Jacobi-preconditioned BiCGSTAB for nonsymmetric systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiCgStabSolver;

impl Solver for BiCgStabSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x0: &[f64], criteria: &StopCriteria) -> Result<Solution> {
        let n = check_system(matrix, rhs, x0)?;
        let inv_diag = jacobi(matrix)?;
        let target = criteria.tolerance * norm(rhs);

        let mut x = x0.to_vec();
        let mut r = residual(matrix, rhs, &x);
        let r_hat = r.clone();
        let (mut rho, mut alpha, mut omega) = (1.0, 1.0, 1.0);
        let mut v = vec![0.0; n];
        let mut p = vec![0.0; n];

        for k in 0..criteria.max_iterations {
            let r_norm = norm(&r);
            if r_norm <= target {
                log::trace!("BiCGSTAB converged in {k} iterations (residual {r_norm:e})");
                return Ok(Solution {
                    x,
                    residual: r_norm,
                    iterations: k,
                });
            }

            let rho_next = dot(&r_hat, &r);
            if rho_next == 0.0 || omega == 0.0 {
                return Err(Error::Solver(format!("BiCGSTAB breakdown at iteration {k}")));
            }
            let beta = (rho_next / rho) * (alpha / omega);
            rho = rho_next;
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
            }

            let y = precondition(&inv_diag, &p);
            v = csr_mat_vec(matrix, &y);
            let rv = dot(&r_hat, &v);
            if rv == 0.0 {
                return Err(Error::Solver(format!("BiCGSTAB breakdown at iteration {k}")));
            }
            alpha = rho / rv;

            let s: Vec<f64> = r.iter().zip(&v).map(|(r, v)| r - alpha * v).collect();
            if norm(&s) <= target {
                x.iter_mut().zip(&y).for_each(|(x, y)| *x += alpha * y);
                let s_norm = norm(&s);
                return Ok(Solution {
                    x,
                    residual: s_norm,
                    iterations: k + 1,
                });
            }

            let z = precondition(&inv_diag, &s);
            let t = csr_mat_vec(matrix, &z);
            let tt = dot(&t, &t);
            omega = if tt == 0.0 { 0.0 } else { dot(&t, &s) / tt };

            for i in 0..n {
                x[i] += alpha * y[i] + omega * z[i];
                r[i] = s[i] - omega * t[i];
            }
        }

        let r_norm = norm(&r);
        if r_norm <= target {
            return Ok(Solution {
                x,
                residual: r_norm,
                iterations: criteria.max_iterations,
            });
        }
        Err(not_converged(self.name(), x, r_norm, criteria.max_iterations))
    }

    fn name(&self) -> &str {
        "Jacobi BiCGSTAB"
    }
}
