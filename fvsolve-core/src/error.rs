//! Error types for fvsolve operations.

use thiserror::Error;

/// Result type alias using the fvsolve Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling or solving a discretized system.
#[derive(Error, Debug)]
pub enum Error {
    /// Operand dimensions are incompatible.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A row or column index lies outside the declared matrix shape.
    #[error("index ({row}, {col}) out of range for {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// An index does not fit the 32-bit compressed storage.
    #[error("index {0} does not fit in 32-bit compressed storage")]
    IndexOverflow(usize),

    /// Operand kind not supported by the requested operation.
    #[error("unsupported operand: {0}")]
    TypeMismatch(String),

    /// Iterative solve stopped at the iteration cap above tolerance.
    ///
    /// Carries the best available solution so the caller can decide
    /// whether to retry with a smaller timestep or give up.
    #[error("solver did not converge after {iterations} iterations (residual {residual:e})")]
    Convergence {
        solution: Vec<f64>,
        residual: f64,
        iterations: usize,
    },

    /// A term could not be evaluated for the current field state.
    #[error("domain error: {0}")]
    Domain(String),

    /// The matrix storage was released by `flush`.
    #[error("matrix storage has been released")]
    Released,

    /// Mesh-related errors.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// Solver errors.
    #[error("solver error: {0}")]
    Solver(String),

    /// Matrix singularity or conditioning issues.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// Backend storage could not be built.
    #[error("backend error: {0}")]
    Backend(String),

    /// Invalid configuration document.
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// I/O errors (matrix export, config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Error::ShapeMismatch(msg.into())
    }
}
