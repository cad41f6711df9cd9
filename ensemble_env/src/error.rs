//! Error types for the ensemble environment abstraction.

use thiserror::Error;

/// Errors raised at the boundary between the engine and its collaborators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvError {
    /// A value could not be reduced to a bare number (text, callable, ...)
    #[error("Non-numeric value: {0}")]
    NonNumeric(&'static str),

    /// The upstream solver failed to produce a run
    #[error("Solver error: {0}")]
    SolverError(String),
}

impl EnvError {
    /// Creates a non-numeric error for a value of the given kind.
    pub fn non_numeric(kind: &'static str) -> Self {
        Self::NonNumeric(kind)
    }

    /// Creates a solver error.
    pub fn solver(msg: impl Into<String>) -> Self {
        Self::SolverError(msg.into())
    }
}
