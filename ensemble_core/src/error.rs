//! Error types for ensemble processing.

use ensemble_env::EnvError;
use thiserror::Error;

/// Errors that can occur while generating designs, flattening runs or
/// summarizing tables.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnsembleError {
    /// Parameter ranges cannot form a design (paired lengths differ, empty ranges, ...)
    #[error("Invalid design: {0}")]
    InvalidDesign(String),

    /// A run's shape cannot be reconciled with the declared variables
    #[error("Malformed output for run {run}: {reason}")]
    MalformedRunOutput { run: usize, reason: String },

    /// Quantile level outside [0, 1]
    #[error("Invalid quantile level: {0}")]
    InvalidQuantileLevel(f64),

    /// The worker pool could not be built
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reported by a collaborator
    #[error(transparent)]
    Environment(#[from] EnvError),
}

impl EnsembleError {
    /// Creates an invalid design error.
    pub fn design(msg: impl Into<String>) -> Self {
        Self::InvalidDesign(msg.into())
    }

    /// Creates a malformed run error for the run at flat index `run`.
    pub fn malformed(run: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRunOutput {
            run,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EnsembleError>;
