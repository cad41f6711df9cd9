//! Upstream solver abstraction.

use crate::error::EnvError;
use crate::types::{IntermediaryRecord, ParameterCombination, RunOutput};

/// Position of one run within an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// 0-based flat run index (combination-major, replicate-minor)
    pub index: usize,

    /// 1-based combination index
    pub combination_index: usize,

    /// 1-based replicate index
    pub replicate_index: usize,

    /// Seed derived for this run
    pub seed: u64,
}

/// What a solver returns for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedRun {
    /// Primary trajectory
    pub output: RunOutput,

    /// Derived quantities, if the model records any
    pub intermediary: Option<IntermediaryRecord>,
}

/// The interface to whatever produces raw trajectories.
///
/// The engine never calls a solver itself; drivers iterate a design and
/// feed each combination through this trait, then hand the collected
/// outputs to the flattener in the same order.
///
/// # Determinism
///
/// Implementations must derive all randomness from `RunContext::seed` so
/// that a run is reproducible from its index alone.
pub trait EnsembleSolver: Send + Sync {
    /// Solves one run of the ensemble.
    fn solve(
        &self,
        combination: &ParameterCombination,
        run: &RunContext,
    ) -> Result<SolvedRun, EnvError>;

    /// Names of the state variables, in the order the solver emits them.
    fn variable_names(&self) -> Vec<String>;

    /// Names of the recorded intermediary variables.
    fn intermediary_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Returns the name of this solver.
    fn name(&self) -> &str;
}
