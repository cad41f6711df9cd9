//! Ensemble runner - design, solve, flatten and summarize in one call.

use ensemble_core::{
    generate_combinations, process_ensemble, Design, EnsembleConfig, EnsembleInput,
    EnsembleTables, Frame, Result,
};
use ensemble_env::{EnsembleSolver, IntermediaryRecord, RunOutput};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Raw outputs of every run of a design, in combination-major order.
#[derive(Debug, Clone, Default)]
pub struct SolvedEnsemble {
    pub outputs: Vec<RunOutput>,
    pub intermediaries: Vec<Option<IntermediaryRecord>>,
}

/// Results from running an ensemble.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleReport {
    /// Solver that produced the runs
    pub solver: String,

    /// Master seed
    pub seed: u64,

    /// Crossed or paired design
    pub crossed: bool,

    /// Number of parameter combinations
    pub combinations: usize,

    /// Replicates per combination
    pub replicates: usize,

    /// Total runs solved
    pub total_runs: usize,

    /// Whether the parallel path was used
    pub parallel: bool,

    /// Wall-clock time spent processing (ms), solving excluded
    pub processing_ms: f64,

    /// The parameter grid
    pub design: Frame,

    /// Long, parameter, initial-value and summary tables
    pub tables: EnsembleTables,
}

/// Solves every run of `design` with `solver`.
///
/// Runs are solved in combination-major, replicate-minor order, each with
/// the seed derived from `master_seed` and its flat index.
pub fn solve_design(
    design: &Design,
    solver: &dyn EnsembleSolver,
    master_seed: u64,
) -> Result<SolvedEnsemble> {
    let mut solved = SolvedEnsemble {
        outputs: Vec::with_capacity(design.total_runs),
        intermediaries: Vec::with_capacity(design.total_runs),
    };

    for (run, combination) in design.runs(master_seed) {
        let result = solver.solve(combination, &run)?;
        solved.outputs.push(result.output);
        solved.intermediaries.push(result.intermediary);

        if run.replicate_index == design.replicates {
            debug!(
                "  combination {}/{} solved ({} replicates)",
                run.combination_index,
                design.len(),
                design.replicates
            );
        }
    }

    Ok(solved)
}

/// Runs ensembles.
pub struct EnsembleRunner {
    config: EnsembleConfig,
}

impl EnsembleRunner {
    /// Creates a new runner from a configuration.
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the replicates per combination.
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.config.replicates = replicates;
        self
    }

    /// Switches between the sequential and the parallel path.
    pub fn with_parallel(mut self, parallel: bool, threads: Option<usize>) -> Self {
        self.config.parallel = parallel;
        self.config.threads = threads;
        self
    }

    /// The effective configuration.
    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Runs the ensemble and returns the report.
    pub fn run(&self, solver: &dyn EnsembleSolver) -> Result<EnsembleReport> {
        let config = &self.config;
        config.validate()?;

        let design = generate_combinations(&config.ranges, config.crossed, config.replicates)?;
        info!(
            "Starting ensemble: {} (seed={}, {} combinations x {} replicates)",
            solver.name(),
            config.seed,
            design.len(),
            design.replicates
        );

        let solved = solve_design(&design, solver, config.seed)?;

        let variable_names = solver.variable_names();
        let intermediary_names = solver.intermediary_names();
        let input = EnsembleInput::new(&solved.outputs, &variable_names)
            .with_intermediaries(&solved.intermediaries, Some(intermediary_names.as_slice()));

        let started = Instant::now();
        let tables = process_ensemble(&input, config)?;
        let processing_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(EnsembleReport {
            solver: solver.name().to_string(),
            seed: config.seed,
            crossed: design.crossed,
            combinations: design.len(),
            replicates: design.replicates,
            total_runs: design.total_runs,
            parallel: config.parallel,
            processing_ms,
            design: design.frame(),
            tables,
        })
    }
}
