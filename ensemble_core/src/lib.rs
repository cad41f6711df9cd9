//! Ensemble Core - Parameter Sweeps to Tidy Statistics
//!
//! This library turns many stochastic simulation runs into analysis-ready tables:
//! 1. **Design**: crossed or paired parameter combinations with replicates
//! 2. **Flattening**: heterogeneous run outputs into one long-format table
//! 3. **Aggregation**: replicate mean, median, variance and quantiles
//!
//! Every stage has a parallel counterpart that returns exactly what the
//! sequential stage returns.

pub mod config;
pub mod design;
pub mod error;
pub mod flatten;
pub mod intermediary;
pub mod parallel;
pub mod pipeline;
pub mod summary;
pub mod table;

// Re-export key types for convenience
pub use config::EnsembleConfig;
pub use design::{generate_combinations, run_indices, run_seed, Design, ParameterRanges};
pub use error::{EnsembleError, Result};
pub use flatten::{flatten, FlattenedTables};
pub use intermediary::{normalize_intermediaries, NormalizedIntermediary};
pub use parallel::{flatten_parallel, summarize_parallel, WorkerPool};
pub use pipeline::{process_ensemble, EnsembleInput, EnsembleTables};
pub use summary::{quantile_label, summarize, DEFAULT_QUANTILES};
pub use table::{
    Column, Frame, InitialRow, InitialTable, LongRow, LongTable, NamedColumn, ParameterRow,
    ParameterTable, SummaryRow, SummaryTable,
};
