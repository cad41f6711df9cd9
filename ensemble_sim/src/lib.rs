//! Ensemble Simulation Harness
//!
//! This crate drives the ensemble engine end to end with a deterministic,
//! closed-form model standing in for a real solver.
//!
//! # Core Principle: One Seed
//!
//! Every run's randomness is derived from a single 64-bit master seed and
//! the run's flat index, so any run can be reproduced on its own and the
//! sequential and parallel paths can be compared value for value.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     EnsembleRunner                       │
//! │                                                          │
//! │  EnsembleConfig ──► Design ──► LogisticFixture (solve)   │
//! │                                      │                   │
//! │                                      ▼                   │
//! │                             RunOutput + Intermediary     │
//! │                                      │                   │
//! │                         flatten / flatten_parallel       │
//! │                                      │                   │
//! │                      summarize / summarize_parallel      │
//! │                                      │                   │
//! │                                      ▼                   │
//! │                               EnsembleReport             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ensemble_core::EnsembleConfig;
//! use ensemble_sim::{EnsembleRunner, LogisticFixture};
//!
//! let config = EnsembleConfig::default()
//!     .with_range("rate", vec![0.3, 0.6])
//!     .with_range("capacity", vec![100.0, 200.0])
//!     .with_replicates(20);
//!
//! let report = EnsembleRunner::new(config).run(&LogisticFixture::new(50, 0.5))?;
//! ```

mod fixture;
mod runner;

pub use fixture::LogisticFixture;
pub use runner::{solve_design, EnsembleReport, EnsembleRunner, SolvedEnsemble};
