//! Ensemble Environment Abstraction Layer
//!
//! This crate describes everything the ensemble engine receives from the
//! outside world, without implementing any of it:
//! - **Units**: numbers tagged with a physical unit, strippable to a magnitude
//! - **Run outputs**: time vectors, state trajectories, initial conditions and
//!   parameter sets in their three shapes (scalar, sequence, named record)
//! - **Solver**: the trait an upstream solver implements so a driver can
//!   produce one run per design point and replicate
//!
//! # Example
//!
//! ```ignore
//! use ensemble_env::{Quantity, RunOutput, StateValue, Value};
//!
//! let run = RunOutput::new(
//!     vec![Value::Quantity(Quantity::new(0.0, "d")), Value::Float(1.0)],
//!     vec![StateValue::sequence([10.0, 1.0]), StateValue::sequence([11.0, 0.8])],
//!     StateValue::sequence([10.0, 1.0]),
//! );
//! ```

mod error;
mod solver;
mod types;
mod units;

pub use error::EnvError;
pub use solver::{EnsembleSolver, RunContext, SolvedRun};
pub use types::{IntermediaryRecord, ParameterCombination, RunOutput, StateValue, Value};
pub use units::{Quantity, UnitAware, UnitTag};
