//! Design Generator - parameter combinations for an ensemble.
//!
//! Two designs are supported:
//! - **Crossed**: full factorial product of every parameter range
//! - **Paired**: the i-th value of every range forms combination i
//!
//! Parameter names are always sorted, and crossed designs enumerate as an
//! odometer whose last (lexicographically greatest) parameter turns fastest:
//!
//! ```text
//! {a: [1, 2], b: [10, 20]}  →  [1,10] [1,20] [2,10] [2,20]
//! ```
//!
//! Combination indices handed to the flattener follow this order, so it must
//! not change between versions.

use crate::error::{EnsembleError, Result};
use crate::table::{Column, Frame};
use ensemble_env::{ParameterCombination, RunContext};
use std::collections::BTreeMap;
use tracing::debug;

/// Candidate values per parameter name.
pub type ParameterRanges = BTreeMap<String, Vec<f64>>;

/// A generated design: combinations plus the replicate count.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    /// Sorted parameter names
    pub names: Vec<String>,

    /// Combinations in enumeration order (combination_index = position + 1)
    pub combinations: Vec<ParameterCombination>,

    /// Replicates per combination
    pub replicates: usize,

    /// `combinations.len() * replicates`
    pub total_runs: usize,

    /// Whether the design is crossed (true) or paired (false)
    pub crossed: bool,
}

/// Builds the combinations of a crossed or paired design.
///
/// # Errors
/// `InvalidDesign` if `ranges` is empty, a range has no values,
/// `replicates` is zero, or (paired only) the ranges differ in length.
pub fn generate_combinations(
    ranges: &ParameterRanges,
    crossed: bool,
    replicates: usize,
) -> Result<Design> {
    if ranges.is_empty() {
        return Err(EnsembleError::design("no parameter ranges given"));
    }
    if replicates == 0 {
        return Err(EnsembleError::design("replicates must be at least 1"));
    }
    if let Some((name, _)) = ranges.iter().find(|(_, values)| values.is_empty()) {
        return Err(EnsembleError::design(format!(
            "parameter '{name}' has no values"
        )));
    }

    let names: Vec<String> = ranges.keys().cloned().collect();
    let columns: Vec<&[f64]> = ranges.values().map(Vec::as_slice).collect();

    let combinations = if crossed {
        crossed_combinations(&names, &columns)?
    } else {
        paired_combinations(&names, &columns)?
    };

    let total_runs = combinations
        .len()
        .checked_mul(replicates)
        .ok_or_else(|| EnsembleError::design("run count overflows"))?;

    debug!(
        "Design: {} parameters, {} combinations x {} replicates = {} runs ({})",
        names.len(),
        combinations.len(),
        replicates,
        total_runs,
        if crossed { "crossed" } else { "paired" },
    );

    Ok(Design {
        names,
        combinations,
        replicates,
        total_runs,
        crossed,
    })
}

fn crossed_combinations(names: &[String], columns: &[&[f64]]) -> Result<Vec<ParameterCombination>> {
    let count = columns
        .iter()
        .try_fold(1usize, |acc, c| acc.checked_mul(c.len()))
        .ok_or_else(|| EnsembleError::design("crossed design is too large"))?;

    let mut combinations = Vec::with_capacity(count);
    let mut digits = vec![0usize; columns.len()];

    for _ in 0..count {
        let values = digits.iter().zip(columns).map(|(&d, c)| c[d]).collect();
        combinations.push(ParameterCombination::new(names.to_vec(), values));

        // Odometer step, last position fastest
        for pos in (0..digits.len()).rev() {
            digits[pos] += 1;
            if digits[pos] < columns[pos].len() {
                break;
            }
            digits[pos] = 0;
        }
    }

    Ok(combinations)
}

fn paired_combinations(names: &[String], columns: &[&[f64]]) -> Result<Vec<ParameterCombination>> {
    let len = columns[0].len();

    if let Some(pos) = columns.iter().position(|c| c.len() != len) {
        return Err(EnsembleError::design(format!(
            "paired design needs equal-length ranges: '{}' has {} values, '{}' has {}",
            names[0],
            len,
            names[pos],
            columns[pos].len()
        )));
    }

    Ok((0..len)
        .map(|i| ParameterCombination::new(names.to_vec(), columns.iter().map(|c| c[i]).collect()))
        .collect())
}

/// Derives the seed of run `index` from a master seed.
///
/// Uses the same golden-ratio mixing as the rest of the harness so that
/// neighbouring runs get uncorrelated streams.
pub fn run_seed(master_seed: u64, index: usize) -> u64 {
    (master_seed ^ (index as u64).wrapping_add(1).wrapping_mul(0x9e3779b97f4a7c15))
        .wrapping_mul(0x517cc1b727220a95)
}

/// 1-based (combination, replicate) indices of the run at flat index `k`.
pub fn run_indices(k: usize, replicates: usize) -> (usize, usize) {
    (k / replicates + 1, k % replicates + 1)
}

impl Design {
    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// 1-based (combination, replicate) of the run at flat index `k`.
    pub fn indices(&self, k: usize) -> (usize, usize) {
        run_indices(k, self.replicates)
    }

    /// Flat index of a run from its 1-based indices.
    pub fn run_index(&self, combination_index: usize, replicate_index: usize) -> Option<usize> {
        if combination_index == 0
            || replicate_index == 0
            || combination_index > self.combinations.len()
            || replicate_index > self.replicates
        {
            return None;
        }
        Some((combination_index - 1) * self.replicates + replicate_index - 1)
    }

    /// Combination by 1-based index.
    pub fn combination(&self, combination_index: usize) -> Option<&ParameterCombination> {
        combination_index
            .checked_sub(1)
            .and_then(|i| self.combinations.get(i))
    }

    /// Every run in combination-major, replicate-minor order.
    pub fn runs(&self, master_seed: u64) -> impl Iterator<Item = (RunContext, &ParameterCombination)> + '_ {
        (0..self.total_runs).map(move |k| {
            let (combination_index, replicate_index) = self.indices(k);
            let run = RunContext {
                index: k,
                combination_index,
                replicate_index,
                seed: run_seed(master_seed, k),
            };
            (run, &self.combinations[combination_index - 1])
        })
    }

    /// The parameter grid: `combination_index` plus one column per parameter.
    pub fn frame(&self) -> Frame {
        let mut frame = Frame::new().with_column(
            "combination_index",
            Column::Int((1..=self.combinations.len()).collect()),
        );
        for (pos, name) in self.names.iter().enumerate() {
            frame = frame.with_column(
                name.clone(),
                Column::Float(
                    self.combinations
                        .iter()
                        .map(|c| c.values.get(pos).copied().unwrap_or(f64::NAN))
                        .collect(),
                ),
            );
        }
        frame
    }
}
