//! Aggregator - replicate statistics per (combination, time, variable).
//!
//! Within each group only finite values count. NaN, infinities and missing
//! entries are tallied in `missing_count` and otherwise ignored; a group
//! with no valid values gets NaN for every statistic.
//!
//! # Quantile labels
//!
//! A level is labelled by its shortest decimal form with the leading `0.`
//! removed, so `0.025 → "025"`, `0.5 → "5"`, `0.975 → "975"`. The two
//! bounds are special: `0.0 → "0"` and `1.0 → "100"`. Columns are named
//! `q<label>`.

use crate::error::{EnsembleError, Result};
use crate::table::{cmp_time, LongRow, LongTable, SummaryRow, SummaryTable};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Quantile levels used when none are requested.
pub const DEFAULT_QUANTILES: [f64; 2] = [0.025, 0.975];

/// Rejects levels that are NaN or outside [0, 1].
pub fn validate_quantile_levels(levels: &[f64]) -> Result<()> {
    match levels.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        Some(&bad) => Err(EnsembleError::InvalidQuantileLevel(bad)),
        None => Ok(()),
    }
}

/// Label of a quantile level, e.g. `0.975 → "975"`.
pub fn quantile_label(level: f64) -> String {
    if level >= 1.0 {
        return "100".to_string();
    }
    let repr = level.to_string();
    match repr.strip_prefix("0.") {
        Some(fraction) => fraction.to_string(),
        None => repr,
    }
}

/// Linear-interpolation quantile of ascending `sorted` values.
///
/// With `h = (n - 1) p`, returns `x[⌊h⌋] + (h - ⌊h⌋)(x[⌈h⌉] - x[⌊h⌋])`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = h - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

/// Grouping key of a long-table row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupKey<'a> {
    pub combination_index: usize,
    pub time: f64,
    pub variable: &'a str,
}

impl<'a> GroupKey<'a> {
    pub fn of(row: &'a LongRow) -> Self {
        Self {
            combination_index: row.combination_index,
            // fold -0.0 into 0.0
            time: row.time + 0.0,
            variable: &row.variable,
        }
    }
}

impl Ord for GroupKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.combination_index
            .cmp(&other.combination_index)
            .then(cmp_time(self.time, other.time))
            .then_with(|| self.variable.cmp(other.variable))
    }
}

impl PartialOrd for GroupKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey<'_> {}

pub(crate) type Groups<'a> = BTreeMap<GroupKey<'a>, Vec<Option<f64>>>;

pub(crate) fn group_rows<'a>(rows: impl IntoIterator<Item = &'a LongRow>) -> Groups<'a> {
    let mut groups = Groups::new();
    for row in rows {
        groups.entry(GroupKey::of(row)).or_default().push(row.value);
    }
    groups
}

/// Statistics of one group.
pub(crate) fn summarize_group(key: &GroupKey<'_>, values: &[Option<f64>], levels: &[f64]) -> SummaryRow {
    let mut valid: Vec<f64> = values
        .iter()
        .filter_map(|v| v.filter(|x| x.is_finite()))
        .collect();
    let missing_count = values.len() - valid.len();

    let (mean, median, variance, quantiles) = if valid.is_empty() {
        (f64::NAN, f64::NAN, f64::NAN, vec![f64::NAN; levels.len()])
    } else {
        // Sum in sorted order so the result does not depend on row order
        valid.sort_by(f64::total_cmp);
        let n = valid.len() as f64;
        let mean = valid.iter().sum::<f64>() / n;
        let variance = if valid.len() > 1 {
            valid.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            f64::NAN
        };
        let median = quantile_sorted(&valid, 0.5);
        let quantiles = levels.iter().map(|&p| quantile_sorted(&valid, p)).collect();
        (mean, median, variance, quantiles)
    };

    SummaryRow {
        combination_index: key.combination_index,
        time: key.time,
        variable: key.variable.to_string(),
        mean,
        median,
        variance,
        quantiles,
        missing_count,
    }
}

pub(crate) fn empty_summary(levels: &[f64]) -> SummaryTable {
    SummaryTable {
        quantile_levels: levels.to_vec(),
        quantile_labels: levels.iter().map(|&p| quantile_label(p)).collect(),
        rows: Vec::new(),
    }
}

/// Summarizes the long table over replicates.
///
/// Sample variance uses divisor `n - 1`; a group with a single valid value
/// has NaN variance. Rows are sorted by (combination, time, variable).
///
/// # Errors
/// `InvalidQuantileLevel` before any grouping if a level is outside [0, 1].
pub fn summarize(long: &LongTable, quantile_levels: &[f64]) -> Result<SummaryTable> {
    validate_quantile_levels(quantile_levels)?;

    let groups = group_rows(&long.rows);
    let mut table = empty_summary(quantile_levels);
    table.rows = groups
        .iter()
        .map(|(key, values)| summarize_group(key, values, quantile_levels))
        .collect();

    debug!("Summarized {} rows into {} groups", long.len(), table.len());
    Ok(table)
}
