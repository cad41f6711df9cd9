//! Output tables and their column-oriented view.
//!
//! Every table is kept row-oriented while it is built and can be turned into
//! a [`Frame`] (ordered, named columns) for downstream consumers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// FRAME
// =============================================================================

/// One column of a [`Frame`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum Column {
    Int(Vec<usize>),
    Float(Vec<f64>),
    /// Floats where `None` marks a missing entry
    MaybeFloat(Vec<Option<f64>>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::MaybeFloat(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the values if this is a `Float` column.
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedColumn {
    pub name: String,
    pub column: Column,
}

/// Ordered collection of named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub columns: Vec<NamedColumn>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column (builder style).
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        debug_assert!(self.columns.is_empty() || self.nrows() == column.len());
        self.columns.push(NamedColumn {
            name: name.into(),
            column,
        });
        self
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column)
    }

    /// Column names in order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.column.len())
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }
}

/// Total order on time stamps used for sorting and grouping.
pub fn cmp_time(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

// =============================================================================
// LONG TABLE
// =============================================================================

/// One observation: a variable's value at one time point of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    pub combination_index: usize,
    pub replicate_index: usize,
    pub time: f64,
    pub variable: String,
    /// `None` when the run recorded no value
    pub value: Option<f64>,
}

/// The long-format ("tidy") table of every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    pub rows: Vec<LongRow>,
}

impl LongTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<LongRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LongRow> {
        self.rows.iter()
    }

    /// Distinct variable names, sorted.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rows.iter().map(|r| r.variable.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Rows belonging to one run.
    pub fn run(&self, combination_index: usize, replicate_index: usize) -> Vec<&LongRow> {
        self.rows
            .iter()
            .filter(|r| {
                r.combination_index == combination_index && r.replicate_index == replicate_index
            })
            .collect()
    }

    /// Sorts by (combination, replicate, time, variable).
    pub fn sort_canonical(&mut self) {
        self.rows.sort_by(|a, b| {
            a.combination_index
                .cmp(&b.combination_index)
                .then(a.replicate_index.cmp(&b.replicate_index))
                .then(cmp_time(a.time, b.time))
                .then_with(|| a.variable.cmp(&b.variable))
        });
    }

    /// Column-oriented view.
    pub fn frame(&self) -> Frame {
        Frame::new()
            .with_column(
                "combination_index",
                Column::Int(self.rows.iter().map(|r| r.combination_index).collect()),
            )
            .with_column(
                "replicate_index",
                Column::Int(self.rows.iter().map(|r| r.replicate_index).collect()),
            )
            .with_column("time", Column::Float(self.rows.iter().map(|r| r.time).collect()))
            .with_column(
                "variable",
                Column::Text(self.rows.iter().map(|r| r.variable.clone()).collect()),
            )
            .with_column(
                "value",
                Column::MaybeFloat(self.rows.iter().map(|r| r.value).collect()),
            )
    }
}

// =============================================================================
// PARAMETER AND INITIAL-VALUE TABLES
// =============================================================================

/// A numeric parameter of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub combination_index: usize,
    pub replicate_index: usize,
    pub parameter: String,
    pub value: f64,
}

/// Parameters of every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    pub rows: Vec<ParameterRow>,
}

impl ParameterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `parameter` for one run.
    pub fn get(
        &self,
        combination_index: usize,
        replicate_index: usize,
        parameter: &str,
    ) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| {
                r.combination_index == combination_index
                    && r.replicate_index == replicate_index
                    && r.parameter == parameter
            })
            .map(|r| r.value)
    }

    pub fn frame(&self) -> Frame {
        Frame::new()
            .with_column(
                "combination_index",
                Column::Int(self.rows.iter().map(|r| r.combination_index).collect()),
            )
            .with_column(
                "replicate_index",
                Column::Int(self.rows.iter().map(|r| r.replicate_index).collect()),
            )
            .with_column(
                "parameter",
                Column::Text(self.rows.iter().map(|r| r.parameter.clone()).collect()),
            )
            .with_column("value", Column::Float(self.rows.iter().map(|r| r.value).collect()))
    }
}

/// Initial value of one variable of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialRow {
    pub combination_index: usize,
    pub replicate_index: usize,
    pub variable: String,
    pub value: Option<f64>,
}

/// Initial values of every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialTable {
    pub rows: Vec<InitialRow>,
}

impl InitialTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Initial value of `variable` for one run.
    pub fn get(
        &self,
        combination_index: usize,
        replicate_index: usize,
        variable: &str,
    ) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| {
                r.combination_index == combination_index
                    && r.replicate_index == replicate_index
                    && r.variable == variable
            })
            .and_then(|r| r.value)
    }

    pub fn frame(&self) -> Frame {
        Frame::new()
            .with_column(
                "combination_index",
                Column::Int(self.rows.iter().map(|r| r.combination_index).collect()),
            )
            .with_column(
                "replicate_index",
                Column::Int(self.rows.iter().map(|r| r.replicate_index).collect()),
            )
            .with_column(
                "variable",
                Column::Text(self.rows.iter().map(|r| r.variable.clone()).collect()),
            )
            .with_column(
                "value",
                Column::MaybeFloat(self.rows.iter().map(|r| r.value).collect()),
            )
    }
}

// =============================================================================
// SUMMARY TABLE
// =============================================================================

/// Replicate statistics for one (combination, time, variable) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub combination_index: usize,
    pub time: f64,
    pub variable: String,
    pub mean: f64,
    pub median: f64,
    pub variance: f64,
    /// Aligned with [`SummaryTable::quantile_labels`]
    pub quantiles: Vec<f64>,
    /// Rows in the group that were NaN, infinite or missing
    pub missing_count: usize,
}

/// Per-group statistics, sorted by (combination, time, variable).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    /// Requested quantile levels
    pub quantile_levels: Vec<f64>,

    /// Labels derived from the levels (see [`crate::quantile_label`])
    pub quantile_labels: Vec<String>,

    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finds the row for one group.
    pub fn find(&self, combination_index: usize, time: f64, variable: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| {
            r.combination_index == combination_index
                && cmp_time(r.time, time) == Ordering::Equal
                && r.variable == variable
        })
    }

    /// Column name of each quantile, e.g. `q975`.
    pub fn quantile_columns(&self) -> Vec<String> {
        self.quantile_labels.iter().map(|l| format!("q{l}")).collect()
    }

    /// Values of the quantile with the given label (`"975"` or `"q975"`).
    ///
    /// `None` if the label is unknown or a row lacks that quantile.
    pub fn quantile(&self, label: &str) -> Option<Vec<f64>> {
        let label = label.strip_prefix('q').unwrap_or(label);
        let idx = self.quantile_labels.iter().position(|l| l == label)?;
        self.rows.iter().map(|r| r.quantiles.get(idx).copied()).collect()
    }

    pub fn frame(&self) -> Frame {
        let mut frame = Frame::new()
            .with_column(
                "combination_index",
                Column::Int(self.rows.iter().map(|r| r.combination_index).collect()),
            )
            .with_column("time", Column::Float(self.rows.iter().map(|r| r.time).collect()))
            .with_column(
                "variable",
                Column::Text(self.rows.iter().map(|r| r.variable.clone()).collect()),
            )
            .with_column("mean", Column::Float(self.rows.iter().map(|r| r.mean).collect()))
            .with_column("median", Column::Float(self.rows.iter().map(|r| r.median).collect()))
            .with_column(
                "variance",
                Column::Float(self.rows.iter().map(|r| r.variance).collect()),
            );

        for (idx, name) in self.quantile_columns().into_iter().enumerate() {
            frame = frame.with_column(
                name,
                Column::Float(
                    self.rows
                        .iter()
                        .map(|r| r.quantiles.get(idx).copied().unwrap_or(f64::NAN))
                        .collect(),
                ),
            );
        }

        frame.with_column(
            "missing_count",
            Column::Int(self.rows.iter().map(|r| r.missing_count).collect()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(c: usize, r: usize, t: f64, var: &str, v: f64) -> LongRow {
        LongRow {
            combination_index: c,
            replicate_index: r,
            time: t,
            variable: var.to_string(),
            value: Some(v),
        }
    }

    #[test]
    fn test_sort_canonical() {
        let mut table = LongTable::from_rows(vec![
            row(2, 1, 0.0, "x", 1.0),
            row(1, 2, 0.0, "x", 2.0),
            row(1, 1, 1.0, "x", 3.0),
            row(1, 1, 0.0, "y", 4.0),
            row(1, 1, 0.0, "x", 5.0),
        ]);

        table.sort_canonical();

        let values: Vec<f64> = table.iter().filter_map(|r| r.value).collect();
        assert_eq!(values, vec![5.0, 4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_long_frame_columns() {
        let table = LongTable::from_rows(vec![row(1, 1, 0.5, "x", 1.0), row(1, 2, 0.5, "x", 2.0)]);
        let frame = table.frame();

        assert_eq!(
            frame.names(),
            vec!["combination_index", "replicate_index", "time", "variable", "value"]
        );
        assert_eq!(frame.nrows(), 2);
        assert_eq!(frame.column("time").and_then(Column::as_floats), Some(&[0.5, 0.5][..]));
        assert_eq!(table.variables(), vec!["x"]);
        assert_eq!(table.run(1, 2).len(), 1);
    }

    #[test]
    fn test_summary_quantile_lookup() {
        let table = SummaryTable {
            quantile_levels: vec![0.1, 0.9],
            quantile_labels: vec!["1".to_string(), "9".to_string()],
            rows: vec![SummaryRow {
                combination_index: 1,
                time: 0.0,
                variable: "x".to_string(),
                mean: 2.0,
                median: 2.0,
                variance: 1.0,
                quantiles: vec![1.2, 2.8],
                missing_count: 0,
            }],
        };

        assert_eq!(table.quantile("q9"), Some(vec![2.8]));
        assert_eq!(table.quantile("1"), Some(vec![1.2]));
        assert_eq!(table.quantile("5"), None);
        assert_eq!(
            table.frame().names(),
            vec!["combination_index", "time", "variable", "mean", "median", "variance", "q1", "q9", "missing_count"]
        );
        assert!(table.find(1, 0.0, "x").is_some());
    }

    #[test]
    fn test_short_quantile_row() {
        let mut short = SummaryRow {
            combination_index: 1,
            time: 0.0,
            variable: "x".to_string(),
            mean: 2.0,
            median: 2.0,
            variance: 1.0,
            quantiles: vec![1.2, 2.8],
            missing_count: 0,
        };
        let full = short.clone();
        short.quantiles.truncate(1);
        let table = SummaryTable {
            quantile_levels: vec![0.1, 0.9],
            quantile_labels: vec!["1".to_string(), "9".to_string()],
            rows: vec![full, short],
        };

        assert_eq!(table.quantile("q1"), Some(vec![1.2, 1.2]));
        assert_eq!(table.quantile("q9"), None);
        let frame = table.frame();
        let q9 = frame.column("q9").and_then(Column::as_floats).unwrap();
        assert_eq!(q9[0], 2.8);
        assert!(q9[1].is_nan());
    }
}
