//! Trajectory Flattener - raw run outputs to the long-format table.
//!
//! Every run contributes one row per (time point, variable). Runs are
//! expected in combination-major, replicate-minor order, so the run at flat
//! index `k` belongs to combination `k / replicates + 1`, replicate
//! `k % replicates + 1`.
//!
//! # Variable naming
//!
//! State values come in three shapes:
//! - scalar: bound to the first declared name
//! - sequence: bound by position; positions past the declared names are
//!   labelled `var_<position>` with a **1-based** position
//! - record: each declared name is looked up as a field
//!
//! Parameters follow the same shapes; unnamed ones are labelled `p1`, `p2`,
//! ... by their original position. Only numeric-like parameters are kept:
//! text, callables, interpolation objects and missing values are dropped.

use crate::design::run_indices;
use crate::error::{EnsembleError, Result};
use crate::intermediary::{normalize_intermediaries, NormalizedIntermediary};
use crate::table::{InitialRow, InitialTable, LongRow, LongTable, ParameterRow, ParameterTable};
use ensemble_env::{IntermediaryRecord, RunOutput, StateValue, UnitAware, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// The three tables produced by flattening an ensemble.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedTables {
    pub long: LongTable,
    pub parameters: ParameterTable,
    pub initial: InitialTable,
}

impl FlattenedTables {
    pub(crate) fn append(&mut self, part: RunTables) {
        self.long.rows.extend(part.long);
        self.parameters.rows.extend(part.parameters);
        self.initial.rows.extend(part.initial);
    }
}

/// Rows contributed by a single run.
#[derive(Debug, Default)]
pub(crate) struct RunTables {
    pub long: Vec<LongRow>,
    pub parameters: Vec<ParameterRow>,
    pub initial: Vec<InitialRow>,
}

/// Flattens every run into long, parameter and initial-value tables.
///
/// `intermediaries`, when given, holds one optional recording per run;
/// their variables are appended to the long table under the run's indices.
///
/// # Errors
/// - `InvalidDesign` if `replicates_per_combination` is zero
/// - `MalformedRunOutput` (with the run index) for shape errors: time and
///   state lengths differ, a non-numeric time point, text in a state slot,
///   a declared name missing from a record state
pub fn flatten(
    run_outputs: &[RunOutput],
    variable_names: &[String],
    intermediaries: Option<&[Option<IntermediaryRecord>]>,
    intermediary_names: Option<&[String]>,
    replicates_per_combination: usize,
) -> Result<FlattenedTables> {
    let normalized = prepare(
        run_outputs,
        intermediaries,
        intermediary_names,
        replicates_per_combination,
    )?;
    let intermediary_names = intermediary_names.unwrap_or(&[]);

    let mut tables = FlattenedTables::default();
    for (k, run) in run_outputs.iter().enumerate() {
        let part = flatten_run(
            k,
            run,
            variable_names,
            normalized.get(k),
            intermediary_names,
            replicates_per_combination,
        )?;
        tables.append(part);
    }

    debug!(
        "Flattened {} runs into {} rows ({} parameters, {} initial values)",
        run_outputs.len(),
        tables.long.len(),
        tables.parameters.len(),
        tables.initial.len()
    );

    Ok(tables)
}

/// Eager checks shared by the sequential and parallel paths.
pub(crate) fn prepare<'a>(
    run_outputs: &[RunOutput],
    intermediaries: Option<&'a [Option<IntermediaryRecord>]>,
    intermediary_names: Option<&[String]>,
    replicates: usize,
) -> Result<Vec<NormalizedIntermediary<'a>>> {
    if replicates == 0 {
        return Err(EnsembleError::design("replicates per combination must be at least 1"));
    }
    if run_outputs.len() % replicates != 0 {
        warn!(
            "{} runs is not a multiple of {} replicates, last combination is incomplete",
            run_outputs.len(),
            replicates
        );
    }

    match intermediaries {
        None => Ok(Vec::new()),
        Some(records) => {
            if records.len() != run_outputs.len() {
                return Err(EnsembleError::malformed(
                    records.len().min(run_outputs.len()),
                    format!(
                        "{} intermediary recordings for {} runs",
                        records.len(),
                        run_outputs.len()
                    ),
                ));
            }
            normalize_intermediaries(records, intermediary_names)
        }
    }
}

/// Flattens the run at flat index `k`.
pub(crate) fn flatten_run(
    k: usize,
    run: &RunOutput,
    variable_names: &[String],
    intermediary: Option<&NormalizedIntermediary<'_>>,
    intermediary_names: &[String],
    replicates: usize,
) -> Result<RunTables> {
    let (combination_index, replicate_index) = run_indices(k, replicates);
    let mut part = RunTables::default();

    let series = Series {
        run: k,
        combination_index,
        replicate_index,
    };
    let mut tagged = series.emit(&run.times, &run.states, variable_names, &mut part.long)?;

    if let Some(inter) = intermediary.filter(|i| !i.is_empty()) {
        tagged += series.emit(inter.times, inter.values, intermediary_names, &mut part.long)?;
    }
    if tagged > 0 {
        debug!("Run {}: stripped units from {} time points", k, tagged);
    }
    ensure_unique_labels(k, &part.long)?;

    part.parameters = extract_parameters(run.parameters.as_ref())
        .into_iter()
        .map(|(parameter, value)| ParameterRow {
            combination_index,
            replicate_index,
            parameter,
            value,
        })
        .collect();

    part.initial = resolve_state(&run.initial, variable_names)
        .map_err(|reason| EnsembleError::malformed(k, format!("initial value: {reason}")))?
        .into_iter()
        .map(|(variable, value)| InitialRow {
            combination_index,
            replicate_index,
            variable,
            value,
        })
        .collect();

    Ok(part)
}

/// Indices shared by every row of one run.
struct Series {
    run: usize,
    combination_index: usize,
    replicate_index: usize,
}

impl Series {
    /// Appends one row per (time point, variable); returns how many time
    /// points carried a unit.
    fn emit(
        &self,
        times: &[Value],
        states: &[StateValue],
        names: &[String],
        out: &mut Vec<LongRow>,
    ) -> Result<usize> {
        if times.len() != states.len() {
            return Err(EnsembleError::malformed(
                self.run,
                format!("{} time points but {} states", times.len(), states.len()),
            ));
        }

        for (i, (t, state)) in times.iter().zip(states).enumerate() {
            let time = strip_time(t).ok_or_else(|| {
                EnsembleError::malformed(
                    self.run,
                    format!("time point {} is not numeric ({})", i, t.kind()),
                )
            })?;

            let bound = resolve_state(state, names).map_err(|reason| {
                EnsembleError::malformed(self.run, format!("at t={time}: {reason}"))
            })?;

            out.extend(bound.into_iter().map(|(variable, value)| LongRow {
                combination_index: self.combination_index,
                replicate_index: self.replicate_index,
                time,
                variable,
                value,
            }));
        }

        Ok(times.iter().filter(|t| t.is_quantity()).count())
    }
}

/// Rejects a run that labels two values the same at one time point, e.g. a
/// state and an intermediary both falling back to `var_2`.
fn ensure_unique_labels(run: usize, rows: &[LongRow]) -> Result<()> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        // fold -0.0 into 0.0
        let time = (row.time + 0.0).to_bits();
        if !seen.insert((time, row.variable.as_str())) {
            return Err(EnsembleError::malformed(
                run,
                format!("variable '{}' appears twice at t={}", row.variable, row.time),
            ));
        }
    }
    Ok(())
}

fn strip_time(t: &Value) -> Option<f64> {
    if t.is_numeric_like() {
        t.magnitude()
    } else {
        None
    }
}

/// Label of position `pos` (0-based): the declared name or `var_<pos + 1>`.
pub fn position_label(names: &[String], pos: usize) -> String {
    names
        .get(pos)
        .cloned()
        .unwrap_or_else(|| format!("var_{}", pos + 1))
}

/// Binds a state value to variable names, stripping units.
///
/// Callable entries are skipped. The error string is the reason only; the
/// caller adds run context.
fn resolve_state(
    state: &StateValue,
    names: &[String],
) -> std::result::Result<Vec<(String, Option<f64>)>, String> {
    let mut bound = Vec::with_capacity(state.len());

    match state {
        StateValue::Scalar(v) => {
            if let Some(x) = leaf(v, &position_label(names, 0))? {
                bound.push((position_label(names, 0), x));
            }
        }
        StateValue::Sequence(values) => {
            for (pos, v) in values.iter().enumerate() {
                let label = position_label(names, pos);
                if let Some(x) = leaf(v, &label)? {
                    bound.push((label, x));
                }
            }
        }
        StateValue::Record(fields) => {
            for name in names {
                let v = fields
                    .get(name)
                    .ok_or_else(|| format!("record has no field '{name}'"))?;
                if let Some(x) = leaf(v, name)? {
                    bound.push((name.clone(), x));
                }
            }
        }
    }

    Ok(bound)
}

/// `Ok(None)` skips the entry, `Ok(Some(None))` is a missing value.
fn leaf(v: &Value, label: &str) -> std::result::Result<Option<Option<f64>>, String> {
    if v.is_callable() {
        return Ok(None);
    }
    v.strip()
        .map(Some)
        .map_err(|e| format!("'{label}': {e}"))
}

/// Numeric parameters as (name, value), in output order.
pub fn extract_parameters(parameters: Option<&StateValue>) -> Vec<(String, f64)> {
    let numeric = |v: &Value| v.is_numeric_like().then(|| v.magnitude()).flatten();

    match parameters {
        None => Vec::new(),
        Some(StateValue::Scalar(v)) => numeric(v)
            .map(|x| vec![("p1".to_string(), x)])
            .unwrap_or_default(),
        Some(StateValue::Sequence(values)) => values
            .iter()
            .enumerate()
            .filter_map(|(pos, v)| numeric(v).map(|x| (format!("p{}", pos + 1), x)))
            .collect(),
        Some(StateValue::Record(fields)) => fields
            .iter()
            .filter_map(|(name, v)| numeric(v).map(|x| (name.clone(), x)))
            .collect(),
    }
}
