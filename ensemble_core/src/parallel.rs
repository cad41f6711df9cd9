//! Parallel Execution Path.
//!
//! Drop-in substitutes for [`flatten`](crate::flatten) and
//! [`summarize`](crate::summarize) running on a fixed-size worker pool.
//!
//! ## Execution model
//! 1. **Flattening** partitions by run. Every worker flattens its runs with
//!    the same per-run function as the sequential path into a local table;
//!    the coordinator concatenates the pieces in run order after the join.
//! 2. **Aggregation** groups rows with an order-preserving fold/reduce, then
//!    hands each (combination, time, variable) group to exactly one worker.
//!
//! Input is shared read-only and no worker writes to shared state, so no
//! locks are taken. Both functions return exactly what the sequential path
//! returns, including which error is reported when several runs fail (the
//! one with the lowest run index).

use crate::error::{EnsembleError, Result};
use crate::flatten::{flatten_run, prepare, FlattenedTables, RunTables};
use crate::summary::{empty_summary, summarize_group, validate_quantile_levels, GroupKey, Groups};
use crate::table::{LongTable, SummaryTable};
use ensemble_env::{IntermediaryRecord, RunOutput};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Fixed-size pool of worker threads.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Builds a pool with `threads` workers (`None` = one per core).
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|i| format!("ensemble-worker-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| EnsembleError::WorkerPool(e.to_string()))?;

        debug!("Worker pool ready with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Parallel [`flatten`](crate::flatten).
pub fn flatten_parallel(
    pool: &WorkerPool,
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

    let parts: Vec<Result<RunTables>> = pool.pool.install(|| {
        run_outputs
            .par_iter()
            .enumerate()
            .map(|(k, run)| {
                flatten_run(
                    k,
                    run,
                    variable_names,
                    normalized.get(k),
                    intermediary_names,
                    replicates_per_combination,
                )
            })
            .collect()
    });

    let mut tables = FlattenedTables::default();
    for part in parts {
        tables.append(part?);
    }

    debug!(
        "Flattened {} runs into {} rows on {} workers",
        run_outputs.len(),
        tables.long.len(),
        pool.threads()
    );

    Ok(tables)
}

/// Parallel [`summarize`](crate::summarize).
pub fn summarize_parallel(
    pool: &WorkerPool,
    long: &LongTable,
    quantile_levels: &[f64],
) -> Result<SummaryTable> {
    validate_quantile_levels(quantile_levels)?;

    let groups: Vec<(GroupKey<'_>, Vec<Option<f64>>)> = pool.pool.install(|| {
        long.rows
            .par_iter()
            .fold(Groups::new, |mut acc, row| {
                acc.entry(GroupKey::of(row)).or_default().push(row.value);
                acc
            })
            .reduce(Groups::new, merge_groups)
            .into_iter()
            .collect()
    });

    let mut table = empty_summary(quantile_levels);
    table.rows = pool.pool.install(|| {
        groups
            .par_iter()
            .map(|(key, values)| summarize_group(key, values, quantile_levels))
            .collect()
    });

    debug!(
        "Summarized {} rows into {} groups on {} workers",
        long.len(),
        table.len(),
        pool.threads()
    );

    Ok(table)
}

/// Appends `right`'s values after `left`'s, group by group.
fn merge_groups<'a>(mut left: Groups<'a>, right: Groups<'a>) -> Groups<'a> {
    for (key, mut values) in right {
        left.entry(key).or_default().append(&mut values);
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{flatten, summarize};
    use ensemble_env::{StateValue, Value};

    fn ensemble(runs: usize, points: usize) -> Vec<RunOutput> {
        (0..runs)
            .map(|k| {
                let times = (0..points).map(|i| Value::Float(i as f64 * 0.5)).collect();
                let states = (0..points)
                    .map(|i| {
                        let x = (k * 31 + i * 7) as f64 * 0.37;
                        if (k + i) % 5 == 0 {
                            StateValue::sequence([Value::Float(x), Value::Missing])
                        } else {
                            StateValue::sequence([x, x.sin()])
                        }
                    })
                    .collect();
                RunOutput::new(times, states, StateValue::sequence([k as f64, 0.0]))
                    .with_parameters(StateValue::scalar(k as f64))
            })
            .collect()
    }

    fn names() -> Vec<String> {
        vec!["x".to_string(), "y".to_string()]
    }

    #[test]
    fn test_flatten_parallel_matches_sequential() {
        let runs = ensemble(12, 9);
        let pool = WorkerPool::new(Some(4)).unwrap();

        let seq = flatten(&runs, &names(), None, None, 3).unwrap();
        let par = flatten_parallel(&pool, &runs, &names(), None, None, 3).unwrap();

        assert_eq!(seq, par);
        assert_eq!(par.long.len(), 12 * 9 * 2);
    }

    #[test]
    fn test_summarize_parallel_matches_sequential() {
        let runs = ensemble(20, 6);
        let pool = WorkerPool::new(Some(3)).unwrap();
        let tables = flatten(&runs, &names(), None, None, 5).unwrap();

        let seq = summarize(&tables.long, &[0.1, 0.5, 0.9]).unwrap();
        let par = summarize_parallel(&pool, &tables.long, &[0.1, 0.5, 0.9]).unwrap();

        assert_eq!(seq.len(), par.len());
        for (a, b) in seq.rows.iter().zip(&par.rows) {
            assert_eq!(a.combination_index, b.combination_index);
            assert_eq!(a.variable, b.variable);
            assert_eq!(a.time.to_bits(), b.time.to_bits());
            assert_eq!(a.mean.to_bits(), b.mean.to_bits());
            assert_eq!(a.median.to_bits(), b.median.to_bits());
            assert_eq!(a.variance.to_bits(), b.variance.to_bits());
            assert_eq!(a.missing_count, b.missing_count);
            let qa: Vec<u64> = a.quantiles.iter().map(|q| q.to_bits()).collect();
            let qb: Vec<u64> = b.quantiles.iter().map(|q| q.to_bits()).collect();
            assert_eq!(qa, qb);
        }
    }

    #[test]
    fn test_parallel_reports_first_failing_run() {
        let mut runs = ensemble(8, 3);
        runs[6].states.pop();
        runs[3].times[0] = Value::Text("bad".into());
        let pool = WorkerPool::new(Some(4)).unwrap();

        let seq = flatten(&runs, &names(), None, None, 2).unwrap_err();
        let par = flatten_parallel(&pool, &runs, &names(), None, None, 2).unwrap_err();

        assert_eq!(seq, par);
        assert!(matches!(par, EnsembleError::MalformedRunOutput { run: 3, .. }));
    }

    #[test]
    fn test_parallel_validates_levels_eagerly() {
        let pool = WorkerPool::new(Some(2)).unwrap();

        assert!(matches!(
            summarize_parallel(&pool, &LongTable::new(), &[2.0]),
            Err(EnsembleError::InvalidQuantileLevel(_))
        ));
    }

    #[test]
    fn test_pool_thread_count() {
        let pool = WorkerPool::new(Some(3)).unwrap();
        assert_eq!(pool.threads(), 3);
    }
}
