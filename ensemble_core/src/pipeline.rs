//! Flatten-then-summarize pipeline over a solved ensemble.

use crate::config::EnsembleConfig;
use crate::error::Result;
use crate::flatten::{flatten, FlattenedTables};
use crate::parallel::{flatten_parallel, summarize_parallel, WorkerPool};
use crate::summary::summarize;
use crate::table::{InitialTable, LongTable, ParameterTable, SummaryTable};
use ensemble_env::{IntermediaryRecord, RunOutput};
use serde::Serialize;
use tracing::info;

/// Raw solver output for every run, in combination-major order.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleInput<'a> {
    pub runs: &'a [RunOutput],
    pub variable_names: &'a [String],
    pub intermediaries: Option<&'a [Option<IntermediaryRecord>]>,
    pub intermediary_names: Option<&'a [String]>,
}

impl<'a> EnsembleInput<'a> {
    pub fn new(runs: &'a [RunOutput], variable_names: &'a [String]) -> Self {
        Self {
            runs,
            variable_names,
            intermediaries: None,
            intermediary_names: None,
        }
    }

    /// Attaches one optional intermediary recording per run.
    pub fn with_intermediaries(
        mut self,
        records: &'a [Option<IntermediaryRecord>],
        names: Option<&'a [String]>,
    ) -> Self {
        self.intermediaries = Some(records);
        self.intermediary_names = names;
        self
    }
}

/// Every table produced for one ensemble.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnsembleTables {
    pub long: LongTable,
    pub parameters: ParameterTable,
    pub initial: InitialTable,
    pub summary: SummaryTable,
}

/// Flattens and summarizes an ensemble.
///
/// Configuration is validated before any run is touched. With
/// `config.parallel` set, both stages run on a worker pool of
/// `config.threads` workers; the tables are identical either way.
pub fn process_ensemble(input: &EnsembleInput<'_>, config: &EnsembleConfig) -> Result<EnsembleTables> {
    config.validate()?;

    let (tables, summary) = if config.parallel {
        let pool = WorkerPool::new(config.threads)?;
        let tables = flatten_parallel(
            &pool,
            input.runs,
            input.variable_names,
            input.intermediaries,
            input.intermediary_names,
            config.replicates,
        )?;
        let summary = summarize_parallel(&pool, &tables.long, &config.quantiles)?;
        (tables, summary)
    } else {
        let tables = flatten(
            input.runs,
            input.variable_names,
            input.intermediaries,
            input.intermediary_names,
            config.replicates,
        )?;
        let summary = summarize(&tables.long, &config.quantiles)?;
        (tables, summary)
    };

    info!(
        "Processed {} runs: {} long rows, {} summary rows",
        input.runs.len(),
        tables.long.len(),
        summary.len()
    );

    let FlattenedTables {
        long,
        parameters,
        initial,
    } = tables;
    Ok(EnsembleTables {
        long,
        parameters,
        initial,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnsembleError;
    use approx::assert_relative_eq;
    use ensemble_env::{StateValue, Value};

    fn runs() -> Vec<RunOutput> {
        (0..4)
            .map(|k| {
                let times = vec![Value::Float(0.0), Value::Float(1.0)];
                let states = vec![
                    StateValue::scalar(k as f64),
                    StateValue::scalar(10.0 + k as f64),
                ];
                RunOutput::new(times, states, StateValue::scalar(k as f64))
            })
            .collect()
    }

    #[test]
    fn test_sequential_pipeline() {
        let runs = runs();
        let names = vec!["n".to_string()];
        let config = EnsembleConfig::default().with_replicates(2).with_quantiles(vec![0.5]);

        let tables = process_ensemble(&EnsembleInput::new(&runs, &names), &config).unwrap();

        assert_eq!(tables.long.len(), 8);
        assert_eq!(tables.initial.len(), 4);
        assert_eq!(tables.summary.len(), 4);
        let end = tables.summary.find(2, 1.0, "n").unwrap();
        assert_relative_eq!(end.mean, 12.5);
        assert_eq!(tables.summary.quantile_columns(), vec!["q5"]);
    }

    #[test]
    fn test_parallel_pipeline_matches() {
        let runs = runs();
        let names = vec!["n".to_string()];
        let config = EnsembleConfig::default().with_replicates(2);

        let seq = process_ensemble(&EnsembleInput::new(&runs, &names), &config).unwrap();
        let par = process_ensemble(
            &EnsembleInput::new(&runs, &names),
            &config.clone().with_parallel(Some(2)),
        )
        .unwrap();

        assert_eq!(seq.long, par.long);
        assert_eq!(seq.initial, par.initial);
        assert_eq!(seq.summary.len(), par.summary.len());
        for (a, b) in seq.summary.rows.iter().zip(&par.summary.rows) {
            assert_eq!(a.mean.to_bits(), b.mean.to_bits());
            assert_eq!(a.variance.to_bits(), b.variance.to_bits());
        }
    }

    #[test]
    fn test_invalid_config_fails_before_processing() {
        let mut runs = runs();
        runs[0].states.pop();
        let names = vec!["n".to_string()];
        let config = EnsembleConfig::default().with_quantiles(vec![3.0]);

        assert!(matches!(
            process_ensemble(&EnsembleInput::new(&runs, &names), &config),
            Err(EnsembleError::InvalidQuantileLevel(_))
        ));
    }

    #[test]
    fn test_intermediaries_flow_through() {
        let runs = runs();
        let names = vec!["n".to_string()];
        let inter_names = vec!["flux".to_string()];
        let records: Vec<Option<IntermediaryRecord>> = (0..4)
            .map(|k| {
                (k % 2 == 0).then(|| {
                    IntermediaryRecord::new(vec![Value::Float(0.5)], vec![StateValue::scalar(1.0)])
                })
            })
            .collect();
        let config = EnsembleConfig::default().with_replicates(2);

        let input = EnsembleInput::new(&runs, &names)
            .with_intermediaries(&records, Some(inter_names.as_slice()));
        let tables = process_ensemble(&input, &config).unwrap();

        assert_eq!(tables.long.len(), 8 + 2);
        assert_eq!(tables.long.variables(), vec!["flux", "n"]);
    }
}
