//! Intermediary Normalizer.
//!
//! Models may record derived quantities next to their state. Per run the
//! recording is either absent or a time/value series; the flattener wants
//! one uniform shape, so absent recordings become empty series.

use crate::error::{EnsembleError, Result};
use ensemble_env::{IntermediaryRecord, StateValue, Value};
use tracing::debug;

/// Uniform view of one run's intermediary recording.
///
/// Borrowed from the input; numeric content is untouched (units are
/// stripped later by the flattener). It never carries a parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedIntermediary<'a> {
    pub times: &'a [Value],
    pub values: &'a [StateValue],
}

impl<'a> NormalizedIntermediary<'a> {
    /// The empty recording.
    pub fn empty() -> Self {
        Self {
            times: &[],
            values: &[],
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl<'a> From<&'a IntermediaryRecord> for NormalizedIntermediary<'a> {
    fn from(record: &'a IntermediaryRecord) -> Self {
        Self {
            times: &record.times,
            values: &record.values,
        }
    }
}

/// Normalizes one optional recording per run.
///
/// `names` labels the recorded variables downstream. It may only be absent
/// when every recording is empty.
///
/// # Errors
/// `MalformedRunOutput` if a record's time and value series differ in
/// length, or if a non-empty record has no names to label it.
pub fn normalize_intermediaries<'a>(
    records: &'a [Option<IntermediaryRecord>],
    names: Option<&[String]>,
) -> Result<Vec<NormalizedIntermediary<'a>>> {
    let normalized = records
        .iter()
        .enumerate()
        .map(|(run, record)| match record {
            None => Ok(NormalizedIntermediary::empty()),
            Some(rec) if rec.times.len() != rec.values.len() => Err(EnsembleError::malformed(
                run,
                format!(
                    "intermediary has {} time points but {} values",
                    rec.times.len(),
                    rec.values.len()
                ),
            )),
            Some(rec) => Ok(NormalizedIntermediary::from(rec)),
        })
        .collect::<Result<Vec<_>>>()?;

    if names.is_none() {
        if let Some(run) = normalized.iter().position(|n| !n.is_empty()) {
            return Err(EnsembleError::malformed(
                run,
                "intermediary values recorded but no intermediary names given",
            ));
        }
    }

    debug!(
        "Normalized {} intermediary recordings ({} non-empty)",
        normalized.len(),
        normalized.iter().filter(|n| !n.is_empty()).count()
    );

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_records_become_empty() {
        let records = vec![
            None,
            Some(IntermediaryRecord::new(
                vec![Value::Float(0.0), Value::Float(1.0)],
                vec![StateValue::scalar(3.0), StateValue::scalar(4.0)],
            )),
        ];
        let names = vec!["flow".to_string()];

        let normalized = normalize_intermediaries(&records, Some(names.as_slice())).unwrap();

        assert_eq!(normalized.len(), 2);
        assert!(normalized[0].is_empty());
        assert_eq!(normalized[0].values.len(), 0);
        assert_eq!(normalized[1].len(), 2);
        assert_eq!(normalized[1].values[1], StateValue::scalar(4.0));
    }

    #[test]
    fn test_missing_names_allowed_without_records() {
        let records: Vec<Option<IntermediaryRecord>> = vec![None, None];

        let normalized = normalize_intermediaries(&records, None).unwrap();
        assert!(normalized.iter().all(|n| n.is_empty()));
    }

    #[test]
    fn test_names_required_for_recorded_values() {
        let records = vec![
            None,
            Some(IntermediaryRecord::new(vec![], vec![])),
            Some(IntermediaryRecord::new(
                vec![Value::Float(0.0)],
                vec![StateValue::scalar(9.0)],
            )),
        ];

        let err = normalize_intermediaries(&records, None).unwrap_err();
        assert!(matches!(err, EnsembleError::MalformedRunOutput { run: 2, .. }));
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let records = vec![
            None,
            Some(IntermediaryRecord::new(
                vec![Value::Float(0.0)],
                vec![],
            )),
        ];

        let err = normalize_intermediaries(&records, None).unwrap_err();
        assert!(matches!(err, EnsembleError::MalformedRunOutput { run: 1, .. }));
    }
}
