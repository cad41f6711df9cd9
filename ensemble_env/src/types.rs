//! Value types exchanged with the upstream solver.

use crate::error::EnvError;
use crate::units::{Quantity, UnitAware};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single leaf value recorded by a simulation run.
///
/// Solvers hand back whatever their model holds, so besides numbers a slot
/// may carry text, a callable placeholder or an interpolation object. Only
/// the numeric-like variants ever make it into a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Float(f64),
    Int(i64),
    Quantity(Quantity),
    /// No value was recorded
    Missing,
    Text(String),
    /// Callable placeholder, identified by name
    Function(String),
    /// Interpolated input series, identified by name
    Interpolation(String),
}

impl Value {
    /// Returns true for values that reduce to a plain number.
    pub fn is_numeric_like(&self) -> bool {
        matches!(self, Value::Float(_) | Value::Int(_) | Value::Quantity(_))
    }

    /// Returns true for callable and interpolation placeholders.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Interpolation(_))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Quantity(_) => "quantity",
            Value::Missing => "missing",
            Value::Text(_) => "text",
            Value::Function(_) => "function",
            Value::Interpolation(_) => "interpolation",
        }
    }

    /// Strips units and coerces to `f64`.
    ///
    /// `Missing` maps to `Ok(None)`; text and callables are an error.
    pub fn strip(&self) -> Result<Option<f64>, EnvError> {
        match self {
            Value::Missing => Ok(None),
            other => other
                .magnitude()
                .map(Some)
                .ok_or_else(|| EnvError::non_numeric(other.kind())),
        }
    }
}

impl UnitAware for Value {
    fn is_quantity(&self) -> bool {
        matches!(self, Value::Quantity(q) if q.is_quantity())
    }

    fn magnitude(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            Value::Quantity(q) => Some(q.strip()),
            Value::Missing | Value::Text(_) | Value::Function(_) | Value::Interpolation(_) => None,
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Value::Quantity(q)
    }
}

impl From<Option<f64>> for Value {
    fn from(x: Option<f64>) -> Self {
        x.map_or(Value::Missing, Value::Float)
    }
}

/// Shape of a state vector (or parameter set) at one time point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    /// One unnamed value
    Scalar(Value),
    /// Values bound to names by position
    Sequence(Vec<Value>),
    /// Values bound to names by field
    Record(BTreeMap<String, Value>),
}

impl StateValue {
    /// Creates a scalar state.
    pub fn scalar(v: impl Into<Value>) -> Self {
        StateValue::Scalar(v.into())
    }

    /// Creates a positional state.
    pub fn sequence<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        StateValue::Sequence(values.into_iter().map(Into::into).collect())
    }

    /// Creates a named-field state.
    pub fn record<K: Into<String>, V: Into<Value>>(
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        StateValue::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Number of leaf values.
    pub fn len(&self) -> usize {
        match self {
            StateValue::Scalar(_) => 1,
            StateValue::Sequence(values) => values.len(),
            StateValue::Record(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One design point: a value per parameter, in lexicographic name order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    /// Parameter names, sorted
    pub names: Vec<String>,

    /// Values aligned with `names`
    pub values: Vec<f64>,
}

impl ParameterCombination {
    /// Creates a combination from aligned names and values.
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Looks up a parameter value by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// Iterates `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Returns the combination as a named parameter set for a run output.
    pub fn to_parameter_set(&self) -> StateValue {
        StateValue::record(self.iter().map(|(n, v)| (n.to_string(), v)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Raw output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Time points (plain numbers or quantities)
    pub times: Vec<Value>,

    /// State at each time point, aligned with `times`
    pub states: Vec<StateValue>,

    /// Initial condition
    pub initial: StateValue,

    /// Parameter set the run was solved with (`None` if absent)
    #[serde(default)]
    pub parameters: Option<StateValue>,
}

impl RunOutput {
    /// Creates a run output without parameters.
    pub fn new(times: Vec<Value>, states: Vec<StateValue>, initial: StateValue) -> Self {
        Self {
            times,
            states,
            initial,
            parameters: None,
        }
    }

    /// Attaches a parameter set.
    pub fn with_parameters(mut self, parameters: StateValue) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Derived quantities recorded alongside one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntermediaryRecord {
    /// Time points of the recording
    pub times: Vec<Value>,

    /// Recorded values, aligned with `times`
    pub values: Vec<StateValue>,
}

impl IntermediaryRecord {
    /// Creates a record from aligned times and values.
    pub fn new(times: Vec<Value>, values: Vec<StateValue>) -> Self {
        Self { times, values }
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_like_predicate() {
        assert!(Value::Float(1.0).is_numeric_like());
        assert!(Value::Int(3).is_numeric_like());
        assert!(Value::Quantity(Quantity::new(2.0, "m")).is_numeric_like());
        assert!(!Value::Missing.is_numeric_like());
        assert!(!Value::Text("a".into()).is_numeric_like());
        assert!(!Value::Function("f".into()).is_numeric_like());
        assert!(Value::Interpolation("input".into()).is_callable());
    }

    #[test]
    fn test_strip_values() {
        assert_eq!(Value::Int(4).strip(), Ok(Some(4.0)));
        assert_eq!(Value::Quantity(Quantity::new(7.5, "d")).strip(), Ok(Some(7.5)));
        assert_eq!(Value::Missing.strip(), Ok(None));
        assert_eq!(
            Value::Text("x".into()).strip(),
            Err(EnvError::NonNumeric("text"))
        );
    }

    #[test]
    fn test_combination_lookup() {
        let combo = ParameterCombination::new(
            vec!["alpha".to_string(), "beta".to_string()],
            vec![0.5, 5.0],
        );

        assert_eq!(combo.get("beta"), Some(5.0));
        assert_eq!(combo.get("gamma"), None);

        let set = combo.to_parameter_set();
        assert_eq!(set.len(), 2);
        assert!(matches!(set, StateValue::Record(ref f) if f["alpha"] == Value::Float(0.5)));
    }

    #[test]
    fn test_combination_lookup_with_short_values() {
        let combo = ParameterCombination {
            names: vec!["alpha".to_string(), "beta".to_string()],
            values: vec![0.5],
        };

        assert_eq!(combo.get("alpha"), Some(0.5));
        assert_eq!(combo.get("beta"), None);
    }

    #[test]
    fn test_state_value_serde_shape() {
        let state = StateValue::sequence([1.0, 2.0]);
        let json = serde_json::to_string(&state).unwrap();

        assert_eq!(json, r#"{"sequence":[{"float":1.0},{"float":2.0}]}"#);
        let back: StateValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
