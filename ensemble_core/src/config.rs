//! Ensemble configuration.
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes:
//!
//! ```json
//! { "replicates": 20, "quantiles": [0.05, 0.5, 0.95], "parallel": true }
//! ```

use crate::design::ParameterRanges;
use crate::error::{EnsembleError, Result};
use crate::summary::{validate_quantile_levels, DEFAULT_QUANTILES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Master seed; per-run seeds are derived from it
    #[serde(default = "EnsembleConfig::default_seed")]
    pub seed: u64,

    /// Candidate values per parameter
    #[serde(default)]
    pub ranges: ParameterRanges,

    /// Crossed (full factorial) or paired design
    #[serde(default = "EnsembleConfig::default_crossed")]
    pub crossed: bool,

    /// Replicates per parameter combination
    #[serde(default = "EnsembleConfig::default_replicates")]
    pub replicates: usize,

    /// Quantile levels reported by the summary
    #[serde(default = "EnsembleConfig::default_quantiles")]
    pub quantiles: Vec<f64>,

    /// Use the parallel path
    #[serde(default)]
    pub parallel: bool,

    /// Worker threads for the parallel path (`None` = one per core)
    #[serde(default)]
    pub threads: Option<usize>,
}

impl EnsembleConfig {
    fn default_seed() -> u64 {
        42
    }
    fn default_crossed() -> bool {
        true
    }
    fn default_replicates() -> usize {
        10
    }
    fn default_quantiles() -> Vec<f64> {
        DEFAULT_QUANTILES.to_vec()
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EnsembleError::Config(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| EnsembleError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Checks replicates and quantile levels.
    pub fn validate(&self) -> Result<()> {
        if self.replicates == 0 {
            return Err(EnsembleError::design("replicates must be at least 1"));
        }
        validate_quantile_levels(&self.quantiles)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the candidate values of one parameter.
    pub fn with_range(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.ranges.insert(name.into(), values);
        self
    }

    pub fn with_crossed(mut self, crossed: bool) -> Self {
        self.crossed = crossed;
        self
    }

    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = quantiles;
        self
    }

    /// Enables the parallel path with the given number of workers.
    pub fn with_parallel(mut self, threads: Option<usize>) -> Self {
        self.parallel = true;
        self.threads = threads;
        self
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            seed: Self::default_seed(),
            ranges: ParameterRanges::new(),
            crossed: Self::default_crossed(),
            replicates: Self::default_replicates(),
            quantiles: Self::default_quantiles(),
            parallel: false,
            threads: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EnsembleConfig::from_json_str(
            r#"{ "replicates": 20, "ranges": { "rate": [0.1, 0.2] }, "parallel": true }"#,
        )
        .unwrap();

        assert_eq!(config.replicates, 20);
        assert!(config.parallel);
        assert!(config.crossed);
        assert_eq!(config.seed, 42);
        assert_eq!(config.quantiles, vec![0.025, 0.975]);
        assert_eq!(config.ranges["rate"], vec![0.1, 0.2]);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            EnsembleConfig::from_json_str("{ replicates: }"),
            Err(EnsembleError::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(EnsembleConfig::default().validate().is_ok());
        assert!(EnsembleConfig::default().with_replicates(0).validate().is_err());
        assert!(matches!(
            EnsembleConfig::default().with_quantiles(vec![0.5, -1.0]).validate(),
            Err(EnsembleError::InvalidQuantileLevel(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = EnsembleConfig::default()
            .with_seed(7)
            .with_range("k", vec![1.0])
            .with_crossed(false)
            .with_parallel(Some(2));

        assert_eq!(config.seed, 7);
        assert!(!config.crossed);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.ranges.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EnsembleConfig::load("/nonexistent/ensemble.json"),
            Err(EnsembleError::Config(_))
        ));
    }
}
