//! Closed-form logistic growth model used as the ensemble's solver.
//!
//! The fixture evaluates the analytic solution
//!
//! ```text
//! N(t) = K / (1 + ((K - N0) / N0) e^(-r t))
//! ```
//!
//! at evenly spaced times, then perturbs every observation with
//! multiplicative Gaussian noise. Observations can also drop out, which
//! shows up as missing values in the tables.

use ensemble_env::{
    EnsembleSolver, EnvError, IntermediaryRecord, ParameterCombination, Quantity, RunContext,
    RunOutput, SolvedRun, StateValue, Value,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Logistic population model with observation noise.
#[derive(Debug, Clone)]
pub struct LogisticFixture {
    /// Population at t = 0
    initial_population: f64,

    /// Number of time points after t = 0
    steps: usize,

    /// Spacing between time points (days)
    dt: f64,

    /// Relative standard deviation of the observation noise
    noise_std: f64,

    /// Probability that an observation is lost
    dropout: f64,
}

impl LogisticFixture {
    /// Creates a fixture with `steps` time points after the initial one.
    pub fn new(steps: usize, dt: f64) -> Self {
        Self {
            initial_population: 10.0,
            steps,
            dt,
            noise_std: 0.05,
            dropout: 0.0,
        }
    }

    /// Sets the initial population.
    pub fn with_initial_population(mut self, n0: f64) -> Self {
        self.initial_population = n0;
        self
    }

    /// Sets the relative observation noise.
    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.noise_std = std_dev;
        self
    }

    /// Sets the observation dropout probability.
    pub fn with_dropout(mut self, probability: f64) -> Self {
        self.dropout = probability;
        self
    }

    /// Noise-free population at time `t`.
    pub fn population(&self, rate: f64, capacity: f64, t: f64) -> f64 {
        let n0 = self.initial_population;
        capacity / (1.0 + ((capacity - n0) / n0) * (-rate * t).exp())
    }

    fn parameter(combination: &ParameterCombination, name: &str) -> Result<f64, EnvError> {
        combination
            .get(name)
            .ok_or_else(|| EnvError::solver(format!("missing parameter '{name}'")))
    }
}

impl EnsembleSolver for LogisticFixture {
    fn solve(
        &self,
        combination: &ParameterCombination,
        run: &RunContext,
    ) -> Result<SolvedRun, EnvError> {
        let rate = Self::parameter(combination, "rate")?;
        let capacity = Self::parameter(combination, "capacity")?;
        if capacity <= 0.0 || self.initial_population <= 0.0 {
            return Err(EnvError::solver(format!(
                "population and capacity must be positive (N0={}, K={})",
                self.initial_population, capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(EnvError::solver(format!("dropout {} outside [0, 1]", self.dropout)));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(run.seed);
        let noise = Normal::new(0.0, self.noise_std).map_err(|e| EnvError::solver(e.to_string()))?;

        let points = self.steps + 1;
        let mut times = Vec::with_capacity(points);
        let mut states = Vec::with_capacity(points);
        let mut growth = Vec::with_capacity(points);

        for i in 0..points {
            let t = i as f64 * self.dt;
            let n = self.population(rate, capacity, t);
            let observed = (n * (1.0 + noise.sample(&mut rng))).max(0.0);
            let value = if self.dropout > 0.0 && rng.gen_bool(self.dropout) {
                Value::Missing
            } else {
                Value::Float(observed)
            };

            times.push(Value::Quantity(Quantity::new(t, "d")));
            states.push(StateValue::record([("population", value)]));
            growth.push(StateValue::scalar(rate * n * (1.0 - n / capacity)));
        }

        let mut parameters = combination.to_parameter_set();
        if let StateValue::Record(fields) = &mut parameters {
            fields.insert("growth_law".to_string(), Value::Function("logistic".to_string()));
        }

        let output = RunOutput::new(
            times.clone(),
            states,
            StateValue::record([("population", self.initial_population)]),
        )
        .with_parameters(parameters);

        Ok(SolvedRun {
            output,
            intermediary: Some(IntermediaryRecord::new(times, growth)),
        })
    }

    fn variable_names(&self) -> Vec<String> {
        vec!["population".to_string()]
    }

    fn intermediary_names(&self) -> Vec<String> {
        vec!["growth_rate".to_string()]
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn combination(rate: f64, capacity: f64) -> ParameterCombination {
        ParameterCombination::new(
            vec!["capacity".to_string(), "rate".to_string()],
            vec![capacity, rate],
        )
    }

    fn context(seed: u64) -> RunContext {
        RunContext {
            index: 0,
            combination_index: 1,
            replicate_index: 1,
            seed,
        }
    }

    #[test]
    fn test_noise_free_curve() {
        let fixture = LogisticFixture::new(4, 1.0).with_noise(0.0);

        let solved = fixture.solve(&combination(0.5, 100.0), &context(1)).unwrap();

        assert_eq!(solved.output.len(), 5);
        let expected = fixture.population(0.5, 100.0, 2.0);
        match &solved.output.states[2] {
            StateValue::Record(fields) => {
                assert_relative_eq!(fields["population"].strip().unwrap().unwrap(), expected);
            }
            other => panic!("unexpected state shape: {:?}", other),
        }
        assert_relative_eq!(fixture.population(0.5, 100.0, 0.0), 10.0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let fixture = LogisticFixture::new(10, 0.5);

        let a = fixture.solve(&combination(0.3, 50.0), &context(7)).unwrap();
        let b = fixture.solve(&combination(0.3, 50.0), &context(7)).unwrap();
        let c = fixture.solve(&combination(0.3, 50.0), &context(8)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.output.states, c.output.states);
    }

    #[test]
    fn test_times_carry_units() {
        let fixture = LogisticFixture::new(2, 0.25);

        let solved = fixture.solve(&combination(0.3, 50.0), &context(1)).unwrap();

        assert_eq!(solved.output.times[1], Value::Quantity(Quantity::new(0.25, "d")));
        assert_eq!(solved.intermediary.unwrap().len(), 3);
    }

    #[test]
    fn test_parameter_set_follows_combination() {
        let fixture = LogisticFixture::new(1, 1.0);

        let solved = fixture.solve(&combination(0.3, 50.0), &context(1)).unwrap();

        assert_eq!(
            solved.output.parameters,
            Some(StateValue::record([
                ("capacity", Value::Float(50.0)),
                ("growth_law", Value::Function("logistic".to_string())),
                ("rate", Value::Float(0.3)),
            ]))
        );
    }

    #[test]
    fn test_full_dropout() {
        let fixture = LogisticFixture::new(3, 1.0).with_dropout(1.0);

        let solved = fixture.solve(&combination(0.3, 50.0), &context(1)).unwrap();

        assert!(solved
            .output
            .states
            .iter()
            .all(|s| *s == StateValue::record([("population", Value::Missing)])));
    }

    #[test]
    fn test_missing_parameter() {
        let fixture = LogisticFixture::new(3, 1.0);
        let only_rate = ParameterCombination::new(vec!["rate".to_string()], vec![0.1]);

        assert!(matches!(
            fixture.solve(&only_rate, &context(1)),
            Err(EnvError::SolverError(_))
        ));
        assert!(fixture.solve(&combination(0.1, -5.0), &context(1)).is_err());
    }
}
