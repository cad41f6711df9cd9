//! Ensemble Simulator CLI
//!
//! Run a parameter sweep of the logistic fixture and summarize it.

use anyhow::{bail, Context};
use clap::Parser;
use ensemble_core::{EnsembleConfig, ParameterRanges};
use ensemble_sim::{EnsembleReport, EnsembleRunner, LogisticFixture};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// One `--param name=v1,v2,...` argument.
#[derive(Debug, Clone)]
struct ParamRange {
    name: String,
    values: Vec<f64>,
}

fn parse_param(arg: &str) -> Result<ParamRange, String> {
    let (name, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=v1,v2,... but got '{arg}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{arg}'"));
    }
    let values = values
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("bad value '{v}' for {name}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParamRange {
        name: name.to_string(),
        values,
    })
}

/// Ensemble processing CLI
#[derive(Parser, Debug)]
#[command(name = "ensemble-sim")]
#[command(about = "Run a parameter sweep and summarize it over replicates", long_about = None)]
struct Args {
    /// Master seed for determinism
    #[arg(short, long)]
    seed: Option<u64>,

    /// Replicates per parameter combination
    #[arg(short, long)]
    replicates: Option<usize>,

    /// Parameter values, e.g. rate=0.3,0.6 (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<ParamRange>,

    /// Pair parameter values by position instead of crossing them
    #[arg(long)]
    paired: bool,

    /// Quantile levels, e.g. 0.025,0.975
    #[arg(short, long, value_delimiter = ',')]
    quantiles: Option<Vec<f64>>,

    /// Time points after t = 0
    #[arg(long, default_value = "50")]
    steps: usize,

    /// Spacing between time points (days)
    #[arg(long, default_value = "0.5")]
    dt: f64,

    /// Relative observation noise
    #[arg(long, default_value = "0.05")]
    noise: f64,

    /// Observation dropout probability
    #[arg(long, default_value = "0.0")]
    dropout: f64,

    /// Use the parallel path
    #[arg(long)]
    parallel: bool,

    /// Worker threads for the parallel path (default: one per core)
    #[arg(short, long)]
    threads: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Merges the configuration file (if any) with the command-line flags.
    fn ensemble_config(&self) -> anyhow::Result<EnsembleConfig> {
        let mut config = match &self.config {
            Some(path) => EnsembleConfig::load(path)
                .with_context(|| format!("loading configuration from {path}"))?,
            None => EnsembleConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(replicates) = self.replicates {
            config.replicates = replicates;
        }
        if let Some(quantiles) = &self.quantiles {
            config.quantiles = quantiles.clone();
        }
        if self.paired {
            config.crossed = false;
        }
        if self.parallel {
            config.parallel = true;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }

        if !self.params.is_empty() {
            config.ranges = self
                .params
                .iter()
                .map(|p| (p.name.clone(), p.values.clone()))
                .collect::<ParameterRanges>();
        } else if config.ranges.is_empty() {
            config = config
                .with_range("rate", vec![0.3, 0.6])
                .with_range("capacity", vec![100.0, 200.0]);
        }

        Ok(config)
    }
}

/// Logs the final-time statistics of every combination.
fn log_report(report: &EnsembleReport) {
    let summary = &report.tables.summary;
    let Some(t_end) = summary.rows.iter().map(|r| r.time).max_by(f64::total_cmp) else {
        info!("Empty ensemble, nothing to summarize");
        return;
    };

    info!(
        "{} runs ({} combinations x {} replicates) processed in {:.2} ms",
        report.total_runs, report.combinations, report.replicates, report.processing_ms
    );
    info!("Final-time population (t={:.2}):", t_end);

    for c in 1..=report.combinations {
        let Some(row) = summary.find(c, t_end, "population") else {
            continue;
        };
        let quantiles: Vec<String> = summary
            .quantile_columns()
            .iter()
            .zip(&row.quantiles)
            .map(|(name, q)| format!("{name}={q:.2}"))
            .collect();
        info!(
            "  #{} mean={:.2} median={:.2} var={:.2} {} missing={}",
            c,
            row.mean,
            row.median,
            row.variance,
            quantiles.join(" "),
            row.missing_count
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    if args.dt.is_nan() || args.dt <= 0.0 {
        bail!("--dt must be positive");
    }

    let config = args.ensemble_config()?;
    let fixture = LogisticFixture::new(args.steps, args.dt)
        .with_noise(args.noise)
        .with_dropout(args.dropout);

    if !args.json {
        info!("Ensemble Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let report = EnsembleRunner::new(config)
        .run(&fixture)
        .context("ensemble run failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        log_report(&report);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        let p = parse_param("rate=0.3, 0.6").unwrap();
        assert_eq!(p.name, "rate");
        assert_eq!(p.values, vec![0.3, 0.6]);

        assert!(parse_param("rate").is_err());
        assert!(parse_param("=1").is_err());
        assert!(parse_param("rate=a").is_err());
    }

    #[test]
    fn test_default_ranges() {
        let args = Args::parse_from(["ensemble-sim"]);
        let config = args.ensemble_config().unwrap();

        assert_eq!(config.ranges.len(), 2);
        assert_eq!(config.ranges["capacity"], vec![100.0, 200.0]);
        assert!(config.crossed);
        assert!(!config.parallel);
    }

    #[test]
    fn test_flags_override() {
        let args = Args::parse_from([
            "ensemble-sim",
            "--param",
            "rate=0.1,0.2,0.3",
            "--param",
            "capacity=50,60,70",
            "--paired",
            "--replicates",
            "3",
            "--quantiles",
            "0.1,0.5,0.9",
            "--parallel",
            "--threads",
            "2",
        ]);
        let config = args.ensemble_config().unwrap();

        assert_eq!(config.ranges["rate"], vec![0.1, 0.2, 0.3]);
        assert!(!config.crossed);
        assert_eq!(config.replicates, 3);
        assert_eq!(config.quantiles, vec![0.1, 0.5, 0.9]);
        assert!(config.parallel);
        assert_eq!(config.threads, Some(2));
    }
}
