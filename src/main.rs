//! intervene CLI - sample from interventional distributions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intervene::{Config, DrawRunner, InterventionSpec, Value};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "intervene")]
#[command(version)]
#[command(about = "Sample from interventional distributions via propensity weighting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw interventional datasets from observational data
    Sample {
        /// Path to input dataset JSONL file (one JSON object per row)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to output JSONL file (one draw per line)
        #[arg(short, long)]
        output: PathBuf,

        /// Treatment value to force, e.g. "true", "2", "0.5".
        /// Omit when keep_original_treatment is set.
        #[arg(short, long)]
        intervene: Option<String>,

        /// Number of draws (overrides config)
        #[arg(long)]
        draws: Option<usize>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

/// Parse a treatment value: bool, then integer level, then float.
fn parse_value(s: &str) -> Result<Value> {
    if let Ok(b) = s.parse::<bool>() {
        return Ok(Value::Bool(b));
    }
    if let Ok(l) = s.parse::<i64>() {
        return Ok(Value::Level(l));
    }
    if let Ok(f) = s.parse::<f64>() {
        return Ok(Value::Float(f));
    }
    anyhow::bail!("cannot parse treatment value '{s}' as bool, integer, or float")
}

fn print_example_config() {
    let example = r#"# intervene configuration file

[variables]
treatment = "d"
outcome = "y"
# Declared column types (optional; inferred from data otherwise)
# types = { z = "continuous", d = "binary" }

[identification]
# Produced by your identification step (backdoor-adjustment set)
common_causes = ["z"]
identified = true

[sampling]
keep_original_treatment = false
stateful = false
proceed_despite_unidentified = false
draws = 100
# sample_size = 5000       # rows per draw; default: input row count
# propensity_clip = 0.01   # clamp scores into [clip, 1-clip]; off by default
# include_weights = false  # append a `weight` column to each draw
# seed = 42                # reproducible draws

[estimator]
learning_rate = 0.1
l2 = 0.01
max_iterations = 1000
tolerance = 1e-6
"#;
    println!("{example}");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            Ok(())
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            info!(
                treatment = %config.variables.treatment,
                outcome = %config.variables.outcome,
                common_causes = config.identification.common_causes.len(),
                "Configuration is valid"
            );
            Ok(())
        }

        Commands::Sample {
            data,
            output,
            intervene,
            draws,
        } => {
            let mut config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            if let Some(draws) = draws {
                config.sampling.draws = draws;
            }

            let intervention = match intervene {
                Some(raw) => Some(InterventionSpec::force(parse_value(&raw)?)),
                None => None,
            };

            let dataset = DrawRunner::load_dataset(&data)
                .with_context(|| format!("Failed to load dataset from {data:?}"))?;

            let runner = DrawRunner::new(config);
            let stats = runner
                .run(dataset, intervention, &output)
                .context("Draw run failed")?;

            info!(
                draws = stats.total_draws,
                output = %output.display(),
                "Wrote interventional draws"
            );
            Ok(())
        }
    }
}
