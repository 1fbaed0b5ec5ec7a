//! Forum Contagion Experiment CLI.
//!
//! Commands:
//! - single: Run one simulation and print its step table
//! - batch: Run repeated seeded simulations of one configuration
//! - sweep: Cross population size, field impact and satiation
//! - config: Print a preset as TOML, ready to edit

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use contagion_kernel::{Model, SimConfig};
use forum_experiment::experiment::{ExperimentRunner, ExperimentRunnerConfig, SweepAxes};
use forum_experiment::results::{GridResults, RunRecord};
use forum_experiment::settings::{load_config, parse_preset, render_config, timestamped_path};

#[derive(Parser)]
#[command(name = "forum-experiment")]
#[command(version)]
#[command(about = "Collective emotion simulations of an online discussion thread")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every simulation command.
#[derive(Args)]
struct SimArgs {
    /// Parameter preset (cyberemotions, opinion)
    #[arg(long, default_value = "cyberemotions")]
    preset: String,

    /// TOML configuration file (overrides the preset)
    #[arg(long, env = "FORUM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of agents
    #[arg(long)]
    agents: Option<usize>,

    /// Maximum steps
    #[arg(long)]
    steps: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
}

impl SimArgs {
    fn resolve(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => parse_preset(&self.preset)?.config(),
        };
        if let Some(agents) = self.agents {
            config.agents = agents;
        }
        if let Some(steps) = self.steps {
            config.max_steps = steps;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation
    Single {
        #[command(flatten)]
        sim: SimArgs,

        /// Output file for the run record
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run repeated simulations of one configuration
    Batch {
        #[command(flatten)]
        sim: SimArgs,

        /// Number of runs
        #[arg(long, default_value = "10")]
        runs: usize,

        /// Maximum concurrent runs
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Output file for results
        #[arg(long, default_value = "batch.json")]
        output: PathBuf,

        /// Output file for per-agent observations (JSON Lines)
        #[arg(long)]
        observations: Option<PathBuf>,
    },

    /// Run a parameter sweep
    Sweep {
        #[command(flatten)]
        sim: SimArgs,

        /// Runs per configuration
        #[arg(long, default_value = "5")]
        runs: usize,

        /// Population sizes to test (comma-separated)
        #[arg(long = "agent-counts", value_delimiter = ',')]
        agent_counts: Vec<usize>,

        /// Field impact magnitudes to test (comma-separated)
        #[arg(long, value_delimiter = ',')]
        impacts: Vec<f64>,

        /// Satiation constants to test (comma-separated)
        #[arg(long, value_delimiter = ',')]
        satiation: Vec<f64>,

        /// Maximum concurrent runs
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Output file for results
        #[arg(long, default_value = "sweep.json")]
        output: PathBuf,

        /// Output file for per-agent observations (JSON Lines)
        #[arg(long)]
        observations: Option<PathBuf>,
    },

    /// Print a preset configuration as TOML
    Config {
        /// Parameter preset (cyberemotions, opinion)
        #[arg(long, default_value = "cyberemotions")]
        preset: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Single { sim, output } => {
            let config = sim.resolve()?;
            let mut model = Model::new(config)?;
            info!(
                agents = model.population_size(),
                seed = model.seed(),
                impact = model.impact(),
                "Starting single run"
            );

            println!(
                "  {:>4} {:>6} {:>4} {:>4} {:>8} {:>9} {:>9}",
                "Step", "Active", "Pos", "Neg", "Satiated", "h_signed", "h_abs"
            );
            let started_at = Utc::now();
            while let Some(report) = model.step() {
                println!(
                    "  {:>4} {:>6} {:>4} {:>4} {:>8} {:>9.4} {:>9.4}",
                    report.step,
                    report.population,
                    report.positive,
                    report.negative,
                    report.satiated,
                    report.charge.signed,
                    report.charge.absolute
                );
            }
            let record = RunRecord::from_model(0, &model, started_at, Utc::now());

            println!("\n=== Run Result ===");
            println!("Seed: {}", record.seed);
            println!("Steps: {}", record.steps);
            if let Some(termination) = record.termination {
                println!("Termination: {:?}", termination);
            }
            println!("Final population: {}", record.final_population());
            println!("Total expressions: {}", record.total_expressions());
            if let Some(theta) = model.field().opinion() {
                println!("Field opinion: {:.4}", theta);
            }

            if let Some(output) = output {
                let mut results = GridResults::new();
                results.add(record);
                results.compute_summary();
                let output_path = timestamped_path(&output);
                results.save(&output_path)?;
                println!("Results saved to: {}", output_path.display());
            }
        }

        Commands::Batch {
            sim,
            runs,
            max_concurrent,
            output,
            observations,
        } => {
            let runner = ExperimentRunner::new(runner_config(sim.resolve()?, runs, max_concurrent));
            info!(runs = runs, "Starting batch");

            let results = runner.run_batch().await?;
            report(&results, &output, observations.as_deref(), "Batch")?;
        }

        Commands::Sweep {
            sim,
            runs,
            agent_counts,
            impacts,
            satiation,
            max_concurrent,
            output,
            observations,
        } => {
            let runner = ExperimentRunner::new(runner_config(sim.resolve()?, runs, max_concurrent));
            let axes = SweepAxes {
                agents: agent_counts,
                impacts,
                satiation,
            };
            for point in axes.points(&runner.config().base) {
                point.validate()?;
            }

            let results = runner.run_sweep(&axes).await?;
            report(&results, &output, observations.as_deref(), "Sweep")?;
        }

        Commands::Config { preset } => {
            let config = parse_preset(&preset)?.config();
            print!("{}", render_config(&config)?);
        }
    }

    Ok(())
}

fn runner_config(
    base: SimConfig,
    runs: usize,
    max_concurrent: Option<usize>,
) -> ExperimentRunnerConfig {
    let defaults = ExperimentRunnerConfig::default();
    ExperimentRunnerConfig {
        base,
        runs,
        max_concurrent: max_concurrent.unwrap_or(defaults.max_concurrent),
    }
}

fn report(
    results: &GridResults,
    output: &Path,
    observations: Option<&Path>,
    label: &str,
) -> Result<()> {
    let output_path = timestamped_path(output);
    results.save(&output_path)?;

    println!("\n=== {} Complete ===", label);
    println!("Results saved to: {}", output_path.display());

    if let Some(path) = observations {
        let path = timestamped_path(path);
        let rows = results.save_observations(&path)?;
        println!("Observations saved to: {} ({} rows)", path.display(), rows);
    }

    let mut keys: Vec<&String> = results.summary.keys().collect();
    keys.sort();
    println!("\nSummary:");
    for key in keys {
        let summary = &results.summary[key];
        println!(
            "  {}: runs={}, avg_steps={:.1}, exhaustion_rate={:.1}%, final_population={:.1}, |h|={:.3}",
            key,
            summary.runs,
            summary.avg_steps,
            summary.exhaustion_rate * 100.0,
            summary.avg_final_population,
            summary.avg_final_abs_charge
        );
    }
    Ok(())
}
