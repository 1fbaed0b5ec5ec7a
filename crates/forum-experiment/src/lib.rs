//! Forum Experiment: run harness for the contagion kernel.
//!
//! This crate wraps the single-threaded kernel with:
//! - Presets and TOML configuration files
//! - Seeded batches and parameter sweeps executed in parallel
//! - Per-run records, tidy per-agent observations and summary statistics

pub mod experiment;
pub mod results;
pub mod settings;

pub use experiment::{ExperimentRunner, ExperimentRunnerConfig, SweepAxes};
pub use results::{AgentTrajectory, ConfigSummary, GridResults, Observation, RunRecord};
pub use settings::{Preset, load_config, parse_config, parse_preset, render_config};
