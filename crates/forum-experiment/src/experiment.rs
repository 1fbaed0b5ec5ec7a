//! Experiment runner for forum contagion simulations.
//!
//! Orchestrates the run lifecycle:
//! 1. Derive the run's seed from the base seed and run index
//! 2. Build a fresh model (no state is shared between runs)
//! 3. Step until max steps or exhaustion
//! 4. Flatten trajectories into a run record
//!
//! Batches and sweeps execute runs on blocking worker threads. A semaphore
//! bounds them to `max_concurrent` at once. Results come back in job order
//! regardless of which run finishes first.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use contagion_kernel::{Model, SatiationConfig, SimConfig, Termination};

use crate::results::{GridResults, RunRecord, format_duration};

/// Configuration for the experiment runner.
#[derive(Debug, Clone)]
pub struct ExperimentRunnerConfig {
    /// Configuration every run starts from
    pub base: SimConfig,
    /// Runs per configuration
    pub runs: usize,
    /// Maximum runs executing at once
    pub max_concurrent: usize,
}

impl Default for ExperimentRunnerConfig {
    fn default() -> Self {
        Self {
            base: SimConfig::default(),
            runs: 1,
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Parameter axes crossed by a sweep. An empty axis keeps the base value.
#[derive(Debug, Clone, Default)]
pub struct SweepAxes {
    /// Population sizes
    pub agents: Vec<usize>,
    /// Field impact magnitudes (scaling mode follows the base config)
    pub impacts: Vec<f64>,
    /// Satiation constants
    pub satiation: Vec<f64>,
}

impl SweepAxes {
    /// Every point of the cross product, agents varying slowest.
    pub fn points(&self, base: &SimConfig) -> Vec<SimConfig> {
        let agents = axis(&self.agents, base.agents);
        let impacts: Vec<Option<f64>> = if self.impacts.is_empty() {
            vec![None]
        } else {
            self.impacts.iter().copied().map(Some).collect()
        };
        let satiation: Vec<Option<f64>> = if self.satiation.is_empty() {
            vec![None]
        } else {
            self.satiation.iter().copied().map(Some).collect()
        };

        let mut points = Vec::with_capacity(agents.len() * impacts.len() * satiation.len());
        for &agent_count in &agents {
            for impact in &impacts {
                for constant in &satiation {
                    let mut config = base.clone();
                    config.agents = agent_count;
                    if let Some(magnitude) = impact {
                        config.field.impact = base.field.impact.with_magnitude(*magnitude);
                    }
                    if let Some(constant) = constant {
                        config.satiation = Some(SatiationConfig {
                            constant: *constant,
                            order: base.satiation.map(|s| s.order).unwrap_or_default(),
                        });
                    }
                    points.push(config);
                }
            }
        }
        points
    }
}

fn axis<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

/// The experiment runner.
pub struct ExperimentRunner {
    config: ExperimentRunnerConfig,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentRunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentRunnerConfig {
        &self.config
    }

    /// Run a single simulation to termination.
    pub fn run(&self, config: &SimConfig, run: usize) -> Result<RunRecord> {
        execute(run_config(config, run), run)
    }

    /// `runs` repetitions of the base configuration.
    pub async fn run_batch(&self) -> Result<GridResults> {
        let jobs = (0..self.config.runs)
            .map(|run| (run_config(&self.config.base, run), run))
            .collect();
        self.run_jobs(jobs).await
    }

    /// `runs` repetitions of every sweep point.
    pub async fn run_sweep(&self, axes: &SweepAxes) -> Result<GridResults> {
        let points = axes.points(&self.config.base);
        info!(
            points = points.len(),
            runs = self.config.runs,
            "Starting sweep"
        );

        let jobs = points
            .iter()
            .flat_map(|point| (0..self.config.runs).map(move |run| (run_config(point, run), run)))
            .collect();
        self.run_jobs(jobs).await
    }

    async fn run_jobs(&self, jobs: Vec<(SimConfig, usize)>) -> Result<GridResults> {
        let total = jobs.len();
        // Bound concurrent runs; a finished run frees its slot immediately
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let completed = Arc::new(AtomicUsize::new(0));

        let handles = jobs.into_iter().map(|(config, run)| {
            let semaphore = semaphore.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                let record = tokio::task::spawn_blocking(move || execute(config, run)).await??;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    progress = format!("{}/{}", done, total),
                    agents = record.config.agents,
                    run = record.run,
                    steps = record.steps,
                    termination = ?record.termination,
                    "Completed run"
                );
                Ok::<_, anyhow::Error>(record)
            })
        });

        // join_all keeps job order regardless of completion order
        let mut results = GridResults::new();
        for outcome in join_all(handles).await {
            results.add(outcome??);
        }

        results.compute_summary();
        Ok(results)
    }
}

/// Seed run `run` as `base_seed + run`; unseeded configs stay unseeded.
pub fn run_config(config: &SimConfig, run: usize) -> SimConfig {
    SimConfig {
        seed: config.seed.map(|seed| seed.wrapping_add(run as u64)),
        ..config.clone()
    }
}

fn execute(config: SimConfig, run: usize) -> Result<RunRecord> {
    let started_at = Utc::now();
    let start_time = Instant::now();

    let mut model = Model::new(config)?;
    debug!(run = run, seed = model.seed(), "Starting run");
    let termination = model.run();

    let elapsed = format_duration(start_time.elapsed().as_millis() as u64);
    debug!(
        run = run,
        steps = model.step_count(),
        termination = ?termination,
        elapsed = %elapsed,
        "Run finished"
    );
    if termination == Termination::Exhausted {
        warn!(
            run = run,
            steps = model.step_count(),
            max_steps = model.config().max_steps,
            "Population exhausted before max steps"
        );
    }

    Ok(RunRecord::from_model(run, &model, started_at, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contagion_kernel::{FieldImpact, SatiationOrder};

    #[test]
    fn test_run_config_offsets_seed() {
        let base = SimConfig {
            seed: Some(100),
            ..Default::default()
        };
        assert_eq!(run_config(&base, 0).seed, Some(100));
        assert_eq!(run_config(&base, 7).seed, Some(107));

        let unseeded = SimConfig::default();
        assert_eq!(run_config(&unseeded, 3).seed, None);

        let edge = SimConfig {
            seed: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(run_config(&edge, 1).seed, Some(0));
    }

    #[test]
    fn test_empty_axes_yield_base_point() {
        let base = SimConfig::default();
        let points = SweepAxes::default().points(&base);
        assert_eq!(points, vec![base]);
    }

    #[test]
    fn test_sweep_cross_product() {
        let mut base = SimConfig::default();
        base.field.impact = FieldImpact::PerCapita { k: 1.0 };
        base.satiation = Some(SatiationConfig {
            constant: 0.1,
            order: SatiationOrder::AfterRelaxation,
        });

        let axes = SweepAxes {
            agents: vec![10, 100],
            impacts: vec![1.0, 2.0, 4.0],
            satiation: vec![0.5, 1.0],
        };
        let points = axes.points(&base);
        assert_eq!(points.len(), 12);

        assert_eq!(points[0].agents, 10);
        assert_eq!(points[0].field.impact, FieldImpact::PerCapita { k: 1.0 });
        assert_eq!(points[11].agents, 100);
        assert_eq!(points[11].field.impact, FieldImpact::PerCapita { k: 4.0 });

        let last = points[11].satiation.unwrap();
        assert_eq!(last.constant, 1.0);
        assert_eq!(last.order, SatiationOrder::AfterRelaxation);
    }

    #[test]
    fn test_run_is_reproducible() {
        let runner = ExperimentRunner::new(ExperimentRunnerConfig::default());
        let config = SimConfig {
            seed: Some(5),
            ..Default::default()
        };
        let a = runner.run(&config, 2).unwrap();
        let b = runner.run(&config, 2).unwrap();
        assert_eq!(a.seed, 7);
        assert_eq!(a.agents, b.agents);
        assert_eq!(a.field_history, b.field_history);
    }

    #[test]
    fn test_invalid_config_surfaces_as_error() {
        let runner = ExperimentRunner::new(ExperimentRunnerConfig::default());
        let config = SimConfig {
            max_steps: 0,
            ..Default::default()
        };
        let err = runner.run(&config, 0).unwrap_err();
        assert!(err.to_string().contains("step count"));
    }
}
