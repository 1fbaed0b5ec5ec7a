//! Results collection and output for forum contagion runs.
//!
//! Captures, per run:
//! - Per-agent valence/arousal (and opinion) trajectories
//! - Population, expression and field charge per step
//! - Termination reason and the seed needed to replay the run
//!
//! Runs flatten into tidy [`Observation`] rows (one per agent per step) so
//! downstream aggregation only needs to group by step.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contagion_kernel::{
    AgentId, ChannelPair, EmotionSample, FieldCharge, Model, SimConfig, Termination,
};

/// One agent's trajectory over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTrajectory {
    pub agent: AgentId,
    pub baseline: ChannelPair<f64>,
    pub threshold: f64,
    /// Step at which the agent left through satiation
    pub exited_at: Option<usize>,
    /// One sample per step the agent acted in
    pub samples: Vec<EmotionSample>,
}

/// Results from a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run index within its batch
    pub run: usize,
    /// Seed actually used (replays the run exactly)
    pub seed: u64,
    /// Run configuration
    pub config: SimConfig,
    /// Field impact after population scaling
    pub impact: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Steps executed
    pub steps: usize,
    /// `None` when the model was captured before it terminated
    pub termination: Option<Termination>,
    /// Active agents per step (index 0 = initial population)
    pub population_history: Vec<usize>,
    /// Expressions per step (index 0 = initial state)
    pub expression_history: Vec<usize>,
    /// Field charge per step (index 0 = initial charge)
    pub field_history: Vec<FieldCharge>,
    /// Field opinion per step, when opinion dynamics are enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_opinion_history: Vec<f64>,
    /// Agent trajectories ordered by agent id
    pub agents: Vec<AgentTrajectory>,
}

/// One row per (agent, step): the tidy layout consumed by plotting and analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub run: usize,
    pub population_size: usize,
    pub step: usize,
    pub agent: usize,
    pub valence: f64,
    pub arousal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opinion: Option<f64>,
    /// Active agents after this step
    pub active_agents: usize,
    /// Expressions during this step
    pub expressions: usize,
    pub signed_charge: f64,
    pub absolute_charge: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_opinion: Option<f64>,
}

impl RunRecord {
    /// Capture a terminated model.
    pub fn from_model(
        run: usize,
        model: &Model,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        let mut agents: Vec<AgentTrajectory> = model
            .agents()
            .map(|agent| AgentTrajectory {
                agent: agent.id(),
                baseline: agent.baseline(),
                threshold: agent.threshold(),
                exited_at: agent.exited_at(),
                samples: agent.history().to_vec(),
            })
            .collect();
        agents.sort_by_key(|t| t.agent);

        Self {
            run,
            seed: model.seed(),
            config: model.config().clone(),
            impact: model.impact(),
            started_at,
            ended_at,
            steps: model.step_count(),
            termination: model.termination(),
            population_history: model.population_history().to_vec(),
            expression_history: model.expression_history().to_vec(),
            field_history: model.field().history().to_vec(),
            field_opinion_history: model.field().opinion_history().to_vec(),
            agents,
        }
    }

    /// Grouping key for summaries: the swept parameters.
    pub fn config_key(&self) -> String {
        let satiation = self
            .config
            .satiation
            .map(|s| s.constant.to_string())
            .unwrap_or_else(|| "off".to_string());
        format!(
            "agents={}:impact={}:satiation={}:opinion={}",
            self.config.agents,
            self.impact,
            satiation,
            self.config.opinion.is_some()
        )
    }

    pub fn exhausted(&self) -> bool {
        self.termination == Some(Termination::Exhausted)
    }

    pub fn final_population(&self) -> usize {
        self.population_history.last().copied().unwrap_or(0)
    }

    pub fn total_expressions(&self) -> usize {
        self.expression_history.iter().sum()
    }

    /// Flatten into tidy rows, ordered by step then agent.
    pub fn observations(&self) -> Vec<Observation> {
        let mut rows = Vec::with_capacity(self.agents.len() * self.steps);
        for step in 1..=self.steps {
            let charge = self.field_history.get(step).copied().unwrap_or_default();
            let field_opinion = self.field_opinion_history.get(step).copied();
            for trajectory in &self.agents {
                let Some(sample) = trajectory.samples.get(step - 1) else {
                    continue;
                };
                rows.push(Observation {
                    run: self.run,
                    population_size: self.config.agents,
                    step,
                    agent: trajectory.agent.0,
                    valence: sample.valence,
                    arousal: sample.arousal,
                    opinion: sample.opinion,
                    active_agents: self.population_history.get(step).copied().unwrap_or(0),
                    expressions: self.expression_history.get(step).copied().unwrap_or(0),
                    signed_charge: charge.signed,
                    absolute_charge: charge.absolute,
                    field_opinion,
                });
            }
        }
        rows
    }
}

/// Aggregate results from a batch or sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridResults {
    /// All individual runs
    pub results: Vec<RunRecord>,
    /// Summary statistics by configuration
    pub summary: HashMap<String, ConfigSummary>,
}

/// Summary statistics for a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub config_key: String,
    pub runs: usize,
    pub avg_steps: f64,
    /// Standard error of avg_steps
    pub avg_steps_se: f64,
    pub min_steps: usize,
    pub max_steps: usize,
    /// Fraction of runs that ended with every agent satiated
    pub exhaustion_rate: f64,
    /// Standard error of exhaustion rate: sqrt(p(1-p)/n)
    pub exhaustion_rate_se: f64,
    /// 95% confidence interval for exhaustion rate: (lower, upper)
    pub exhaustion_rate_ci: (f64, f64),
    pub avg_final_population: f64,
    pub avg_expressions_per_step: f64,
    pub avg_final_abs_charge: f64,
}

impl GridResults {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            summary: HashMap::new(),
        }
    }

    pub fn add(&mut self, result: RunRecord) {
        self.results.push(result);
    }

    /// Compute summary statistics.
    pub fn compute_summary(&mut self) {
        let mut by_config: HashMap<String, Vec<&RunRecord>> = HashMap::new();
        for result in &self.results {
            by_config.entry(result.config_key()).or_default().push(result);
        }

        self.summary.clear();
        for (key, results) in by_config {
            let runs = results.len();
            let n = runs as f64;

            let exhausted = results.iter().filter(|r| r.exhausted()).count();
            let exhaustion_rate = exhausted as f64 / n;
            let exhaustion_rate_se = if runs > 1 {
                (exhaustion_rate * (1.0 - exhaustion_rate) / n).sqrt()
            } else {
                0.0
            };
            let z = 1.96;
            let exhaustion_rate_ci = (
                (exhaustion_rate - z * exhaustion_rate_se).max(0.0),
                (exhaustion_rate + z * exhaustion_rate_se).min(1.0),
            );

            let steps: Vec<f64> = results.iter().map(|r| r.steps as f64).collect();
            let avg_steps = steps.iter().sum::<f64>() / n;
            let avg_steps_se = if runs > 1 {
                let variance =
                    steps.iter().map(|s| (s - avg_steps).powi(2)).sum::<f64>() / (n - 1.0);
                variance.sqrt() / n.sqrt()
            } else {
                0.0
            };
            let min_steps = results.iter().map(|r| r.steps).min().unwrap_or(0);
            let max_steps = results.iter().map(|r| r.steps).max().unwrap_or(0);

            let avg_final_population =
                results.iter().map(|r| r.final_population() as f64).sum::<f64>() / n;
            let avg_expressions_per_step = results
                .iter()
                .map(|r| r.total_expressions() as f64 / r.steps.max(1) as f64)
                .sum::<f64>()
                / n;
            let avg_final_abs_charge = results
                .iter()
                .map(|r| r.field_history.last().map(|c| c.absolute).unwrap_or(0.0))
                .sum::<f64>()
                / n;

            self.summary.insert(
                key.clone(),
                ConfigSummary {
                    config_key: key,
                    runs,
                    avg_steps,
                    avg_steps_se,
                    min_steps,
                    max_steps,
                    exhaustion_rate,
                    exhaustion_rate_se,
                    exhaustion_rate_ci,
                    avg_final_population,
                    avg_expressions_per_step,
                    avg_final_abs_charge,
                },
            );
        }
    }

    /// Every run's observations, in run order.
    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.results.iter().flat_map(RunRecord::observations)
    }

    /// Save results to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read results from {}", path.display()))?;
        let results = serde_json::from_str(&json).context("Failed to parse results")?;
        Ok(results)
    }

    /// Write every observation as one JSON object per line. Returns the row count.
    pub fn save_observations(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut rows = 0;
        for observation in self.observations() {
            serde_json::to_writer(&mut writer, &observation)?;
            writer.write_all(b"\n")?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }
}

impl Default for GridResults {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a duration in milliseconds for display.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1}m", ms as f64 / 60_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contagion_kernel::{SatiationConfig, SatiationOrder};

    fn record(run: usize, seed: u64, config: SimConfig) -> RunRecord {
        let mut model = Model::new(SimConfig {
            seed: Some(seed),
            ..config
        })
        .unwrap();
        let started_at = Utc::now();
        model.run();
        RunRecord::from_model(run, &model, started_at, Utc::now())
    }

    #[test]
    fn test_record_shape_for_reference_scenario() {
        let record = record(0, 42, SimConfig::default());
        assert_eq!(record.steps, 15);
        assert_eq!(record.termination, Some(Termination::MaxSteps));
        assert_eq!(record.agents.len(), 10);
        assert!(record.agents.iter().all(|a| a.samples.len() == 15));
        assert_eq!(record.field_history.len(), 16);
        assert!(record.field_opinion_history.is_empty());

        let ids: Vec<usize> = record.agents.iter().map(|a| a.agent.0).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_record_of_running_model_has_no_termination() {
        let mut model = Model::new(SimConfig {
            seed: Some(42),
            ..Default::default()
        })
        .unwrap();
        let started_at = Utc::now();
        model.step();
        model.step();

        let record = RunRecord::from_model(0, &model, started_at, Utc::now());
        assert_eq!(record.steps, 2);
        assert_eq!(record.termination, None);
        assert!(!record.exhausted());
        assert_eq!(record.field_history.len(), 3);
    }

    #[test]
    fn test_observations_are_tidy() {
        let record = record(3, 42, SimConfig::default());
        let rows = record.observations();
        assert_eq!(rows.len(), 10 * 15);

        let first = &rows[0];
        assert_eq!((first.run, first.step, first.agent), (3, 1, 0));
        assert_eq!(first.population_size, 10);
        assert_eq!(first.valence, record.agents[0].samples[0].valence);
        assert_eq!(first.signed_charge, record.field_history[1].signed);

        // Step-major ordering, per-step aggregates shared across agents.
        for chunk in rows.chunks(10) {
            let step = chunk[0].step;
            assert!(chunk.iter().all(|r| r.step == step));
            assert!(chunk.iter().all(|r| r.expressions == record.expression_history[step]));
        }
    }

    #[test]
    fn test_observations_skip_departed_agents() {
        let config = SimConfig {
            max_steps: 40,
            satiation: Some(SatiationConfig {
                constant: 0.3,
                order: SatiationOrder::BeforeRelaxation,
            }),
            ..Default::default()
        };
        let record = record(0, 7, config);
        let expected: usize = record.agents.iter().map(|a| a.samples.len()).sum();
        assert_eq!(record.observations().len(), expected);
    }

    #[test]
    fn test_grid_results_summary() {
        let mut results = GridResults::new();
        for run in 0..3 {
            results.add(record(run, run as u64, SimConfig::default()));
        }
        let exhausting = SimConfig {
            satiation: Some(SatiationConfig {
                constant: 100.0,
                order: SatiationOrder::BeforeRelaxation,
            }),
            ..Default::default()
        };
        results.add(record(0, 9, exhausting.clone()));
        results.add(record(1, 10, exhausting));

        results.compute_summary();
        assert_eq!(results.summary.len(), 2);

        let calm = &results.summary["agents=10:impact=0.1:satiation=off:opinion=false"];
        assert_eq!(calm.runs, 3);
        assert_eq!(calm.avg_steps, 15.0);
        assert_eq!(calm.avg_steps_se, 0.0);
        assert_eq!(calm.exhaustion_rate, 0.0);
        assert_eq!(calm.avg_final_population, 10.0);

        let draining = &results.summary["agents=10:impact=0.1:satiation=100:opinion=false"];
        assert_eq!(draining.runs, 2);
        assert_eq!(draining.exhaustion_rate, 1.0);
        assert_eq!((draining.min_steps, draining.max_steps), (1, 1));
        assert_eq!(draining.avg_final_population, 0.0);
        assert!(draining.exhaustion_rate_ci.0 <= draining.exhaustion_rate);
        assert!(draining.exhaustion_rate_ci.1 >= draining.exhaustion_rate);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(90_000), "1.5m");
    }
}
