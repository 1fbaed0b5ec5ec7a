//! The model: one population, one field, and the step scheduler.
//!
//! ## Step
//!
//! 1. Snapshot the field charge.
//! 2. Each active agent, in the step's order: perceive the snapshot, opinate,
//!    record, express (tallied), satiation test, relax.
//! 3. Satiated agents move to the inactive list in the order they acted.
//! 4. The field aggregates the step's tallies.
//! 5. Step-level histories are recorded.
//! 6. The active order is shuffled for the next step.
//!
//! The run terminates when `max_steps` is reached or no agent is left. On
//! termination every remaining agent moves to the inactive list, so the
//! inactive list is the complete final population.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{Agent, Expression, Sign};
use crate::config::{SatiationOrder, SimConfig};
use crate::error::ConfigError;
use crate::field::{Field, FieldCharge};
use crate::random::{self, MODEL_STREAM, RandomSource};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// `max_steps` steps were executed.
    MaxSteps,
    /// Every agent left through satiation.
    Exhausted,
}

/// Summary of a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub positive: usize,
    pub negative: usize,
    /// Agents that left during this step
    pub satiated: usize,
    /// Active agents after the step
    pub population: usize,
    /// Field charge after aggregation
    pub charge: FieldCharge,
    pub termination: Option<Termination>,
}

impl StepReport {
    pub fn expressions(&self) -> usize {
        self.positive + self.negative
    }
}

/// A single simulation run.
#[derive(Debug, Clone)]
pub struct Model {
    config: SimConfig,
    seed: u64,
    impact: f64,
    active: Vec<Agent>,
    inactive: Vec<Agent>,
    field: Field,
    rng: RandomSource,
    step: usize,
    population_history: Vec<usize>,
    expression_history: Vec<usize>,
    step_history: Vec<usize>,
    termination: Option<Termination>,
}

impl Model {
    /// Validate `config` and build the population and field.
    ///
    /// Without a configured seed one is drawn from the OS; [`Model::seed`]
    /// reports it so the run can be replayed.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(random::entropy_seed);
        let active: Vec<Agent> = (0..config.agents)
            .map(|index| Agent::new(index, &config, seed))
            .collect();
        let field = Field::new(&config);
        let impact = config.effective_impact();

        debug!(
            agents = config.agents,
            max_steps = config.max_steps,
            seed = seed,
            impact = impact,
            "Model constructed"
        );

        Ok(Self {
            seed,
            impact,
            inactive: Vec::with_capacity(active.len()),
            population_history: vec![active.len()],
            expression_history: vec![0],
            step_history: vec![0],
            active,
            field,
            rng: RandomSource::new(seed, MODEL_STREAM),
            step: 0,
            termination: None,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Seed actually used for every stream of this run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Field impact after population scaling.
    pub fn impact(&self) -> f64 {
        self.impact
    }

    /// Initial population size.
    pub fn population_size(&self) -> usize {
        self.config.agents
    }

    /// Active agents in the order they will act next step.
    pub fn active(&self) -> &[Agent] {
        &self.active
    }

    /// Agents that left, in removal order. After termination this is the
    /// whole population.
    pub fn inactive(&self) -> &[Agent] {
        &self.inactive
    }

    /// Every agent, active first.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.active.iter().chain(self.inactive.iter())
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Steps executed so far.
    pub fn step_count(&self) -> usize {
        self.step
    }

    /// Active population after each step; index 0 is the initial population.
    pub fn population_history(&self) -> &[usize] {
        &self.population_history
    }

    /// Expressions per step; index 0 is the initial state (zero).
    pub fn expression_history(&self) -> &[usize] {
        &self.expression_history
    }

    pub fn step_history(&self) -> &[usize] {
        &self.step_history
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn is_running(&self) -> bool {
        self.termination.is_none()
    }

    /// Execute one step. Returns `None` once the run has terminated.
    pub fn step(&mut self) -> Option<StepReport> {
        if !self.is_running() {
            return None;
        }

        let step = self.step + 1;
        let snapshot = self.field.snapshot();
        let dt = self.config.dt;
        let retention = self.config.down_regulation;

        let mut positive = 0;
        let mut negative = 0;
        let mut leaving: Vec<usize> = Vec::new();

        for (index, agent) in self.active.iter_mut().enumerate() {
            agent.perceive(&snapshot, &self.config);
            if let Some(opinion) = &self.config.opinion {
                agent.opinate(&snapshot, opinion, dt);
            }
            agent.record();

            match agent.express(retention) {
                Expression::Expressed(Sign::Positive) => positive += 1,
                Expression::Expressed(Sign::Negative) => negative += 1,
                Expression::NoExpression => {}
            }

            let satiated = match &self.config.satiation {
                None => {
                    agent.relax(&self.config.decay, dt);
                    false
                }
                Some(satiation) => match satiation.order {
                    SatiationOrder::BeforeRelaxation => {
                        let satiated = agent.is_satiated(satiation.constant);
                        if !satiated {
                            agent.relax(&self.config.decay, dt);
                        }
                        satiated
                    }
                    SatiationOrder::AfterRelaxation => {
                        agent.relax(&self.config.decay, dt);
                        agent.is_satiated(satiation.constant)
                    }
                },
            };

            if satiated {
                leaving.push(index);
            }
        }

        let satiated = leaving.len();
        if !leaving.is_empty() {
            self.retire(&leaving, step);
        }

        self.field
            .aggregate(positive, negative, self.impact, self.config.field.decay, dt);
        if let Some(opinion) = &self.config.opinion {
            self.field.drift_opinion(opinion, &self.config, &mut self.rng);
        }

        self.step = step;
        self.population_history.push(self.active.len());
        self.expression_history.push(positive + negative);
        self.step_history.push(step);

        self.rng.shuffle(&mut self.active);

        let charge = self.field.snapshot();
        debug!(
            step = step,
            population = self.active.len(),
            positive = positive,
            negative = negative,
            satiated = satiated,
            signed_charge = charge.signed,
            absolute_charge = charge.absolute,
            "Step complete"
        );

        if self.active.is_empty() {
            self.terminate(Termination::Exhausted);
        } else if step >= self.config.max_steps {
            self.terminate(Termination::MaxSteps);
        }

        Some(StepReport {
            step,
            positive,
            negative,
            satiated,
            population: self.population_history[self.population_history.len() - 1],
            charge,
            termination: self.termination,
        })
    }

    /// Step until termination.
    pub fn run(&mut self) -> Termination {
        loop {
            if let Some(termination) = self.termination {
                return termination;
            }
            self.step();
        }
    }

    /// Move the agents at `indices` (ascending) to the inactive list,
    /// preserving the order in which they acted.
    fn retire(&mut self, indices: &[usize], step: usize) {
        let mut marks = indices.iter().copied().peekable();
        let mut kept = Vec::with_capacity(self.active.len() - indices.len());

        for (index, mut agent) in std::mem::take(&mut self.active).into_iter().enumerate() {
            if marks.peek() == Some(&index) {
                marks.next();
                agent.mark_exit(step);
                self.inactive.push(agent);
            } else {
                kept.push(agent);
            }
        }

        self.active = kept;
    }

    fn terminate(&mut self, reason: Termination) {
        self.inactive.append(&mut self.active);
        self.termination = Some(reason);

        info!(
            steps = self.step,
            reason = ?reason,
            population = self.population_size(),
            "Run terminated"
        );
    }
}
