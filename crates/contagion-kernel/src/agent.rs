//! Agents: forum users with a private emotional state.
//!
//! An agent only ever reads the field snapshot taken at the start of a step and
//! only ever mutates itself. The model calls its methods in a fixed order:
//! perceive, opinate, record, express, satiation test, relax.

use serde::{Deserialize, Serialize};

use crate::config::{ChannelPair, ChannelRouting, OpinionConfig, ShockDistribution, SimConfig};
use crate::field::FieldCharge;
use crate::random::RandomSource;

/// Stable identity of an agent within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Polarity of an expressed emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    /// Sign of a valence. Zero (either sign of zero) resolves to `Positive`.
    pub fn of(valence: f64) -> Self {
        if valence >= 0.0 {
            Sign::Positive
        } else {
            Sign::Negative
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

/// Outcome of an expression attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "sign", rename_all = "snake_case")]
pub enum Expression {
    Expressed(Sign),
    NoExpression,
}

impl Expression {
    pub fn sign(self) -> Option<Sign> {
        match self {
            Expression::Expressed(sign) => Some(sign),
            Expression::NoExpression => None,
        }
    }
}

/// One recorded observation of an agent's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub valence: f64,
    pub arousal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opinion: Option<f64>,
}

/// A simulated forum user.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    valence: f64,
    arousal: f64,
    baseline: ChannelPair<f64>,
    threshold: f64,
    opinion: Option<f64>,
    history: Vec<EmotionSample>,
    /// Step at which the agent left through satiation
    exited_at: Option<usize>,
    rng: RandomSource,
}

impl Agent {
    /// Create agent `index`, drawing its baseline, threshold and initial
    /// opinion from its own stream of `seed`. State starts at the baseline.
    pub fn new(index: usize, config: &SimConfig, seed: u64) -> Self {
        let mut rng = RandomSource::for_agent(seed, index);
        let baseline = ChannelPair::new(
            rng.sample(&config.baseline.valence),
            rng.sample(&config.baseline.arousal),
        );
        let threshold = rng.sample_threshold(&config.threshold);
        let opinion = config
            .opinion
            .as_ref()
            .map(|op| rng.normal(0.0, op.initial_std_dev));

        Self {
            id: AgentId(index),
            valence: baseline.valence,
            arousal: baseline.arousal,
            baseline,
            threshold,
            opinion,
            history: Vec::new(),
            exited_at: None,
            rng,
        }
    }

    /// Displace the current state away from the baseline.
    pub fn with_state(mut self, valence: f64, arousal: f64) -> Self {
        self.valence = valence;
        self.arousal = arousal;
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn valence(&self) -> f64 {
        self.valence
    }

    pub fn arousal(&self) -> f64 {
        self.arousal
    }

    pub fn baseline(&self) -> ChannelPair<f64> {
        self.baseline
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn opinion(&self) -> Option<f64> {
        self.opinion
    }

    pub fn history(&self) -> &[EmotionSample] {
        &self.history
    }

    pub fn exited_at(&self) -> Option<usize> {
        self.exited_at
    }

    /// React to the field: each channel moves by its cubic response, scaled by
    /// the routed field channel, plus an amplitude-scaled shock.
    pub fn perceive(&mut self, field: &FieldCharge, config: &SimConfig) {
        let (valence_signal, arousal_signal) = match config.response.routing {
            ChannelRouting::SignedValence => (field.signed, field.absolute),
            ChannelRouting::AbsoluteValence => (field.absolute, field.signed),
        };

        let (valence_shock, arousal_shock) = match config.shock {
            ShockDistribution::Uniform => (self.rng.symmetric(), self.rng.symmetric()),
            ShockDistribution::Normal { std_dev } => (
                self.rng.normal(0.0, std_dev.valence),
                self.rng.normal(0.0, std_dev.arousal),
            ),
        };

        let stab = &config.stabilization;
        let dv = valence_signal * stab.cubic(&config.response.valence, self.valence)
            + config.amplitude.valence * valence_shock;
        let da = arousal_signal * stab.cubic(&config.response.arousal, self.arousal)
            + config.amplitude.arousal * arousal_shock;

        self.valence += config.dt * dv;
        self.arousal += config.dt * da;
    }

    /// Drift the opinion against the field snapshot. No-op without an opinion.
    pub fn opinate(&mut self, field: &FieldCharge, opinion: &OpinionConfig, dt: f64) {
        if let Some(theta) = self.opinion.as_mut() {
            let pull = opinion.c0 * opinion.c0 / opinion.c1 * field.signed;
            *theta += dt * opinion.c1 * field.absolute * (*theta - pull);
        }
    }

    /// Append the current state to the trajectory.
    pub fn record(&mut self) {
        self.history.push(EmotionSample {
            valence: self.valence,
            arousal: self.arousal,
            opinion: self.opinion,
        });
    }

    /// Express if arousal has reached the threshold.
    ///
    /// On expression both channels are pulled toward baseline:
    /// `new = (old - baseline) * retention + baseline`.
    pub fn express(&mut self, retention: f64) -> Expression {
        if self.arousal < self.threshold {
            return Expression::NoExpression;
        }

        let sign = Sign::of(self.valence);
        self.valence = (self.valence - self.baseline.valence) * retention + self.baseline.valence;
        self.arousal = (self.arousal - self.baseline.arousal) * retention + self.baseline.arousal;
        Expression::Expressed(sign)
    }

    /// Pull both channels toward baseline by a fraction of their deviation.
    pub fn relax(&mut self, decay: &ChannelPair<f64>, dt: f64) {
        self.valence += dt * (-decay.valence * (self.valence - self.baseline.valence));
        self.arousal += dt * (-decay.arousal * (self.arousal - self.baseline.arousal));
    }

    /// Stochastic exit test with probability `arousal² × constant`.
    ///
    /// Consumes exactly one uniform draw.
    pub fn is_satiated(&mut self, constant: f64) -> bool {
        let probability = self.arousal.powi(2) * constant;
        self.rng.uniform() < probability
    }

    pub(crate) fn mark_exit(&mut self, step: usize) {
        self.exited_at = Some(step);
    }
}
