//! The shared field: a discussion thread's aggregate emotional charge.
//!
//! The field never sees individual agents. Once per step it receives the
//! step's positive and negative expression counts and relaxes geometrically
//! toward zero in their absence.

use serde::{Deserialize, Serialize};

use crate::config::{OpinionConfig, SimConfig};
use crate::random::RandomSource;

/// Read-only view of the field's two charge channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCharge {
    /// Net polarity of recent expressions
    pub signed: f64,
    /// Magnitude of recent expressions, regardless of polarity
    pub absolute: f64,
}

/// The field state and its trajectory.
#[derive(Debug, Clone)]
pub struct Field {
    charge: FieldCharge,
    opinion: Option<f64>,
    history: Vec<FieldCharge>,
    opinion_history: Vec<f64>,
}

impl Field {
    /// Create a field at `config.field.initial_charge`, recording it as the
    /// first history entry.
    pub fn new(config: &SimConfig) -> Self {
        let initial = config.field.initial_charge;
        let charge = FieldCharge {
            signed: initial,
            absolute: initial.abs(),
        };
        let opinion = config.opinion.as_ref().map(|_| 0.0);

        Self {
            charge,
            opinion,
            history: vec![charge],
            opinion_history: opinion.into_iter().collect(),
        }
    }

    /// Current charge, used as the snapshot for a step.
    pub fn snapshot(&self) -> FieldCharge {
        self.charge
    }

    pub fn opinion(&self) -> Option<f64> {
        self.opinion
    }

    /// Charge after every step, starting with the initial charge.
    pub fn history(&self) -> &[FieldCharge] {
        &self.history
    }

    pub fn opinion_history(&self) -> &[f64] {
        &self.opinion_history
    }

    /// Fold one step's expressions into the charge.
    ///
    /// Each channel follows `state += dt * (-decay * state + impact * count)`
    /// with `count = positive - negative` for the signed channel and
    /// `positive + negative` for the absolute one.
    pub fn aggregate(
        &mut self,
        positive: usize,
        negative: usize,
        impact: f64,
        decay: f64,
        dt: f64,
    ) {
        let signed_count = positive as f64 - negative as f64;
        let absolute_count = (positive + negative) as f64;

        self.charge.signed += dt * (-decay * self.charge.signed + impact * signed_count);
        self.charge.absolute += dt * (-decay * self.charge.absolute + impact * absolute_count);
        self.history.push(self.charge);
    }

    /// Advance the field opinion against the freshly aggregated charge.
    /// No-op when opinion dynamics are disabled.
    pub fn drift_opinion(
        &mut self,
        opinion: &OpinionConfig,
        config: &SimConfig,
        rng: &mut RandomSource,
    ) {
        let Some(theta) = self.opinion.as_mut() else {
            return;
        };

        let h = self.charge;
        let [a2, a3] = opinion.field_coefficients;
        let stab = &config.stabilization;
        let noise = rng.normal(0.0, 1.0);

        // Coefficients sit inside the powers: (a2·θ)² + (a3·θ)³.
        let rate = -opinion.c0 * opinion.c0 * h.absolute * h.signed
            + opinion.c1 * (h.absolute - opinion.baseline_charge) * *theta
            + stab.apply(a2 * *theta).powi(2)
            + stab.apply(a3 * *theta).powi(3)
            + opinion.amplitude * noise;

        *theta += config.dt * rate;
        self.opinion_history.push(*theta);
    }
}
