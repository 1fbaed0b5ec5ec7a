//! Configuration types for the simulation.
//!
//! A [`SimConfig`] is immutable once a [`Model`](crate::Model) is built from it.
//! Agents and the field read their constants from it by reference, so runs with
//! different parameters never share state. Loaded from TOML/JSON by the harness.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A pair of values, one per emotional channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelPair<T> {
    pub valence: T,
    pub arousal: T,
}

impl<T> ChannelPair<T> {
    pub const fn new(valence: T, arousal: T) -> Self {
        Self { valence, arousal }
    }
}

/// Source of a per-agent value that is drawn once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSource {
    /// Every agent gets the same value.
    Fixed { value: f64 },
    /// Each agent samples independently.
    Normal { mean: f64, std_dev: f64 },
}

/// Source of the per-agent arousal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdSource {
    Fixed { value: f64 },
    /// Uniform on `[min, max)`; `min == max` degenerates to a fixed value.
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, std_dev: f64 },
}

/// Distribution of the additive stochastic shock applied during perception.
///
/// The draw is multiplied by the channel's amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShockDistribution {
    /// Uniform on `[-1, 1)`.
    Uniform,
    /// Zero-mean normal with a per-channel standard deviation.
    Normal { std_dev: ChannelPair<f64> },
}

/// Which field channel drives which emotional channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRouting {
    /// Signed charge drives valence, absolute charge drives arousal.
    #[default]
    SignedValence,
    /// Absolute charge drives valence, signed charge drives arousal.
    AbsoluteValence,
}

/// Cubic response coefficients `[c0, c1, c2, c3]` shared by every agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub valence: [f64; 4],
    pub arousal: [f64; 4],
    #[serde(default)]
    pub routing: ChannelRouting,
}

/// Bounds applied to the base of every squared or cubed term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stabilization {
    /// Decimal places the base is rounded to before exponentiation.
    pub decimals: u32,
    /// Magnitude the base is clamped to before rounding.
    pub bound: f64,
}

impl Default for Stabilization {
    fn default() -> Self {
        Self {
            decimals: 9,
            bound: 1.0e6,
        }
    }
}

impl Stabilization {
    /// Clamp to `±bound`, then round to `decimals` places.
    pub fn apply(&self, x: f64) -> f64 {
        let scale = 10f64.powi(self.decimals as i32);
        (x.clamp(-self.bound, self.bound) * scale).round() / scale
    }

    /// `c0 + c1·x + c2·r² + c3·r³`, where `r` is the stabilized `x`.
    pub fn cubic(&self, coefficients: &[f64; 4], x: f64) -> f64 {
        let [c0, c1, c2, c3] = *coefficients;
        let r = self.apply(x);
        c0 + c1 * x + c2 * r.powi(2) + c3 * r.powi(3)
    }
}

/// How much each expression moves the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldImpact {
    Fixed { value: f64 },
    /// `k / agents`, keeping collective effects comparable across population sizes.
    PerCapita { k: f64 },
}

impl FieldImpact {
    /// The effective impact for a population of `agents`.
    pub fn resolve(&self, agents: usize) -> f64 {
        match *self {
            FieldImpact::Fixed { value } => value,
            FieldImpact::PerCapita { k } => k / agents.max(1) as f64,
        }
    }

    /// Same scaling mode with a new magnitude.
    pub fn with_magnitude(&self, magnitude: f64) -> Self {
        match self {
            FieldImpact::Fixed { .. } => FieldImpact::Fixed { value: magnitude },
            FieldImpact::PerCapita { .. } => FieldImpact::PerCapita { k: magnitude },
        }
    }

    fn magnitude(&self) -> f64 {
        match *self {
            FieldImpact::Fixed { value } => value,
            FieldImpact::PerCapita { k } => k,
        }
    }
}

/// Field constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Starting signed charge; the absolute channel starts at its magnitude.
    pub initial_charge: f64,
    /// Geometric decay rate for both channels.
    pub decay: f64,
    pub impact: FieldImpact,
}

/// When the satiation test runs relative to relaxation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatiationOrder {
    /// Satiated agents leave before relaxing.
    #[default]
    BeforeRelaxation,
    /// Every agent relaxes, then the test runs on the relaxed state.
    AfterRelaxation,
}

/// Stochastic exit of agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatiationConfig {
    /// Exit probability per step is `arousal² × constant`.
    pub constant: f64,
    #[serde(default)]
    pub order: SatiationOrder,
}

/// Opinion dynamics coupled to the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpinionConfig {
    /// Standard deviation of the initial agent opinion (mean 0).
    pub initial_std_dev: f64,
    /// Polarity bias coefficient.
    pub c0: f64,
    /// Coupling coefficient; must be non-zero.
    pub c1: f64,
    /// Quadratic and cubic self-terms of the field opinion.
    pub field_coefficients: [f64; 2],
    /// Absolute charge at which the field opinion is neutrally stable.
    pub baseline_charge: f64,
    /// Amplitude of the standard-normal shock on the field opinion.
    pub amplitude: f64,
}

impl Default for OpinionConfig {
    fn default() -> Self {
        Self {
            initial_std_dev: 0.09,
            c0: 0.1,
            c1: 1.0,
            field_coefficients: [0.0, -2.0],
            baseline_charge: 0.1,
            amplitude: 0.05,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Initial population size
    pub agents: usize,
    /// Maximum number of steps before the run terminates
    pub max_steps: usize,
    /// Seed for every random stream of the run (None draws one from the OS)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Integration step applied to every rate update
    #[serde(default = "default_dt")]
    pub dt: f64,
    pub baseline: ChannelPair<ValueSource>,
    pub threshold: ThresholdSource,
    /// Relaxation rates toward baseline
    pub decay: ChannelPair<f64>,
    /// Stochastic shock amplitudes
    pub amplitude: ChannelPair<f64>,
    pub shock: ShockDistribution,
    pub response: ResponseConfig,
    #[serde(default)]
    pub stabilization: Stabilization,
    /// Retention factor `k` of the reset applied on expression
    pub down_regulation: f64,
    pub field: FieldConfig,
    #[serde(default)]
    pub satiation: Option<SatiationConfig>,
    #[serde(default)]
    pub opinion: Option<OpinionConfig>,
}

fn default_dt() -> f64 {
    1.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            agents: 10,
            max_steps: 15,
            seed: None,
            dt: 1.0,
            baseline: ChannelPair::new(
                ValueSource::Fixed { value: 0.1 },
                ValueSource::Fixed { value: 0.8 },
            ),
            threshold: ThresholdSource::Uniform { min: 0.1, max: 1.1 },
            decay: ChannelPair::new(0.5, 0.9),
            amplitude: ChannelPair::new(0.3, 0.3),
            shock: ShockDistribution::Uniform,
            response: ResponseConfig {
                valence: [0.0, 1.0, 0.0, -1.0],
                arousal: [0.05, 0.5, 0.0, 0.0],
                routing: ChannelRouting::SignedValence,
            },
            stabilization: Stabilization::default(),
            down_regulation: 0.4,
            field: FieldConfig {
                initial_charge: 0.0,
                decay: 0.7,
                impact: FieldImpact::Fixed { value: 0.1 },
            },
            satiation: None,
            opinion: None,
        }
    }
}

impl SimConfig {
    /// Opinion polarization variant: sampled valence baselines, normal shocks,
    /// satiation and opinion dynamics, integrated with `dt = 0.1`.
    pub fn opinion_polarization() -> Self {
        Self {
            agents: 100,
            max_steps: 200,
            seed: None,
            dt: 0.1,
            baseline: ChannelPair::new(
                ValueSource::Normal {
                    mean: 0.0,
                    std_dev: 0.1,
                },
                ValueSource::Fixed { value: 0.0 },
            ),
            threshold: ThresholdSource::Uniform { min: 0.1, max: 1.1 },
            decay: ChannelPair::new(0.5, 0.9),
            amplitude: ChannelPair::new(0.3, 0.3),
            shock: ShockDistribution::Normal {
                std_dev: ChannelPair::new(0.5, 6.0),
            },
            response: ResponseConfig {
                valence: [0.0, 1.0, 0.0, -1.0],
                arousal: [0.05, 0.5, 0.1, 0.0],
                routing: ChannelRouting::SignedValence,
            },
            stabilization: Stabilization {
                decimals: 6,
                bound: 1.0e6,
            },
            down_regulation: 0.1,
            field: FieldConfig {
                initial_charge: 0.0,
                decay: 0.7,
                impact: FieldImpact::Fixed { value: 0.6 },
            },
            satiation: Some(SatiationConfig {
                constant: 1.0,
                order: SatiationOrder::BeforeRelaxation,
            }),
            opinion: Some(OpinionConfig::default()),
        }
    }

    /// The field impact for this configuration's population.
    pub fn effective_impact(&self) -> f64 {
        self.field.impact.resolve(self.agents)
    }

    /// Check every parameter against its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.max_steps == 0 {
            return Err(ConfigError::NoSteps);
        }

        finite("dt", self.dt)?;
        if self.dt <= 0.0 || self.dt > 1.0 {
            return Err(ConfigError::StepSizeOutOfRange(self.dt));
        }

        for (field, source) in [
            ("baseline.valence", &self.baseline.valence),
            ("baseline.arousal", &self.baseline.arousal),
        ] {
            match *source {
                ValueSource::Fixed { value } => finite(field, value)?,
                ValueSource::Normal { mean, std_dev } => {
                    finite(field, mean)?;
                    non_negative(field, std_dev)?;
                }
            }
        }

        match self.threshold {
            ThresholdSource::Fixed { value } => finite("threshold", value)?,
            ThresholdSource::Uniform { min, max } => {
                finite("threshold.min", min)?;
                finite("threshold.max", max)?;
                if min > max {
                    return Err(ConfigError::InvertedThresholdRange { min, max });
                }
            }
            ThresholdSource::Normal { mean, std_dev } => {
                finite("threshold.mean", mean)?;
                non_negative("threshold.std_dev", std_dev)?;
            }
        }

        unit_interval("decay.valence", self.decay.valence)?;
        unit_interval("decay.arousal", self.decay.arousal)?;
        unit_interval("field.decay", self.field.decay)?;

        non_negative("amplitude.valence", self.amplitude.valence)?;
        non_negative("amplitude.arousal", self.amplitude.arousal)?;
        if let ShockDistribution::Normal { std_dev } = self.shock {
            non_negative("shock.std_dev.valence", std_dev.valence)?;
            non_negative("shock.std_dev.arousal", std_dev.arousal)?;
        }

        for c in self.response.valence {
            finite("response.valence", c)?;
        }
        for c in self.response.arousal {
            finite("response.arousal", c)?;
        }

        if self.stabilization.decimals > 15 {
            return Err(ConfigError::PrecisionTooFine(self.stabilization.decimals));
        }
        if !(self.stabilization.bound > 0.0) {
            return Err(ConfigError::NonPositiveBound(self.stabilization.bound));
        }

        finite("down_regulation", self.down_regulation)?;
        if self.down_regulation <= 0.0 || self.down_regulation >= 1.0 {
            return Err(ConfigError::RetentionOutOfRange(self.down_regulation));
        }

        finite("field.initial_charge", self.field.initial_charge)?;
        finite("field.impact", self.field.impact.magnitude())?;

        if let Some(satiation) = &self.satiation {
            non_negative("satiation.constant", satiation.constant)?;
        }

        if let Some(opinion) = &self.opinion {
            non_negative("opinion.initial_std_dev", opinion.initial_std_dev)?;
            finite("opinion.c0", opinion.c0)?;
            finite("opinion.c1", opinion.c1)?;
            if opinion.c1 == 0.0 {
                return Err(ConfigError::ZeroOpinionCoupling);
            }
            for c in opinion.field_coefficients {
                finite("opinion.field_coefficients", c)?;
            }
            finite("opinion.baseline_charge", opinion.baseline_charge)?;
            non_negative("opinion.amplitude", opinion.amplitude)?;
        }

        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::DecayOutOfRange { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
        assert_eq!(SimConfig::opinion_polarization().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_empty_population_and_zero_steps() {
        let config = SimConfig {
            agents: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPopulation));

        let config = SimConfig {
            max_steps: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoSteps));
    }

    #[test]
    fn test_rejects_inverted_threshold_range() {
        let config = SimConfig {
            threshold: ThresholdSource::Uniform { min: 1.1, max: 0.1 },
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedThresholdRange { min: 1.1, max: 0.1 })
        );
    }

    #[test]
    fn test_degenerate_threshold_range_is_allowed() {
        let config = SimConfig {
            threshold: ThresholdSource::Uniform { min: 0.5, max: 0.5 },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_domain_constants() {
        let mut config = SimConfig::default();
        config.decay.arousal = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DecayOutOfRange { field: "decay.arousal", .. })
        ));

        let mut config = SimConfig::default();
        config.field.decay = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DecayOutOfRange { field: "field.decay", .. })
        ));

        for k in [0.0, 1.0, 1.2] {
            let config = SimConfig {
                down_regulation: k,
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::RetentionOutOfRange(k)));
        }

        let config = SimConfig {
            dt: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::StepSizeOutOfRange(0.0)));
    }

    #[test]
    fn test_rejects_non_finite_and_negative_values() {
        let mut config = SimConfig::default();
        config.amplitude.valence = -0.3;
        assert!(matches!(config.validate(), Err(ConfigError::Negative { .. })));

        let mut config = SimConfig::default();
        config.response.valence[3] = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::NotFinite { .. })));

        let config = SimConfig {
            satiation: Some(SatiationConfig {
                constant: -1.0,
                order: SatiationOrder::default(),
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { field: "satiation.constant", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_opinion_coupling() {
        let config = SimConfig {
            opinion: Some(OpinionConfig {
                c1: 0.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroOpinionCoupling));
    }

    #[test]
    fn test_per_capita_impact_scales_with_population() {
        let impact = FieldImpact::PerCapita { k: 2.0 };
        assert!((impact.resolve(10) - 0.2).abs() < 1e-12);
        assert!((impact.resolve(100) - 0.02).abs() < 1e-12);
        assert_eq!(FieldImpact::Fixed { value: 0.1 }.resolve(1000), 0.1);
        assert_eq!(
            impact.with_magnitude(4.0),
            FieldImpact::PerCapita { k: 4.0 }
        );
    }

    #[test]
    fn test_stabilization_rounds_and_bounds_the_base() {
        let stab = Stabilization {
            decimals: 2,
            bound: 10.0,
        };
        assert_eq!(stab.apply(0.123_456), 0.12);
        assert_eq!(stab.apply(1.0e300), 10.0);
        assert_eq!(stab.apply(-1.0e300), -10.0);

        // Cubic term stays finite even for an enormous state.
        let value = stab.cubic(&[0.0, 0.0, 0.0, -1.0], 1.0e200);
        assert!(value.is_finite());
        assert_eq!(value, -1000.0);
    }

    #[test]
    fn test_cubic_matches_plain_polynomial_for_moderate_values() {
        let stab = Stabilization::default();
        let x = 0.5;
        let expected = 0.05 + 0.5 * x + 0.1 * x * x - 2.0 * x * x * x;
        assert!((stab.cubic(&[0.05, 0.5, 0.1, -2.0], x) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = SimConfig::opinion_polarization();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, decoded);
    }
}
