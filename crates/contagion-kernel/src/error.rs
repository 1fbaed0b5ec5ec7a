//! Error types for model construction.

use thiserror::Error;

/// A configuration value outside its required domain.
///
/// Returned by [`SimConfig::validate`](crate::SimConfig::validate) and
/// therefore by [`Model::new`](crate::Model::new). Values are never clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("population size must be positive")]
    EmptyPopulation,

    #[error("maximum step count must be positive")]
    NoSteps,

    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must lie in [0, 1], got {value}")]
    DecayOutOfRange { field: &'static str, value: f64 },

    #[error("down-regulation retention must lie in (0, 1), got {0}")]
    RetentionOutOfRange(f64),

    #[error("step size dt must lie in (0, 1], got {0}")]
    StepSizeOutOfRange(f64),

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("threshold range is inverted: min {min} > max {max}")]
    InvertedThresholdRange { min: f64, max: f64 },

    #[error("opinion coupling c1 must be non-zero")]
    ZeroOpinionCoupling,

    #[error("stabilization bound must be positive, got {0}")]
    NonPositiveBound(f64),

    #[error("stabilization precision is capped at 15 decimals, got {0}")]
    PrecisionTooFine(u32),
}
