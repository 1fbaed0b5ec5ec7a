//! Contagion Kernel: collective emotions in an online forum.
//!
//! Agents (forum users) carry a private valence/arousal state and interact only
//! through one shared field, the thread's aggregate emotional charge. Each step
//! every agent perceives the field, may express (feeding the field and
//! down-regulating itself), may leave through satiation, and relaxes toward its
//! baseline. The field then folds the step's expressions into its charge.

pub mod agent;
pub mod config;
pub mod error;
pub mod field;
pub mod model;
pub mod random;

pub use agent::{Agent, AgentId, EmotionSample, Expression, Sign};
pub use config::{
    ChannelPair, ChannelRouting, FieldConfig, FieldImpact, OpinionConfig, ResponseConfig,
    SatiationConfig, SatiationOrder, ShockDistribution, SimConfig, Stabilization,
    ThresholdSource, ValueSource,
};
pub use error::ConfigError;
pub use field::{Field, FieldCharge};
pub use model::{Model, StepReport, Termination};
pub use random::RandomSource;
