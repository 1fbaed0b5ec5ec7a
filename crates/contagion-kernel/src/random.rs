//! Seedable random streams.
//!
//! Every run derives all of its randomness from one seed. The model owns
//! stream 0 (ordering shuffles, field noise) and agent `i` owns stream `i + 1`,
//! so a run replays exactly and no two agents share a generator.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::{ThresholdSource, ValueSource};

/// Stream index reserved for the model itself.
pub const MODEL_STREAM: u64 = 0;

/// Uniform and normal draws from an independent ChaCha stream.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: ChaCha8Rng,
}

impl RandomSource {
    /// Open stream `stream` of `seed`.
    pub fn new(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self { rng }
    }

    /// Stream for the agent with the given index.
    pub fn for_agent(seed: u64, index: usize) -> Self {
        Self::new(seed, index as u64 + 1)
    }

    /// Uniform on `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform on `[min, max)`. Returns `min` when the range is empty.
    pub fn uniform_range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.uniform()
    }

    /// Uniform on `[-1, 1)`.
    pub fn symmetric(&mut self) -> f64 {
        self.uniform_range(-1.0, 1.0)
    }

    /// Normal draw via the Box-Muller transform.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(f64::EPSILON);
        let u2 = self.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    pub fn sample(&mut self, source: &ValueSource) -> f64 {
        match *source {
            ValueSource::Fixed { value } => value,
            ValueSource::Normal { mean, std_dev } => self.normal(mean, std_dev),
        }
    }

    pub fn sample_threshold(&mut self, source: &ThresholdSource) -> f64 {
        match *source {
            ThresholdSource::Fixed { value } => value,
            ThresholdSource::Uniform { min, max } => self.uniform_range(min, max),
            ThresholdSource::Normal { mean, std_dev } => self.normal(mean, std_dev),
        }
    }

    /// Uniform random permutation in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

/// Draw a fresh seed from OS entropy.
pub fn entropy_seed() -> u64 {
    rand::random()
}
