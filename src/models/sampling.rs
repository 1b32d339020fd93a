//! Token sampling for the decoder output.
//!
//! Applies temperature scaling, top-k truncation, and top-p (nucleus)
//! filtering, then draws from the resulting distribution with a ChaCha RNG
//! so that a fixed seed reproduces the whole token sequence.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, WebdError};

use super::engine::GenerationParams;

/// Seeded sampler shared by all codebooks of one engine.
pub struct Sampler {
    rng: ChaCha8Rng,
    use_sampling: bool,
    top_k: usize,
    top_p: f32,
    temperature: f32,
}

impl Sampler {
    /// Creates a sampler with an entropy-seeded RNG and default parameters.
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            use_sampling: true,
            top_k: 250,
            top_p: 0.67,
            temperature: 1.2,
        }
    }

    /// Re-seeds the RNG for reproducible generation.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Applies sampling parameters for subsequent draws.
    pub fn configure(&mut self, params: &GenerationParams) {
        self.use_sampling = params.use_sampling;
        self.top_k = params.top_k as usize;
        self.top_p = params.top_p;
        self.temperature = params.temperature.max(f32::EPSILON);
    }

    /// Samples one token id from a single row of logits.
    pub fn sample(&mut self, logits: &[f32]) -> Result<i64> {
        if logits.is_empty() {
            return Err(WebdError::model_inference_failed("empty logits row"));
        }

        if !self.use_sampling {
            return Ok(argmax(logits));
        }

        // Softmax with temperature, max-subtracted for stability.
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = logits
            .iter()
            .map(|l| ((l - max) / self.temperature).exp())
            .collect();
        let sum: f32 = exp.iter().sum();

        let mut indexed: Vec<(usize, f32)> = exp
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e / sum))
            .collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        // Top-k truncation.
        let k = self.top_k.clamp(1, indexed.len());
        indexed.truncate(k);

        // Top-p nucleus cutoff, always keeping the most probable token.
        if self.top_p > 0.0 && self.top_p < 1.0 {
            let mut cumulative = 0.0f32;
            let mut cutoff = indexed.len();
            for (i, (_, p)) in indexed.iter().enumerate() {
                cumulative += p;
                if cumulative >= self.top_p {
                    cutoff = i + 1;
                    break;
                }
            }
            indexed.truncate(cutoff.max(1));
        }

        let dist = WeightedIndex::new(indexed.iter().map(|(_, p)| *p)).map_err(|e| {
            WebdError::model_inference_failed(format!("degenerate token distribution: {}", e))
        })?;
        let choice = dist.sample(&mut self.rng);
        Ok(indexed[choice].0 as i64)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

fn argmax(logits: &[f32]) -> i64 {
    let mut best = 0usize;
    for (i, l) in logits.iter().enumerate() {
        if *l > logits[best] {
            best = i;
        }
    }
    best as i64
}
