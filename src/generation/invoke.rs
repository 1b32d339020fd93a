//! Engine invocation for a single generation request.
//!
//! Resolves the seed, applies the sampling parameters, and runs the
//! engine. Seed resolution mutates the parameter set: an explicitly
//! random seed is drawn here and written back so the value that actually
//! produced the audio lands in the metadata sidecar.

use rand::Rng;
use tracing::debug;

use crate::error::Result;
use crate::models::{GenerationParams, InferenceEngine};
use crate::params::{ParameterSet, SeedSpec};
use crate::types::MelodyReference;

/// Runs one generation on an already-loaded engine.
///
/// `params.seed` is `Fixed` on return whenever it was present in the
/// request, so callers can persist the effective seed.
pub fn run_inference(
    engine: &mut dyn InferenceEngine,
    prompt: &str,
    params: &mut ParameterSet,
    melody: Option<&MelodyReference>,
) -> Result<Vec<f32>> {
    let seed = match params.seed {
        Some(SeedSpec::Fixed(s)) => Some(s),
        Some(SeedSpec::Random) => {
            // Non-negative so the persisted value round-trips through
            // clients that parse it as a signed 32-bit int.
            let drawn = rand::thread_rng().gen_range(0..=i32::MAX as u64);
            params.seed = Some(SeedSpec::Fixed(drawn));
            Some(drawn)
        }
        None => None,
    };

    let resolved = GenerationParams::from_parameter_set(params);
    engine.set_params(&resolved);
    if let Some(s) = seed {
        debug!(seed = s, "Seeding sampler");
        engine.seed(s);
    }

    match melody {
        Some(melody) => engine.generate_with_melody(prompt, melody),
        None => engine.generate(prompt),
    }
}
