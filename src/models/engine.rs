//! Inference engine seam.
//!
//! The worker thread and the queue never see ONNX sessions directly; they
//! drive generation through these traits so the engine stays swappable and
//! the queue logic stays testable without model files.

use crate::error::Result;
use crate::params::{self, ParameterSet};
use crate::types::MelodyReference;

use super::ModelVariant;

/// Engine-facing sampling parameters with all defaults resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub use_sampling: bool,
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub cfg_coef: f32,
    pub duration_sec: u32,
    pub two_step_cfg: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            use_sampling: true,
            top_k: params::DEFAULT_TOP_K,
            top_p: params::DEFAULT_TOP_P,
            temperature: params::DEFAULT_TEMPERATURE,
            cfg_coef: params::DEFAULT_CFG_COEF,
            duration_sec: params::DEFAULT_DURATION_SEC,
            two_step_cfg: false,
        }
    }
}

impl GenerationParams {
    /// Resolves engine parameters from a normalized parameter set,
    /// filling absent fields with the documented defaults.
    pub fn from_parameter_set(params: &ParameterSet) -> Self {
        let defaults = Self::default();
        Self {
            use_sampling: params.use_sampling.unwrap_or(defaults.use_sampling),
            top_k: params.top_k.unwrap_or(defaults.top_k),
            top_p: params.top_p.unwrap_or(defaults.top_p),
            temperature: params.temperature.unwrap_or(defaults.temperature),
            cfg_coef: params.cfg_coef.unwrap_or(defaults.cfg_coef),
            duration_sec: params.duration_sec.unwrap_or(defaults.duration_sec),
            two_step_cfg: params.two_step_cfg.unwrap_or(defaults.two_step_cfg),
        }
    }
}

/// A loaded generative model ready to produce waveforms.
pub trait InferenceEngine: Send {
    /// The variant this engine was loaded for.
    fn variant(&self) -> ModelVariant;

    /// Output sample rate of generated audio in Hz.
    fn sample_rate(&self) -> u32;

    /// Applies sampling parameters for subsequent generations.
    fn set_params(&mut self, params: &GenerationParams);

    /// Seeds the sampler RNG for reproducible generation.
    fn seed(&mut self, seed: u64);

    /// Generates a mono waveform from a text prompt.
    fn generate(&mut self, prompt: &str) -> Result<Vec<f32>>;

    /// Generates a mono waveform conditioned on a reference melody.
    fn generate_with_melody(
        &mut self,
        prompt: &str,
        melody: &MelodyReference,
    ) -> Result<Vec<f32>>;
}

/// Loads engines on demand for the model manager.
pub trait EngineLoader: Send {
    fn load(&self, variant: ModelVariant) -> Result<Box<dyn InferenceEngine>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::error::WebdError;

    /// Deterministic in-memory engine for queue and pipeline tests.
    ///
    /// Emits a short waveform derived from the applied seed so tests can
    /// assert determinism without model files.
    pub struct StubEngine {
        variant: ModelVariant,
        params: GenerationParams,
        seed: u64,
        fail_with: Option<String>,
    }

    impl StubEngine {
        pub fn new(variant: ModelVariant) -> Self {
            Self {
                variant,
                params: GenerationParams::default(),
                seed: 0,
                fail_with: None,
            }
        }

        pub fn failing(variant: ModelVariant, message: impl Into<String>) -> Self {
            let mut engine = Self::new(variant);
            engine.fail_with = Some(message.into());
            engine
        }

        fn waveform(&self, len: usize) -> Vec<f32> {
            // xorshift keyed on the seed keeps output deterministic per seed.
            let mut state = self.seed.wrapping_add(0x9e3779b97f4a7c15);
            (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    ((state % 2000) as f32 / 1000.0) - 1.0
                })
                .collect()
        }
    }

    impl InferenceEngine for StubEngine {
        fn variant(&self) -> ModelVariant {
            self.variant
        }

        fn sample_rate(&self) -> u32 {
            self.variant.sample_rate()
        }

        fn set_params(&mut self, params: &GenerationParams) {
            self.params = *params;
        }

        fn seed(&mut self, seed: u64) {
            self.seed = seed;
        }

        fn generate(&mut self, _prompt: &str) -> Result<Vec<f32>> {
            if let Some(ref message) = self.fail_with {
                return Err(WebdError::model_inference_failed(message.clone()));
            }
            Ok(self.waveform(self.params.duration_sec as usize * 16))
        }

        fn generate_with_melody(
            &mut self,
            prompt: &str,
            _melody: &MelodyReference,
        ) -> Result<Vec<f32>> {
            self.generate(prompt)
        }
    }

    /// Loader handing out stub engines, counting loads for swap tests.
    pub struct StubLoader {
        pub loads: Arc<AtomicUsize>,
        pub fail_variant: Option<ModelVariant>,
        pub fail_generation: Option<String>,
    }

    impl StubLoader {
        pub fn new() -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                fail_variant: None,
                fail_generation: None,
            }
        }
    }

    impl EngineLoader for StubLoader {
        fn load(&self, variant: ModelVariant) -> Result<Box<dyn InferenceEngine>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_variant == Some(variant) {
                return Err(WebdError::model_load_failed(format!(
                    "stub refuses to load {}",
                    variant
                )));
            }
            match self.fail_generation {
                Some(ref message) => Ok(Box::new(StubEngine::failing(variant, message.clone()))),
                None => Ok(Box::new(StubEngine::new(variant))),
            }
        }
    }
}
