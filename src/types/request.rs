//! Generation request types.

use crate::models::ModelVariant;
use crate::params::ParameterSet;

/// A decoded reference melody for the melody variant.
///
/// Decoded to mono at submit time so queued jobs hold no open file handles.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodyReference {
    /// Mono waveform samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate of the decoded waveform in Hz.
    pub sample_rate: u32,
}

impl MelodyReference {
    /// Duration of the reference melody in seconds.
    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A validated, immutable generation request.
///
/// Built at the submission boundary after prompt validation, parameter
/// normalization, and melody resolution; consumed exactly once by the
/// worker thread.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The model variant to generate with.
    pub variant: ModelVariant,
    /// Free-text prompt describing the desired music.
    pub prompt: String,
    /// Normalized sampling and post-processing parameters.
    pub params: ParameterSet,
    /// Reference melody, present only for the melody variant.
    pub melody: Option<MelodyReference>,
}

impl GenerationRequest {
    /// Creates a text-only request.
    pub fn new(variant: ModelVariant, prompt: impl Into<String>, params: ParameterSet) -> Self {
        Self {
            variant,
            prompt: prompt.into(),
            params,
            melody: None,
        }
    }

    /// Attaches a reference melody to the request.
    pub fn with_melody(mut self, melody: MelodyReference) -> Self {
        self.melody = Some(melody);
        self
    }
}
