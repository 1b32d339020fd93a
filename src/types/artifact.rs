//! Generated artifact types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::ModelVariant;

/// Outcome of the optional 44.1kHz resample step.
///
/// Resampling is best effort: a failure keeps the original-rate file and
/// the job still succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ResampleOutcome {
    /// The request did not ask for resampling.
    NotRequested,
    /// The file was rewritten at 44.1kHz.
    Done,
    /// Resampling failed; the 32kHz file was kept.
    Degraded(String),
}

/// A successfully exported generation: an audio file paired with its
/// JSON metadata sidecar. The two always share a base name.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    /// Absolute path to the audio file.
    pub audio_path: PathBuf,
    /// Absolute path to the metadata sidecar.
    pub metadata_path: PathBuf,
    /// Variant that produced the audio.
    pub variant: ModelVariant,
    /// Prompt the audio was generated from.
    pub prompt: String,
    /// Flat parameter map as persisted in the sidecar, including any
    /// back-filled seed.
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Human-readable generation timestamp.
    pub created_at: String,
    /// Whether the optional resample step ran, and how it went.
    pub resample: ResampleOutcome,
}

impl GeneratedArtifact {
    /// File name of the audio file, for client display.
    pub fn audio_file_name(&self) -> String {
        self.audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name of the metadata sidecar, for client display.
    pub fn metadata_file_name(&self) -> String {
        self.metadata_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        let artifact = GeneratedArtifact {
            audio_path: PathBuf::from("/audio/calm piano.wav"),
            metadata_path: PathBuf::from("/audio/calm piano.json"),
            variant: ModelVariant::Large,
            prompt: "calm piano".to_string(),
            parameters: serde_json::Map::new(),
            created_at: "2026-08-29 12:00:00".to_string(),
            resample: ResampleOutcome::NotRequested,
        };
        assert_eq!(artifact.audio_file_name(), "calm piano.wav");
        assert_eq!(artifact.metadata_file_name(), "calm piano.json");
    }

    #[test]
    fn resample_outcome_serializes_with_reason() {
        let degraded = ResampleOutcome::Degraded("chunk underrun".to_string());
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "chunk underrun");
    }
}
