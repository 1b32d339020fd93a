//! MusicGen model variants.
//!
//! The daemon keeps at most one variant resident at a time; selecting a
//! different variant drops the current engine before loading the new one.

use serde::{Deserialize, Serialize};

/// Available MusicGen model variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// musicgen-small: fastest, lowest quality.
    Small,
    /// musicgen-medium: balanced speed and quality.
    Medium,
    /// musicgen-large: best text-only quality.
    #[default]
    Large,
    /// musicgen-melody: text plus reference-melody conditioning.
    Melody,
}

impl ModelVariant {
    /// Returns the string representation of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Small => "small",
            ModelVariant::Medium => "medium",
            ModelVariant::Large => "large",
            ModelVariant::Melody => "melody",
        }
    }

    /// Parses a variant from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "small" => Some(ModelVariant::Small),
            "medium" => Some(ModelVariant::Medium),
            "large" => Some(ModelVariant::Large),
            "melody" => Some(ModelVariant::Melody),
            _ => None,
        }
    }

    /// Returns the HuggingFace repository id for this variant.
    pub fn repo_id(&self) -> &'static str {
        match self {
            ModelVariant::Small => "facebook/musicgen-small",
            ModelVariant::Medium => "facebook/musicgen-medium",
            ModelVariant::Large => "facebook/musicgen-large",
            ModelVariant::Melody => "facebook/musicgen-melody",
        }
    }

    /// Returns the subdirectory name for this variant's model files.
    pub fn dir_name(&self) -> &'static str {
        self.as_str()
    }

    /// Output sample rate in Hz (all MusicGen variants emit 32kHz audio).
    pub fn sample_rate(&self) -> u32 {
        32000
    }

    /// Returns true if this variant conditions on a reference melody.
    pub fn requires_melody(&self) -> bool {
        matches!(self, ModelVariant::Melody)
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_parsing() {
        assert_eq!(ModelVariant::parse("small"), Some(ModelVariant::Small));
        assert_eq!(ModelVariant::parse("MEDIUM"), Some(ModelVariant::Medium));
        assert_eq!(ModelVariant::parse("large"), Some(ModelVariant::Large));
        assert_eq!(ModelVariant::parse("melody"), Some(ModelVariant::Melody));
        assert_eq!(ModelVariant::parse("xl"), None);
    }

    #[test]
    fn default_is_large() {
        assert_eq!(ModelVariant::default(), ModelVariant::Large);
    }

    #[test]
    fn melody_requires_melody() {
        assert!(ModelVariant::Melody.requires_melody());
        assert!(!ModelVariant::Large.requires_melody());
    }

    #[test]
    fn repo_ids() {
        assert_eq!(ModelVariant::Small.repo_id(), "facebook/musicgen-small");
        assert_eq!(ModelVariant::Melody.repo_id(), "facebook/musicgen-melody");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&ModelVariant::Melody).unwrap();
        assert_eq!(json, "\"melody\"");
        let back: ModelVariant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelVariant::Melody);
    }
}
