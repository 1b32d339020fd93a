//! Daemon configuration module.
//!
//! Runtime configuration for musicgen-webd: model storage, generated
//! audio and melody upload directories, the default model, and ONNX
//! thread settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::ModelVariant;

/// Runtime configuration for the daemon.
///
/// Typically loaded from command-line arguments or environment variables
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path to the directory containing ONNX model files, one
    /// subdirectory per variant. If None, uses the platform-specific
    /// default cache location.
    pub model_path: Option<PathBuf>,

    /// Path to the directory for storing generated audio files.
    /// If None, uses the platform-specific default cache location.
    pub audio_path: Option<PathBuf>,

    /// Path to the scratch directory for uploaded melody files.
    /// If None, uses the platform-specific default cache location.
    pub melody_scratch_path: Option<PathBuf>,

    /// Path to the last-run settings file.
    /// If None, uses the platform-specific default config location.
    pub settings_path: Option<PathBuf>,

    /// Model variant used when a request does not name one.
    pub default_model: ModelVariant,

    /// Number of threads for intra-op parallelism in ONNX Runtime.
    /// If None, uses ONNX Runtime's default (typically number of CPU cores).
    pub threads: Option<u32>,
}

impl DaemonConfig {
    /// Creates a new DaemonConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a DaemonConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `MUSICGEN_WEBD_MODEL_PATH` - Path to the model directory
    /// - `MUSICGEN_WEBD_AUDIO_PATH` - Path to the generated audio directory
    /// - `MUSICGEN_WEBD_MELODY_PATH` - Path to the melody upload directory
    /// - `MUSICGEN_WEBD_SETTINGS_PATH` - Path to the settings file
    /// - `MUSICGEN_WEBD_MODEL` - Default model (small, medium, large, melody)
    /// - `MUSICGEN_WEBD_THREADS` - Number of threads for CPU execution
    ///
    /// Falls back to defaults for unset variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("MUSICGEN_WEBD_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("MUSICGEN_WEBD_AUDIO_PATH") {
            config.audio_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("MUSICGEN_WEBD_MELODY_PATH") {
            config.melody_scratch_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("MUSICGEN_WEBD_SETTINGS_PATH") {
            config.settings_path = Some(PathBuf::from(path));
        }

        if let Ok(model_str) = std::env::var("MUSICGEN_WEBD_MODEL") {
            if let Some(variant) = ModelVariant::parse(&model_str) {
                config.default_model = variant;
            }
        }

        if let Ok(threads_str) = std::env::var("MUSICGEN_WEBD_THREADS") {
            if let Ok(threads) = threads_str.parse::<u32>() {
                if threads > 0 {
                    config.threads = Some(threads);
                }
            }
        }

        config
    }

    /// Returns the effective model path, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        match self.model_path {
            Some(ref path) => path.clone(),
            None => default_cache_subdir("models"),
        }
    }

    /// Returns the effective generated-audio path.
    pub fn effective_audio_path(&self) -> PathBuf {
        match self.audio_path {
            Some(ref path) => path.clone(),
            None => default_cache_subdir("audio"),
        }
    }

    /// Returns the effective melody upload path.
    pub fn effective_melody_scratch_path(&self) -> PathBuf {
        match self.melody_scratch_path {
            Some(ref path) => path.clone(),
            None => default_cache_subdir("melody"),
        }
    }

    /// Returns the effective settings file path.
    pub fn effective_settings_path(&self) -> PathBuf {
        if let Some(ref path) = self.settings_path {
            return path.clone();
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "musicgen-webd") {
            proj_dirs.config_dir().join("settings.json")
        } else {
            PathBuf::from("./settings.json")
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Some("threads must be > 0".to_string());
            }
            if threads > 256 {
                return Some(format!("threads too high: {} (max 256)", threads));
            }
        }

        None
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            audio_path: None,
            melody_scratch_path: None,
            settings_path: None,
            default_model: ModelVariant::default(),
            threads: None,
        }
    }
}

/// Returns a platform-specific default storage path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/musicgen-webd/<name>
/// - Linux: ~/.cache/musicgen-webd/<name>
/// - Windows: C:\Users\<user>\AppData\Local\musicgen-webd\cache\<name>
fn default_cache_subdir(name: &str) -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "musicgen-webd") {
        proj_dirs.cache_dir().join(name)
    } else {
        // Fallback to current directory
        PathBuf::from(".").join(name)
    }
}
