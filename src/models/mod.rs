//! MusicGen model components.
//!
//! This module contains the engine seam and its ONNX implementation:
//! - [`ModelVariant`]: The selectable MusicGen variants
//! - [`InferenceEngine`]/[`EngineLoader`]: The seam the worker drives
//! - [`OnnxMusicGen`](musicgen::OnnxMusicGen): The ONNX Runtime engine
//! - [`ModelManager`]: Single-resident engine ownership and swapping
//! - [`ensure_models`](downloader::ensure_models): Model file provisioning

pub mod downloader;
pub mod engine;
pub mod manager;
pub mod musicgen;
pub mod sampling;
mod variant;

use std::path::PathBuf;

use crate::error::Result;

pub use downloader::ensure_models;
pub use engine::{EngineLoader, GenerationParams, InferenceEngine};
pub use manager::ModelManager;
pub use musicgen::{check_model_files, OnnxMusicGen, REQUIRED_MODEL_FILES};
pub use variant::ModelVariant;

/// Production loader: provisions files under `<model_root>/<variant>` and
/// loads the ONNX sessions.
pub struct OnnxEngineLoader {
    model_root: PathBuf,
}

impl OnnxEngineLoader {
    pub fn new(model_root: PathBuf) -> Self {
        Self { model_root }
    }

    /// Model directory for one variant.
    pub fn variant_dir(&self, variant: ModelVariant) -> PathBuf {
        self.model_root.join(variant.dir_name())
    }
}

impl EngineLoader for OnnxEngineLoader {
    fn load(&self, variant: ModelVariant) -> Result<Box<dyn InferenceEngine>> {
        let dir = self.variant_dir(variant);
        ensure_models(variant, &dir)?;
        let engine = OnnxMusicGen::load(&dir, variant)?;
        Ok(Box::new(engine))
    }
}
