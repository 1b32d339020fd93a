//! Single-resident model manager.
//!
//! At most one engine is loaded at a time. Selecting a different variant
//! drops the resident engine before the replacement is loaded so both are
//! never in memory together; a failed load leaves nothing resident and the
//! next request simply retries.

use tracing::info;

use crate::error::{Result, WebdError};

use super::engine::{EngineLoader, InferenceEngine};
use super::ModelVariant;

/// Owns the resident engine. Only the worker thread holds a manager, so
/// no locking is needed around the engine itself.
pub struct ModelManager {
    loader: Box<dyn EngineLoader>,
    resident: Option<Box<dyn InferenceEngine>>,
}

impl ModelManager {
    pub fn new(loader: Box<dyn EngineLoader>) -> Self {
        Self {
            loader,
            resident: None,
        }
    }

    /// Returns the variant currently resident, if any.
    pub fn resident_variant(&self) -> Option<ModelVariant> {
        self.resident.as_ref().map(|e| e.variant())
    }

    /// Returns the engine for `variant`, loading or swapping as needed.
    pub fn ensure_loaded(&mut self, variant: ModelVariant) -> Result<&mut dyn InferenceEngine> {
        let resident_matches = self
            .resident
            .as_ref()
            .map(|e| e.variant() == variant)
            .unwrap_or(false);

        if !resident_matches {
            if let Some(previous) = self.resident.take() {
                info!(from = %previous.variant(), to = %variant, "swapping resident model");
                // Old engine drops here, releasing its sessions before the
                // replacement allocates.
                drop(previous);
            }
            let engine = self.loader.load(variant)?;
            info!(variant = %variant, "model loaded");
            self.resident = Some(engine);
        }

        match self.resident.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(WebdError::model_load_failed(
                "no engine resident after load",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::models::engine::test_support::StubLoader;

    #[test]
    fn loads_on_first_use_and_caches() {
        let loader = StubLoader::new();
        let loads = Arc::clone(&loader.loads);
        let mut manager = ModelManager::new(Box::new(loader));

        assert!(manager.resident_variant().is_none());
        manager.ensure_loaded(ModelVariant::Small).unwrap();
        manager.ensure_loaded(ModelVariant::Small).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(manager.resident_variant(), Some(ModelVariant::Small));
    }

    #[test]
    fn swaps_when_variant_changes() {
        let loader = StubLoader::new();
        let loads = Arc::clone(&loader.loads);
        let mut manager = ModelManager::new(Box::new(loader));

        manager.ensure_loaded(ModelVariant::Small).unwrap();
        manager.ensure_loaded(ModelVariant::Large).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(manager.resident_variant(), Some(ModelVariant::Large));
    }

    #[test]
    fn failed_load_leaves_nothing_resident_and_retries() {
        let mut loader = StubLoader::new();
        loader.fail_variant = Some(ModelVariant::Melody);
        let loads = Arc::clone(&loader.loads);
        let mut manager = ModelManager::new(Box::new(loader));

        manager.ensure_loaded(ModelVariant::Small).unwrap();
        assert!(manager.ensure_loaded(ModelVariant::Melody).is_err());
        // The previous engine was dropped before the failed load.
        assert!(manager.resident_variant().is_none());

        // A later request is allowed to retry.
        assert!(manager.ensure_loaded(ModelVariant::Melody).is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }
}
