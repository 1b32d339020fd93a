//! Last-run settings persisted for UI pre-population.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params;

/// Settings of the most recent submission.
///
/// Saved on every accepted submission; loaded when a client connects so
/// the form comes back up the way it was left. Corrupt or missing files
/// fall back to [`LastRunSettings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRunSettings {
    /// Model variant name as submitted.
    pub model: String,
    /// Prompt text of the last submission.
    pub prompt: String,
    /// Flat parameter map as submitted (after coercion).
    pub parameters: Map<String, Value>,
}

impl Default for LastRunSettings {
    fn default() -> Self {
        let mut parameters = Map::new();
        parameters.insert("duration".into(), Value::from(params::DEFAULT_DURATION_SEC));
        parameters.insert(
            "cfg_coef".into(),
            Value::from(params::DEFAULT_CFG_COEF as f64),
        );
        parameters.insert("top_p".into(), Value::from(params::DEFAULT_TOP_P as f64));
        parameters.insert(
            "temperature".into(),
            Value::from(params::DEFAULT_TEMPERATURE as f64),
        );
        parameters.insert("top_k".into(), Value::from(params::DEFAULT_TOP_K));
        Self {
            model: "large".to_string(),
            prompt: String::new(),
            parameters,
        }
    }
}
