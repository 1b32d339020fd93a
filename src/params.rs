//! Parameter normalization for generation requests.
//!
//! Browser form fields arrive as loosely-typed strings. This module coerces
//! each known key to its engine-facing type and gates the advanced keys
//! behind the `advanced_expanded` flag from the UI.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Keys only honored when the advanced panel was expanded in the UI.
pub const ADVANCED_KEYS: &[&str] = &[
    "two_step_cfg",
    "seed",
    "loudness_headroom_db",
    "fade_ms",
    "resample_44k",
];

/// Default top-k applied when the field is absent.
pub const DEFAULT_TOP_K: u32 = 250;
/// Default top-p applied when the field is absent.
pub const DEFAULT_TOP_P: f32 = 0.67;
/// Default temperature applied when the field is absent.
pub const DEFAULT_TEMPERATURE: f32 = 1.2;
/// Default classifier-free guidance coefficient.
pub const DEFAULT_CFG_COEF: f32 = 4.0;
/// Default duration in seconds.
pub const DEFAULT_DURATION_SEC: u32 = 30;
/// Default loudness headroom in dB below full scale.
pub const DEFAULT_LOUDNESS_HEADROOM_DB: f32 = 18.0;

/// How the random seed should be resolved for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSpec {
    /// The seed field was present but empty: draw a fresh random seed and
    /// record it back into the parameter set before anything is persisted.
    Random,
    /// A concrete seed to apply to the sampler RNG before invocation.
    Fixed(u64),
}

/// A normalized, typed parameter set for one generation request.
///
/// Absent fields mean "engine default"; only present fields are serialized
/// into metadata sidecars and the last-run settings record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    pub use_sampling: Option<bool>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub temperature: Option<f32>,
    pub cfg_coef: Option<f32>,
    pub duration_sec: Option<u32>,
    pub two_step_cfg: Option<bool>,
    pub seed: Option<SeedSpec>,
    pub loudness_headroom_db: Option<f32>,
    pub fade_ms: Option<u32>,
    pub resample_44k: Option<bool>,
    /// Unrecognized keys, kept for forward compatibility. Values are
    /// best-effort coerced to floats, raw strings when that fails.
    pub extra: BTreeMap<String, Value>,
}

impl ParameterSet {
    /// Normalizes a raw key/value map from the front end.
    ///
    /// When `advanced_expanded` is false the advanced keys are stripped
    /// regardless of what the client sent; a collapsed panel can still
    /// submit stale hidden fields.
    pub fn normalize(raw: &Map<String, Value>, advanced_expanded: bool) -> Self {
        let mut params = ParameterSet::default();

        for (key, value) in raw {
            if !advanced_expanded && ADVANCED_KEYS.contains(&key.as_str()) {
                continue;
            }
            match key.as_str() {
                "use_sampling" => params.use_sampling = coerce_bool(value),
                "top_k" => params.top_k = coerce_u32(value),
                "top_p" => params.top_p = coerce_f32(value),
                "temperature" => params.temperature = coerce_f32(value),
                "cfg_coef" => params.cfg_coef = coerce_f32(value),
                "duration" => params.duration_sec = coerce_u32(value),
                "two_step_cfg" => params.two_step_cfg = coerce_bool(value),
                "seed" => params.seed = coerce_seed(value),
                "loudness_headroom_db" => params.loudness_headroom_db = coerce_f32(value),
                "fade_ms" => params.fade_ms = coerce_u32(value),
                "resample_44k" => params.resample_44k = coerce_bool(value),
                other => {
                    let coerced = coerce_f32(value)
                        .and_then(|f| serde_json::Number::from_f64(f as f64).map(Value::Number))
                        .unwrap_or_else(|| value.clone());
                    params.extra.insert(other.to_string(), coerced);
                }
            }
        }

        params
    }

    /// Serializes the present fields into a flat JSON object.
    ///
    /// A still-unresolved `SeedSpec::Random` serializes as null; the worker
    /// back-fills the drawn seed before any persistence happens.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(v) = self.use_sampling {
            map.insert("use_sampling".into(), Value::Bool(v));
        }
        if let Some(v) = self.top_k {
            map.insert("top_k".into(), Value::from(v));
        }
        if let Some(v) = self.top_p {
            map.insert("top_p".into(), Value::from(v as f64));
        }
        if let Some(v) = self.temperature {
            map.insert("temperature".into(), Value::from(v as f64));
        }
        if let Some(v) = self.cfg_coef {
            map.insert("cfg_coef".into(), Value::from(v as f64));
        }
        if let Some(v) = self.duration_sec {
            map.insert("duration".into(), Value::from(v));
        }
        if let Some(v) = self.two_step_cfg {
            map.insert("two_step_cfg".into(), Value::Bool(v));
        }
        match self.seed {
            Some(SeedSpec::Fixed(s)) => {
                map.insert("seed".into(), Value::from(s));
            }
            Some(SeedSpec::Random) => {
                map.insert("seed".into(), Value::Null);
            }
            None => {}
        }
        if let Some(v) = self.loudness_headroom_db {
            map.insert("loudness_headroom_db".into(), Value::from(v as f64));
        }
        if let Some(v) = self.fade_ms {
            map.insert("fade_ms".into(), Value::from(v));
        }
        if let Some(v) = self.resample_44k {
            map.insert("resample_44k".into(), Value::Bool(v));
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        map
    }
}

/// Coerces a value to f32, accepting numbers and numeric strings.
fn coerce_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}

/// Coerces a value to u32, truncating fractional strings like "30.0".
fn coerce_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u32),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f as u32),
        _ => None,
    }
}

/// Coerces a value to bool, treating integer-like strings as C booleans.
fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|i| i != 0),
        _ => None,
    }
}

/// Coerces the nullable seed field.
///
/// Null or an empty string means "draw a random seed"; a concrete integer
/// is used as-is. Anything unparseable is treated as absent.
fn coerce_seed(value: &Value) -> Option<SeedSpec> {
    match value {
        Value::Null => Some(SeedSpec::Random),
        Value::Number(n) => n.as_u64().map(SeedSpec::Fixed),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(SeedSpec::Random)
            } else {
                trimmed.parse::<u64>().ok().map(SeedSpec::Fixed)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn coerces_floats_from_strings() {
        let raw = raw(&[
            ("top_p", json!("0.9")),
            ("temperature", json!(" 1.5 ")),
            ("cfg_coef", json!("3")),
        ]);
        let params = ParameterSet::normalize(&raw, true);
        assert_eq!(params.top_p, Some(0.9));
        assert_eq!(params.temperature, Some(1.5));
        assert_eq!(params.cfg_coef, Some(3.0));
    }

    #[test]
    fn coerces_ints_from_fractional_strings() {
        let raw = raw(&[
            ("duration", json!("30.0")),
            ("top_k", json!("250.7")),
            ("fade_ms", json!(100)),
        ]);
        let params = ParameterSet::normalize(&raw, true);
        assert_eq!(params.duration_sec, Some(30));
        assert_eq!(params.top_k, Some(250));
        assert_eq!(params.fade_ms, Some(100));
    }

    #[test]
    fn coerces_bools_from_int_strings() {
        let raw = raw(&[
            ("two_step_cfg", json!("1")),
            ("resample_44k", json!("0")),
            ("use_sampling", json!(true)),
        ]);
        let params = ParameterSet::normalize(&raw, true);
        assert_eq!(params.two_step_cfg, Some(true));
        assert_eq!(params.resample_44k, Some(false));
        assert_eq!(params.use_sampling, Some(true));
    }

    #[test]
    fn seed_absent_empty_and_fixed() {
        let params = ParameterSet::normalize(&raw(&[]), true);
        assert_eq!(params.seed, None);

        let params = ParameterSet::normalize(&raw(&[("seed", json!(""))]), true);
        assert_eq!(params.seed, Some(SeedSpec::Random));

        let params = ParameterSet::normalize(&raw(&[("seed", Value::Null)]), true);
        assert_eq!(params.seed, Some(SeedSpec::Random));

        let params = ParameterSet::normalize(&raw(&[("seed", json!("42"))]), true);
        assert_eq!(params.seed, Some(SeedSpec::Fixed(42)));
    }

    #[test]
    fn advanced_keys_stripped_when_collapsed() {
        let raw = raw(&[
            ("two_step_cfg", json!("1")),
            ("seed", json!("42")),
            ("loudness_headroom_db", json!("12")),
            ("fade_ms", json!("100")),
            ("resample_44k", json!("1")),
            ("top_k", json!("64")),
        ]);
        let params = ParameterSet::normalize(&raw, false);
        assert_eq!(params.two_step_cfg, None);
        assert_eq!(params.seed, None);
        assert_eq!(params.loudness_headroom_db, None);
        assert_eq!(params.fade_ms, None);
        assert_eq!(params.resample_44k, None);
        // Basic keys survive the gating.
        assert_eq!(params.top_k, Some(64));
    }

    #[test]
    fn unknown_keys_coerced_best_effort() {
        let raw = raw(&[
            ("extend_stride", json!("18")),
            ("preset_name", json!("ambient pads")),
        ]);
        let params = ParameterSet::normalize(&raw, true);
        assert_eq!(params.extra["extend_stride"], json!(18.0));
        assert_eq!(params.extra["preset_name"], json!("ambient pads"));
    }

    #[test]
    fn to_json_only_serializes_present_keys() {
        let raw = raw(&[("duration", json!("15")), ("seed", json!("7"))]);
        let params = ParameterSet::normalize(&raw, true);
        let map = params.to_json();
        assert_eq!(map.len(), 2);
        assert_eq!(map["duration"], json!(15));
        assert_eq!(map["seed"], json!(7));
    }

    #[test]
    fn unparseable_values_are_dropped() {
        let raw = raw(&[("top_k", json!("many")), ("temperature", json!([1, 2]))]);
        let params = ParameterSet::normalize(&raw, true);
        assert_eq!(params.top_k, None);
        assert_eq!(params.temperature, None);
    }
}
