//! Persisted model artifact
//!
//! Loading never fails. A missing, unreadable or malformed file yields the
//! version-9 default, and each field of a readable file is coerced on its
//! own: wrong types and missing keys take the default value, unknown keys
//! are dropped. Loading runs in two steps, `parse_with_fallback` followed
//! by `repair`, so each step can be tested on its own.

use super::features::{DENSE_FEATURE_NAMES, FUNNEL_FEATURE_NAMES};
use super::TrainResult;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Schema version written by this trainer
pub const ARTIFACT_VERSION: i64 = 9;

/// Intercept of a freshly synthesised head
pub const DEFAULT_INTERCEPT: f64 = -2.25;

/// Secondary classifier head for scam-funnel progression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelHead {
    pub intercept: f64,
    pub dense_feature_weights: IndexMap<String, f64>,
}

impl Default for FunnelHead {
    fn default() -> Self {
        Self {
            intercept: DEFAULT_INTERCEPT,
            dense_feature_weights: zero_weights(&FUNNEL_FEATURE_NAMES),
        }
    }
}

/// The model file read by the scoring side
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    pub version: i64,
    pub intercept: f64,
    pub dense_feature_weights: IndexMap<String, f64>,
    pub token_weights: IndexMap<String, f64>,
    pub funnel_head: FunnelHead,
}

impl Default for ModelArtifact {
    fn default() -> Self {
        Self {
            version: ARTIFACT_VERSION,
            intercept: DEFAULT_INTERCEPT,
            dense_feature_weights: zero_weights(&DENSE_FEATURE_NAMES),
            token_weights: IndexMap::new(),
            funnel_head: FunnelHead::default(),
        }
    }
}

impl ModelArtifact {
    /// Load from disk, falling back to the default on any problem
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No prior model at {}, starting from defaults", path.display());
                None
            }
            Err(e) => {
                warn!("Could not read prior model {}: {}", path.display(), e);
                None
            }
        };
        repair(parse_with_fallback(raw.as_deref()).as_ref())
    }

    /// Write the whole artifact as pretty-printed JSON
    pub fn save(&self, path: &Path) -> TrainResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Step 1: raw text to a JSON object. Anything that is not a JSON object
/// (absent, unparsable, array, scalar) is `None`.
pub fn parse_with_fallback(raw: Option<&str>) -> Option<Map<String, Value>> {
    let raw = raw?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(
                "Prior model is not a JSON object ({}), using defaults",
                json_type(&other)
            );
            None
        }
        Err(e) => {
            warn!("Prior model is not valid JSON ({}), using defaults", e);
            None
        }
    }
}

/// Step 2: coerce a parsed object into a complete artifact
pub fn repair(object: Option<&Map<String, Value>>) -> ModelArtifact {
    let Some(object) = object else {
        return ModelArtifact::default();
    };

    let version = object
        .get("version")
        .and_then(Value::as_i64)
        .filter(|v| *v >= 0)
        .unwrap_or(ARTIFACT_VERSION);

    let funnel = object.get("funnelHead").and_then(Value::as_object);
    let funnel_head = FunnelHead {
        intercept: number_or(funnel.and_then(|f| f.get("intercept")), DEFAULT_INTERCEPT),
        dense_feature_weights: fixed_weights(
            funnel.and_then(|f| f.get("denseFeatureWeights")),
            &FUNNEL_FEATURE_NAMES,
        ),
    };

    ModelArtifact {
        version,
        intercept: number_or(object.get("intercept"), DEFAULT_INTERCEPT),
        dense_feature_weights: fixed_weights(
            object.get("denseFeatureWeights"),
            &DENSE_FEATURE_NAMES,
        ),
        token_weights: token_weights(object.get("tokenWeights")),
        funnel_head,
    }
}

fn zero_weights(names: &[&str]) -> IndexMap<String, f64> {
    names.iter().map(|n| (n.to_string(), 0.0)).collect()
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn number_or(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(finite_number).unwrap_or(default)
}

/// Exactly `names`, in order; stored numbers kept, everything else 0.0
fn fixed_weights(value: Option<&Value>, names: &[&str]) -> IndexMap<String, f64> {
    let stored = value.and_then(Value::as_object);
    names
        .iter()
        .map(|name| {
            let weight = number_or(stored.and_then(|m| m.get(*name)), 0.0);
            (name.to_string(), weight)
        })
        .collect()
}

/// Any string key with a numeric value; other entries are dropped
fn token_weights(value: Option<&Value>) -> IndexMap<String, f64> {
    let Some(map) = value.and_then(Value::as_object) else {
        return IndexMap::new();
    };
    map.iter()
        .filter_map(|(token, v)| finite_number(v).map(|w| (token.clone(), w)))
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load_str(raw: &str) -> ModelArtifact {
        repair(parse_with_fallback(Some(raw)).as_ref())
    }

    #[test]
    fn test_default_shape() {
        let artifact = ModelArtifact::default();
        assert_eq!(artifact.version, 9);
        assert_eq!(artifact.intercept, -2.25);
        assert_eq!(artifact.dense_feature_weights.len(), 36);
        assert!(artifact.dense_feature_weights.values().all(|w| *w == 0.0));
        assert!(artifact.token_weights.is_empty());
        assert_eq!(artifact.funnel_head.dense_feature_weights.len(), 14);
    }

    #[test]
    fn test_unparsable_and_wrong_shape_fall_back() {
        for raw in ["", "{not json", "[1, 2, 3]", "42", "null", "\"model\""] {
            assert_eq!(load_str(raw), ModelArtifact::default(), "{raw:?}");
        }
        assert!(parse_with_fallback(None).is_none());
    }

    #[test]
    fn test_field_coercion() {
        let artifact = load_str(
            r#"{
                "version": "nine",
                "intercept": "high",
                "denseFeatureWeights": {"kw_payment": 1.5, "kw_account": "x", "bogus": 3.0},
                "tokenWeights": {"ng3:a b c": 0.7, "ng3:d e f": true, "ng4:x y z w": -1},
                "funnelHead": {"intercept": -1.0, "denseFeatureWeights": [1, 2]},
                "extra": {"ignored": true}
            }"#,
        );

        assert_eq!(artifact.version, 9);
        assert_eq!(artifact.intercept, -2.25);
        assert_eq!(artifact.dense_feature_weights.len(), 36);
        assert_eq!(artifact.dense_feature_weights["kw_payment"], 1.5);
        assert_eq!(artifact.dense_feature_weights["kw_account"], 0.0);
        assert!(!artifact.dense_feature_weights.contains_key("bogus"));

        assert_eq!(artifact.token_weights.len(), 2);
        assert_eq!(artifact.token_weights["ng3:a b c"], 0.7);
        assert_eq!(artifact.token_weights["ng4:x y z w"], -1.0);

        assert_eq!(artifact.funnel_head.intercept, -1.0);
        assert_eq!(artifact.funnel_head.dense_feature_weights.len(), 14);
        assert!(artifact.funnel_head.dense_feature_weights.values().all(|w| *w == 0.0));
    }

    #[test]
    fn test_dense_keys_keep_fixed_order() {
        let artifact = load_str(
            r#"{"denseFeatureWeights": {"funnel_hits_norm": 2.0, "kw_payment": 1.0}}"#,
        );
        let keys: Vec<_> = artifact.dense_feature_weights.keys().map(String::as_str).collect();
        assert_eq!(keys, DENSE_FEATURE_NAMES.to_vec());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("model.json");

        let mut artifact = ModelArtifact::default();
        artifact.intercept = -1.234_567_890_123_456_7;
        artifact.dense_feature_weights.insert("kw_trust".into(), 0.1 + 0.2);
        artifact.token_weights.insert("ng3:pay me now".into(), 1.0 / 3.0);
        artifact.funnel_head.intercept = 0.75;

        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path);
        assert_eq!(loaded, artifact);

        let text = std::fs::read_to_string(&path).unwrap();
        for key in [
            "\"version\"",
            "\"denseFeatureWeights\"",
            "\"tokenWeights\"",
            "\"funnelHead\"",
        ] {
            assert!(text.contains(key), "missing {key}");
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let loaded = ModelArtifact::load(&dir.path().join("absent.json"));
        assert_eq!(loaded, ModelArtifact::default());
    }
}
