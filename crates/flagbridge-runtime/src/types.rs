//! Values exchanged with the engine
//!
//! Evaluation results are plain data decoded from the engine's JSON. The
//! bridge never interprets them beyond typed lookups with a fallback.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Arbitrary JSON object returned by the engine
pub type JsonObject = Map<String, Value>;

/// Why an evaluation produced its result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationDetails {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub lcut: Option<u64>,
    #[serde(default)]
    pub received_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureGate {
    pub name: String,
    #[serde(default)]
    pub value: bool,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub id_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EvaluationDetails>,
}

impl FeatureGate {
    /// Result returned when the engine could not be asked.
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicConfig {
    pub name: String,
    #[serde(default)]
    pub value: JsonObject,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub id_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EvaluationDetails>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    #[serde(default)]
    pub value: JsonObject,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub id_type: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EvaluationDetails>,
}

/// Layer result
///
/// Keeps the engine's raw JSON so parameter exposures can be logged for the
/// exact evaluation that produced this value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub id_type: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub allocated_experiment_name: Option<String>,
    #[serde(rename = "__value", default)]
    pub value: JsonObject,
    #[serde(default)]
    pub details: Option<EvaluationDetails>,
    #[serde(skip)]
    pub(crate) raw: Option<String>,
    #[serde(skip)]
    pub(crate) exposure_logging_disabled: bool,
}

impl Layer {
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Typed lookups into a result's value object, with a caller fallback
pub trait ValueGetters {
    fn values(&self) -> &JsonObject;

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.values().get(key)
    }

    fn get_string(&self, key: &str, fallback: &str) -> String {
        match self.get_value(key) {
            Some(Value::String(s)) => s.clone(),
            _ => fallback.to_string(),
        }
    }

    fn get_f64(&self, key: &str, fallback: f64) -> f64 {
        self.get_value(key).and_then(Value::as_f64).unwrap_or(fallback)
    }

    fn get_i64(&self, key: &str, fallback: i64) -> i64 {
        self.get_value(key).and_then(Value::as_i64).unwrap_or(fallback)
    }

    fn get_bool(&self, key: &str, fallback: bool) -> bool {
        self.get_value(key).and_then(Value::as_bool).unwrap_or(fallback)
    }

    fn get_array(&self, key: &str, fallback: Vec<Value>) -> Vec<Value> {
        match self.get_value(key) {
            Some(Value::Array(items)) => items.clone(),
            _ => fallback,
        }
    }

    fn get_object(&self, key: &str, fallback: JsonObject) -> JsonObject {
        match self.get_value(key) {
            Some(Value::Object(map)) => map.clone(),
            _ => fallback,
        }
    }

    /// Deserialize the value under `key` into `T`.
    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl ValueGetters for DynamicConfig {
    fn values(&self) -> &JsonObject {
        &self.value
    }
}

impl ValueGetters for Experiment {
    fn values(&self) -> &JsonObject {
        &self.value
    }
}

impl ValueGetters for Layer {
    fn values(&self) -> &JsonObject {
        &self.value
    }
}

/// Named collection of parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterStore {
    pub name: String,
    #[serde(default)]
    pub details: Option<EvaluationDetails>,
}

/// Outcome of a blocking initialization
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitializeDetails {
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub init_success: bool,
    #[serde(default)]
    pub is_config_spec_ready: bool,
    #[serde(default)]
    pub is_id_list_ready: Option<bool>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub failure_details: Option<FailureDetails>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureDetails {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub error: Option<JsonObject>,
}

/// Per-call evaluation switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EvaluationOptions {
    pub disable_exposure_logging: bool,
}

impl EvaluationOptions {
    pub fn without_exposure_logging() -> Self {
        Self {
            disable_exposure_logging: true,
        }
    }
}

/// Options for `get_client_init_response`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ClientInitResponseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_sdk_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_local_overrides: Option<bool>,
}

/// Custom event logged through the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl Event {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            value: None,
            metadata: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}
