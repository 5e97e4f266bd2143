//! Wire protocol types for the worker exchange.
//!
//! One request line, one response line, strictly in that order per
//! exchange. The stream carries no multiplexing; correlation ids exist as
//! a consistency check, not a routing mechanism.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation token for one request/response exchange.
///
/// UUID v4 keeps ids unique across the process lifetime; the original
/// protocol only requires an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One request to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: RequestId,
    pub method: String,
    /// Flat map of string keys to primitive values; list-valued parameters
    /// are comma-joined strings.
    pub params: serde_json::Map<String, Value>,
}

/// One reply from the worker.
///
/// `id` echoes the request id when the worker supplies it. Exactly one of
/// `result`/`error` is expected; a reply with neither is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl WireResponse {
    /// Top-level worker error, if one is present and non-empty.
    ///
    /// Empty strings, empty containers, `null`, `false`, and `0` count as
    /// no error; the worker pads replies with empty error fields.
    pub fn error_text(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        if is_empty_value(error) {
            return None;
        }
        Some(stringify(error))
    }

    /// Worker-side parameter rejection embedded in the result object.
    ///
    /// Presence of the `error` key is what counts here, not its value;
    /// that is the worker's convention for validation failures.
    pub fn embedded_error(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        let embedded = result.as_object()?.get("error")?;
        Some(stringify(embedded))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
