//! Session result map and the frozen payload handed to a transport

use crate::error::ReporterError;
use serde_json::{Map, Number, Value};

/// Flat mapping from field name to JSON value, built up during a session
pub type SessionResult = Map<String, Value>;

/// Largest integer a JS number represents exactly (2^53 - 1)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Shallow merge: keys in `patch` overwrite keys of the same name in `target`
pub fn merge(target: &mut SessionResult, patch: SessionResult) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Convert a number to the JSON value a browser would serialize.
///
/// Integral values become JSON integers (`200`, not `200.0`), non-finite
/// values become `null` like `JSON.stringify` does.
pub fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Value::from(value as i64);
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Final, immutable result of a session ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    url: String,
    result: SessionResult,
}

impl Payload {
    pub fn new(url: impl Into<String>, result: SessionResult) -> Self {
        Self {
            url: url.into(),
            result,
        }
    }

    /// Destination the payload is addressed to
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn result(&self) -> &SessionResult {
        &self.result
    }

    /// Serialize as a flat JSON object
    pub fn to_json(&self) -> Result<String, ReporterError> {
        Ok(serde_json::to_string(&self.result)?)
    }
}
