//! Claim value tree for verifiable credentials.
//!
//! Claims form a recursive sum over null, booleans, numbers, strings,
//! arrays and objects. Object keys are unordered (a sorted map keeps the
//! encoding canonical); array order is significant and preserved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A claim map as carried by a credential: field name to claim value.
pub type ClaimMap = BTreeMap<String, ClaimValue>;

/// A single claim value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClaimValue {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Ordered array of claim values
    Array(Vec<ClaimValue>),
    /// Nested object; key order is irrelevant
    Object(ClaimMap),
}

impl ClaimValue {
    /// The string contents, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ClaimValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric contents, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ClaimValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean contents, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClaimValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert from an arbitrary JSON value.
    ///
    /// Numbers that exceed f64 precision are truncated the way JSON
    /// interop already truncates them.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ClaimValue::Null,
            serde_json::Value::Bool(b) => ClaimValue::Bool(*b),
            serde_json::Value::Number(n) => ClaimValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => ClaimValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                ClaimValue::Array(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => ClaimValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ClaimValue::Null => serde_json::Value::Null,
            ClaimValue::Bool(b) => serde_json::Value::Bool(*b),
            ClaimValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ClaimValue::Text(s) => serde_json::Value::String(s.clone()),
            ClaimValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            ClaimValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Bool(value)
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        ClaimValue::Number(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Number(value as f64)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Text(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::Text(value)
    }
}

impl<T: Into<ClaimValue>> From<Vec<T>> for ClaimValue {
    fn from(values: Vec<T>) -> Self {
        ClaimValue::Array(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({
            "emailAddress": "alice@example.com",
            "verified": true,
            "score": 42.0,
            "tags": ["a", "b"],
            "nested": { "inner": null }
        });

        let claim = ClaimValue::from_json(&json);
        assert_eq!(claim.to_json(), json);
    }

    #[test]
    fn object_key_order_is_irrelevant() {
        let a = ClaimValue::from_json(&serde_json::json!({"x": 1.0, "y": 2.0}));
        let b = ClaimValue::from_json(&serde_json::json!({"y": 2.0, "x": 1.0}));
        assert_eq!(a, b);
    }

    #[test]
    fn array_order_is_significant() {
        let a: ClaimValue = vec!["x", "y"].into();
        let b: ClaimValue = vec!["y", "x"].into();
        assert_ne!(a, b);
    }
}
