//! Answer values and answer sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping from field key to answer. Missing keys are unanswered.
pub type FormData = BTreeMap<String, FieldValue>;

/// A single answer as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn number(n: i64) -> Self {
        Self::Number(n.into())
    }

    /// Non-empty check used by completion tracking.
    ///
    /// Booleans are always answered (`false` is a valid answer); text must be
    /// non-blank after trimming; `Null` is never answered.
    pub fn is_answered(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(_) => true,
            Self::Number(_) => true,
            Self::Text(s) => !s.trim().is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// True if `data` holds an answered value for `key`.
pub fn is_answered(data: &FormData, key: &str) -> bool {
    data.get(key).is_some_and(FieldValue::is_answered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answered_rules() {
        assert!(FieldValue::Bool(false).is_answered());
        assert!(FieldValue::number(0).is_answered());
        assert!(FieldValue::text("x").is_answered());
        assert!(!FieldValue::text("   ").is_answered());
        assert!(!FieldValue::Null.is_answered());
    }

    #[test]
    fn test_untagged_json_shapes() {
        let data: FormData = serde_json::from_value(json!({
            "a": "x", "b": null, "c": true, "d": 12
        }))
        .unwrap();

        assert_eq!(data["a"], FieldValue::text("x"));
        assert_eq!(data["b"], FieldValue::Null);
        assert_eq!(data["c"], FieldValue::Bool(true));
        assert_eq!(data["d"], FieldValue::number(12));
        assert!(!is_answered(&data, "b"));
        assert!(!is_answered(&data, "missing"));
    }
}
