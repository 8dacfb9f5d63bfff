//! Field type resolution.
//!
//! Order: field-scoped `fieldType` override, declared type, inference from
//! `options`, global `defaultFieldType`, then single-line. Anything the
//! renderer doesn't recognize falls through to the next step, so externally
//! authored template data can never produce an unrenderable kind.

use ob_forms_types::{FieldValue, FormField};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::template::ConfigResolver;

/// Field-scoped configuration key overriding the declared type.
pub const FIELD_TYPE_KEY: &str = "fieldType";
/// Global configuration key giving the fallback type.
pub const DEFAULT_FIELD_TYPE_KEY: &str = "defaultFieldType";

/// The closed set of input behaviors a renderer must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    SingleLine,
    MultiLine,
    Dropdown,
    Checkbox,
}

impl FieldKind {
    /// Map a declared or configured type name. `None` for unknown names.
    pub fn from_declared(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "TEXT" | "STRING" | "EMAIL" | "PHONE" | "URL" | "DATE" | "NUMBER" | "SINGLE_LINE" => {
                Some(Self::SingleLine)
            }
            "TEXTAREA" | "MULTILINE" | "MULTI_LINE" | "LONG_TEXT" => Some(Self::MultiLine),
            "SELECT" | "DROPDOWN" | "RADIO" => Some(Self::Dropdown),
            "BOOLEAN" | "CHECKBOX" => Some(Self::Checkbox),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleLine => "single-line",
            Self::MultiLine => "multi-line",
            Self::Dropdown => "dropdown",
            Self::Checkbox => "checkbox",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve the kind of one field under a template's configuration.
pub fn resolve_kind(field: &FormField, config: &ConfigResolver) -> FieldKind {
    let configured = |value: Option<&serde_json::Value>| {
        value
            .and_then(serde_json::Value::as_str)
            .and_then(FieldKind::from_declared)
    };

    configured(config.field_override(&field.key, FIELD_TYPE_KEY))
        .or_else(|| FieldKind::from_declared(&field.field_type))
        .or_else(|| field.has_options().then_some(FieldKind::Dropdown))
        .or_else(|| configured(config.global_value(DEFAULT_FIELD_TYPE_KEY)))
        .unwrap_or(FieldKind::SingleLine)
}

fn is_numeric_type(declared: &str) -> bool {
    matches!(
        declared.trim().to_ascii_uppercase().as_str(),
        "NUMBER" | "NUMERIC" | "INTEGER" | "DECIMAL"
    )
}

/// Value a field takes after clearing: `false` for checkboxes, `null` for
/// numeric fields, empty string otherwise.
pub fn empty_value(field: &FormField, kind: FieldKind) -> FieldValue {
    if kind == FieldKind::Checkbox {
        FieldValue::Bool(false)
    } else if is_numeric_type(&field.field_type) {
        FieldValue::Null
    } else {
        FieldValue::text("")
    }
}
