//! Form templates and scoped configuration.

use serde::{Deserialize, Serialize};

use crate::task::TemplateId;

/// Publication state of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    Draft,
    Active,
    Archived,
    /// Any status the engine doesn't know yet
    #[serde(other)]
    Unknown,
}

/// Static description of a form, fetched once per task-type selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Storage-facing task type name (e.g. "company_kyb")
    pub task_type: String,
    pub status: TemplateStatus,
    #[serde(default)]
    pub configurations: Vec<Configuration>,
}

/// Granularity at which a configuration entry applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    #[serde(alias = "GLOBAL")]
    Global,
    #[serde(alias = "SECTION")]
    Section,
    #[serde(alias = "FIELD")]
    Field,
}

/// One configuration entry. `scope_target` names a section id or field key
/// for scoped entries and is `None` for global ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub scope: ConfigScope,
    #[serde(default)]
    pub scope_target: Option<String>,
    pub key: String,
    pub value: serde_json::Value,
}

impl Configuration {
    pub fn global(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            scope: ConfigScope::Global,
            scope_target: None,
            key: key.into(),
            value,
        }
    }

    pub fn section(
        section_id: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            scope: ConfigScope::Section,
            scope_target: Some(section_id.into()),
            key: key.into(),
            value,
        }
    }

    pub fn field(
        field_key: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            scope: ConfigScope::Field,
            scope_target: Some(field_key.into()),
            key: key.into(),
            value,
        }
    }

    /// True if this entry targets the given scope and target.
    pub fn targets(&self, scope: ConfigScope, target: &str) -> bool {
        self.scope == scope && self.scope_target.as_deref() == Some(target)
    }
}
