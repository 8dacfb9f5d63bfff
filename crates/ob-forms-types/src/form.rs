//! Sections, fields, and the raw field definitions they are built from.

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// A titled group of questions. Sorted ascending by `order`, stable on ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub order: i32,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

impl FormSection {
    pub fn new(id: impl Into<String>, title: impl Into<String>, order: i32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            order,
            fields: Vec::new(),
        }
    }
}

/// A single question as rendered by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Durable identity used for persistence
    pub key: String,
    pub label: String,
    /// Declared type as authored in the template (e.g. "TEXT", "TEXTAREA")
    #[serde(rename = "type")]
    pub field_type: String,
    /// Id of the owning section
    pub section: String,
    pub order: i32,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub value: Option<FieldValue>,
}

impl FormField {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
        section: impl Into<String>,
        order: i32,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type: field_type.into(),
            section: section.into(),
            order,
            options: None,
            placeholder: None,
            help_text: None,
            required: false,
            value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn has_options(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
    }
}

/// Field definition as served by the backend for one task type.
///
/// Each task type's service turns these into [`FormSection`]s and
/// [`FormField`]s according to its own key and grouping conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Numeric backend id
    pub id: i64,
    pub field_key: String,
    pub display_name: String,
    #[serde(default)]
    pub question: Option<String>,
    pub field_type: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
}

impl FieldDefinition {
    pub fn new(id: i64, field_key: &str, display_name: &str, field_type: &str, group: &str) -> Self {
        Self {
            id,
            field_key: field_key.to_string(),
            display_name: display_name.to_string(),
            question: None,
            field_type: field_type.to_string(),
            group: Some(group.to_string()),
            order: i32::try_from(id).unwrap_or(i32::MAX),
            required: false,
            options: None,
            placeholder: None,
            help_text: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|o| o.to_string()).collect());
        self
    }
}
