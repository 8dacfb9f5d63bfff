//! FormBackend trait - the sole boundary between the engine and the server.
//!
//! The engine never talks HTTP directly. It goes through this port, which has
//! an in-process implementation for tests and tooling ([`InMemoryBackend`])
//! and a REST implementation ([`HttpBackend`]).

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ob_forms_types::{FieldDefinition, FormData, TaskId, Template, TemplateId};
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Transport-level failures reported by a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{} required field(s) missing", .missing_fields.len())]
    Incomplete { missing_fields: Vec<String> },
}

/// Payload for save-progress and submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub task_id: TaskId,
    /// Storage-facing task type name
    pub form_type: String,
    pub answers: FormData,
    pub include_metadata: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAck {
    pub task_id: TaskId,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub field_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAck {
    pub task_id: TaskId,
    pub submitted_at: DateTime<Utc>,
    /// Generated submission document, if the backend produces one
    #[serde(default)]
    pub file_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAck {
    pub task_id: TaskId,
    #[serde(default)]
    pub cleared: usize,
}

/// The endpoints the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Template,
    FieldDefinitions,
    SavedProgress,
    SaveProgress,
    Submit,
    ClearFields,
}

#[async_trait]
pub trait FormBackend: Send + Sync {
    /// Template for a storage-facing task type name.
    async fn template_by_task_type(&self, task_type: &str) -> BackendResult<Template>;

    /// Raw field definitions behind a template.
    async fn field_definitions(
        &self,
        task_type: &str,
        template_id: TemplateId,
    ) -> BackendResult<Vec<FieldDefinition>>;

    /// Previously saved answers, keyed by storage key. Empty if none.
    async fn saved_progress(&self, task_id: TaskId) -> BackendResult<FormData>;

    async fn save_progress(&self, request: &ProgressRequest) -> BackendResult<SaveAck>;

    /// Finalize the task. Fails with [`BackendError::Incomplete`] when the
    /// server's own required-field check rejects the payload.
    async fn submit(&self, request: &ProgressRequest) -> BackendResult<SubmitAck>;

    async fn clear_fields(&self, task_id: TaskId, task_type: &str) -> BackendResult<ClearAck>;
}
