//! In-process backend.
//!
//! Holds templates, definitions, and saved progress in memory. Counts every
//! call per endpoint and supports injected failures and per-task-type latency
//! so coordinator behavior can be exercised deterministically.

use async_trait::async_trait;
use chrono::Utc;
use ob_forms_types::{FieldDefinition, FormData, TaskId, Template, TemplateId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::{
    BackendError, BackendResult, ClearAck, Endpoint, FormBackend, ProgressRequest, SaveAck,
    SubmitAck,
};

#[derive(Default)]
struct MemoryState {
    templates: HashMap<String, Template>,
    definitions: HashMap<String, Vec<FieldDefinition>>,
    progress: HashMap<TaskId, FormData>,
    submissions: HashMap<TaskId, FormData>,
    saves: Vec<ProgressRequest>,
    calls: HashMap<Endpoint, usize>,
    failures: HashMap<Endpoint, u32>,
    latency: HashMap<(Endpoint, Option<String>), Duration>,
    submit_rejection: Option<Vec<String>>,
    next_file_id: i64,
}

/// Backend that never leaves the process.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a template and its field definitions under the template's
    /// storage task type name.
    pub fn insert_template(&self, template: Template, definitions: Vec<FieldDefinition>) {
        let mut state = self.state();
        state
            .definitions
            .insert(template.task_type.clone(), definitions);
        state.templates.insert(template.task_type.clone(), template);
    }

    pub fn insert_progress(&self, task_id: TaskId, answers: FormData) {
        self.state().progress.insert(task_id, answers);
    }

    pub fn progress(&self, task_id: TaskId) -> Option<FormData> {
        self.state().progress.get(&task_id).cloned()
    }

    pub fn submission(&self, task_id: TaskId) -> Option<FormData> {
        self.state().submissions.get(&task_id).cloned()
    }

    /// Every save-progress request received, in arrival order.
    pub fn saves(&self) -> Vec<ProgressRequest> {
        self.state().saves.clone()
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state().calls.get(&endpoint).copied().unwrap_or(0)
    }

    /// Fail the next `times` calls to `endpoint` with a transport error.
    pub fn fail_next(&self, endpoint: Endpoint, times: u32) {
        self.state().failures.insert(endpoint, times);
    }

    /// Delay calls to `endpoint`. With `task_type` set, only calls for that
    /// storage name are delayed.
    pub fn set_latency(&self, endpoint: Endpoint, task_type: Option<&str>, delay: Duration) {
        self.state()
            .latency
            .insert((endpoint, task_type.map(str::to_string)), delay);
    }

    /// Make submit answer with `Incomplete` listing these keys.
    pub fn reject_submit(&self, missing_fields: Vec<String>) {
        self.state().submit_rejection = Some(missing_fields);
    }

    /// Count the call, then apply latency and any injected failure.
    async fn enter(&self, endpoint: Endpoint, task_type: Option<&str>) -> BackendResult<()> {
        let delay = {
            let mut state = self.state();
            *state.calls.entry(endpoint).or_insert(0) += 1;
            let scoped = task_type.and_then(|t| {
                state
                    .latency
                    .get(&(endpoint, Some(t.to_string())))
                    .copied()
            });
            scoped.or_else(|| state.latency.get(&(endpoint, None)).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(remaining) = state.failures.get_mut(&endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(?endpoint, "Injected backend failure");
                return Err(BackendError::Transport(format!(
                    "injected failure on {:?}",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FormBackend for InMemoryBackend {
    async fn template_by_task_type(&self, task_type: &str) -> BackendResult<Template> {
        self.enter(Endpoint::Template, Some(task_type)).await?;
        self.state()
            .templates
            .get(task_type)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("template for {}", task_type)))
    }

    async fn field_definitions(
        &self,
        task_type: &str,
        template_id: TemplateId,
    ) -> BackendResult<Vec<FieldDefinition>> {
        self.enter(Endpoint::FieldDefinitions, Some(task_type))
            .await?;
        let state = self.state();
        match state.templates.get(task_type) {
            Some(tpl) if tpl.id == template_id => {}
            _ => {
                return Err(BackendError::NotFound(format!(
                    "template {} for {}",
                    template_id, task_type
                )))
            }
        }
        Ok(state.definitions.get(task_type).cloned().unwrap_or_default())
    }

    async fn saved_progress(&self, task_id: TaskId) -> BackendResult<FormData> {
        self.enter(Endpoint::SavedProgress, None).await?;
        Ok(self
            .state()
            .progress
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_progress(&self, request: &ProgressRequest) -> BackendResult<SaveAck> {
        self.enter(Endpoint::SaveProgress, Some(&request.form_type))
            .await?;
        let mut state = self.state();
        state.saves.push(request.clone());
        state
            .progress
            .insert(request.task_id, request.answers.clone());
        Ok(SaveAck {
            task_id: request.task_id,
            saved_at: Utc::now(),
            field_count: request.answers.len(),
        })
    }

    async fn submit(&self, request: &ProgressRequest) -> BackendResult<SubmitAck> {
        self.enter(Endpoint::Submit, Some(&request.form_type))
            .await?;
        let mut state = self.state();
        if let Some(missing_fields) = state.submit_rejection.clone() {
            return Err(BackendError::Incomplete { missing_fields });
        }
        state.next_file_id += 1;
        let file_id = state.next_file_id;
        state
            .submissions
            .insert(request.task_id, request.answers.clone());
        Ok(SubmitAck {
            task_id: request.task_id,
            submitted_at: Utc::now(),
            file_id: Some(file_id),
        })
    }

    async fn clear_fields(&self, task_id: TaskId, task_type: &str) -> BackendResult<ClearAck> {
        self.enter(Endpoint::ClearFields, Some(task_type)).await?;
        let cleared = self
            .state()
            .progress
            .remove(&task_id)
            .map(|answers| answers.len())
            .unwrap_or(0);
        Ok(ClearAck { task_id, cleared })
    }
}
