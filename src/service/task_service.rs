//! Generic Form Service parameterized by a [`TaskConvention`].

use async_trait::async_trait;
use ob_forms_types::{
    FieldValue, FormData, FormField, FormSection, TaskId, TaskType, TemplateId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::convention::{build_form, Ky3pConvention, KybConvention, OpenBankingConvention, TaskConvention};
use super::{FormService, SaveOptions};
use crate::backend::{FormBackend, ProgressRequest, SaveAck, SubmitAck};
use crate::completion::CompletionReport;
use crate::error::{FormError, Result};
use crate::layout::FormLayout;

pub type KybFormService = TaskFormService<KybConvention>;
pub type Ky3pFormService = TaskFormService<Ky3pConvention>;
pub type OpenBankingFormService = TaskFormService<OpenBankingConvention>;

#[derive(Default)]
struct ServiceState {
    /// Bumped by `clear_cache`; an initialize that started under an older
    /// epoch must not commit.
    epoch: u64,
    init_outcome: Option<Result<()>>,
    layout: Option<FormLayout>,
    /// Field key to storage key, only where they differ
    storage_keys: HashMap<String, String>,
    answers: FormData,
    last_save: Option<SaveAck>,
}

/// Form Service for one task instance of the convention's task type.
pub struct TaskFormService<C: TaskConvention> {
    convention: C,
    backend: Arc<dyn FormBackend>,
    task_id: Option<TaskId>,
    /// Single-flight gate for `initialize`
    init_gate: Mutex<()>,
    state: RwLock<ServiceState>,
}

impl<C: TaskConvention + Default> TaskFormService<C> {
    pub fn new(backend: Arc<dyn FormBackend>, task_id: Option<TaskId>) -> Self {
        Self::with_convention(C::default(), backend, task_id)
    }
}

impl<C: TaskConvention> TaskFormService<C> {
    pub fn with_convention(
        convention: C,
        backend: Arc<dyn FormBackend>,
        task_id: Option<TaskId>,
    ) -> Self {
        Self {
            convention,
            backend,
            task_id,
            init_gate: Mutex::new(()),
            state: RwLock::new(ServiceState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_name(&self) -> &'static str {
        self.convention.task_type().storage_name()
    }

    /// Most recent save acknowledgement received.
    pub fn last_save(&self) -> Option<SaveAck> {
        self.read().last_save.clone()
    }

    fn request(&self, options: &SaveOptions) -> ProgressRequest {
        let state = self.read();
        let answers = state
            .answers
            .iter()
            .map(|(key, value)| {
                let storage = state.storage_keys.get(key).unwrap_or(key);
                (storage.clone(), value.clone())
            })
            .collect();
        ProgressRequest {
            task_id: options.task_id,
            form_type: options
                .form_type
                .clone()
                .unwrap_or_else(|| self.storage_name().to_string()),
            answers,
            include_metadata: options.include_metadata,
        }
    }

    /// Translate stored keys back to field keys. Keys with no mapping are
    /// kept as stored.
    fn decode(&self, stored: FormData) -> FormData {
        let state = self.read();
        let reverse: HashMap<&str, &str> = state
            .storage_keys
            .iter()
            .map(|(key, storage)| (storage.as_str(), key.as_str()))
            .collect();
        stored
            .into_iter()
            .map(|(k, v)| match reverse.get(k.as_str()) {
                Some(key) => (key.to_string(), v),
                None => (k, v),
            })
            .collect()
    }

    async fn fetch_layout(&self, template_id: TemplateId) -> Result<(FormLayout, HashMap<String, String>)> {
        let task_type = self.convention.task_type();
        let definitions = self
            .backend
            .field_definitions(task_type.storage_name(), template_id)
            .await
            .map_err(|e| FormError::ServiceInitFailed {
                task_type: task_type.to_string(),
                reason: e.to_string(),
            })?;

        let built = build_form(&self.convention, &definitions);
        Ok((
            FormLayout::build(&built.sections, &built.fields),
            built.storage_keys,
        ))
    }
}

#[async_trait]
impl<C: TaskConvention> FormService for TaskFormService<C> {
    fn task_type(&self) -> TaskType {
        self.convention.task_type()
    }

    fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    async fn initialize(&self, template_id: TemplateId) -> Result<()> {
        let _gate = self.init_gate.lock().await;
        let epoch = {
            let state = self.read();
            if let Some(outcome) = &state.init_outcome {
                debug!(task_type = %self.task_type(), "Initialize skipped, outcome cached");
                return outcome.clone();
            }
            state.epoch
        };

        let fetched = self.fetch_layout(template_id).await;

        let mut state = self.write();
        if state.epoch != epoch {
            debug!(task_type = %self.task_type(), "Cache cleared during initialize, result dropped");
            return Err(FormError::NotInitialized);
        }
        let outcome = match fetched {
            Ok((layout, storage_keys)) => {
                info!(
                    task_type = %self.task_type(),
                    %template_id,
                    sections = layout.sections.len(),
                    fields = layout.fields().count(),
                    "Form service initialized"
                );
                state.layout = Some(layout);
                state.storage_keys = storage_keys;
                Ok(())
            }
            Err(e) => Err(e),
        };
        state.init_outcome = Some(outcome.clone());
        outcome
    }

    fn fields(&self) -> Result<Vec<FormField>> {
        let state = self.read();
        let layout = state.layout.as_ref().ok_or(FormError::NotInitialized)?;
        Ok(layout
            .fields()
            .map(|f| FormField {
                value: state.answers.get(&f.key).cloned(),
                ..f.clone()
            })
            .collect())
    }

    fn sections(&self) -> Result<Vec<FormSection>> {
        self.layout().map(|l| l.sections)
    }

    fn layout(&self) -> Result<FormLayout> {
        self.read().layout.clone().ok_or(FormError::NotInitialized)
    }

    async fn load_progress(&self, task_id: TaskId) -> Result<FormData> {
        if self.read().layout.is_none() {
            return Err(FormError::NotInitialized);
        }
        let stored = self
            .backend
            .saved_progress(task_id)
            .await
            .map_err(|e| FormError::ProgressLoadFailed {
                task_id,
                reason: e.to_string(),
            })?;

        let answers = self.decode(stored);
        if !answers.is_empty() {
            self.write().answers = answers.clone();
        }
        debug!(%task_id, count = answers.len(), "Saved progress loaded");
        Ok(answers)
    }

    fn load_form_data(&self, initial: FormData) {
        let mut state = self.write();
        state.answers.extend(initial);
    }

    fn update_form_data(&self, key: &str, value: FieldValue) {
        self.write().answers.insert(key.to_string(), value);
    }

    fn form_data(&self) -> FormData {
        self.read().answers.clone()
    }

    fn clear_form_data(&self) {
        self.write().answers.clear();
    }

    async fn save(&self, options: &SaveOptions) -> Result<SaveAck> {
        let request = self.request(options);
        match self.backend.save_progress(&request).await {
            Ok(ack) => {
                self.write().last_save = Some(ack.clone());
                Ok(ack)
            }
            Err(e) => Err(FormError::SaveFailed {
                task_id: options.task_id,
                reason: e.to_string(),
            }),
        }
    }

    async fn submit(&self, options: &SaveOptions) -> Result<SubmitAck> {
        let report = {
            let state = self.read();
            let layout = state.layout.as_ref().ok_or(FormError::NotInitialized)?;
            CompletionReport::for_layout(layout, &state.answers, false)
        };
        if !report.is_complete() {
            warn!(
                task_id = %options.task_id,
                progress = report.overall_progress,
                missing = report.missing_required.len(),
                "Submission blocked, required fields unanswered"
            );
            return Err(FormError::SubmitIncomplete {
                progress: report.overall_progress,
                missing_fields: report.missing_required,
            });
        }

        let request = self.request(options);
        let ack = self
            .backend
            .submit(&request)
            .await
            .map_err(|e| FormError::from_submit(e, report.overall_progress))?;
        info!(task_id = %options.task_id, file_id = ?ack.file_id, "Form submitted");
        Ok(ack)
    }

    fn clear_cache(&self) {
        let mut state = self.write();
        let epoch = state.epoch + 1;
        *state = ServiceState {
            epoch,
            ..ServiceState::default()
        };
    }
}
