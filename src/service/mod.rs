//! Form Service - one stateful instance per task id + task type.
//!
//! Every task type shares the same lifecycle behind [`FormService`]; the
//! differences (grouping, storage key conventions) live in a
//! [`TaskConvention`]. Concrete services are looked up by task-type name in a
//! [`FormServiceRegistry`] passed in by the caller.

pub mod convention;
pub mod registry;
pub mod task_service;

use async_trait::async_trait;
use ob_forms_types::{FieldValue, FormData, FormField, FormSection, TaskId, TaskType, TemplateId};

use crate::backend::{SaveAck, SubmitAck};
use crate::error::Result;
use crate::layout::FormLayout;

pub use convention::{
    build_form, BuiltForm, Ky3pConvention, KybConvention, OpenBankingConvention, TaskConvention,
};
pub use registry::{FormServiceRegistry, ServiceContext, ServiceFactory};
pub use task_service::{Ky3pFormService, KybFormService, OpenBankingFormService, TaskFormService};

/// Options for [`FormService::save`] and [`FormService::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub task_id: TaskId,
    /// Storage form type; the service's own storage name when `None`
    pub form_type: Option<String>,
    pub include_metadata: bool,
}

impl SaveOptions {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            form_type: None,
            include_metadata: true,
        }
    }
}

#[async_trait]
pub trait FormService: Send + Sync {
    fn task_type(&self) -> TaskType;

    fn task_id(&self) -> Option<TaskId>;

    /// Load field and section definitions. Repeated calls without
    /// [`clear_cache`](Self::clear_cache) return the first outcome without
    /// another fetch.
    async fn initialize(&self, template_id: TemplateId) -> Result<()>;

    /// Rendered fields in section order, with current answers filled in.
    /// `NotInitialized` before `initialize` succeeds.
    fn fields(&self) -> Result<Vec<FormField>>;

    /// Sorted sections with their fields. `NotInitialized` before
    /// `initialize` succeeds.
    fn sections(&self) -> Result<Vec<FormSection>>;

    fn layout(&self) -> Result<FormLayout>;

    /// Fetch saved answers and hydrate them. No saved progress is an empty map.
    async fn load_progress(&self, task_id: TaskId) -> Result<FormData>;

    /// Seed answers without a server round-trip.
    fn load_form_data(&self, initial: FormData);

    /// Local single-field mutation; never touches the network.
    fn update_form_data(&self, key: &str, value: FieldValue);

    fn form_data(&self) -> FormData;

    /// Drop every answer while keeping fields and sections loaded.
    fn clear_form_data(&self);

    /// Persist the full answer set.
    async fn save(&self, options: &SaveOptions) -> Result<SaveAck>;

    /// Finalize the task. `SubmitIncomplete` if required fields are unanswered.
    async fn submit(&self, options: &SaveOptions) -> Result<SubmitAck>;

    /// Drop fields, sections, and answers so the next `initialize` starts clean.
    fn clear_cache(&self);

    /// True when fields and sections are both loaded and non-empty.
    fn is_ready(&self) -> bool {
        matches!(
            (self.fields(), self.sections()),
            (Ok(fields), Ok(sections)) if !fields.is_empty() && !sections.is_empty()
        )
    }
}
