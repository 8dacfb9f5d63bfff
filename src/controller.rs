//! Form Controller
//!
//! Binds a ready [`FormSession`] to everything a UI layer needs: resolved
//! field kinds, merged configuration, completion state, active section, and
//! autosave. Every recomputation is reported through the progress callback.

use ob_forms_types::{FieldValue, FormData, FormField, FormSection, TaskId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::autosave::{AutosaveCoordinator, AutosaveStats};
use crate::backend::{ClearAck, FormBackend, SaveAck, SubmitAck};
use crate::completion::{CompletionReport, SectionNavigator};
use crate::config::FormEngineConfig;
use crate::coordinator::FormSession;
use crate::demo::demo_answers;
use crate::error::{FormError, Result};
use crate::layout::FormLayout;
use crate::resolver::{empty_value, resolve_kind, FieldKind};
use crate::service::SaveOptions;
use crate::template::{ConfigResolver, MergedConfig};

pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

pub struct FormController {
    session: FormSession,
    backend: Arc<dyn FormBackend>,
    include_metadata: bool,
    config: ConfigResolver,
    layout: FormLayout,
    kinds: HashMap<String, FieldKind>,
    navigator: SectionNavigator,
    report: CompletionReport,
    required_only: bool,
    autosave: AutosaveCoordinator,
    on_progress: Option<ProgressCallback>,
    /// Checkboxes reset by `clear_fields` and not touched since. They render
    /// `false` but don't count as answered.
    cleared_checkboxes: HashSet<String>,
}

impl FormController {
    pub fn new(
        session: FormSession,
        backend: Arc<dyn FormBackend>,
        engine: &FormEngineConfig,
    ) -> Result<Self> {
        let layout = session.service.layout()?;
        let config = ConfigResolver::from_template(&session.template);
        let kinds = layout
            .fields()
            .chain(layout.orphans.iter())
            .map(|f| (f.key.clone(), resolve_kind(f, &config)))
            .collect();
        let report = CompletionReport::for_layout(&layout, &session.service.form_data(), false);
        let autosave = AutosaveCoordinator::new(
            session.service.clone(),
            engine.debounce(),
            engine.include_metadata,
        );

        Ok(Self {
            navigator: SectionNavigator::new(layout.sections.len(), true),
            session,
            backend,
            include_metadata: engine.include_metadata,
            config,
            layout,
            kinds,
            report,
            required_only: false,
            autosave,
            on_progress: None,
            cleared_checkboxes: HashSet::new(),
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Count only required answers when deciding whether a section has started.
    pub fn with_required_only(mut self, required_only: bool) -> Self {
        self.required_only = required_only;
        self
    }

    /// Drop the synthetic review section from navigation.
    pub fn without_review_section(mut self) -> Self {
        self.navigator = SectionNavigator::new(self.layout.sections.len(), false);
        self
    }

    /// First-load hook: recompute, then run the one-shot auto-navigation.
    /// Returns the active section index.
    pub fn start(&mut self, review_requested: bool) -> usize {
        self.recompute();
        if let Some(index) = self.navigator.auto_navigate(&self.report, review_requested) {
            debug!(index, review_requested, "Auto-navigated to initial section");
        }
        self.navigator.active()
    }

    pub fn session(&self) -> &FormSession {
        &self.session
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.session.task_id
    }

    pub fn autosave_stats(&self) -> Arc<AutosaveStats> {
        self.autosave.stats()
    }

    // ── Rendering state ──

    pub fn sections(&self) -> &[FormSection] {
        &self.layout.sections
    }

    /// Content sections followed by the review section, when enabled.
    pub fn navigation_sections(&self) -> Vec<FormSection> {
        if self.navigator.section_count() > self.layout.sections.len() {
            self.layout.with_review_section()
        } else {
            self.layout.sections.clone()
        }
    }

    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.layout.field(key)
    }

    pub fn kind(&self, key: &str) -> FieldKind {
        self.kinds.get(key).copied().unwrap_or(FieldKind::SingleLine)
    }

    pub fn field_config(&self, key: &str) -> Option<MergedConfig> {
        self.layout.field(key).map(|f| self.config.for_field(f))
    }

    pub fn section_config(&self, section_id: &str) -> MergedConfig {
        self.config.for_section(section_id)
    }

    pub fn report(&self) -> &CompletionReport {
        &self.report
    }

    pub fn progress(&self) -> u8 {
        self.report.overall_progress
    }

    pub fn form_data(&self) -> FormData {
        self.session.service.form_data()
    }

    // ── Navigation ──

    pub fn active_section(&self) -> usize {
        self.navigator.active()
    }

    pub fn set_active_section(&mut self, index: usize) -> bool {
        self.navigator.set_active(index)
    }

    pub fn next_section(&mut self) -> bool {
        self.navigator.next()
    }

    pub fn previous_section(&mut self) -> bool {
        self.navigator.previous()
    }

    // ── Mutation ──

    /// Recompute completion and report progress.
    pub fn recompute(&mut self) -> &CompletionReport {
        self.report = CompletionReport::for_layout(
            &self.layout,
            &self.tracked_answers(),
            self.required_only,
        );
        if let Some(callback) = &self.on_progress {
            callback(self.report.overall_progress);
        }
        &self.report
    }

    /// Local edit followed by a debounced save.
    ///
    /// The debounce timer needs a running tokio runtime; outside one the edit
    /// is applied locally and no save is scheduled.
    pub fn update_field(&mut self, key: &str, value: FieldValue) {
        self.cleared_checkboxes.remove(key);
        self.session.service.update_form_data(key, value);
        self.recompute();
        if let Some(task_id) = self.session.task_id {
            self.autosave.schedule(task_id);
        }
    }

    /// Save the latest answers, then submit. The save always happens first
    /// so the submitted payload matches local state.
    pub async fn submit(&mut self) -> Result<SubmitAck> {
        let task_id = self.session.task_id.ok_or(FormError::MissingTaskId)?;
        self.autosave.save_now(task_id).await?;
        self.recompute();
        if !self.report.is_complete() {
            return Err(FormError::SubmitIncomplete {
                progress: self.report.overall_progress,
                missing_fields: self.report.missing_required.clone(),
            });
        }
        self.session.service.submit(&self.save_options(task_id)).await
    }

    /// Clear on the server, then mirror the clear locally with type-appropriate
    /// empties and return to the first section.
    pub async fn clear_fields(&mut self) -> Result<ClearAck> {
        let task_id = self.session.task_id.ok_or(FormError::MissingTaskId)?;
        self.autosave.cancel_pending(task_id);

        let ack = self
            .backend
            .clear_fields(task_id, self.session.task_type.storage_name())
            .await
            .map_err(|e| FormError::ClearFailed(e.to_string()))?;

        let empties: Vec<(String, FieldValue)> = self
            .layout
            .fields()
            .chain(self.layout.orphans.iter())
            .map(|f| (f.key.clone(), empty_value(f, self.kind(&f.key))))
            .collect();
        self.cleared_checkboxes.clear();
        for (key, value) in empties {
            if self.kind(&key) == FieldKind::Checkbox {
                self.cleared_checkboxes.insert(key.clone());
            }
            self.session.service.update_form_data(&key, value);
        }

        self.recompute();
        self.navigator.reset();
        info!(%task_id, cleared = ack.cleared, "Form fields cleared");
        Ok(ack)
    }

    /// Answer every field with demo data and save immediately.
    pub async fn fill_demo(&mut self) -> Result<SaveAck> {
        let task_id = self.session.task_id.ok_or(FormError::MissingTaskId)?;
        let answers = demo_answers(self.layout.fields(), |f| self.kind(&f.key));
        self.session.service.load_form_data(answers);
        self.cleared_checkboxes.clear();
        self.recompute();
        self.autosave.save_now(task_id).await
    }

    /// Answers as the completion tracker sees them.
    fn tracked_answers(&self) -> FormData {
        let mut answers = self.session.service.form_data();
        for key in &self.cleared_checkboxes {
            answers.remove(key);
        }
        answers
    }

    fn save_options(&self, task_id: TaskId) -> SaveOptions {
        SaveOptions {
            task_id,
            form_type: None,
            include_metadata: self.include_metadata,
        }
    }
}
