//! Initialization Coordinator
//!
//! Sequences template fetch, service resolution, service initialization, and
//! saved-progress load for one task-type selection:
//!
//! ```text
//! Idle → FetchingTemplate → ResolvingService → InitializingService → LoadingProgress → Ready
//!                 └──────────────┴───────────────────┴──────────→ Error
//! ```
//!
//! Each call to [`InitializationCoordinator::initialize`] takes a fresh
//! generation. Every phase commit checks that its generation is still the
//! current one; results from a superseded generation are dropped without
//! being reported as errors.

use ob_forms_types::{FormData, TaskId, TaskType, Template};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backend::FormBackend;
use crate::config::FormEngineConfig;
use crate::error::{FormError, Result};
use crate::service::{FormService, FormServiceRegistry, ServiceContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitPhase {
    Idle,
    FetchingTemplate,
    ResolvingService,
    InitializingService,
    LoadingProgress,
    Ready,
    /// Terminal; carries the user-facing message
    Error { message: String },
}

impl InitPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingTemplate => "fetching_template",
            Self::ResolvingService => "resolving_service",
            Self::InitializingService => "initializing_service",
            Self::LoadingProgress => "loading_progress",
            Self::Ready => "ready",
            Self::Error { .. } => "error",
        }
    }
}

/// Snapshot published to subscribers on every committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitState {
    pub generation: u64,
    /// Task type name as supplied by the caller
    pub task_type: Option<String>,
    pub phase: InitPhase,
}

#[derive(Debug, Clone, Default)]
pub struct InitRequest {
    /// UI or storage name of the task type
    pub task_type: String,
    pub task_id: Option<TaskId>,
    /// Caller-supplied defaults used when nothing is saved
    pub initial_data: Option<FormData>,
}

impl InitRequest {
    pub fn new(task_type: impl Into<String>, task_id: Option<TaskId>) -> Self {
        Self {
            task_type: task_type.into(),
            task_id,
            initial_data: None,
        }
    }

    pub fn with_initial_data(mut self, data: FormData) -> Self {
        self.initial_data = Some(data);
        self
    }
}

/// Where the hydrated answer set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    Saved,
    Initial,
    Empty,
}

/// A fully initialized task instance.
#[derive(Clone)]
pub struct FormSession {
    pub generation: u64,
    pub task_type: TaskType,
    pub task_id: Option<TaskId>,
    pub template: Template,
    pub service: Arc<dyn FormService>,
    pub progress_source: ProgressSource,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("generation", &self.generation)
            .field("task_type", &self.task_type)
            .field("task_id", &self.task_id)
            .field("template", &self.template.id)
            .field("progress_source", &self.progress_source)
            .finish()
    }
}

#[derive(Debug)]
pub enum InitOutcome {
    Ready(FormSession),
    /// A newer selection took over; this result was discarded.
    Superseded { generation: u64 },
}

impl InitOutcome {
    pub fn into_session(self) -> Option<FormSession> {
        match self {
            Self::Ready(session) => Some(session),
            Self::Superseded { .. } => None,
        }
    }
}

pub struct InitializationCoordinator {
    backend: Arc<dyn FormBackend>,
    registry: Arc<FormServiceRegistry>,
    config: FormEngineConfig,
    generation: AtomicU64,
    state: watch::Sender<InitState>,
}

impl InitializationCoordinator {
    pub fn new(
        backend: Arc<dyn FormBackend>,
        registry: Arc<FormServiceRegistry>,
        config: FormEngineConfig,
    ) -> Self {
        let (state, _) = watch::channel(InitState {
            generation: 0,
            task_type: None,
            phase: InitPhase::Idle,
        });
        Self {
            backend,
            registry,
            config,
            generation: AtomicU64::new(0),
            state,
        }
    }

    pub fn state(&self) -> InitState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InitState> {
        self.state.subscribe()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, token: u64) -> bool {
        self.current_generation() == token
    }

    /// Invalidate whatever is in flight and go back to `Idle`.
    ///
    /// This is the hook for a task-type change that doesn't immediately start
    /// a new selection. [`initialize`](Self::initialize) supersedes the
    /// previous generation on its own and publishes `FetchingTemplate` directly.
    pub fn reset(&self) {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(InitState {
            generation: token,
            task_type: None,
            phase: InitPhase::Idle,
        });
    }

    /// Commit `phase` if `token` is still current.
    fn advance(&self, token: u64, phase: InitPhase) -> bool {
        let committed = self.state.send_if_modified(|state| {
            if state.generation != token || !self.is_current(token) {
                return false;
            }
            state.phase = phase.clone();
            true
        });
        if committed {
            info!(generation = token, phase = phase.as_str(), "Form initialization phase");
        }
        committed
    }

    fn superseded(&self, token: u64) -> Result<InitOutcome> {
        debug!(generation = token, "Discarding superseded initialization result");
        Ok(InitOutcome::Superseded { generation: token })
    }

    /// Terminal failure for `token`, unless it's already stale.
    fn fail(&self, token: u64, err: FormError) -> Result<InitOutcome> {
        if !self.advance(
            token,
            InitPhase::Error {
                message: err.user_message(),
            },
        ) {
            return self.superseded(token);
        }
        error!(generation = token, error = %err, "Form initialization failed");
        Err(err)
    }

    /// Run one selection to `Ready`.
    ///
    /// Starting takes a new generation, which supersedes everything still in
    /// flight. The first published state for that generation is
    /// `FetchingTemplate`; an earlier generation's `Error` or `Ready` is never
    /// visible after it.
    pub async fn initialize(&self, request: InitRequest) -> Result<InitOutcome> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(InitState {
            generation: token,
            task_type: Some(request.task_type.clone()),
            phase: InitPhase::FetchingTemplate,
        });
        info!(generation = token, task_type = %request.task_type, "Form initialization started");

        // ── Template ──
        let storage_name = TaskType::canonical_name(&request.task_type)
            .unwrap_or(request.task_type.as_str())
            .to_string();
        let fetched = self.fetch_template(token, &storage_name).await;
        if !self.is_current(token) {
            return self.superseded(token);
        }
        let template = match fetched {
            Ok(template) => template,
            Err(e) => return self.fail(token, e),
        };

        // ── Service ──
        if !self.advance(token, InitPhase::ResolvingService) {
            return self.superseded(token);
        }
        let ctx = ServiceContext {
            backend: self.backend.clone(),
            task_id: request.task_id,
        };
        let (task_type, service) = match self.registry.resolve(&request.task_type, ctx) {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(token, e),
        };

        if service.is_ready() {
            debug!(generation = token, %task_type, "Service already initialized, skipping");
            // A reused instance still holds the previous mount's answers.
            service.clear_form_data();
        } else {
            if !self.advance(token, InitPhase::InitializingService) {
                return self.superseded(token);
            }
            let initialized = self.initialize_service(token, &service, &template).await;
            if !self.is_current(token) {
                return self.superseded(token);
            }
            if let Err(e) = initialized {
                return self.fail(token, e);
            }
        }

        // ── Progress ──
        if !self.advance(token, InitPhase::LoadingProgress) {
            return self.superseded(token);
        }
        let progress_source = self.load_progress(&service, &request).await;
        if !self.advance(token, InitPhase::Ready) {
            return self.superseded(token);
        }

        Ok(InitOutcome::Ready(FormSession {
            generation: token,
            task_type,
            task_id: request.task_id,
            template,
            service,
            progress_source,
        }))
    }

    async fn fetch_template(&self, token: u64, storage_name: &str) -> Result<Template> {
        let max = self.config.max_template_attempts;
        let mut last_reason = String::new();

        for attempt in 1..=max {
            if !self.is_current(token) {
                break;
            }
            match self.backend.template_by_task_type(storage_name).await {
                Ok(template) => return Ok(template),
                Err(e) => {
                    warn!(generation = token, attempt, max, error = %e, "Template fetch failed");
                    last_reason = e.to_string();
                }
            }
            if attempt < max {
                tokio::time::sleep(self.config.retry_backoff()).await;
            }
        }

        Err(FormError::TemplateFetchFailed {
            task_type: storage_name.to_string(),
            reason: last_reason,
        })
    }

    async fn initialize_service(
        &self,
        token: u64,
        service: &Arc<dyn FormService>,
        template: &Template,
    ) -> Result<()> {
        let max = self.config.max_init_attempts;
        let timeout = self.config.init_timeout();
        let task_type = service.task_type().to_string();
        let mut last = FormError::ServiceInitFailed {
            task_type: task_type.clone(),
            reason: "not attempted".to_string(),
        };

        for attempt in 1..=max {
            if !self.is_current(token) {
                break;
            }
            match tokio::time::timeout(timeout, service.initialize(template.id)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => last = e,
                Err(_) => {
                    last = FormError::ServiceInitTimedOut {
                        task_type: task_type.clone(),
                        timeout_ms: self.config.init_timeout_ms,
                    }
                }
            }
            warn!(generation = token, attempt, max, error = %last, "Service initialization failed");
            // The service caches its outcome; clear it so the next attempt refetches.
            service.clear_cache();
            if attempt < max {
                tokio::time::sleep(self.config.retry_backoff()).await;
            }
        }
        Err(last)
    }

    /// Saved progress, then caller defaults, then empty. Never fails.
    async fn load_progress(
        &self,
        service: &Arc<dyn FormService>,
        request: &InitRequest,
    ) -> ProgressSource {
        if let Some(task_id) = request.task_id {
            match service.load_progress(task_id).await {
                Ok(saved) if !saved.is_empty() => return ProgressSource::Saved,
                Ok(_) => {}
                Err(e) => {
                    warn!(%task_id, error = %e, "Saved progress unavailable, falling back");
                }
            }
        }

        match &request.initial_data {
            Some(initial) if !initial.is_empty() => {
                service.load_form_data(initial.clone());
                ProgressSource::Initial
            }
            _ => ProgressSource::Empty,
        }
    }
}
