//! OB-FORMS - template-driven questionnaire engine
//!
//! Drives KYB, KY3P, and Open Banking questionnaires through one lifecycle:
//!
//! ```text
//! Template ──► FormService ──► FieldKind resolution ──► UI
//!                  │        └─► CompletionReport  ──► UI (on_progress)
//!                  │
//!   InitializationCoordinator (template → service → init → progress)
//!   AutosaveCoordinator       (debounced saves keyed by task id)
//! ```
//!
//! All I/O goes through the [`backend::FormBackend`] port.

pub mod autosave;
pub mod backend;
pub mod completion;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod demo;
pub mod error;
pub mod layout;
pub mod resolver;
pub mod service;
pub mod template;

pub use ob_forms_types as types;

pub use autosave::{AutosaveCoordinator, AutosaveStats};
pub use backend::{FormBackend, HttpBackend, InMemoryBackend};
pub use completion::{compute_completion, CompletionReport, SectionNavigator, SectionStatus};
pub use config::FormEngineConfig;
pub use controller::{FormController, ProgressCallback};
pub use coordinator::{
    FormSession, InitOutcome, InitPhase, InitRequest, InitState, InitializationCoordinator,
    ProgressSource,
};
pub use error::{FormError, Result};
pub use layout::FormLayout;
pub use resolver::{resolve_kind, FieldKind};
pub use service::{FormService, FormServiceRegistry, SaveOptions};
pub use template::ConfigResolver;
