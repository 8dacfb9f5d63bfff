//! Typed error model for the form engine.
//!
//! Initialization failures are fatal once their retry bound is exceeded.
//! Progress-load and save failures degrade gracefully. Submission failures
//! are always surfaced to the caller with the specific reason.

use ob_forms_types::TaskId;

use crate::backend::BackendError;

pub type Result<T> = std::result::Result<T, FormError>;

/// Every failure mode the engine reports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("template fetch failed for {task_type}: {reason}")]
    TemplateFetchFailed { task_type: String, reason: String },

    #[error("no form service registered for task type '{0}'")]
    NoServiceRegistered(String),

    #[error("form service initialization failed for {task_type}: {reason}")]
    ServiceInitFailed { task_type: String, reason: String },

    #[error("form service initialization for {task_type} timed out after {timeout_ms}ms")]
    ServiceInitTimedOut { task_type: String, timeout_ms: u64 },

    #[error("form service is not initialized")]
    NotInitialized,

    #[error("progress load failed for task {task_id}: {reason}")]
    ProgressLoadFailed { task_id: TaskId, reason: String },

    #[error("save failed for task {task_id}: {reason}")]
    SaveFailed { task_id: TaskId, reason: String },

    #[error("form is incomplete ({progress}%): {} required field(s) unanswered", .missing_fields.len())]
    SubmitIncomplete {
        progress: u8,
        missing_fields: Vec<String>,
    },

    #[error("submission failed: {0}")]
    SubmitFailed(String),

    #[error("clearing fields failed: {0}")]
    ClearFailed(String),

    #[error("operation requires a task id")]
    MissingTaskId,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FormError {
    /// Initialization errors that end in the terminal `Error` state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TemplateFetchFailed { .. }
                | Self::NoServiceRegistered(_)
                | Self::ServiceInitFailed { .. }
                | Self::ServiceInitTimedOut { .. }
        )
    }

    /// Text shown to the end user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::TemplateFetchFailed { .. } => {
                "We couldn't load this form. Please reload the page to try again.".to_string()
            }
            Self::NoServiceRegistered(name) => {
                format!("Forms of type '{}' are not supported.", name)
            }
            Self::ServiceInitFailed { .. } | Self::ServiceInitTimedOut { .. } => {
                "The form failed to initialize. Please reload the page to try again.".to_string()
            }
            Self::SubmitIncomplete {
                missing_fields,
                progress,
            } => format!(
                "Please complete all required fields before submitting ({}% complete, {} remaining).",
                progress,
                missing_fields.len()
            ),
            Self::SubmitFailed(reason) => format!("Submission failed: {}", reason),
            other => other.to_string(),
        }
    }

    pub(crate) fn from_submit(err: BackendError, progress: u8) -> Self {
        match err {
            BackendError::Incomplete { missing_fields } => Self::SubmitIncomplete {
                progress,
                missing_fields,
            },
            other => Self::SubmitFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(FormError::NoServiceRegistered("x".into()).is_fatal());
        assert!(FormError::ServiceInitTimedOut {
            task_type: "kyb".into(),
            timeout_ms: 10
        }
        .is_fatal());
        assert!(!FormError::SaveFailed {
            task_id: TaskId(1),
            reason: "down".into()
        }
        .is_fatal());
        assert!(!FormError::NotInitialized.is_fatal());
    }

    #[test]
    fn test_backend_incomplete_maps_to_submit_incomplete() {
        let err = FormError::from_submit(
            BackendError::Incomplete {
                missing_fields: vec!["a".into(), "b".into()],
            },
            80,
        );
        assert_eq!(
            err,
            FormError::SubmitIncomplete {
                progress: 80,
                missing_fields: vec!["a".into(), "b".into()],
            }
        );
        assert_eq!(
            err.to_string(),
            "form is incomplete (80%): 2 required field(s) unanswered"
        );
    }
}
