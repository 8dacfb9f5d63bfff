//! Shared Form Types for OB-FORMS
//!
//! Pure data model for the template-driven questionnaire engine. Every type
//! that crosses the backend boundary (templates, field definitions, saved
//! answers) lives here so the engine crate and any UI layer agree on shape.
//!
//! ## Rules
//!
//! 1. No async and no I/O in this crate
//! 2. `FormField::key` is the durable identity of a question
//! 3. Missing answer keys mean "unanswered", never an explicit empty value

pub mod form;
pub mod task;
pub mod template;
pub mod value;

pub use form::{FieldDefinition, FormField, FormSection};
pub use task::{ParseTaskTypeError, TaskId, TaskType, TemplateId};
pub use template::{ConfigScope, Configuration, Template, TemplateStatus};
pub use value::{is_answered, FieldValue, FormData};
