//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ob_forms::backend::InMemoryBackend;
use ob_forms::types::{
    Configuration, FieldDefinition, FieldValue, FormData, TaskId, Template, TemplateId,
    TemplateStatus,
};
use ob_forms::{FormBackend, FormEngineConfig, FormServiceRegistry, InitializationCoordinator};
use serde_json::json;

pub const TASK: TaskId = TaskId(42);

pub fn template(id: i64, task_type: &str) -> Template {
    Template {
        id: TemplateId(id),
        name: format!("{} template", task_type),
        description: None,
        task_type: task_type.to_string(),
        status: TemplateStatus::Active,
        configurations: vec![
            Configuration::global("tooltipPosition", json!("right")),
            Configuration::field("b", "tooltipPosition", json!("left")),
        ],
    }
}

/// Info(a, b required) and Risk(c required, boolean).
pub fn info_risk_definitions() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new(1, "a", "A", "TEXT", "Info").required(),
        FieldDefinition::new(2, "b", "B", "TEXT", "Info").required(),
        FieldDefinition::new(3, "c", "C", "BOOLEAN", "Risk").required(),
    ]
}

/// Five required non-boolean fields across two KYB groups.
pub fn kyb_definitions() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new(10, "legalName", "Legal name", "TEXT", "Company Profile").required(),
        FieldDefinition::new(11, "registrationNumber", "Registration number", "TEXT", "Company Profile")
            .required(),
        FieldDefinition::new(12, "website", "Website", "URL", "Company Profile").required(),
        FieldDefinition::new(13, "annualRevenue", "Annual revenue", "NUMBER", "Financial Profile")
            .required(),
        FieldDefinition::new(14, "employeeCount", "Employee count", "NUMBER", "Financial Profile")
            .required(),
    ]
}

pub fn answers(pairs: &[(&str, FieldValue)]) -> FormData {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

pub fn kyb_answers() -> FormData {
    answers(&[
        ("legalName", "Acme Ltd".into()),
        ("registrationNumber", "0123456".into()),
        ("website", "https://acme.example".into()),
        ("annualRevenue", FieldValue::number(1_000_000)),
        ("employeeCount", FieldValue::number(40)),
    ])
}

pub fn backend_with(task_type: &str, definitions: Vec<FieldDefinition>) -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.insert_template(template(1, task_type), definitions);
    backend
}

pub fn coordinator(backend: Arc<InMemoryBackend>, config: FormEngineConfig) -> InitializationCoordinator {
    let backend: Arc<dyn FormBackend> = backend;
    InitializationCoordinator::new(
        backend,
        Arc::new(FormServiceRegistry::with_defaults()),
        config,
    )
}
