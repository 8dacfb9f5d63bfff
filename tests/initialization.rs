//! Initialization Coordinator: phase sequencing, retries, and stale results.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ob_forms::backend::Endpoint;
use ob_forms::service::KybFormService;
use ob_forms::types::{FieldValue, TaskType, TemplateId};
use ob_forms::{
    FormBackend, FormEngineConfig, FormError, FormService, FormServiceRegistry, InitOutcome,
    InitPhase, InitRequest, InitializationCoordinator, ProgressSource,
};

#[tokio::test]
async fn test_initialize_reaches_ready_with_saved_progress() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.insert_progress(TASK, answers(&[("a", "x".into())]));
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());

    let session = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert_eq!(session.task_type, TaskType::Kyb);
    assert_eq!(session.template.id, TemplateId(1));
    assert_eq!(session.progress_source, ProgressSource::Saved);
    assert_eq!(session.service.form_data().get("a"), Some(&FieldValue::text("x")));
    assert!(session.service.is_ready());

    let state = coordinator.state();
    assert_eq!(state.phase, InitPhase::Ready);
    assert_eq!(state.generation, session.generation);
    assert_eq!(state.task_type.as_deref(), Some("kyb"));
}

#[tokio::test]
async fn test_storage_names_are_accepted() {
    let backend = backend_with("sp_ky3p_assessment", info_risk_definitions());
    let coordinator = coordinator(backend, FormEngineConfig::default());

    let outcome = coordinator
        .initialize(InitRequest::new("sp_ky3p_assessment", None))
        .await
        .unwrap();
    let session = outcome.into_session().unwrap();
    assert_eq!(session.task_type, TaskType::Ky3p);
    assert_eq!(session.progress_source, ProgressSource::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_stale_result_never_overwrites_newer_selection() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.insert_template(template(2, "sp_ky3p_assessment"), info_risk_definitions());
    backend.set_latency(Endpoint::Template, Some("company_kyb"), Duration::from_millis(500));
    backend.set_latency(
        Endpoint::Template,
        Some("sp_ky3p_assessment"),
        Duration::from_millis(10),
    );
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());
    let mut states = coordinator.subscribe();

    let (first, second) = tokio::join!(
        coordinator.initialize(InitRequest::new("kyb", Some(TASK))),
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            coordinator.initialize(InitRequest::new("ky3p", Some(TASK))).await
        },
    );

    assert!(matches!(first.unwrap(), InitOutcome::Superseded { generation: 1 }));
    let session = second.unwrap().into_session().unwrap();
    assert_eq!(session.task_type, TaskType::Ky3p);
    assert_eq!(session.generation, 2);

    let state = states.borrow_and_update().clone();
    assert_eq!(state.generation, 2);
    assert_eq!(state.phase, InitPhase::Ready);
    assert_eq!(state.task_type.as_deref(), Some("ky3p"));
    // only the live selection initialized a service
    assert_eq!(backend.calls(Endpoint::FieldDefinitions), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_in_flight_initialization() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.set_latency(Endpoint::Template, None, Duration::from_millis(300));
    let coordinator = coordinator(backend, FormEngineConfig::default());

    let (outcome, _) = tokio::join!(
        coordinator.initialize(InitRequest::new("kyb", Some(TASK))),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            coordinator.reset();
        }
    );

    assert!(matches!(outcome.unwrap(), InitOutcome::Superseded { .. }));
    assert_eq!(coordinator.state().phase, InitPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_template_fetch_retries_are_bounded() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.fail_next(Endpoint::Template, 10);
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());

    let err = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap_err();

    assert!(matches!(err, FormError::TemplateFetchFailed { .. }));
    assert_eq!(backend.calls(Endpoint::Template), 3);
    assert_eq!(
        coordinator.state().phase,
        InitPhase::Error {
            message: err.user_message()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_template_failure_recovers() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.fail_next(Endpoint::Template, 2);
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());

    let outcome = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap();

    assert!(matches!(outcome, InitOutcome::Ready(_)));
    assert_eq!(backend.calls(Endpoint::Template), 3);
}

#[tokio::test(start_paused = true)]
async fn test_hung_service_initialization_times_out() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.set_latency(Endpoint::FieldDefinitions, None, Duration::from_secs(60));
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());

    let err = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FormError::ServiceInitTimedOut {
            timeout_ms: 10_000,
            ..
        }
    ));
    assert_eq!(backend.calls(Endpoint::FieldDefinitions), 3);
    assert!(matches!(coordinator.state().phase, InitPhase::Error { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_service_initialization_retries_after_failure() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.fail_next(Endpoint::FieldDefinitions, 1);
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());

    let session = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert!(session.service.is_ready());
    assert_eq!(backend.calls(Endpoint::FieldDefinitions), 2);
}

#[tokio::test]
async fn test_unregistered_task_type_is_fatal() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.insert_template(template(3, "sp_ky3p_assessment"), info_risk_definitions());

    let mut registry = FormServiceRegistry::new();
    registry.register(TaskType::Kyb, |ctx| {
        Arc::new(KybFormService::new(ctx.backend, ctx.task_id))
    });
    let dyn_backend: Arc<dyn FormBackend> = backend.clone();
    let coordinator =
        InitializationCoordinator::new(dyn_backend, Arc::new(registry), FormEngineConfig::default());

    let err = coordinator
        .initialize(InitRequest::new("ky3p", Some(TASK)))
        .await
        .unwrap_err();

    assert_eq!(err, FormError::NoServiceRegistered("ky3p".to_string()));
    assert!(err.is_fatal());
    assert!(matches!(coordinator.state().phase, InitPhase::Error { .. }));
    assert_eq!(backend.calls(Endpoint::FieldDefinitions), 0);
}

#[tokio::test]
async fn test_ready_service_skips_initialization() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    let shared = Arc::new(KybFormService::new(backend.clone(), Some(TASK)));
    shared.initialize(TemplateId(1)).await.unwrap();

    let mut registry = FormServiceRegistry::new();
    registry.register_instance(TaskType::Kyb, shared.clone());
    let dyn_backend: Arc<dyn FormBackend> = backend.clone();
    let coordinator =
        InitializationCoordinator::new(dyn_backend, Arc::new(registry), FormEngineConfig::default());

    let outcome = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap();

    assert!(matches!(outcome, InitOutcome::Ready(_)));
    assert_eq!(backend.calls(Endpoint::FieldDefinitions), 1);
}

#[tokio::test]
async fn test_progress_failure_falls_back_to_initial_data() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.fail_next(Endpoint::SavedProgress, 1);
    let coordinator = coordinator(backend, FormEngineConfig::default());
    let initial = answers(&[("a", "seed".into())]);

    let session = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)).with_initial_data(initial.clone()))
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert_eq!(session.progress_source, ProgressSource::Initial);
    assert_eq!(session.service.form_data(), initial);
    assert_eq!(coordinator.state().phase, InitPhase::Ready);
}

#[tokio::test]
async fn test_progress_failure_without_defaults_starts_empty() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.fail_next(Endpoint::SavedProgress, 1);
    let coordinator = coordinator(backend, FormEngineConfig::default());

    let session = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert_eq!(session.progress_source, ProgressSource::Empty);
    assert!(session.service.form_data().is_empty());
}

#[tokio::test]
async fn test_reused_service_starts_from_fresh_answers() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    let shared = Arc::new(KybFormService::new(backend.clone(), Some(TASK)));
    shared.initialize(TemplateId(1)).await.unwrap();
    shared.update_form_data("a", "left over".into());
    shared.update_form_data("c", true.into());

    let mut registry = FormServiceRegistry::new();
    registry.register_instance(TaskType::Kyb, shared.clone());
    let dyn_backend: Arc<dyn FormBackend> = backend.clone();
    let coordinator =
        InitializationCoordinator::new(dyn_backend, Arc::new(registry), FormEngineConfig::default());

    let initial = answers(&[("b", "seed".into())]);
    let session = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)).with_initial_data(initial.clone()))
        .await
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(session.progress_source, ProgressSource::Initial);
    assert_eq!(session.service.form_data(), initial);

    let session = coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(session.progress_source, ProgressSource::Empty);
    assert!(session.service.form_data().is_empty());
}

#[tokio::test]
async fn test_reset_publishes_idle_for_a_new_generation() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    let coordinator = coordinator(backend, FormEngineConfig::default());
    coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .unwrap();
    let mut states = coordinator.subscribe();
    states.borrow_and_update();

    coordinator.reset();

    assert!(states.has_changed().unwrap());
    let state = states.borrow_and_update().clone();
    assert_eq!(state.phase, InitPhase::Idle);
    assert_eq!(state.generation, 2);
    assert_eq!(state.task_type, None);
}

#[tokio::test(start_paused = true)]
async fn test_new_selection_replaces_previous_error() {
    let backend = backend_with("company_kyb", info_risk_definitions());
    backend.fail_next(Endpoint::Template, 3);
    let coordinator = coordinator(backend.clone(), FormEngineConfig::default());
    assert!(coordinator
        .initialize(InitRequest::new("kyb", Some(TASK)))
        .await
        .is_err());
    assert!(matches!(coordinator.state().phase, InitPhase::Error { .. }));

    backend.set_latency(Endpoint::Template, None, Duration::from_millis(100));
    let (outcome, seen) = tokio::join!(
        coordinator.initialize(InitRequest::new("kyb", Some(TASK))),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            coordinator.state()
        }
    );

    assert_eq!(seen.generation, 2);
    assert_eq!(seen.phase, InitPhase::FetchingTemplate);
    assert!(matches!(outcome.unwrap(), InitOutcome::Ready(_)));
}
