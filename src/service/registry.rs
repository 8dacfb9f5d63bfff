//! Task-type to Form Service factory registry.
//!
//! Constructed explicitly and passed to the coordinator, so tests can swap
//! in fakes per task type.

use ob_forms_types::{TaskId, TaskType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::task_service::{Ky3pFormService, KybFormService, OpenBankingFormService};
use super::FormService;
use crate::backend::FormBackend;
use crate::error::{FormError, Result};

/// What a factory gets to build a service instance.
#[derive(Clone)]
pub struct ServiceContext {
    pub backend: Arc<dyn FormBackend>,
    pub task_id: Option<TaskId>,
}

pub type ServiceFactory = Arc<dyn Fn(ServiceContext) -> Arc<dyn FormService> + Send + Sync>;

#[derive(Default, Clone)]
pub struct FormServiceRegistry {
    factories: HashMap<TaskType, ServiceFactory>,
}

impl FormServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in KYB, KY3P, and Open Banking services.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TaskType::Kyb, |ctx| {
            Arc::new(KybFormService::new(ctx.backend, ctx.task_id))
        });
        registry.register(TaskType::Ky3p, |ctx| {
            Arc::new(Ky3pFormService::new(ctx.backend, ctx.task_id))
        });
        registry.register(TaskType::OpenBanking, |ctx| {
            Arc::new(OpenBankingFormService::new(ctx.backend, ctx.task_id))
        });
        registry
    }

    pub fn register<F>(&mut self, task_type: TaskType, factory: F)
    where
        F: Fn(ServiceContext) -> Arc<dyn FormService> + Send + Sync + 'static,
    {
        self.factories.insert(task_type, Arc::new(factory));
    }

    /// Register one shared instance for a task type. Every resolution hands
    /// back the same service, so an already-initialized instance is reused.
    pub fn register_instance(&mut self, task_type: TaskType, service: Arc<dyn FormService>) {
        self.register(task_type, move |_| service.clone());
    }

    pub fn is_registered(&self, task_type: TaskType) -> bool {
        self.factories.contains_key(&task_type)
    }

    /// Task type for `name`: the name as given first, then its canonical
    /// storage mapping.
    pub fn resolve_type(&self, name: &str) -> Result<TaskType> {
        if let Some(task_type) = TaskType::from_storage_name(name).filter(|t| self.is_registered(*t)) {
            return Ok(task_type);
        }
        let mapped = TaskType::from_ui_name(name)
            .map(|t| t.storage_name())
            .and_then(TaskType::from_storage_name)
            .filter(|t| self.is_registered(*t));
        match mapped {
            Some(task_type) => {
                debug!(name, canonical = task_type.storage_name(), "Task type resolved via mapping");
                Ok(task_type)
            }
            None => Err(FormError::NoServiceRegistered(name.to_string())),
        }
    }

    pub fn resolve(&self, name: &str, ctx: ServiceContext) -> Result<(TaskType, Arc<dyn FormService>)> {
        let task_type = self.resolve_type(name)?;
        let factory = self
            .factories
            .get(&task_type)
            .ok_or_else(|| FormError::NoServiceRegistered(name.to_string()))?;
        Ok((task_type, factory(ctx)))
    }
}
