//! Autosave Coordinator
//!
//! Debounces field mutations into single save calls. At most one pending
//! timer exists per task id; a new mutation inside the window aborts it and
//! starts a fresh one. A timer that has already fired detaches itself first,
//! so an in-flight save is never cancelled by a later edit.

use ob_forms_types::TaskId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::SaveAck;
use crate::error::Result;
use crate::service::{FormService, SaveOptions};

/// Counters for saves issued by the coordinator.
#[derive(Debug, Default)]
pub struct AutosaveStats {
    scheduled: AtomicU64,
    rescheduled: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl AutosaveStats {
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    pub fn rescheduled(&self) -> u64 {
        self.rescheduled.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

struct PendingSave {
    seq: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<TaskId, PendingSave>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<TaskId, PendingSave>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AutosaveCoordinator {
    service: Arc<dyn FormService>,
    debounce: Duration,
    form_type: Option<String>,
    include_metadata: bool,
    next_seq: AtomicU64,
    pending: PendingMap,
    stats: Arc<AutosaveStats>,
}

impl AutosaveCoordinator {
    pub fn new(service: Arc<dyn FormService>, debounce: Duration, include_metadata: bool) -> Self {
        Self {
            service,
            debounce,
            form_type: None,
            include_metadata,
            next_seq: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(AutosaveStats::default()),
        }
    }

    /// Override the storage form type sent with saves.
    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        self.form_type = Some(form_type.into());
        self
    }

    pub fn stats(&self) -> Arc<AutosaveStats> {
        self.stats.clone()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    fn options(&self, task_id: TaskId) -> SaveOptions {
        SaveOptions {
            task_id,
            form_type: self.form_type.clone(),
            include_metadata: self.include_metadata,
        }
    }

    pub fn has_pending(&self, task_id: TaskId) -> bool {
        lock(&self.pending).contains_key(&task_id)
    }

    /// Start (or restart) the debounce window for `task_id`.
    ///
    /// The timer runs on the current tokio runtime. Outside a runtime nothing
    /// is scheduled and a warning is logged; use [`save_now`](Self::save_now)
    /// from async code instead.
    pub fn schedule(&self, task_id: TaskId) {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(%task_id, "No tokio runtime; autosave not scheduled");
                return;
            }
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let service = self.service.clone();
        let pending = self.pending.clone();
        let stats = self.stats.clone();
        let options = self.options(task_id);
        let debounce = self.debounce;

        // Held across spawn + insert so the timer can't look itself up
        // before it is registered.
        let mut map = lock(&self.pending);
        if let Some(previous) = map.remove(&task_id) {
            previous.handle.abort();
            stats.rescheduled.fetch_add(1, Ordering::Relaxed);
            debug!(%task_id, "Autosave rescheduled");
        }
        stats.scheduled.fetch_add(1, Ordering::Relaxed);

        let handle = runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            {
                let mut map = lock(&pending);
                match map.get(&task_id) {
                    Some(entry) if entry.seq == seq => {
                        map.remove(&task_id);
                    }
                    _ => return,
                }
            }
            let _ = run_save(service.as_ref(), &options, &stats).await;
        });
        map.insert(task_id, PendingSave { seq, handle });
    }

    /// Drop the pending timer for `task_id`. Returns whether one existed.
    pub fn cancel_pending(&self, task_id: TaskId) -> bool {
        match lock(&self.pending).remove(&task_id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel any pending timer and save immediately.
    pub async fn save_now(&self, task_id: TaskId) -> Result<SaveAck> {
        self.cancel_pending(task_id);
        run_save(self.service.as_ref(), &self.options(task_id), &self.stats).await
    }

    /// Save now only if a debounced save is still waiting.
    pub async fn flush(&self, task_id: TaskId) -> Option<Result<SaveAck>> {
        if !self.cancel_pending(task_id) {
            return None;
        }
        Some(run_save(self.service.as_ref(), &self.options(task_id), &self.stats).await)
    }
}

impl Drop for AutosaveCoordinator {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.pending).drain() {
            entry.handle.abort();
        }
    }
}

async fn run_save(
    service: &dyn FormService,
    options: &SaveOptions,
    stats: &AutosaveStats,
) -> Result<SaveAck> {
    match service.save(options).await {
        Ok(ack) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            info!(task_id = %options.task_id, fields = ack.field_count, "Progress saved");
            Ok(ack)
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(task_id = %options.task_id, error = %e, "Progress save failed; local answers kept");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::service::KybFormService;

    #[test]
    fn test_schedule_outside_runtime_is_a_no_op() {
        let service: Arc<dyn FormService> =
            Arc::new(KybFormService::new(Arc::new(InMemoryBackend::new()), Some(TaskId(1))));
        let autosave = AutosaveCoordinator::new(service, Duration::from_millis(10), true);

        autosave.schedule(TaskId(1));

        assert!(!autosave.has_pending(TaskId(1)));
        assert_eq!(autosave.stats().scheduled(), 0);
    }
}
