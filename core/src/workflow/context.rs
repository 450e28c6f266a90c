use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, StoreBackendKind};
use crate::error::StoreError;
use crate::executor::{ExecutionOpts, ExecutorBuilder, ParallelExecutor};
use crate::flags::FlagInjector;
use crate::ratelimit::MultiProviderRateLimiter;
use crate::store::{FileBackend, MemoryBackend, StateBackend, TaskStore};

use super::bootstrap::initialize_standard_workflow;

/// Everything one workflow run shares: configuration, the task store, the
/// flag injector and the provider limiters. Components receive it (or its
/// parts) explicitly; nothing lives in a global.
#[derive(Clone)]
pub struct WorkflowContext {
    cfg: AppConfig,
    store: Arc<TaskStore>,
    injector: Arc<FlagInjector>,
    limiter: Arc<MultiProviderRateLimiter>,
}

impl WorkflowContext {
    /// Open the workflow on `backend`, restoring any state stored there.
    pub fn new(cfg: AppConfig, backend: Arc<dyn StateBackend>) -> Result<Self, StoreError> {
        let store = Arc::new(TaskStore::open(cfg.workflow_id.clone(), backend)?);
        let injector = Arc::new(
            FlagInjector::new(store.clone())
                .serialize_same_item_fixes(cfg.flags.serialize_same_item_fixes),
        );
        let limiter = Arc::new(MultiProviderRateLimiter::from_config(&cfg.rate_limits));

        info!(
            target: "folio.workflow",
            workflow_id = %cfg.workflow_id,
            backend = store.backend_name(),
            tasks = store.len(),
            "workflow context ready"
        );
        Ok(Self {
            cfg,
            store,
            injector,
            limiter,
        })
    }

    /// Open with the backend named in the `[store]` table.
    pub fn from_config(cfg: AppConfig) -> Result<Self, StoreError> {
        let backend: Arc<dyn StateBackend> = match (cfg.store.backend, &cfg.store.path) {
            (StoreBackendKind::File, Some(path)) => Arc::new(FileBackend::open(path)?),
            _ => Arc::new(MemoryBackend::new()),
        };
        Self::new(cfg, backend)
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn workflow_id(&self) -> &str {
        self.store.workflow_id()
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn injector(&self) -> &Arc<FlagInjector> {
        &self.injector
    }

    pub fn limiter(&self) -> &Arc<MultiProviderRateLimiter> {
        &self.limiter
    }

    /// Create the standard N-item workflow and bound flag targets to
    /// `1..=items`.
    pub fn bootstrap(&mut self, items: u32) -> Result<usize, StoreError> {
        let created = initialize_standard_workflow(&self.store, items)?;
        self.injector = Arc::new(
            FlagInjector::new(self.store.clone())
                .with_item_count(items)
                .serialize_same_item_fixes(self.cfg.flags.serialize_same_item_fixes),
        );
        Ok(created)
    }

    /// Executor builder wired to this context. Add a renderer or retry
    /// strategy before calling `build()`.
    pub fn executor_builder(&self) -> ExecutorBuilder {
        ParallelExecutor::builder(self.store.clone())
            .injector(self.injector.clone())
            .limiter(self.limiter.clone())
            .guards(self.cfg.guards.clone())
            .opts(ExecutionOpts::from_config(&self.cfg.executor))
    }

    pub fn executor(&self) -> ParallelExecutor {
        self.executor_builder().build()
    }

    /// Drop every task and flag of this workflow.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!(target: "folio.workflow", workflow_id = %self.workflow_id(), "workflow reset");
        Ok(())
    }
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("workflow_id", &self.workflow_id())
            .field("tasks", &self.store.len())
            .field("providers", &self.limiter.providers())
            .finish()
    }
}
