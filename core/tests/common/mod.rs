#![allow(dead_code)]

use std::sync::Arc;

use folio_core::api::{
    task_body_fn, MultiProviderRateLimiter, RateLimitConfig, Task, TaskBody, TaskContext,
    TaskFailure, TaskStore,
};
use serde_json::json;

pub fn store_with(tasks: Vec<Task>) -> Arc<TaskStore> {
    let store = Arc::new(TaskStore::in_memory("wf-it"));
    for task in tasks {
        store.add_task(task).unwrap();
    }
    store
}

/// Limits loose enough to never delay a test.
pub fn fast_limiter() -> Arc<MultiProviderRateLimiter> {
    Arc::new(MultiProviderRateLimiter::new([(
        "default",
        RateLimitConfig::new(10_000, 16),
    )]))
}

pub fn echo_body() -> Arc<dyn TaskBody> {
    task_body_fn(|task: Task, _ctx: TaskContext| async move {
        Ok::<_, TaskFailure>(json!({ "task": task.id }))
    })
}

pub fn complete(store: &TaskStore, id: &str) {
    store.mark_started(id).unwrap();
    store.mark_complete(id, json!("done")).unwrap();
}
