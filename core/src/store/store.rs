use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::flags::Flag;
use crate::task::{StatusTransition, Task, TaskStatus};

use super::{MemoryBackend, StateBackend, WorkflowStats};

/// Task graph store for one workflow instance.
///
/// All keys are namespaced under `workflow:{id}:`, with `%` and `:` in the
/// id percent-encoded so one workflow's prefix never covers another's. Writes for different task
/// ids never conflict, so concurrently running tasks only contend on the
/// in-memory lock for the duration of a single update.
pub struct TaskStore {
    workflow_id: String,
    namespace: String,
    backend: Arc<dyn StateBackend>,
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    tasks: HashMap<String, Task>,
    /// Insertion order of task ids, for stable wave listings.
    order: Vec<String>,
    flags: HashMap<String, Flag>,
    flag_order: Vec<String>,
    completed_count: usize,
}

impl TaskStore {
    /// Open the workflow `workflow_id`, loading whatever the backend already holds.
    pub fn open(
        workflow_id: impl Into<String>,
        backend: Arc<dyn StateBackend>,
    ) -> Result<Self, StoreError> {
        let workflow_id = workflow_id.into();
        let store = Self {
            namespace: namespace(&workflow_id),
            workflow_id,
            backend,
            inner: RwLock::new(StoreInner::default()),
        };
        store.load()?;
        Ok(store)
    }

    /// Store backed by a fresh [`MemoryBackend`].
    pub fn in_memory(workflow_id: impl Into<String>) -> Self {
        let workflow_id = workflow_id.into();
        Self {
            namespace: namespace(&workflow_id),
            workflow_id,
            backend: Arc::new(MemoryBackend::new()),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Insert or overwrite a task by id and persist it.
    pub fn add_task(&self, task: Task) -> Result<(), StoreError> {
        let mut inner = self.write();
        let is_new = !inner.tasks.contains_key(&task.id);

        self.put_json(&self.task_key(&task.id), &task)?;
        if is_new {
            inner.order.push(task.id.clone());
            self.put_json(&self.key("task_order"), &inner.order)?;
        }

        debug!(target: "folio.store", task_id = %task.id, deps = ?task.dependencies, new = is_new, "task stored");
        inner.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Remove a task by id. Returns `false` if it was not stored.
    pub fn remove_task(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.write();
        if !inner.tasks.contains_key(id) {
            return Ok(false);
        }
        self.backend.delete(&self.task_key(id))?;
        inner.tasks.remove(id);
        inner.order.retain(|t| t != id);
        self.put_json(&self.key("task_order"), &inner.order)?;

        debug!(target: "folio.store", task_id = %id, "task removed");
        Ok(true)
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.read().tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every task in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    pub fn tasks_for_item(&self, item: u32) -> Vec<Task> {
        self.tasks().into_iter().filter(|t| t.item == item).collect()
    }

    /// Non-terminal tasks whose dependencies all completed.
    pub fn ready_tasks(&self) -> Vec<Task> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|task| !task.is_terminal() && task.status != TaskStatus::InProgress)
            .filter(|task| {
                task.dependencies.iter().all(|dep| {
                    inner
                        .tasks
                        .get(dep)
                        .is_some_and(|d| d.status == TaskStatus::Complete)
                })
            })
            .cloned()
            .collect()
    }

    /// Move a task to `in_progress`. Restarting a failed task drops the
    /// error and completion time of the failed attempt.
    pub fn mark_started(&self, id: &str) -> Result<(), StoreError> {
        self.transition(id, TaskStatus::InProgress, |task| {
            task.started_at = Some(Utc::now());
            task.completed_at = None;
            task.metadata.remove("error");
        })
        .map(|_| ())
    }

    /// Record success. Returns `false` when the task was already complete, in
    /// which case neither the task nor the completed counter changes.
    pub fn mark_complete(&self, id: &str, result: serde_json::Value) -> Result<bool, StoreError> {
        let changed = self.transition(id, TaskStatus::Complete, |task| {
            task.completed_at = Some(Utc::now());
            task.result = Some(result);
        })?;

        if changed {
            let mut inner = self.write();
            inner.completed_count += 1;
            self.put_json(&self.key("completed_count"), &inner.completed_count)?;
        }
        Ok(changed)
    }

    /// Record failure with its message under the `error` metadata key.
    /// Returns `false` when the task had already failed.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<bool, StoreError> {
        self.transition(id, TaskStatus::Failed, |task| {
            task.completed_at = Some(Utc::now());
            task.metadata
                .insert("error".to_string(), serde_json::Value::String(error.to_string()));
        })
    }

    /// Move a task between its waiting states (`pending`, `blocked`, `ready`).
    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<bool, StoreError> {
        self.transition(id, status, |_| {})
    }

    pub fn completed_count(&self) -> usize {
        self.read().completed_count
    }

    pub fn stats(&self) -> WorkflowStats {
        let inner = self.read();
        WorkflowStats::from_tasks(inner.tasks.values())
    }

    /// Insert or replace a flag record.
    pub fn put_flag(&self, flag: &Flag) -> Result<(), StoreError> {
        let mut inner = self.write();
        self.put_json(&self.flag_key(&flag.id), flag)?;
        if !inner.flags.contains_key(&flag.id) {
            inner.flag_order.push(flag.id.clone());
            self.put_json(&self.key("flag_order"), &inner.flag_order)?;
        }
        inner.flags.insert(flag.id.clone(), flag.clone());
        Ok(())
    }

    pub fn flag(&self, id: &str) -> Option<Flag> {
        self.read().flags.get(id).cloned()
    }

    /// Every flag ever raised, oldest first.
    pub fn flags(&self) -> Vec<Flag> {
        let inner = self.read();
        inner
            .flag_order
            .iter()
            .filter_map(|id| inner.flags.get(id).cloned())
            .collect()
    }

    pub fn open_flag_count(&self) -> usize {
        self.read().flags.values().filter(|f| f.is_open()).count()
    }

    /// Drop every task, flag and counter of this workflow.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.write();
        let removed = self.backend.delete_prefix(&self.key(""))?;
        *inner = StoreInner::default();
        debug!(target: "folio.store", workflow_id = %self.workflow_id, removed, "workflow cleared");
        Ok(())
    }

    /// Apply `update` and move the task to `to`. A task already in `to` is
    /// left untouched and `Ok(false)` is returned.
    fn transition<F>(&self, id: &str, to: TaskStatus, update: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let mut inner = self.write();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;

        if task.status == to {
            return Ok(false);
        }

        let from = task.status;
        StatusTransition::validate(from, to).map_err(|_| StoreError::InvalidTransition {
            task_id: id.to_string(),
            from,
            to,
        })?;

        let mut updated = task.clone();
        updated.status = to;
        update(&mut updated);
        self.put_json(&self.task_key(id), &updated)?;
        *task = updated;

        debug!(target: "folio.store", task_id = %id, %from, %to, "status changed");
        Ok(true)
    }

    fn load(&self) -> Result<(), StoreError> {
        let mut inner = self.write();

        for key in self.backend.keys_with_prefix(&self.key("task:"))? {
            if let Some(task) = self.get_json::<Task>(&key)? {
                inner.tasks.insert(task.id.clone(), task);
            }
        }
        for key in self.backend.keys_with_prefix(&self.key("flag:"))? {
            if let Some(flag) = self.get_json::<Flag>(&key)? {
                inner.flags.insert(flag.id.clone(), flag);
            }
        }

        let mut order: Vec<String> = self
            .get_json(&self.key("task_order"))?
            .unwrap_or_default();
        order.retain(|id| inner.tasks.contains_key(id));
        let mut missing: Vec<&Task> = inner
            .tasks
            .values()
            .filter(|t| !order.contains(&t.id))
            .collect();
        if !missing.is_empty() {
            warn!(target: "folio.store", count = missing.len(), "tasks missing from stored order; appending by creation time");
            missing.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            let extra: Vec<String> = missing.iter().map(|t| t.id.clone()).collect();
            order.extend(extra);
        }
        inner.order = order;

        let mut flag_order: Vec<String> = self
            .get_json(&self.key("flag_order"))?
            .unwrap_or_default();
        flag_order.retain(|id| inner.flags.contains_key(id));
        for id in inner.flags.keys() {
            if !flag_order.contains(id) {
                flag_order.push(id.clone());
            }
        }
        inner.flag_order = flag_order;

        inner.completed_count = self
            .get_json(&self.key("completed_count"))?
            .unwrap_or(0);

        if !inner.tasks.is_empty() {
            debug!(
                target: "folio.store",
                workflow_id = %self.workflow_id,
                tasks = inner.tasks.len(),
                flags = inner.flags.len(),
                completed = inner.completed_count,
                "resumed workflow state"
            );
        }
        Ok(())
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.namespace, suffix)
    }

    fn task_key(&self, id: &str) -> String {
        self.key(&format!("task:{id}"))
    }

    fn flag_key(&self, id: &str) -> String {
        self.key(&format!("flag:{id}"))
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let body = serde_json::to_string(value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, body)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Serde {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("workflow_id", &self.workflow_id)
            .field("backend", &self.backend.name())
            .field("tasks", &self.len())
            .finish()
    }
}

fn namespace(workflow_id: &str) -> String {
    let escaped = workflow_id.replace('%', "%25").replace(':', "%3A");
    format!("workflow:{escaped}:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn store_with(tasks: Vec<Task>) -> TaskStore {
        let store = TaskStore::in_memory("test");
        for task in tasks {
            store.add_task(task).unwrap();
        }
        store
    }

    #[test]
    fn test_add_task_overwrites_by_id() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        store
            .add_task(
                Task::new(TaskKind::Analyze, 1).with_metadata("note", serde_json::json!("v2")),
            )
            .unwrap();

        assert_eq!(store.len(), 1);
        let task = store.get_task("analyze_1").unwrap();
        assert_eq!(task.metadata["note"], serde_json::json!("v2"));
    }

    #[test]
    fn test_mark_complete_twice_counts_once() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        store.mark_started("analyze_1").unwrap();

        assert!(store
            .mark_complete("analyze_1", serde_json::json!({"words": 1200}))
            .unwrap());
        assert!(!store
            .mark_complete("analyze_1", serde_json::json!({"words": 9999}))
            .unwrap());

        assert_eq!(store.completed_count(), 1);
        let task = store.get_task("analyze_1").unwrap();
        assert_eq!(task.result, Some(serde_json::json!({"words": 1200})));
    }

    #[test]
    fn test_complete_requires_start() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        let err = store
            .mark_complete("analyze_1", serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.completed_count(), 0);
    }

    #[test]
    fn test_mark_failed_records_error() {
        let store = store_with(vec![Task::new(TaskKind::Expand, 2)]);
        store.mark_started("expand_2").unwrap();
        store.mark_failed("expand_2", "provider timeout").unwrap();

        let task = store.get_task("expand_2").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.last_error(), Some("provider timeout"));
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_failed_task_restarts_and_completes() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        store.mark_started("analyze_1").unwrap();
        store.mark_failed("analyze_1", "rate limited").unwrap();

        store.mark_started("analyze_1").unwrap();
        let task = store.get_task("analyze_1").unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.last_error(), None);
        assert!(task.completed_at.is_none());

        assert!(store
            .mark_complete("analyze_1", serde_json::Value::Null)
            .unwrap());
        assert_eq!(store.completed_count(), 1);
    }

    #[test]
    fn test_failed_task_cannot_return_to_pending() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        store.mark_failed("analyze_1", "boom").unwrap();
        assert!(matches!(
            store.set_status("analyze_1", TaskStatus::Pending),
            Err(StoreError::InvalidTransition {
                from: TaskStatus::Failed,
                to: TaskStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_task_is_reported() {
        let store = TaskStore::in_memory("test");
        assert!(matches!(
            store.mark_started("nope_1"),
            Err(StoreError::TaskNotFound(id)) if id == "nope_1"
        ));
    }

    #[test]
    fn test_tasks_for_item_and_ready() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1),
            Task::new(TaskKind::Expand, 1).depends_on("analyze_1"),
            Task::new(TaskKind::Analyze, 2),
        ]);

        let item1: Vec<String> = store.tasks_for_item(1).into_iter().map(|t| t.id).collect();
        assert_eq!(item1, vec!["analyze_1", "expand_1"]);

        let ready: Vec<String> = store.ready_tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ready, vec!["analyze_1", "analyze_2"]);

        store.mark_started("analyze_1").unwrap();
        store.mark_complete("analyze_1", serde_json::Value::Null).unwrap();
        let ready: Vec<String> = store.ready_tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ready, vec!["expand_1", "analyze_2"]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        store.mark_started("analyze_1").unwrap();
        store.mark_complete("analyze_1", serde_json::Value::Null).unwrap();

        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.completed_count(), 0);
        assert!(store.get_task("analyze_1").is_none());
    }

    #[test]
    fn test_clear_leaves_workflow_with_colon_in_id() {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryBackend::new());
        let parent = TaskStore::open("a", backend.clone()).unwrap();
        let child = TaskStore::open("a:b", backend.clone()).unwrap();
        parent.add_task(Task::new(TaskKind::Analyze, 1)).unwrap();
        child.add_task(Task::new(TaskKind::Analyze, 2)).unwrap();

        parent.clear().unwrap();

        let reopened = TaskStore::open("a:b", backend.clone()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.contains("analyze_2"));
        assert!(TaskStore::open("a", backend).unwrap().is_empty());
    }

    #[test]
    fn test_remove_task_drops_it_from_backend_and_order() {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryBackend::new());
        let store = TaskStore::open("novel", backend.clone()).unwrap();
        store.add_task(Task::new(TaskKind::Analyze, 1)).unwrap();
        store.add_task(Task::new(TaskKind::Analyze, 2)).unwrap();

        assert!(store.remove_task("analyze_1").unwrap());
        assert!(!store.remove_task("analyze_1").unwrap());

        let reopened = TaskStore::open("novel", backend).unwrap();
        let ids: Vec<String> = reopened.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["analyze_2"]);
    }

    #[test]
    fn test_stats_breakdown() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1),
            Task::new(TaskKind::Analyze, 2),
            Task::new(TaskKind::Analyze, 3),
            Task::new(TaskKind::Analyze, 4),
        ]);
        store.mark_started("analyze_1").unwrap();
        store.mark_complete("analyze_1", serde_json::Value::Null).unwrap();
        store.mark_failed("analyze_2", "boom").unwrap();
        store.set_status("analyze_3", TaskStatus::Blocked).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.count(TaskStatus::Blocked), 1);
        assert_eq!(stats.count(TaskStatus::Pending), 1);
        assert!((stats.progress_pct - 25.0).abs() < f64::EPSILON);
        assert!(!stats.is_finished());
    }
}
