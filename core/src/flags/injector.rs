use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::FlagError;
use crate::store::TaskStore;
use crate::task::{Task, TaskKind};

use super::{Flag, FlagStatus, Issue};

/// Turns cross-item flags into fix tasks in the live store.
///
/// Each accepted flag produces exactly one `fix_{item}_{seq}` task that
/// depends on `analyze_{discovered_in}`. The next wave resolution picks it
/// up without any extra bookkeeping.
pub struct FlagInjector {
    store: Arc<TaskStore>,
    item_count: Option<u32>,
    serialize_same_item_fixes: bool,
    /// Serialises sequence allocation between concurrently finishing tasks.
    lock: Mutex<()>,
}

impl FlagInjector {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            item_count: None,
            serialize_same_item_fixes: false,
            lock: Mutex::new(()),
        }
    }

    /// Reject flags naming items outside `1..=count`.
    pub fn with_item_count(mut self, count: u32) -> Self {
        self.item_count = Some(count);
        self
    }

    /// Chain every new fix task for an item after the previous one.
    pub fn serialize_same_item_fixes(mut self, enabled: bool) -> Self {
        self.serialize_same_item_fixes = enabled;
        self
    }

    pub fn item_count(&self) -> Option<u32> {
        self.item_count
    }

    /// Record a flag and inject its fix task. Nothing is written when
    /// validation fails.
    pub fn add_flag(
        &self,
        discovered_in: u32,
        affects_item: u32,
        issue: Issue,
    ) -> Result<Flag, FlagError> {
        if discovered_in == affects_item {
            return Err(FlagError::SelfReference {
                item: discovered_in,
            });
        }
        self.check_range(discovered_in)?;
        self.check_range(affects_item)?;

        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let seq = self.store.flags().len() + 1;
        let flag_id = format!("flag_{discovered_in}_to_{affects_item}_{seq}");
        let fix_id = format!("fix_{affects_item}_{seq}");
        let analysis_id = Task::task_id(TaskKind::Analyze, discovered_in);

        let mut fix = Task::with_id(fix_id.clone(), TaskKind::Fix, affects_item)
            .depends_on(analysis_id)
            .with_metadata("flag_id", json!(flag_id))
            .with_metadata("triggered_by", json!(discovered_in))
            .with_metadata("issue_type", json!(issue.category.as_str()))
            .with_metadata("severity", json!(issue.severity.as_str()));

        if self.serialize_same_item_fixes {
            if let Some(previous) = self
                .store
                .tasks_for_item(affects_item)
                .into_iter()
                .rev()
                .find(|t| t.kind == TaskKind::Fix)
            {
                debug!(target: "folio.flags", fix_id = %fix_id, after = %previous.id, "chaining fix task");
                fix = fix.depends_on(previous.id);
            }
        }
        fix.flags.push(issue.clone());

        let flag = Flag {
            id: flag_id,
            discovered_in,
            affects_item,
            issue,
            status: FlagStatus::Open,
            fix_task_id: fix_id,
            created_at: Utc::now(),
            resolved_at: None,
        };

        // The flag is only recorded once its fix task is stored.
        self.store.add_task(fix)?;
        if let Err(err) = self.store.put_flag(&flag) {
            if let Err(rollback) = self.store.remove_task(&flag.fix_task_id) {
                warn!(target: "folio.flags", fix_task = %flag.fix_task_id, error = %rollback, "could not roll back fix task");
            }
            return Err(err.into());
        }

        info!(
            target: "folio.flags",
            flag_id = %flag.id,
            fix_task = %flag.fix_task_id,
            discovered_in,
            affects_item,
            category = %flag.issue.category,
            severity = %flag.issue.severity,
            "flag raised"
        );
        Ok(flag)
    }

    /// Same as [`add_flag`](Self::add_flag) for loosely typed input.
    pub fn add_flag_raw(
        &self,
        discovered_in: u32,
        affects_item: u32,
        category: &str,
        detail: &str,
        severity: &str,
    ) -> Result<Flag, FlagError> {
        let issue = Issue::parse(category, detail, severity)?;
        self.add_flag(discovered_in, affects_item, issue)
    }

    /// Mark a flag resolved. Returns `false` if it already was.
    pub fn resolve_flag(&self, flag_id: &str) -> Result<bool, FlagError> {
        let mut flag = self
            .store
            .flag(flag_id)
            .ok_or_else(|| FlagError::NotFound(flag_id.to_string()))?;

        if flag.status == FlagStatus::Resolved {
            return Ok(false);
        }
        flag.status = FlagStatus::Resolved;
        flag.resolved_at = Some(Utc::now());
        self.store.put_flag(&flag)?;

        debug!(target: "folio.flags", flag_id = %flag_id, "flag resolved");
        Ok(true)
    }

    /// Resolve the flag a fix task was created for, if any.
    pub fn resolve_for_task(&self, task: &Task) -> Result<bool, FlagError> {
        match task.metadata.get("flag_id").and_then(|v| v.as_str()) {
            Some(flag_id) => self.resolve_flag(flag_id),
            None => Ok(false),
        }
    }

    pub fn flags(&self) -> Vec<Flag> {
        self.store.flags()
    }

    pub fn open_flags(&self) -> Vec<Flag> {
        self.store.flags().into_iter().filter(|f| f.is_open()).collect()
    }

    pub fn open_flag_count(&self) -> usize {
        self.store.open_flag_count()
    }

    /// Flags whose fix lands in `item`.
    pub fn flags_for_item(&self, item: u32) -> Vec<Flag> {
        self.store
            .flags()
            .into_iter()
            .filter(|f| f.affects_item == item)
            .collect()
    }

    fn check_range(&self, item: u32) -> Result<(), FlagError> {
        match self.item_count {
            Some(max) if item == 0 || item > max => Err(FlagError::ItemOutOfRange { item, max }),
            _ => Ok(()),
        }
    }
}
