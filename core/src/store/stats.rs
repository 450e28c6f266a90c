use std::collections::BTreeMap;

use serde::Serialize;

use crate::task::{Task, TaskStatus};

/// Status breakdown of a workflow at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub by_status: BTreeMap<String, usize>,
    pub progress_pct: f64,
}

impl WorkflowStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut by_status: BTreeMap<String, usize> = TaskStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut total = 0;

        for task in tasks {
            total += 1;
            *by_status.entry(task.status.as_str().to_string()).or_default() += 1;
        }

        let count = |status: TaskStatus| by_status.get(status.as_str()).copied().unwrap_or(0);
        let completed = count(TaskStatus::Complete);
        let failed = count(TaskStatus::Failed);
        let progress_pct = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total,
            completed,
            failed,
            by_status,
            progress_pct,
        }
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Every task reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.completed + self.failed == self.total
    }
}
