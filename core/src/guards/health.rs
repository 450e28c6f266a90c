use serde::Serialize;

use crate::store::WorkflowStats;
use crate::task::TaskStatus;

/// Soft warnings about a running workflow. Unlike guards these never stop it.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub warnings: Vec<String>,
    pub stats: WorkflowStats,
    pub open_flags: usize,
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    pub max_failure_rate: f64,
    /// Failure rate is only judged once more than this many tasks exist.
    pub min_tasks_for_failure_rate: usize,
    pub max_blocked: usize,
    pub max_open_flags: usize,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            max_failure_rate: 0.2,
            min_tasks_for_failure_rate: 5,
            max_blocked: 10,
            max_open_flags: 50,
        }
    }
}

impl HealthMonitor {
    pub fn check(&self, stats: &WorkflowStats, open_flags: usize) -> HealthReport {
        let mut warnings = Vec::new();

        if stats.total > self.min_tasks_for_failure_rate {
            let rate = stats.failed as f64 / stats.total as f64;
            if rate > self.max_failure_rate {
                warnings.push(format!(
                    "high failure rate: {:.1}% ({}/{})",
                    rate * 100.0,
                    stats.failed,
                    stats.total
                ));
            }
        }

        let blocked = stats.count(TaskStatus::Blocked);
        if blocked > self.max_blocked {
            warnings.push(format!("many blocked tasks: {blocked}"));
        }

        if open_flags > self.max_open_flags {
            warnings.push(format!("many open flags: {open_flags}"));
        }

        HealthReport {
            healthy: warnings.is_empty(),
            warnings,
            stats: stats.clone(),
            open_flags,
        }
    }
}
