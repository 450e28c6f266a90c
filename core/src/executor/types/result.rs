use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::guards::GuardStatus;
use crate::ratelimit::RateLimiterStats;
use crate::store::WorkflowStats;

/// Result of executing a single task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    /// Task identifier
    pub task_id: String,

    /// Wave the task ran in (1-based)
    pub wave: usize,

    pub success: bool,

    /// Payload returned by the task body on success
    pub result: Option<serde_json::Value>,

    /// Error message (if any)
    pub error: Option<String>,

    /// Execution duration in milliseconds, including rate-limit waits
    pub duration_ms: u64,

    /// Number of retries used
    pub retries_used: u32,

    /// Failed without running because a dependency failed
    pub skipped: bool,
}

impl TaskOutcome {
    pub fn succeeded(task_id: &str, wave: usize, result: serde_json::Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            wave,
            success: true,
            result: Some(result),
            error: None,
            duration_ms: 0,
            retries_used: 0,
            skipped: false,
        }
    }

    pub fn failed(task_id: &str, wave: usize, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.to_string(),
            wave,
            success: false,
            result: None,
            error: Some(error.into()),
            duration_ms: 0,
            retries_used: 0,
            skipped: false,
        }
    }
}

/// Outcome of one wave. Failures sit next to successes.
#[derive(Debug, Clone, Serialize)]
pub struct WaveReport {
    pub wave: usize,
    pub outcomes: Vec<TaskOutcome>,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

impl WaveReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.task_id.clone()).collect()
    }
}

/// Throughput counters of an executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionMetrics {
    /// Tasks currently in the store
    pub total_tasks: usize,
    /// Complete tasks in the store, including those of earlier runs
    pub completed_tasks: usize,
    /// Failed tasks in the store
    pub failed_tasks: usize,
    /// Tasks this executor completed
    pub run_completed: usize,
    /// Tasks this executor failed, including upstream-failure skips
    pub run_failed: usize,
    /// Wall-clock duration of each executed wave, in order
    pub wave_durations_ms: Vec<u64>,
    pub total_duration_ms: u64,
    pub tasks_per_second: f64,
    /// Limiter utilisation per provider
    pub rate_limits: BTreeMap<String, RateLimiterStats>,
}

/// Everything a finished workflow run reports back to the host.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub run_id: String,
    pub workflow_id: String,
    /// Results of tasks completed in this run, keyed by task id
    pub results: BTreeMap<String, serde_json::Value>,
    /// Error messages of tasks failed in this run, keyed by task id
    pub failures: BTreeMap<String, String>,
    /// Task ids executed per wave, in execution order
    pub waves: Vec<Vec<String>>,
    pub flags_raised: usize,
    pub metrics: ExecutionMetrics,
    pub stats: WorkflowStats,
    pub guards: GuardStatus,
}

impl WorkflowReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of fanning a callback out over item ids.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub results: BTreeMap<u32, serde_json::Value>,
    pub failures: BTreeMap<u32, String>,
    pub duration_ms: u64,
}

/// Projected runtime of the current plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEstimate {
    pub task_count: usize,
    pub wave_count: usize,
    pub max_wave_width: usize,
    pub sequential_secs: f64,
    pub parallel_secs: f64,
    pub time_saved_secs: f64,
    pub speedup: f64,
    pub avg_tasks_per_wave: f64,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
