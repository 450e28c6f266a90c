use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ratelimit::DEFAULT_PROVIDER;

/// Runtime options of one [`ParallelExecutor`](crate::executor::ParallelExecutor).
#[derive(Debug, Clone)]
pub struct ExecutionOpts {
    /// Global cap on tasks running at once, independent of provider limits.
    pub max_concurrent: usize,

    /// Provider used for tasks that do not name one.
    pub default_provider: String,

    /// Optional per-task timeout; a timeout counts as a task failure.
    pub task_timeout: Option<Duration>,

    /// Enable visual progress bar (disabled for jsonl output)
    pub progress_bar: bool,

    /// Run identifier used in events; generated when unset.
    pub run_id: Option<String>,
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

impl ExecutionOpts {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent.max(1),
            default_provider: cfg.default_provider.clone(),
            task_timeout: cfg.task_timeout_secs.map(Duration::from_secs),
            progress_bar: cfg.progress,
            run_id: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }
}

/// `[executor]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    /// Show an indicatif progress bar while running.
    #[serde(default)]
    pub progress: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            default_provider: default_provider(),
            task_timeout_secs: None,
            progress: false,
        }
    }
}

fn default_max_concurrent() -> usize {
    5
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

/// `[retry]` table. `strategy = "none"` disables retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub base_delay_ms: u64,
    #[serde(default)]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: 100,
            max_delay_ms: 5000,
            max_attempts: 3,
        }
    }
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}
