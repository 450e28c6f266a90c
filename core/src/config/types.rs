use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::executor::types::{ExecutorConfig, RetryConfig};
use crate::guards::GuardConfig;
use crate::ratelimit::RateLimitsConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Namespace of every store key of this workflow.
    #[serde(default = "default_workflow_id")]
    pub workflow_id: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    #[serde(default)]
    pub guards: GuardConfig,

    #[serde(default)]
    pub flags: FlagConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_workflow_id() -> String {
    "manuscript".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workflow_id: default_workflow_id(),
            logging: LoggingConfig::default(),
            executor: ExecutorConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            guards: GuardConfig::default(),
            flags: FlagConfig::default(),
            store: StoreConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reject settings that would stall or never schedule anything.
    pub fn validate(&self) -> Result<(), String> {
        if self.workflow_id.trim().is_empty() {
            return Err("workflow_id must not be empty".into());
        }
        if self.executor.max_concurrent == 0 {
            return Err("executor.max_concurrent must be at least 1".into());
        }
        for (name, limits) in &self.rate_limits.providers {
            if limits.requests_per_minute == 0 {
                return Err(format!("rate_limits.{name}.requests_per_minute must be at least 1"));
            }
            if limits.max_concurrent == 0 {
                return Err(format!("rate_limits.{name}.max_concurrent must be at least 1"));
            }
            if limits.requests_per_day == Some(0) {
                return Err(format!("rate_limits.{name}.requests_per_day must be at least 1"));
            }
        }

        let guards = &self.guards;
        if guards.max_iterations == 0
            || guards.max_open_flags == 0
            || guards.no_progress_threshold == 0
            || guards.max_execution_time_secs == 0
        {
            return Err("guard thresholds must all be greater than zero".into());
        }

        if self.store.backend == StoreBackendKind::File && self.store.path.is_none() {
            return Err("store.path is required for the file backend".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "folio_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// `[flags]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagConfig {
    /// Chain fix tasks that target the same item so they never share a wave.
    #[serde(default)]
    pub serialize_same_item_fixes: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    #[default]
    Memory,
    File,
}

/// `[store]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackendKind,

    /// JSON document used by the file backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}
