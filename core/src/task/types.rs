use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flags::Issue;

/// Common task interface for dependency graph handling.
pub trait TaskLike: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

/// Kind of work a task performs on its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Analyze,
    Expand,
    Fix,
    Polish,
    Validate,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Expand => "expand",
            Self::Fix => "fix",
            Self::Polish => "polish",
            Self::Validate => "validate",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analyze" => Ok(Self::Analyze),
            "expand" => Ok(Self::Expand),
            "fix" => Ok(Self::Fix),
            "polish" => Ok(Self::Polish),
            "validate" => Ok(Self::Validate),
            other => Err(format!("unknown task kind: {other}")),
        }
    }
}

/// Lifecycle status of a task. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Blocked,
    Ready,
    InProgress,
    Complete,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Pending,
        Self::Blocked,
        Self::Ready,
        Self::InProgress,
        Self::Complete,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Finished for the current run. Only `Complete` is final: a failed
    /// task may be started again by a later run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of scheduled work on one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identity, `{kind}_{item}` for phase tasks and
    /// `fix_{item}_{seq}` for injected fix tasks.
    pub id: String,
    pub kind: TaskKind,
    pub item: u32,
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Issue payloads attached by the flag injector.
    #[serde(default)]
    pub flags: Vec<Issue>,
    /// Free-form metadata; the last failure message lives under `error`.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Rate-limit provider for this task; the executor default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl Task {
    /// Canonical id of the phase task of `kind` for `item`.
    pub fn task_id(kind: TaskKind, item: u32) -> String {
        format!("{kind}_{item}")
    }

    pub fn new(kind: TaskKind, item: u32) -> Self {
        Self::with_id(Self::task_id(kind, item), kind, item)
    }

    pub fn with_id(id: impl Into<String>, kind: TaskKind, item: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            item,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            flags: Vec::new(),
            metadata: BTreeMap::new(),
            provider: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        let dep = dep.into();
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            self = self.depends_on(dep);
        }
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Message recorded by the last `mark_failed`.
    pub fn last_error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(|v| v.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl TaskLike for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_format() {
        assert_eq!(Task::task_id(TaskKind::Analyze, 3), "analyze_3");
        assert_eq!(Task::new(TaskKind::Polish, 12).id, "polish_12");
    }

    #[test]
    fn test_depends_on_ignores_duplicates() {
        let task = Task::new(TaskKind::Expand, 1)
            .depends_on("analyze_1")
            .depends_on("analyze_1");
        assert_eq!(task.dependencies, vec!["analyze_1".to_string()]);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert!(TaskStatus::Complete.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("Validate".parse::<TaskKind>().unwrap(), TaskKind::Validate);
        assert!("rewrite".parse::<TaskKind>().is_err());
    }
}
