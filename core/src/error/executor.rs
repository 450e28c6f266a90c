use thiserror::Error;

use super::{ErrorCode, GuardError, StoreError};

/// Workflow-fatal errors raised while resolving or driving waves.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{} task(s) can never be scheduled: [{}]{}", .unresolved.len(), .unresolved.join(", "), describe_cause(.cycle, .dangling))]
    UnresolvedDependencies {
        unresolved: Vec<String>,
        /// First cycle found among the unresolved tasks, if any.
        cycle: Option<Vec<String>>,
        /// `(task_id, missing_dep)` pairs referencing tasks that do not exist.
        dangling: Vec<(String, String)>,
    },

    #[error("safety guard tripped: {0}")]
    Guard(#[from] GuardError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("Runner error: {0}")]
    Runner(String),
}

impl ExecutorError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnresolvedDependencies { cycle: Some(_), .. } => ErrorCode::CircularDependency,
            Self::UnresolvedDependencies { .. } => ErrorCode::DependencyError,
            Self::Guard(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Runner(_) => ErrorCode::GeneralError,
        }
    }
}

fn describe_cause(cycle: &Option<Vec<String>>, dangling: &[(String, String)]) -> String {
    let mut out = String::new();
    if let Some(path) = cycle {
        out.push_str(&format!("; cycle: {}", path.join(" -> ")));
    }
    if !dangling.is_empty() {
        let pairs: Vec<String> = dangling
            .iter()
            .map(|(task, dep)| format!("{task} -> {dep}"))
            .collect();
        out.push_str(&format!("; missing: {}", pairs.join(", ")));
    }
    out
}
