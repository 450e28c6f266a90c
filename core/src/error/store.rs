use thiserror::Error;

use crate::task::TaskStatus;

use super::ErrorCode;

/// Errors raised by the task store and its persistence backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid transition for task '{task_id}': {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("serialization error for key '{key}': {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("backend io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::TaskNotFound(_) => ErrorCode::TaskNotFound,
            Self::InvalidTransition { .. } => ErrorCode::ValidationError,
            Self::Serde { .. } | Self::Io { .. } | Self::Poisoned => ErrorCode::StorageError,
        }
    }
}
