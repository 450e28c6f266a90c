//! Task status transition rules.

use thiserror::Error;

use super::TaskStatus;

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: TaskStatus },
}

pub struct StatusTransition;

impl StatusTransition {
    /// Check whether a task may move from `from` to `to`.
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        if from == TaskStatus::Complete {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            // A failed task may only be started again, e.g. by a resumed run.
            (TaskStatus::Failed, TaskStatus::InProgress) => true,
            (TaskStatus::Failed, _) => false,
            (TaskStatus::Pending, TaskStatus::Blocked) => true,
            (TaskStatus::Blocked, TaskStatus::Pending) => true,
            (TaskStatus::Pending | TaskStatus::Blocked, TaskStatus::Ready) => true,
            (
                TaskStatus::Pending | TaskStatus::Blocked | TaskStatus::Ready,
                TaskStatus::InProgress,
            ) => true,
            (TaskStatus::InProgress, TaskStatus::Complete) => true,

            // Any live task can fail, including tasks that never started
            // because an upstream dependency failed.
            (_, TaskStatus::Failed) => true,

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }
}
