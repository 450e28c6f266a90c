//! Task model: identity, kinds, lifecycle status and the status state machine.

mod transitions;
mod types;

pub use transitions::{StatusTransition, TransitionError};
pub use types::{Task, TaskKind, TaskLike, TaskStatus};
