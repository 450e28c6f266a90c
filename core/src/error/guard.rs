use std::time::Duration;

use thiserror::Error;

use super::ErrorCode;

/// A tripped safety guard. Every variant is fatal to the workflow run and
/// carries the measured values next to the configured limit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("iteration limit exceeded: {iterations} > {max_iterations} (possible infinite loop from contradictory dependencies)")]
    IterationLimitExceeded {
        iterations: u32,
        max_iterations: u32,
    },

    #[error("no progress: completed count stuck at {completed}/{total} for {window} consecutive samples")]
    NoProgress {
        completed: usize,
        total: usize,
        window: usize,
    },

    #[error("flag explosion: {open_flags} open flags exceeds ceiling of {max_open_flags}")]
    FlagExplosion {
        open_flags: usize,
        max_open_flags: usize,
    },

    #[error("execution time exceeded: {elapsed:?} > {max_duration:?}")]
    ExecutionTimeExceeded {
        elapsed: Duration,
        max_duration: Duration,
    },

    #[error("circular dependency detected: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },
}

impl GuardError {
    /// Short machine-readable name of the guard that tripped.
    pub fn guard_name(&self) -> &'static str {
        match self {
            Self::IterationLimitExceeded { .. } => "iteration_limit",
            Self::NoProgress { .. } => "no_progress",
            Self::FlagExplosion { .. } => "flag_explosion",
            Self::ExecutionTimeExceeded { .. } => "execution_time",
            Self::CircularDependency { .. } => "circular_dependency",
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::ExecutionTimeExceeded { .. } => ErrorCode::Timeout,
            _ => ErrorCode::GuardTripped,
        }
    }
}
