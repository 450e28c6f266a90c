use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::GuardError;

use super::cycle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Scheduling passes allowed per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Open flags tolerated before the run is aborted.
    #[serde(default = "default_max_open_flags")]
    pub max_open_flags: usize,

    /// Consecutive identical completed-count samples that count as stalled.
    #[serde(default = "default_no_progress_threshold")]
    pub no_progress_threshold: usize,

    #[serde(default = "default_max_execution_time_secs")]
    pub max_execution_time_secs: u64,
}

fn default_max_iterations() -> u32 {
    50
}

fn default_max_open_flags() -> usize {
    100
}

fn default_no_progress_threshold() -> usize {
    10
}

fn default_max_execution_time_secs() -> u64 {
    6 * 60 * 60
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_open_flags: default_max_open_flags(),
            no_progress_threshold: default_no_progress_threshold(),
            max_execution_time_secs: default_max_execution_time_secs(),
        }
    }
}

impl GuardConfig {
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_secs(self.max_execution_time_secs)
    }
}

/// Point-in-time view of the guard counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardStatus {
    pub iterations: u32,
    pub max_iterations: u32,
    pub elapsed_secs: f64,
    pub max_execution_time_secs: u64,
    pub progress_history: Vec<usize>,
    pub no_progress_threshold: usize,
    pub max_open_flags: usize,
}

/// Iteration, progress, flag and time watchdogs for one workflow run.
#[derive(Debug, Clone)]
pub struct SafetyGuards {
    config: GuardConfig,
    iterations: u32,
    progress_history: VecDeque<usize>,
    started_at: Option<Instant>,
}

impl SafetyGuards {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            iterations: 0,
            progress_history: VecDeque::new(),
            started_at: None,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Reset counters and start the wall clock.
    pub fn start_workflow(&mut self) {
        self.iterations = 0;
        self.progress_history.clear();
        self.started_at = Some(Instant::now());
        debug!(target: "folio.guards", config = ?self.config, "guards armed");
    }

    /// Count one scheduling pass and fail once the cap is exceeded.
    pub fn check_iteration_limit(&mut self) -> Result<u32, GuardError> {
        self.iterations += 1;
        if self.iterations > self.config.max_iterations {
            warn!(target: "folio.guards", iterations = self.iterations, max = self.config.max_iterations, "iteration limit exceeded");
            return Err(GuardError::IterationLimitExceeded {
                iterations: self.iterations,
                max_iterations: self.config.max_iterations,
            });
        }
        Ok(self.iterations)
    }

    /// Sample the completed count. Fails when the last
    /// `no_progress_threshold` samples are all equal while work remains.
    pub fn check_progress(&mut self, completed: usize, total: usize) -> Result<(), GuardError> {
        let window = self.config.no_progress_threshold.max(1);

        self.progress_history.push_back(completed);
        while self.progress_history.len() > window {
            self.progress_history.pop_front();
        }

        if total <= completed {
            return Ok(());
        }

        let stalled = self.progress_history.len() == window
            && self.progress_history.front() == self.progress_history.back();
        if stalled {
            warn!(target: "folio.guards", completed, total, window, "no progress");
            return Err(GuardError::NoProgress {
                completed,
                total,
                window,
            });
        }
        Ok(())
    }

    /// Fails only when `open_flags` is strictly above the ceiling.
    pub fn check_flag_count(&self, open_flags: usize) -> Result<(), GuardError> {
        if open_flags > self.config.max_open_flags {
            warn!(target: "folio.guards", open_flags, max = self.config.max_open_flags, "flag explosion");
            return Err(GuardError::FlagExplosion {
                open_flags,
                max_open_flags: self.config.max_open_flags,
            });
        }
        Ok(())
    }

    pub fn check_execution_time(&self) -> Result<(), GuardError> {
        let elapsed = self.elapsed();
        let max_duration = self.config.max_execution_time();
        if elapsed > max_duration {
            warn!(target: "folio.guards", elapsed_secs = elapsed.as_secs(), max_secs = max_duration.as_secs(), "execution time exceeded");
            return Err(GuardError::ExecutionTimeExceeded {
                elapsed,
                max_duration,
            });
        }
        Ok(())
    }

    pub fn check_circular_dependency(
        &self,
        start: &str,
        adjacency: &std::collections::HashMap<String, Vec<String>>,
    ) -> Result<(), GuardError> {
        cycle::check_circular_dependency(start, adjacency)
    }

    /// Time since [`start_workflow`](Self::start_workflow); zero before it.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn status(&self) -> GuardStatus {
        GuardStatus {
            iterations: self.iterations,
            max_iterations: self.config.max_iterations,
            elapsed_secs: self.elapsed().as_secs_f64(),
            max_execution_time_secs: self.config.max_execution_time_secs,
            progress_history: self.progress_history.iter().copied().collect(),
            no_progress_threshold: self.config.no_progress_threshold,
            max_open_flags: self.config.max_open_flags,
        }
    }
}

impl Default for SafetyGuards {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
