//! Fallback event output when no renderer plugin is installed: events go to
//! the tracing subscriber instead of stdout.

use tracing::{debug, info, warn};

use super::types::{ExecutionMetrics, TaskOutcome};
use crate::flags::Flag;

pub fn emit_run_start(run_id: &str, workflow_id: &str, total_tasks: usize) {
    info!(target: "folio.executor", run_id, workflow_id, total_tasks, "run started");
}

pub fn emit_execution_plan(run_id: &str, waves: &[Vec<String>]) {
    info!(target: "folio.executor", run_id, waves = waves.len(), "execution plan");
    for (i, wave) in waves.iter().enumerate() {
        debug!(target: "folio.executor", run_id, wave = i + 1, tasks = %wave.join(", "), "planned wave");
    }
}

pub fn emit_wave_start(run_id: &str, wave: usize, task_ids: &[String]) {
    info!(target: "folio.executor", run_id, wave, tasks = task_ids.len(), "wave started");
}

pub fn emit_task_start(run_id: &str, task_id: &str, wave: usize) {
    debug!(target: "folio.executor", run_id, task_id, wave, "task started");
}

pub fn emit_task_complete(run_id: &str, outcome: &TaskOutcome) {
    if outcome.success {
        debug!(
            target: "folio.executor",
            run_id,
            task_id = %outcome.task_id,
            duration_ms = outcome.duration_ms,
            retries = outcome.retries_used,
            "task complete"
        );
    } else {
        warn!(
            target: "folio.executor",
            run_id,
            task_id = %outcome.task_id,
            skipped = outcome.skipped,
            error = outcome.error.as_deref().unwrap_or(""),
            "task failed"
        );
    }
}

pub fn emit_flag_raised(run_id: &str, flag: &Flag) {
    info!(
        target: "folio.executor",
        run_id,
        flag_id = %flag.id,
        fix_task = %flag.fix_task_id,
        "fix task injected"
    );
}

pub fn emit_wave_end(run_id: &str, wave: usize, completed: usize, failed: usize, duration_ms: u64) {
    info!(target: "folio.executor", run_id, wave, completed, failed, duration_ms, "wave finished");
}

pub fn emit_run_end(run_id: &str, metrics: &ExecutionMetrics) {
    info!(
        target: "folio.executor",
        run_id,
        total = metrics.total_tasks,
        completed = metrics.completed_tasks,
        failed = metrics.failed_tasks,
        run_completed = metrics.run_completed,
        run_failed = metrics.run_failed,
        waves = metrics.wave_durations_ms.len(),
        duration_ms = metrics.total_duration_ms,
        "run finished"
    );
}
