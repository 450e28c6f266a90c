use crate::executor::types::{ExecutionMetrics, TaskOutcome};
use crate::flags::Flag;

/// Output renderer plugin (controls how run events are presented)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }
    fn render(&self, event: &RenderEvent);
}

/// Events emitted while a workflow runs. Waves are numbered from 1.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        workflow_id: String,
        total_tasks: usize,
    },
    Plan {
        run_id: String,
        waves: Vec<Vec<String>>,
    },
    WaveStart {
        run_id: String,
        wave: usize,
        task_ids: Vec<String>,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        wave: usize,
    },
    TaskComplete {
        run_id: String,
        outcome: TaskOutcome,
    },
    FlagRaised {
        run_id: String,
        flag: Flag,
    },
    WaveEnd {
        run_id: String,
        wave: usize,
        completed: usize,
        failed: usize,
        duration_ms: u64,
    },
    RunEnd {
        run_id: String,
        metrics: ExecutionMetrics,
    },
}
