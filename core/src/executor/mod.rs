//! Wave execution over the task graph store.
//!
//! ```text
//! TaskStore::tasks()
//!   ↓
//! TaskGraph::from_tasks() → resolve() → WavePlan { waves, unresolved }
//!   ↓
//! ParallelExecutor::execute_workflow()
//!   ├─ guards: cycle pre-flight, iteration / time / flag ceilings
//!   ├─ run_wave() → execute_parallel() → run_task() per task
//!   │     mark started → rate-limit permit → TaskBody::run → complete/failed
//!   └─ re-resolve from the live store (injected fix tasks join here)
//!   ↓
//! WorkflowReport
//! ```

mod engine;
mod graph;
mod output;
mod progress;
mod scheduler;
pub mod traits;
pub mod types;

pub use engine::{ExecutorBuilder, ParallelExecutor};
pub use graph::{TaskGraph, WavePlan};
pub use progress::ProgressMonitor;
pub use scheduler::execute_parallel;
pub use traits::{
    task_body_fn, FnTaskBody, OutputRendererPlugin, RenderEvent, RetryStrategyPlugin, TaskBody,
    TaskContext, TaskFailure,
};
pub use types::{
    BatchReport, ExecutionMetrics, ExecutionOpts, ExecutorConfig, RetryConfig, TaskOutcome,
    TimeEstimate, WaveReport, WorkflowReport,
};
