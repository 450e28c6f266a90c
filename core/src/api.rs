//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `folio_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from_path, AppConfig, FlagConfig, LoggingConfig, StoreBackendKind,
    StoreConfig,
};
pub use crate::error::{
    CliError, ErrorCode, ExecutorError, FlagError, GuardError, StoreError,
};
pub use crate::executor::{
    task_body_fn, BatchReport, ExecutionMetrics, ExecutionOpts, ExecutorBuilder, ExecutorConfig,
    FnTaskBody, OutputRendererPlugin, ParallelExecutor, RenderEvent, RetryConfig,
    RetryStrategyPlugin, TaskBody, TaskContext, TaskFailure, TaskGraph, TaskOutcome,
    TimeEstimate, WavePlan, WaveReport, WorkflowReport,
};
pub use crate::flags::{Flag, FlagInjector, FlagStatus, Issue, IssueCategory, Severity};
pub use crate::guards::{
    check_circular_dependency, find_any_cycle, GuardConfig, GuardStatus, HealthMonitor,
    HealthReport, SafetyGuards,
};
pub use crate::ratelimit::{
    MultiProviderRateLimiter, RateLimitConfig, RateLimitPermit, RateLimiter, RateLimiterStats,
    RateLimitsConfig, DEFAULT_PROVIDER,
};
pub use crate::store::{FileBackend, MemoryBackend, StateBackend, TaskStore, WorkflowStats};
pub use crate::task::{Task, TaskKind, TaskLike, TaskStatus};
pub use crate::workflow::{initialize_standard_workflow, Phase, WorkflowContext};
