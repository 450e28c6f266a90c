use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ExecutorError, GuardError};
use crate::flags::FlagInjector;
use crate::guards::{find_any_cycle, GuardConfig, GuardStatus, HealthMonitor, SafetyGuards};
use crate::ratelimit::{MultiProviderRateLimiter, RateLimitPermit};
use crate::store::TaskStore;
use crate::task::{Task, TaskStatus};

use super::graph::{TaskGraph, WavePlan};
use super::output;
use super::progress::ProgressMonitor;
use super::scheduler::execute_parallel;
use super::traits::{
    OutputRendererPlugin, RenderEvent, RetryStrategyPlugin, TaskBody, TaskContext, TaskFailure,
};
use super::types::{
    BatchReport, ExecutionMetrics, ExecutionOpts, TaskOutcome, TimeEstimate, WaveReport,
    WorkflowReport,
};

#[derive(Debug, Default)]
struct MetricsState {
    completed: usize,
    failed: usize,
    wave_durations_ms: Vec<u64>,
    started: Option<Instant>,
    finished: Option<Duration>,
}

/// Body result plus the permit still held for it.
struct Attempted {
    result: Result<serde_json::Value, TaskFailure>,
    retries: u32,
    permit: Option<RateLimitPermit>,
}

/// Wave-by-wave executor over a live [`TaskStore`].
///
/// Tasks inside a wave run concurrently, bounded by the global
/// `max_concurrent` cap and by the rate limiter of each task's provider.
/// Waves run strictly one after another.
pub struct ParallelExecutor {
    store: Arc<TaskStore>,
    injector: Arc<FlagInjector>,
    limiter: Arc<MultiProviderRateLimiter>,
    guards: Mutex<SafetyGuards>,
    opts: ExecutionOpts,
    run_id: String,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    metrics: Mutex<MetricsState>,
    progress: Mutex<ProgressMonitor>,
}

pub struct ExecutorBuilder {
    store: Arc<TaskStore>,
    injector: Option<Arc<FlagInjector>>,
    limiter: Option<Arc<MultiProviderRateLimiter>>,
    guards: GuardConfig,
    opts: ExecutionOpts,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
}

impl ExecutorBuilder {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            injector: None,
            limiter: None,
            guards: GuardConfig::default(),
            opts: ExecutionOpts::default(),
            renderer: None,
            retry_strategy: None,
        }
    }

    /// Injector handed to task bodies. Must wrap the same store.
    pub fn injector(mut self, injector: Arc<FlagInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn limiter(mut self, limiter: Arc<MultiProviderRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn guards(mut self, config: GuardConfig) -> Self {
        self.guards = config;
        self
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> ParallelExecutor {
        let injector = self
            .injector
            .unwrap_or_else(|| Arc::new(FlagInjector::new(self.store.clone())));
        let limiter = self.limiter.unwrap_or_default();
        let run_id = self
            .opts
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let progress = ProgressMonitor::new(self.store.len(), self.opts.progress_bar);

        ParallelExecutor {
            store: self.store,
            injector,
            limiter,
            guards: Mutex::new(SafetyGuards::new(self.guards)),
            opts: self.opts,
            run_id,
            renderer: self.renderer,
            retry_strategy: self.retry_strategy,
            metrics: Mutex::new(MetricsState::default()),
            progress: Mutex::new(progress),
        }
    }
}

impl ParallelExecutor {
    pub fn new(store: Arc<TaskStore>, limiter: Arc<MultiProviderRateLimiter>) -> Self {
        ExecutorBuilder::new(store).limiter(limiter).build()
    }

    pub fn builder(store: Arc<TaskStore>) -> ExecutorBuilder {
        ExecutorBuilder::new(store)
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn injector(&self) -> &Arc<FlagInjector> {
        &self.injector
    }

    pub fn limiter(&self) -> &Arc<MultiProviderRateLimiter> {
        &self.limiter
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn guard_status(&self) -> GuardStatus {
        self.lock_guards().status()
    }

    /// Current wave partition of the live store.
    pub fn plan(&self) -> Result<WavePlan, ExecutorError> {
        TaskGraph::from_tasks(&self.store.tasks()).resolve()
    }

    /// Run one batch of mutually independent tasks and gather every outcome.
    ///
    /// A failing task is recorded on its store entry and reported in the
    /// wave; it never aborts its siblings.
    pub async fn execute_wave(
        &self,
        tasks: Vec<Task>,
        body: Arc<dyn TaskBody>,
        provider: &str,
    ) -> Result<WaveReport, ExecutorError> {
        let wave = self.lock_metrics().wave_durations_ms.len() + 1;
        self.run_wave(wave, tasks, body, provider).await
    }

    /// Drive the whole workflow until no wave has work left.
    ///
    /// The plan is recomputed from the store before every wave, so fix
    /// tasks injected while a wave runs are scheduled in a later one.
    /// Guard trips and unresolvable dependencies abort the run; task
    /// failures do not. Tasks that failed in an earlier run are attempted
    /// once more.
    pub async fn execute_workflow(
        &self,
        body: Arc<dyn TaskBody>,
        provider: &str,
    ) -> Result<WorkflowReport, ExecutorError> {
        self.lock_metrics().started = Some(Instant::now());
        self.lock_guards().start_workflow();

        let tasks = self.store.tasks();
        let graph = TaskGraph::from_tasks(&tasks);
        find_any_cycle(&graph.adjacency()).map_err(|err| self.abort(err))?;
        let plan = graph.resolve()?;

        info!(
            target: "folio.executor",
            run_id = %self.run_id,
            workflow_id = %self.store.workflow_id(),
            tasks = tasks.len(),
            waves = plan.wave_count(),
            max_concurrent = self.opts.max_concurrent,
            "workflow started"
        );
        self.emit(RenderEvent::RunStart {
            run_id: self.run_id.clone(),
            workflow_id: self.store.workflow_id().to_string(),
            total_tasks: tasks.len(),
        });
        self.emit(RenderEvent::Plan {
            run_id: self.run_id.clone(),
            waves: plan.waves,
        });
        self.with_progress(|p| p.set_total(tasks.len()));

        let mut results = BTreeMap::new();
        let mut failures = BTreeMap::new();
        let mut executed = Vec::new();
        let mut seen_flags: HashSet<String> =
            self.store.flags().into_iter().map(|f| f.id).collect();
        let mut flags_raised = 0;
        let mut retry: HashSet<String> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id.clone())
            .collect();
        if !retry.is_empty() {
            info!(target: "folio.executor", run_id = %self.run_id, tasks = retry.len(), "retrying failed tasks");
        }

        loop {
            let tasks = self.store.tasks();
            let plan = TaskGraph::from_tasks(&tasks).resolve()?;

            let skipped = self.cascade_failures(&plan, &tasks, &retry);
            let skipped_ids: HashSet<String> =
                skipped.iter().map(|o| o.task_id.clone()).collect();
            retry.retain(|id| !skipped_ids.contains(id));
            for outcome in skipped {
                failures.insert(outcome.task_id.clone(), outcome.error.clone().unwrap_or_default());
                self.emit(RenderEvent::TaskComplete {
                    run_id: self.run_id.clone(),
                    outcome,
                });
            }

            let Some((wave, runnable)) = next_wave(&plan, &tasks, &skipped_ids, &retry) else {
                break;
            };

            self.check_pre_wave_guards().map_err(|err| self.abort(err))?;

            let report = self.run_wave(wave, runnable, body.clone(), provider).await?;
            for outcome in &report.outcomes {
                if outcome.success {
                    results.insert(
                        outcome.task_id.clone(),
                        outcome.result.clone().unwrap_or(serde_json::Value::Null),
                    );
                } else {
                    failures.insert(outcome.task_id.clone(), outcome.error.clone().unwrap_or_default());
                }
            }
            for outcome in &report.outcomes {
                retry.remove(&outcome.task_id);
            }
            executed.push(report.task_ids());

            for flag in self.store.flags() {
                if seen_flags.insert(flag.id.clone()) {
                    flags_raised += 1;
                    self.emit(RenderEvent::FlagRaised {
                        run_id: self.run_id.clone(),
                        flag,
                    });
                }
            }
            self.with_progress(|p| p.set_total(self.store.len()));

            // Failed tasks can never complete, so they do not count as
            // outstanding work.
            let stats = self.store.stats();
            let check = self
                .lock_guards()
                .check_progress(stats.completed, stats.total.saturating_sub(stats.failed));
            check.map_err(|err| self.abort(err))?;
        }

        let elapsed = self
            .lock_metrics()
            .started
            .map(|s| s.elapsed())
            .unwrap_or_default();
        self.lock_metrics().finished = Some(elapsed);

        let stats = self.store.stats();
        let open_flags = self.store.open_flag_count();
        let health = HealthMonitor::default().check(&stats, open_flags);
        for warning in &health.warnings {
            warn!(target: "folio.guards", run_id = %self.run_id, %warning, "workflow health");
        }

        let metrics = self.metrics().await;
        self.with_progress(|p| p.finish(failures.is_empty()));
        self.emit(RenderEvent::RunEnd {
            run_id: self.run_id.clone(),
            metrics: metrics.clone(),
        });

        Ok(WorkflowReport {
            run_id: self.run_id.clone(),
            workflow_id: self.store.workflow_id().to_string(),
            results,
            failures,
            waves: executed,
            flags_raised,
            metrics,
            stats,
            guards: self.guard_status(),
        })
    }

    /// Fan `f` out over item ids as a single wave with no dependency
    /// structure. Every call holds a rate-limit permit of `provider`.
    pub async fn execute_item_batch<F, Fut>(
        &self,
        items: Vec<u32>,
        provider: &str,
        f: F,
    ) -> Result<BatchReport, ExecutorError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<serde_json::Value, TaskFailure>>,
    {
        let started = Instant::now();
        debug!(target: "folio.executor", items = items.len(), provider, "batch started");

        let outcomes = execute_parallel(items, self.opts.max_concurrent, |item| {
            let fut = f(item);
            async move {
                let permit = match self.limiter.acquire(provider).await {
                    Ok(permit) => permit,
                    Err(err) => return (item, Err(TaskFailure::fatal(err.to_string()))),
                };
                let result = fut.await;
                permit.release();
                (item, result)
            }
        })
        .await?;

        let mut report = BatchReport::default();
        for (item, result) in outcomes {
            match result {
                Ok(value) => {
                    report.results.insert(item, value);
                }
                Err(failure) => {
                    warn!(target: "folio.executor", item, error = %failure, "batch item failed");
                    report.failures.insert(item, failure.message);
                }
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            target: "folio.executor",
            completed = report.results.len(),
            failed = report.failures.len(),
            duration_ms = report.duration_ms,
            "batch finished"
        );
        Ok(report)
    }

    /// Store-wide task counts, this run's counters and a limiter snapshot
    /// for every provider. Throughput only counts this run's completions.
    pub async fn metrics(&self) -> ExecutionMetrics {
        let rate_limits = self.limiter.stats().await;
        let stats = self.store.stats();
        let state = self.lock_metrics();

        let total = state
            .finished
            .or_else(|| state.started.map(|s| s.elapsed()))
            .unwrap_or_default();
        let secs = total.as_secs_f64();
        let tasks_per_second = if secs > 0.0 {
            state.completed as f64 / secs
        } else {
            0.0
        };

        ExecutionMetrics {
            total_tasks: stats.total,
            completed_tasks: stats.completed,
            failed_tasks: stats.failed,
            run_completed: state.completed,
            run_failed: state.failed,
            wave_durations_ms: state.wave_durations_ms.clone(),
            total_duration_ms: total.as_millis() as u64,
            tasks_per_second,
            rate_limits,
        }
    }

    /// Project the runtime of every task in the store at `avg_task_secs`
    /// per task, with each wave split into `max_concurrent`-sized rounds.
    pub fn estimate_time(&self, avg_task_secs: f64) -> Result<TimeEstimate, ExecutorError> {
        let plan = self.plan()?;
        let slots = self.opts.max_concurrent.max(1);
        let task_count = plan.task_count();
        let wave_count = plan.wave_count();

        let sequential_secs = task_count as f64 * avg_task_secs;
        let parallel_secs: f64 = plan
            .waves
            .iter()
            .map(|wave| wave.len().div_ceil(slots) as f64 * avg_task_secs)
            .sum();
        let speedup = if parallel_secs > 0.0 {
            sequential_secs / parallel_secs
        } else {
            1.0
        };
        let avg_tasks_per_wave = if wave_count > 0 {
            task_count as f64 / wave_count as f64
        } else {
            0.0
        };

        Ok(TimeEstimate {
            task_count,
            wave_count,
            max_wave_width: plan.waves.iter().map(Vec::len).max().unwrap_or(0),
            sequential_secs,
            parallel_secs,
            time_saved_secs: sequential_secs - parallel_secs,
            speedup,
            avg_tasks_per_wave,
        })
    }

    async fn run_wave(
        &self,
        wave: usize,
        tasks: Vec<Task>,
        body: Arc<dyn TaskBody>,
        provider: &str,
    ) -> Result<WaveReport, ExecutorError> {
        let started = Instant::now();
        let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        self.emit(RenderEvent::WaveStart {
            run_id: self.run_id.clone(),
            wave,
            task_ids: task_ids.clone(),
        });
        self.with_progress(|p| p.start_wave(wave, &task_ids));

        let mut outcomes = execute_parallel(tasks, self.opts.max_concurrent, |task| {
            self.run_task(wave, task, body.as_ref(), provider)
        })
        .await?;

        // Report in plan order rather than completion order
        let position: HashMap<&str, usize> = task_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();
        outcomes.sort_by_key(|o| position.get(o.task_id.as_str()).copied().unwrap_or(usize::MAX));

        let duration = started.elapsed();
        self.lock_metrics()
            .wave_durations_ms
            .push(duration.as_millis() as u64);

        let report = WaveReport {
            wave,
            outcomes,
            duration,
        };
        self.emit(RenderEvent::WaveEnd {
            run_id: self.run_id.clone(),
            wave,
            completed: report.completed(),
            failed: report.failed(),
            duration_ms: duration.as_millis() as u64,
        });
        Ok(report)
    }

    /// mark started -> acquire -> body -> mark complete/failed -> release
    async fn run_task(
        &self,
        wave: usize,
        task: Task,
        body: &dyn TaskBody,
        provider: &str,
    ) -> TaskOutcome {
        let started = Instant::now();
        let provider = task.provider.clone().unwrap_or_else(|| provider.to_string());

        self.emit(RenderEvent::TaskStart {
            run_id: self.run_id.clone(),
            task_id: task.id.clone(),
            wave,
        });

        let attempted = match self.store.mark_started(&task.id) {
            Ok(()) => self.invoke(wave, &task, body, &provider).await,
            Err(err) => Attempted {
                result: Err(TaskFailure::fatal(err.to_string())),
                retries: 0,
                permit: None,
            },
        };

        let mut outcome = match attempted.result {
            Ok(value) => self.record_success(wave, &task, value),
            Err(failure) => self.record_failure(wave, &task, &failure.message),
        };
        if let Some(permit) = attempted.permit {
            permit.release();
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome.retries_used = attempted.retries;

        self.with_progress(|p| p.complete_task(&task.id, outcome.success, outcome.duration_ms));
        self.emit(RenderEvent::TaskComplete {
            run_id: self.run_id.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Call the body under the retry strategy. The permit is given back
    /// while waiting between attempts and taken again for the next one.
    async fn invoke(
        &self,
        wave: usize,
        task: &Task,
        body: &dyn TaskBody,
        provider: &str,
    ) -> Attempted {
        let mut ctx = TaskContext::new(
            self.store.workflow_id(),
            self.run_id.as_str(),
            wave,
            provider,
            self.injector.clone(),
        );
        let max_attempts = self
            .retry_strategy
            .as_ref()
            .map(|strategy| strategy.max_attempts().max(1))
            .unwrap_or(1);

        let mut attempt: u32 = 0;
        loop {
            let permit = match self.limiter.acquire(provider).await {
                Ok(permit) => permit,
                Err(err) => {
                    return Attempted {
                        result: Err(TaskFailure::fatal(err.to_string())),
                        retries: attempt,
                        permit: None,
                    }
                }
            };

            ctx.attempt = attempt;
            let failure = match self.call_body(task, &ctx, body).await {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        retries: attempt,
                        permit: Some(permit),
                    }
                }
                Err(failure) => failure,
            };

            let next = attempt + 1;
            let delay = match &self.retry_strategy {
                Some(strategy)
                    if failure.retryable
                        && next < max_attempts
                        && strategy.should_retry(next, &failure.message) =>
                {
                    strategy.next_delay(next, &failure.message)
                }
                _ => None,
            };
            let Some(delay) = delay else {
                return Attempted {
                    result: Err(failure),
                    retries: attempt,
                    permit: Some(permit),
                };
            };

            debug!(
                target: "folio.executor",
                task_id = %task.id,
                attempt = next,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying task"
            );
            drop(permit);
            tokio::time::sleep(delay).await;
            attempt = next;
        }
    }

    async fn call_body(
        &self,
        task: &Task,
        ctx: &TaskContext,
        body: &dyn TaskBody,
    ) -> Result<serde_json::Value, TaskFailure> {
        match self.opts.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, body.run(task, ctx)).await {
                Ok(result) => result,
                Err(_) => Err(TaskFailure::new(format!(
                    "timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => body.run(task, ctx).await,
        }
    }

    fn record_success(&self, wave: usize, task: &Task, value: serde_json::Value) -> TaskOutcome {
        if let Err(err) = self.store.mark_complete(&task.id, value.clone()) {
            return self.record_failure(wave, task, &err.to_string());
        }
        if let Err(err) = self.injector.resolve_for_task(task) {
            warn!(target: "folio.executor", task_id = %task.id, error = %err, "could not resolve flag");
        }
        self.lock_metrics().completed += 1;
        debug!(target: "folio.executor", task_id = %task.id, wave, "task complete");
        TaskOutcome::succeeded(&task.id, wave, value)
    }

    fn record_failure(&self, wave: usize, task: &Task, error: &str) -> TaskOutcome {
        if let Err(err) = self.store.mark_failed(&task.id, error) {
            warn!(target: "folio.executor", task_id = %task.id, error = %err, "could not record failure");
        }
        self.lock_metrics().failed += 1;
        warn!(target: "folio.executor", task_id = %task.id, wave, error, "task failed");
        TaskOutcome::failed(&task.id, wave, error)
    }

    /// Fail every live task with a failed dependency, walking waves in order
    /// so the failure reaches transitive dependents in one pass. Tasks in
    /// `retry` are still live.
    fn cascade_failures(
        &self,
        plan: &WavePlan,
        tasks: &[Task],
        retry: &HashSet<String>,
    ) -> Vec<TaskOutcome> {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut failed: HashSet<String> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed && !retry.contains(&t.id))
            .map(|t| t.id.clone())
            .collect();

        let mut skipped = Vec::new();
        for (idx, wave) in plan.waves.iter().enumerate() {
            for id in wave {
                let Some(task) = by_id.get(id.as_str()) else {
                    continue;
                };
                if task.is_terminal() && !retry.contains(&task.id) {
                    continue;
                }
                if let Some(dep) = task.dependencies.iter().find(|d| failed.contains(*d)) {
                    let error = format!("upstream dependency '{dep}' failed");
                    let mut outcome = self.record_failure(idx + 1, task, &error);
                    outcome.skipped = true;
                    self.with_progress(|p| p.skip_task(&task.id));
                    failed.insert(task.id.clone());
                    skipped.push(outcome);
                }
            }
        }
        skipped
    }

    fn check_pre_wave_guards(&self) -> Result<(), GuardError> {
        let open_flags = self.store.open_flag_count();
        let mut guards = self.lock_guards();
        let iteration = guards.check_iteration_limit()?;
        guards.check_execution_time()?;
        guards.check_flag_count(open_flags)?;
        debug!(target: "folio.guards", iteration, open_flags, "guards passed");
        Ok(())
    }

    fn abort(&self, err: GuardError) -> ExecutorError {
        warn!(
            target: "folio.guards",
            run_id = %self.run_id,
            guard = err.guard_name(),
            code = err.error_code().as_u16(),
            error = %err,
            "workflow aborted"
        );
        self.with_progress(|p| p.finish(false));
        ExecutorError::Guard(err)
    }

    fn emit(&self, event: RenderEvent) {
        if let Some(renderer) = &self.renderer {
            renderer.render(&event);
            return;
        }
        match &event {
            RenderEvent::RunStart {
                run_id,
                workflow_id,
                total_tasks,
            } => output::emit_run_start(run_id, workflow_id, *total_tasks),
            RenderEvent::Plan { run_id, waves } => output::emit_execution_plan(run_id, waves),
            RenderEvent::WaveStart {
                run_id,
                wave,
                task_ids,
            } => output::emit_wave_start(run_id, *wave, task_ids),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                wave,
            } => output::emit_task_start(run_id, task_id, *wave),
            RenderEvent::TaskComplete { run_id, outcome } => {
                output::emit_task_complete(run_id, outcome)
            }
            RenderEvent::FlagRaised { run_id, flag } => output::emit_flag_raised(run_id, flag),
            RenderEvent::WaveEnd {
                run_id,
                wave,
                completed,
                failed,
                duration_ms,
            } => output::emit_wave_end(run_id, *wave, *completed, *failed, *duration_ms),
            RenderEvent::RunEnd { run_id, metrics } => output::emit_run_end(run_id, metrics),
        }
    }

    fn with_progress<F: FnOnce(&mut ProgressMonitor)>(&self, f: F) {
        if let Ok(mut monitor) = self.progress.lock() {
            f(&mut monitor);
        }
    }

    fn lock_metrics(&self) -> MutexGuard<'_, MetricsState> {
        match self.metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_guards(&self) -> MutexGuard<'_, SafetyGuards> {
        match self.guards.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("run_id", &self.run_id)
            .field("workflow_id", &self.store.workflow_id())
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

/// Lowest wave that still has tasks to run.
fn next_wave(
    plan: &WavePlan,
    tasks: &[Task],
    skipped: &HashSet<String>,
    retry: &HashSet<String>,
) -> Option<(usize, Vec<Task>)> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    plan.waves.iter().enumerate().find_map(|(idx, wave)| {
        let runnable: Vec<Task> = wave
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .filter(|t| (!t.is_terminal() || retry.contains(&t.id)) && !skipped.contains(&t.id))
            .map(|t| (*t).clone())
            .collect();
        (!runnable.is_empty()).then_some((idx + 1, runnable))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::task_body_fn;
    use crate::ratelimit::RateLimitConfig;
    use crate::task::TaskKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store_with(tasks: Vec<Task>) -> Arc<TaskStore> {
        let store = Arc::new(TaskStore::in_memory("wf-test"));
        for task in tasks {
            store.add_task(task).unwrap();
        }
        store
    }

    fn fast_limiter() -> Arc<MultiProviderRateLimiter> {
        Arc::new(MultiProviderRateLimiter::new([(
            "default",
            RateLimitConfig::new(10_000, 10),
        )]))
    }

    fn echo_body() -> Arc<dyn TaskBody> {
        task_body_fn(|task: Task, _ctx: TaskContext| async move {
            Ok::<_, TaskFailure>(json!({ "id": task.id }))
        })
    }

    #[tokio::test]
    async fn test_execute_wave_isolates_failures() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1),
            Task::new(TaskKind::Analyze, 2),
            Task::new(TaskKind::Analyze, 3),
        ]);
        let executor = ParallelExecutor::new(store.clone(), fast_limiter());
        let body = task_body_fn(|task: Task, _ctx: TaskContext| async move {
            if task.item == 2 {
                Err(TaskFailure::new("model refused"))
            } else {
                Ok(json!(task.item))
            }
        });

        let report = executor
            .execute_wave(store.tasks(), body, "default")
            .await
            .unwrap();

        assert_eq!(report.wave, 1);
        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.task_ids(),
            vec!["analyze_1", "analyze_2", "analyze_3"]
        );

        let failed = store.get_task("analyze_2").unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.last_error(), Some("model refused"));
        assert_eq!(store.completed_count(), 2);
    }

    #[tokio::test]
    async fn test_workflow_runs_waves_in_order() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1),
            Task::new(TaskKind::Analyze, 2),
            Task::new(TaskKind::Analyze, 3),
            Task::new(TaskKind::Expand, 4).depends_on("analyze_1"),
            Task::new(TaskKind::Polish, 5).depends_on("expand_4"),
        ]);
        let executor = ParallelExecutor::new(store.clone(), fast_limiter());

        let report = executor
            .execute_workflow(echo_body(), "default")
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.waves,
            vec![
                vec!["analyze_1", "analyze_2", "analyze_3"],
                vec!["expand_4"],
                vec!["polish_5"],
            ]
        );
        assert_eq!(report.results.len(), 5);
        assert_eq!(report.metrics.completed_tasks, 5);
        assert_eq!(report.metrics.wave_durations_ms.len(), 3);
        assert!(report.stats.is_finished());
    }

    #[tokio::test]
    async fn test_failure_cascades_to_dependents() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1),
            Task::new(TaskKind::Expand, 1).depends_on("analyze_1"),
            Task::new(TaskKind::Polish, 1).depends_on("expand_1"),
            Task::new(TaskKind::Analyze, 2),
        ]);
        let executor = ParallelExecutor::new(store.clone(), fast_limiter());
        let body = task_body_fn(|task: Task, _ctx: TaskContext| async move {
            if task.id == "analyze_1" {
                Err(TaskFailure::fatal("bad input"))
            } else {
                Ok(json!(null))
            }
        });

        let report = executor.execute_workflow(body, "default").await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.waves, vec![vec!["analyze_1", "analyze_2"]]);
        assert_eq!(
            report.failures.get("expand_1").map(String::as_str),
            Some("upstream dependency 'analyze_1' failed")
        );
        assert_eq!(
            report.failures.get("polish_1").map(String::as_str),
            Some("upstream dependency 'expand_1' failed")
        );
        assert_eq!(store.get_task("polish_1").unwrap().status, TaskStatus::Failed);
        assert_eq!(store.get_task("analyze_2").unwrap().status, TaskStatus::Complete);
        assert_eq!(report.metrics.failed_tasks, 3);
    }

    #[tokio::test]
    async fn test_completed_tasks_are_not_rerun() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1),
            Task::new(TaskKind::Expand, 1).depends_on("analyze_1"),
        ]);
        store.mark_started("analyze_1").unwrap();
        store.mark_complete("analyze_1", json!("earlier run")).unwrap();

        let executor = ParallelExecutor::new(store.clone(), fast_limiter());
        let report = executor
            .execute_workflow(echo_body(), "default")
            .await
            .unwrap();

        assert_eq!(report.waves, vec![vec!["expand_1"]]);
        assert_eq!(store.completed_count(), 2);

        let metrics = executor.metrics().await;
        assert_eq!(metrics.total_tasks, 2);
        assert_eq!(metrics.completed_tasks, 2);
        assert_eq!(metrics.run_completed, 1);
        assert_eq!(metrics.failed_tasks, 0);
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_running() {
        let store = store_with(vec![
            Task::new(TaskKind::Analyze, 1).depends_on("expand_1"),
            Task::new(TaskKind::Expand, 1).depends_on("analyze_1"),
        ]);
        let executor = ParallelExecutor::new(store.clone(), fast_limiter());

        let err = executor
            .execute_workflow(echo_body(), "default")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExecutorError::Guard(GuardError::CircularDependency { .. })
        ));
        assert_eq!(store.get_task("analyze_1").unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timeout_counts_as_failure() {
        let store = store_with(vec![Task::new(TaskKind::Analyze, 1)]);
        let executor = ParallelExecutor::builder(store.clone())
            .limiter(fast_limiter())
            .opts(ExecutionOpts::default().with_task_timeout(Duration::from_secs(1)))
            .build();
        let body = task_body_fn(|_task: Task, _ctx: TaskContext| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TaskFailure>(json!(null))
        });

        let report = executor
            .execute_wave(store.tasks(), body, "default")
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.outcomes[0].error.as_deref(),
            Some("timed out after 1000ms")
        );
    }

    #[tokio::test]
    async fn test_item_batch_collects_results_and_failures() {
        let store = Arc::new(TaskStore::in_memory("wf-batch"));
        let executor = ParallelExecutor::new(store, fast_limiter());

        let report = executor
            .execute_item_batch(vec![1, 2, 3, 4], "default", |item| async move {
                if item % 2 == 0 {
                    Err(TaskFailure::new(format!("item {item} failed")))
                } else {
                    Ok(json!(item * 10))
                }
            })
            .await
            .unwrap();

        assert_eq!(report.results.get(&1), Some(&json!(10)));
        assert_eq!(report.results.get(&3), Some(&json!(30)));
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures.get(&4).map(String::as_str), Some("item 4 failed"));
    }

    #[test]
    fn test_estimate_time_splits_wide_waves() {
        let mut tasks: Vec<Task> = (1..=10).map(|i| Task::new(TaskKind::Analyze, i)).collect();
        tasks.push(Task::new(TaskKind::Expand, 1).depends_on("analyze_1"));
        let store = store_with(tasks);
        let executor = ParallelExecutor::builder(store)
            .opts(ExecutionOpts::default().with_max_concurrent(4))
            .build();

        let estimate = executor.estimate_time(2.0).unwrap();

        assert_eq!(estimate.task_count, 11);
        assert_eq!(estimate.wave_count, 2);
        assert_eq!(estimate.max_wave_width, 10);
        assert_eq!(estimate.sequential_secs, 22.0);
        // 10 tasks over 4 slots = 3 rounds, plus 1 round for wave 2
        assert_eq!(estimate.parallel_secs, 8.0);
        assert_eq!(estimate.speedup, 2.75);
    }
}
