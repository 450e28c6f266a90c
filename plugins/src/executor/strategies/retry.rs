use std::time::Duration;

use folio_core::executor::traits::RetryStrategyPlugin;
use folio_core::executor::types::RetryConfig;

/// Doubles the wait after every failed attempt: base, 2x base, 4x base...
pub struct ExponentialBackoffPlugin {
    config: RetryConfig,
}

/// Grows the wait by one base step per failed attempt: base, 2x, 3x...
pub struct LinearRetryPlugin {
    config: RetryConfig,
}

impl ExponentialBackoffPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

/// `retry` is 1 for the first retry. `None` once the attempt budget is spent.
fn capped_delay(config: &RetryConfig, retry: u32, factor: u64) -> Option<Duration> {
    if retry == 0 || retry >= config.max_attempts {
        return None;
    }
    let delay = config
        .base_delay_ms
        .saturating_mul(factor)
        .min(config.max_delay_ms);
    Some(Duration::from_millis(delay))
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, retry: u32, _error: &str) -> Option<Duration> {
        let factor = 1u64 << retry.saturating_sub(1).min(30);
        capped_delay(&self.config, retry, factor)
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, retry: u32, _error: &str) -> Option<Duration> {
        capped_delay(&self.config, retry, u64::from(retry))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use folio_core::api::{
        task_body_fn, ExecutorBuilder, MultiProviderRateLimiter, RateLimitConfig, Task,
        TaskContext, TaskFailure, TaskKind, TaskStatus, TaskStore,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cfg(strategy: &str, base: u64, max: u64, attempts: u32) -> RetryConfig {
        RetryConfig {
            strategy: strategy.to_string(),
            base_delay_ms: base,
            max_delay_ms: max,
            max_attempts: attempts,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let plugin = ExponentialBackoffPlugin::new(cfg("exponential-backoff", 100, 1000, 5));
        assert_eq!(plugin.next_delay(1, "err"), Some(Duration::from_millis(100)));
        assert_eq!(plugin.next_delay(2, "err"), Some(Duration::from_millis(200)));
        assert_eq!(plugin.next_delay(4, "err"), Some(Duration::from_millis(800)));
        assert_eq!(plugin.next_delay(5, "err"), None);
    }

    #[test]
    fn test_exponential_backoff_caps_at_max_delay() {
        let plugin = ExponentialBackoffPlugin::new(cfg("exponential-backoff", 400, 1000, 10));
        assert_eq!(plugin.next_delay(3, "err"), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_linear_backoff() {
        let plugin = LinearRetryPlugin::new(cfg("linear", 50, 200, 4));
        assert_eq!(plugin.next_delay(1, "err"), Some(Duration::from_millis(50)));
        assert_eq!(plugin.next_delay(3, "err"), Some(Duration::from_millis(150)));
        assert_eq!(plugin.next_delay(4, "err"), None);
        assert!(plugin.should_retry(3, "err"));
        assert!(!plugin.should_retry(4, "err"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_retries_transient_failures() {
        let store = Arc::new(TaskStore::in_memory("retry"));
        store.add_task(Task::new(TaskKind::Analyze, 1)).unwrap();
        let limiter = Arc::new(MultiProviderRateLimiter::new([(
            "default",
            RateLimitConfig::new(1_000, 4),
        )]));
        let executor = ExecutorBuilder::new(store.clone())
            .limiter(limiter)
            .retry_strategy(Arc::new(ExponentialBackoffPlugin::new(cfg(
                "exponential-backoff",
                100,
                1000,
                3,
            ))))
            .build();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let body = task_body_fn(move |_task: Task, ctx: TaskContext| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if ctx.attempt < 2 {
                    Err(TaskFailure::new("provider overloaded"))
                } else {
                    Ok(json!("ok"))
                }
            }
        });

        let report = executor
            .execute_wave(store.tasks(), body, "default")
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.outcomes[0].retries_used, 2);
        assert!(report.outcomes[0].success);
        assert_eq!(store.get_task("analyze_1").unwrap().status, TaskStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failures_are_not_retried() {
        let store = Arc::new(TaskStore::in_memory("retry"));
        store.add_task(Task::new(TaskKind::Analyze, 1)).unwrap();
        let executor = ExecutorBuilder::new(store.clone())
            .retry_strategy(Arc::new(LinearRetryPlugin::new(cfg("linear", 10, 100, 5))))
            .build();

        let body = task_body_fn(|_task: Task, _ctx: TaskContext| async move {
            Err::<serde_json::Value, _>(TaskFailure::fatal("malformed chapter"))
        });

        let report = executor
            .execute_wave(store.tasks(), body, "default")
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].retries_used, 0);
        assert_eq!(report.outcomes[0].error.as_deref(), Some("malformed chapter"));
    }
}
