use std::time::Duration;

/// Decides whether a failed task body is tried again and how long to wait.
///
/// `retry` counts from 1 for the first retry. The executor only consults
/// the strategy for failures marked retryable and gives the provider permit
/// back while waiting.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// `None` stops retrying.
    fn next_delay(&self, retry: u32, error: &str) -> Option<Duration>;

    /// Total attempts including the first one.
    fn max_attempts(&self) -> u32;

    fn should_retry(&self, retry: u32, error: &str) -> bool {
        retry < self.max_attempts() && !self.is_fatal_error(error)
    }

    fn is_fatal_error(&self, _error: &str) -> bool {
        false
    }
}
