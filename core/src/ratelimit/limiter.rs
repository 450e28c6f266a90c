use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::error::ExecutorError;

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const DAY_WINDOW: Duration = Duration::from_secs(86_400);
const MINUTE_MARGIN: Duration = Duration::from_millis(100);
const DAY_MARGIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Hard daily quota; unlimited when unset.
    #[serde(default)]
    pub requests_per_day: Option<u32>,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: u32, max_concurrent: usize) -> Self {
        Self {
            requests_per_minute,
            requests_per_day: None,
            max_concurrent,
        }
    }

    pub fn with_daily_limit(mut self, requests_per_day: u32) -> Self {
        self.requests_per_day = Some(requests_per_day);
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(default_requests_per_minute(), default_max_concurrent())
    }
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_max_concurrent() -> usize {
    5
}

/// Utilisation snapshot of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    pub provider: String,
    pub requests_last_minute: usize,
    pub requests_per_minute: u32,
    pub requests_last_day: usize,
    pub requests_per_day: Option<u32>,
    pub max_concurrent: usize,
    pub available_permits: usize,
    pub in_flight: usize,
    pub total_acquired: u64,
    pub total_wait_ms: u64,
}

#[derive(Default)]
struct Windows {
    minute: VecDeque<Instant>,
    day: VecDeque<Instant>,
}

impl Windows {
    fn prune(&mut self, now: Instant) {
        while let Some(&ts) = self.minute.front() {
            if now.saturating_duration_since(ts) >= MINUTE_WINDOW {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        while let Some(&ts) = self.day.front() {
            if now.saturating_duration_since(ts) >= DAY_WINDOW {
                self.day.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Rate limiter for a single provider.
pub struct RateLimiter {
    provider: String,
    config: RateLimitConfig,
    /// Window bookkeeping. Held across the wait so waiters are admitted one
    /// at a time against an up-to-date window.
    windows: Mutex<Windows>,
    semaphore: Arc<Semaphore>,
    total_acquired: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    pub fn new(provider: impl Into<String>, config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            requests_per_minute: config.requests_per_minute.max(1),
            requests_per_day: config.requests_per_day.map(|d| d.max(1)),
            max_concurrent: config.max_concurrent.max(1),
        };
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            windows: Mutex::new(Windows::default()),
            total_acquired: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a request is admitted by both windows and a concurrency
    /// slot is free. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<RateLimitPermit, ExecutorError> {
        let started = Instant::now();

        {
            let mut windows = self.windows.lock().await;
            loop {
                let now = Instant::now();
                windows.prune(now);

                if let Some(wait) = self.window_wait(&windows, now) {
                    debug!(
                        target: "folio.ratelimit",
                        provider = %self.provider,
                        wait_ms = wait.as_millis() as u64,
                        "rate window full, waiting"
                    );
                    sleep(wait).await;
                    continue;
                }

                windows.minute.push_back(now);
                if self.config.requests_per_day.is_some() {
                    windows.day.push_back(now);
                }
                break;
            }
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Runner("rate limiter semaphore closed unexpectedly".into()))?;

        let waited = started.elapsed();
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.total_wait_ms
            .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
        trace!(target: "folio.ratelimit", provider = %self.provider, waited_ms = waited.as_millis() as u64, "permit acquired");

        Ok(RateLimitPermit {
            provider: self.provider.clone(),
            waited,
            _permit: permit,
        })
    }

    /// How long until the oldest request leaves whichever window is full.
    fn window_wait(&self, windows: &Windows, now: Instant) -> Option<Duration> {
        if windows.minute.len() >= self.config.requests_per_minute as usize {
            if let Some(&oldest) = windows.minute.front() {
                return Some((oldest + MINUTE_WINDOW + MINUTE_MARGIN).saturating_duration_since(now));
            }
        }
        if let Some(per_day) = self.config.requests_per_day {
            if windows.day.len() >= per_day as usize {
                if let Some(&oldest) = windows.day.front() {
                    return Some((oldest + DAY_WINDOW + DAY_MARGIN).saturating_duration_since(now));
                }
            }
        }
        None
    }

    pub async fn stats(&self) -> RateLimiterStats {
        let (minute, day) = {
            let mut windows = self.windows.lock().await;
            windows.prune(Instant::now());
            (windows.minute.len(), windows.day.len())
        };
        let available = self.semaphore.available_permits();

        RateLimiterStats {
            provider: self.provider.clone(),
            requests_last_minute: minute,
            requests_per_minute: self.config.requests_per_minute,
            requests_last_day: day,
            requests_per_day: self.config.requests_per_day,
            max_concurrent: self.config.max_concurrent,
            available_permits: available,
            in_flight: self.config.max_concurrent.saturating_sub(available),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("provider", &self.provider)
            .field("config", &self.config)
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}

/// Admission granted by [`RateLimiter::acquire`]. Dropping it frees the
/// concurrency slot on every exit path.
#[derive(Debug)]
pub struct RateLimitPermit {
    provider: String,
    waited: Duration,
    _permit: OwnedSemaphorePermit,
}

impl RateLimitPermit {
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Time spent inside `acquire`.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    pub fn release(self) {
        trace!(target: "folio.ratelimit", provider = %self.provider, "permit released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok};

    #[tokio::test]
    async fn test_concurrency_gate_blocks_until_release() {
        let limiter = RateLimiter::new("test", RateLimitConfig::new(100, 1));
        let first = limiter.acquire().await.unwrap();

        let mut second = tokio_test::task::spawn(limiter.acquire());
        assert_pending!(second.poll());

        first.release();
        assert!(second.is_woken());
        let permit = assert_ready_ok!(second.poll());
        assert_eq!(permit.provider(), "test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_window_delays_excess() {
        let limiter = RateLimiter::new("burst", RateLimitConfig::new(2, 10));
        let start = Instant::now();

        for _ in 0..2 {
            limiter.acquire().await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        let third = limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= MINUTE_WINDOW);
        assert!(third.waited() >= MINUTE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_window_applies_after_minute_window() {
        let limiter = RateLimiter::new("daily", RateLimitConfig::new(10, 2).with_daily_limit(1));
        let start = Instant::now();

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();

        assert!(start.elapsed() >= DAY_WINDOW);
        let stats = limiter.stats().await;
        assert_eq!(stats.requests_last_day, 1);
        assert_eq!(stats.total_acquired, 2);
    }

    #[tokio::test]
    async fn test_stats_track_in_flight() {
        let limiter = RateLimiter::new("stats", RateLimitConfig::new(30, 3));
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();

        let stats = limiter.stats().await;
        assert_eq!(stats.requests_last_minute, 2);
        assert_eq!(stats.in_flight, 2);
        assert_eq!(stats.available_permits, 1);

        drop(a);
        assert_eq!(limiter.stats().await.in_flight, 1);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let limiter = RateLimiter::new("zero", RateLimitConfig::new(0, 0));
        assert_eq!(limiter.config().requests_per_minute, 1);
        assert_eq!(limiter.config().max_concurrent, 1);
    }
}
