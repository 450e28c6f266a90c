//! Per-provider admission control.
//!
//! A provider admits a request only after three gates: a 60 second sliding
//! window, an optional 24 hour sliding window, and a concurrency cap. The
//! window gates are checked and the attempt recorded before the concurrency
//! gate is requested, so time spent waiting for a free slot never counts
//! against the rate windows twice.

mod limiter;
mod multi;

pub use limiter::{
    RateLimitConfig, RateLimitPermit, RateLimiter, RateLimiterStats, DAY_WINDOW, MINUTE_WINDOW,
};
pub use multi::{MultiProviderRateLimiter, RateLimitsConfig, DEFAULT_PROVIDER};
