use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExecutorError;

use super::{RateLimitConfig, RateLimitPermit, RateLimiter, RateLimiterStats};

/// Provider used when a task names a provider that has no configuration.
pub const DEFAULT_PROVIDER: &str = "default";

/// `[rate_limits.<provider>]` tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(flatten)]
    pub providers: BTreeMap<String, RateLimitConfig>,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        let providers = [
            ("openai", RateLimitConfig::new(30, 5)),
            ("anthropic", RateLimitConfig::new(50, 5)),
            (DEFAULT_PROVIDER, RateLimitConfig::new(30, 5)),
        ]
        .into_iter()
        .map(|(name, cfg)| (name.to_string(), cfg))
        .collect();
        Self { providers }
    }
}

/// Independent limiters keyed by provider name.
#[derive(Debug, Clone)]
pub struct MultiProviderRateLimiter {
    limiters: HashMap<String, Arc<RateLimiter>>,
    fallback: Arc<RateLimiter>,
}

impl MultiProviderRateLimiter {
    /// Build one limiter per entry. A `default` entry is synthesised when
    /// absent so unknown providers always have somewhere to go.
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = (S, RateLimitConfig)>,
        S: Into<String>,
    {
        let mut limiters: HashMap<String, Arc<RateLimiter>> = providers
            .into_iter()
            .map(|(name, cfg)| {
                let name = name.into();
                (name.clone(), Arc::new(RateLimiter::new(name, cfg)))
            })
            .collect();

        let fallback = limiters
            .entry(DEFAULT_PROVIDER.to_string())
            .or_insert_with(|| {
                Arc::new(RateLimiter::new(
                    DEFAULT_PROVIDER,
                    RateLimitConfig::default(),
                ))
            })
            .clone();

        Self { limiters, fallback }
    }

    pub fn from_config(cfg: &RateLimitsConfig) -> Self {
        Self::new(
            cfg.providers
                .iter()
                .map(|(name, limits)| (name.clone(), limits.clone())),
        )
    }

    /// Limiter for `provider`, or the default limiter for unknown names.
    pub fn limiter(&self, provider: &str) -> Arc<RateLimiter> {
        match self.limiters.get(provider) {
            Some(limiter) => limiter.clone(),
            None => {
                debug!(target: "folio.ratelimit", provider, "unknown provider, using default limits");
                self.fallback.clone()
            }
        }
    }

    pub async fn acquire(&self, provider: &str) -> Result<RateLimitPermit, ExecutorError> {
        self.limiter(provider).acquire().await
    }

    /// Configured provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.limiters.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn stats(&self) -> BTreeMap<String, RateLimiterStats> {
        let mut out = BTreeMap::new();
        for (name, limiter) in &self.limiters {
            out.insert(name.clone(), limiter.stats().await);
        }
        out
    }
}

impl Default for MultiProviderRateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitsConfig::default())
    }
}
