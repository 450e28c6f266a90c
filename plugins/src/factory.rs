use std::sync::Arc;

use anyhow::{bail, Result};

use folio_core::executor::traits::{OutputRendererPlugin, RetryStrategyPlugin};
use folio_core::executor::types::RetryConfig;

use crate::executor::{
    ExponentialBackoffPlugin, JsonlRendererPlugin, LinearRetryPlugin, TextRendererPlugin,
};

/// `None` when retries are disabled.
pub fn build_retry_strategy(cfg: &RetryConfig) -> Result<Option<Arc<dyn RetryStrategyPlugin>>> {
    if cfg.max_attempts <= 1 {
        return Ok(None);
    }
    match cfg.strategy.as_str() {
        "none" => Ok(None),
        "exponential-backoff" | "exponential" => {
            Ok(Some(Arc::new(ExponentialBackoffPlugin::new(cfg.clone()))))
        }
        "linear" => Ok(Some(Arc::new(LinearRetryPlugin::new(cfg.clone())))),
        other => bail!("unknown retry strategy: {other}"),
    }
}

pub fn build_renderer(format: &str) -> Arc<dyn OutputRendererPlugin> {
    match format {
        "jsonl" => Arc::new(JsonlRendererPlugin::new(false)),
        "text-verbose" => Arc::new(TextRendererPlugin::new(false).verbose(true)),
        // Anything else renders as plain text.
        _ => Arc::new(TextRendererPlugin::new(false)),
    }
}
