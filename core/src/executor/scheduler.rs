use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::error::ExecutorError;

/// Run `executor_fn` over every item with at most `max_concurrency` in
/// flight, and gather every output before returning.
///
/// # Arguments
///
/// * `items` - Work items of a single wave
/// * `max_concurrency` - Maximum number of concurrent executions
/// * `executor_fn` - Async function executing one item; per-item failures
///   must be folded into its output so they never abort the gather
///
/// # Returns
///
/// Outputs in completion order
pub async fn execute_parallel<I, R, F, Fut>(
    items: Vec<I>,
    max_concurrency: usize,
    executor_fn: F,
) -> Result<Vec<R>, ExecutorError>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = R>,
{
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for item in items {
        let sem = sem.clone();
        let fut = executor_fn(item);

        futs.push(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|_| ExecutorError::Runner("semaphore closed unexpectedly".into()))?;

            Ok::<R, ExecutorError>(fut.await)
        });
    }

    let mut results = Vec::with_capacity(futs.len());
    while let Some(res) = futs.next().await {
        results.push(res?);
    }

    Ok(results)
}
