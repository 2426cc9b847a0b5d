//! Bounded-concurrency dispatch for transfer tasks.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::error;

/// Concurrent server-side copy initiations for delegated (uncompressed)
/// transfers.
pub const DELEGATED_COPY_CONCURRENCY: usize = 100;

/// Resolve the concurrency bound for a transfer batch.
///
/// Compressed transfers are always serialized: concurrent writers mutating
/// adjacent blocks of the same compressed upload stream corrupt the upload
/// (the store rejects it with a bad request). This is a hard rule, not a
/// tunable. A configured bound of `0` means hardware-based auto config.
pub fn effective_concurrency(compressed: bool, configured: usize) -> usize {
    if compressed {
        1
    } else if configured == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        configured
    }
}

/// Run `worker` over every task with at most `max_concurrency` in flight.
///
/// Worker errors are collected and returned once every task has settled;
/// a failing task never aborts the rest of the batch.
pub async fn run_bounded<T, F, Fut, E>(tasks: Vec<T>, max_concurrency: usize, worker: F) -> Vec<E>
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        // Acquire before spawning so at most `max_concurrency` tasks are live.
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let fut = worker(task);
        handles.push(tokio::spawn(async move {
            let result = fut.await;
            drop(permit);
            result
        }));
    }

    let mut failures = Vec::new();
    for result in join_all(handles).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(e),
            Err(e) => error!("Transfer task join error: {}", e),
        }
    }
    failures
}
