//! Bounded-concurrency dispatch of work items to the remote service.
//!
//! One tokio task per item, gated by a semaphore so at most `max_workers`
//! requests are in flight. Each task builds, sends and classifies its request,
//! then reports `(WorkItem, Outcome)` over a channel to a single consumer.
//! Nothing a task does can fail another task's item.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

use crate::error::{ItemError, ItemResult};
use crate::report::Outcome;
use crate::request::RequestBuilder;
use crate::response;
use crate::source::WorkItem;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Maximum concurrent requests
    pub max_workers: usize,
    /// Per-item timeout in milliseconds, covering build, send and body read
    pub timeout_ms: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            timeout_ms: 300_000,
        }
    }
}

/// Concurrent dispatcher for a batch of work items.
pub struct WorkerPool {
    builder: Arc<RequestBuilder>,
    options: PoolOptions,
}

impl WorkerPool {
    pub fn new(builder: RequestBuilder, options: PoolOptions) -> Self {
        Self {
            builder: Arc::new(builder),
            options,
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Dispatch every item and collect the outcomes.
    ///
    /// Returns one pair per item in completion order. `on_complete` is called
    /// as each item finishes, from the worker task that processed it.
    pub async fn run<F>(&self, items: &[WorkItem], on_complete: F) -> Vec<(WorkItem, Outcome)>
    where
        F: Fn(&WorkItem, &Outcome) + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let on_complete = Arc::new(on_complete);
        let (tx, mut rx) = mpsc::unbounded_channel::<(WorkItem, Outcome)>();
        let mut handles = Vec::with_capacity(items.len());

        tracing::info!(
            "Dispatching {} item(s) with up to {} concurrent worker(s)",
            items.len(),
            self.options.max_workers
        );

        for item in items {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("Worker semaphore closed unexpectedly, stopping dispatch");
                    break;
                }
            };

            let builder = self.builder.clone();
            let timeout_ms = self.options.timeout_ms;
            let on_complete = on_complete.clone();
            let tx = tx.clone();
            let task_item = item.clone();

            let handle = tokio::spawn(async move {
                let outcome = dispatch(&builder, &task_item, timeout_ms).await;
                drop(permit); // Release the slot before reporting
                on_complete(&task_item, &outcome);
                let _ = tx.send((task_item, outcome));
            });

            handles.push((item.clone(), handle));
        }
        drop(tx);

        let mut panicked = Vec::new();
        for (item, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker for {} panicked: {e}", item.display_name);
                panicked.push(item);
            }
        }

        let mut pairs = Vec::with_capacity(items.len());
        while let Some(pair) = rx.recv().await {
            pairs.push(pair);
        }

        // A task that panicked after sending already has its outcome
        let reported: HashSet<usize> = pairs.iter().map(|(item, _)| item.index).collect();
        for item in panicked {
            if !reported.contains(&item.index) {
                pairs.push((item, Outcome::internal("Worker panicked while processing this item")));
            }
        }

        pairs
    }
}

/// Process one item under the per-item timeout. Never fails: every error
/// becomes a `Failure` outcome.
async fn dispatch(builder: &RequestBuilder, item: &WorkItem, timeout_ms: u64) -> Outcome {
    let started = Instant::now();
    let result = match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        send(builder, item, timeout_ms),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ItemError::Timeout { timeout_ms }),
    };

    let elapsed_ms = started.elapsed().as_millis();
    match result {
        Ok(payload) => {
            tracing::debug!("Processed {} in {elapsed_ms}ms", item.display_name);
            Outcome::Success { payload }
        }
        Err(e) => {
            tracing::warn!("Failed: {} - {e} ({elapsed_ms}ms)", item.display_name);
            Outcome::from(e)
        }
    }
}

async fn send(builder: &RequestBuilder, item: &WorkItem, timeout_ms: u64) -> ItemResult<Value> {
    let request = builder.build(item).await?;
    let response = request
        .send()
        .await
        .map_err(|e| ItemError::from_transport(&e, timeout_ms))?;
    tracing::debug!(
        "{} answered HTTP {} for {}",
        response.url(),
        response.status(),
        item.display_name
    );
    response::read_payload(response, timeout_ms).await
}
