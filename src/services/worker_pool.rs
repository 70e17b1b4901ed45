//! Bounded pool for per-host remote operations.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Limits how many remote operations run at once.
///
/// One pool is shared by every polling stage of a run so that the limit holds
/// across stages as well as within a round.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Use `configured` when set, otherwise half of the logical CPUs.
    pub fn sized_for_host(configured: Option<usize>) -> Self {
        let size = configured.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() / 2)
                .unwrap_or(1)
        });
        Self::new(size)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` for every item and wait for all of them.
    ///
    /// Results come back in item order. A task that panics is dropped from the
    /// result, so callers must key results by something inside `R`.
    pub async fn map<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let task = Arc::new(task);
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let semaphore = self.semaphore.clone();
            let task = task.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(task(item).await)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Some(result)) => results.push(result),
                Ok(None) => tracing::warn!("worker pool closed before task started"),
                Err(e) => tracing::error!(error = %e, "worker task failed"),
            }
        }
        results
    }
}
