//! Bounded worker pool shared by every execution in the process.
//!
//! The pool is a semaphore, not a set of threads: each node execution is
//! its own tokio task, and the pool caps how many of them run their body
//! at the same time. One large fan-out therefore queues behind the limit
//! instead of starving other executions.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::QueueError;

/// Cloneable handle to a process-wide bounded pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool that runs at most `size` tasks concurrently.
    ///
    /// A `size` of zero is bumped to one so the pool can make progress.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrently running tasks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a slot, then run `task` to completion while holding it.
    pub async fn run<F>(&self, task: F) -> Result<F::Output, QueueError>
    where
        F: Future,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| QueueError::PoolClosed)?;
        Ok(task.await)
    }

    /// Spawn `task` onto the runtime; its body starts once a slot is free.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<Result<F::Output, QueueError>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let pool = self.clone();
        tokio::spawn(async move { pool.run(task).await })
    }

    /// Stop handing out slots. Tasks already waiting fail with
    /// [`QueueError::PoolClosed`]; running tasks finish normally.
    pub fn close(&self) {
        debug!("closing worker pool (size={})", self.size);
        self.semaphore.close();
    }
}
