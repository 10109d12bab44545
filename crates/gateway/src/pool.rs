//! Bounded worker pool for answer requests.
//!
//! Each submitted unit runs on its own Tokio task once one of `size`
//! permits is free; the caller awaits its output.

use scholar_core::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running unit.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting work. Units already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `unit` once a permit is free and return its output.
    ///
    /// A closed pool or a panicked task is reported as `Error::Internal`.
    pub async fn run<F, T>(&self, unit: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("worker pool is closed".into()))?;
        debug!(available = self.permits.available_permits(), "Worker permit acquired");

        let handle = tokio::spawn(async move {
            let _permit = permit;
            unit.await
        });

        handle.await.map_err(|e| {
            error!(error = %e, "Worker task failed");
            Error::Internal(format!("worker task failed: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn returns_unit_output() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.run(async { 40 + 2 }).await.unwrap(), 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn zero_size_is_clamped_to_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }

    #[tokio::test]
    async fn bounds_concurrency() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units = (0..8).map(|_| {
            let running = running.clone();
            let peak = peak.clone();
            pool.run(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
        });

        let results = futures::future::join_all(units).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closed_pool_rejects_work() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(matches!(pool.run(async {}).await, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn panicking_unit_becomes_internal_error() {
        let pool = WorkerPool::new(1);
        let result: Result<u32> = pool.run(async { panic!("boom") }).await;
        assert!(matches!(result, Err(Error::Internal(_))));
        assert_eq!(pool.available(), 1);
    }
}
