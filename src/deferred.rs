//! Delay-then-run task queue.
//!
//! Each scheduled task is an independent tokio task: sleep for its delay,
//! then run its closure once. Nothing is cancelled or deduplicated, and the
//! number of in-flight tasks is unbounded.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::logging::{log_failure, Category};

#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    pending: Arc<AtomicUsize>,
    completed: Arc<AtomicU64>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending.clone();
        let completed = self.completed.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(err) = task() {
                log_failure(Category::Remedy, "deferred_task_failed", &err);
            }
            completed.fetch_add(1, Ordering::SeqCst);
            pending.fetch_sub(1, Ordering::SeqCst);
        });
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait until every scheduled task has run.
    pub async fn drain(&self) {
        while self.pending() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    }
}
