//! Bounded-concurrency task pool.
//!
//! # How It Works
//!
//! 1. A task first takes a permit from a fair semaphore sized to
//!    `max_concurrency`. Tasks beyond the limit wait in FIFO order.
//!
//! 2. The task is spawned together with its permit, so the permit is released
//!    exactly when the task settles and the next waiter starts.
//!
//! 3. With a `max_time`, the caller races the task against a timer. Losing
//!    the race rejects the caller with `Timeout`; the task itself keeps
//!    running, and keeps its permit, until it settles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::PoolConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    max_time: Option<Duration>,
}

impl TaskPool {
    /// A pool running at most `max_concurrency` tasks at once (at least one).
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            max_time: None,
        }
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        let pool = Self::new(config.max_concurrency);
        match config.max_time_ms {
            Some(ms) => pool.with_max_time(Duration::from_millis(ms)),
            None => pool,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of tasks that could start right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Reject waiting and future tasks with `PoolClosed`. Running tasks finish.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Run one task once a slot is free. Must be called inside a tokio runtime.
    pub async fn run<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolClosed)?;
        let handle = tokio::spawn(async move {
            let _permit = permit;
            task().await
        });
        match self.max_time {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined?,
                Err(_) => {
                    let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    debug!(ms, "pool task timed out");
                    Err(Error::Timeout { ms })
                }
            },
            None => handle.await?,
        }
    }

    /// Run `task` for every item through the pool. Results keep input order;
    /// the first failure rejects the whole batch.
    pub async fn scatter<I, F, Fut, T>(&self, items: I, task: F) -> Result<Vec<T>>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let runs = items.into_iter().map(|item| {
            let task = task.clone();
            self.run(move || task(item))
        });
        try_join_all(runs).await
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::from_config(&crate::config::Config::global().pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[tokio::test]
    async fn concurrency_never_exceeds_the_limit() {
        let pool = TaskPool::new(3);
        let in_flight = Arc::new(AtomicI32::new(0));
        let peak = Arc::new(AtomicI32::new(0));
        let (a, b) = (in_flight.clone(), peak.clone());
        let results = pool
            .scatter(0..10, move |i| {
                let (a, b) = (a.clone(), b.clone());
                async move {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    b.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                    Ok(i * 2)
                }
            })
            .await
            .unwrap();
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn first_failure_rejects_the_batch() {
        let pool = TaskPool::new(2);
        let err = pool
            .scatter(0..4, |i| async move {
                if i == 2 {
                    Err(Error::custom("task two failed"))
                } else {
                    Ok(i)
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "task two failed");
    }

    #[tokio::test]
    async fn slow_tasks_time_out_but_keep_running() {
        let pool = TaskPool::new(1).with_max_time(Duration::from_millis(10));
        let finished = Arc::new(AtomicI32::new(0));
        let done = finished.clone();
        let err = pool
            .run(move || async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { ms: 10 }));
        assert_eq!(pool.available(), 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn closed_pool_rejects_new_tasks() {
        let pool = TaskPool::new(1);
        pool.close();
        let err = pool.run(|| async { Ok(1) }).await.unwrap_err();
        assert!(matches!(err, Error::PoolClosed));
    }

    #[test]
    fn from_config_applies_limits() {
        let pool = TaskPool::from_config(&PoolConfig {
            max_concurrency: 0,
            max_time_ms: Some(5),
        });
        assert_eq!(pool.max_concurrency(), 1);
        assert_eq!(pool.max_time, Some(Duration::from_millis(5)));
    }
}
