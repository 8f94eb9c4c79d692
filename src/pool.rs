//! A bounded pool for deferred transfer jobs.
//!
//! Downloads discovered during a scrape should not block pagination,
//! and should not all run at once. Jobs queue here and a background
//! ticker promotes them, keeping at most `max_connections` in flight.

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

/// One deferred transfer.
#[derive(Debug, Clone)]
pub struct Job {
    /// Source URL.
    pub url: String,
    /// Destination name, without extension.
    pub name: String,
    /// Destination file extension.
    pub extension: String,
}

impl Job {
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            extension: extension.into(),
        }
    }
}

/// The function that performs one job.
pub type TransferFn = Arc<
    dyn Fn(Job) -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

struct PoolInner {
    max_connections: usize,
    transfer: TransferFn,
    queued: Mutex<VecDeque<Job>>,
    running: Mutex<Vec<Arc<AtomicBool>>>,
    /// Guard against overlapping ticks.
    ticking: AtomicBool,
    closed: AtomicBool,
    done: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl PoolInner {
    fn tick(self: &Arc<Self>) {
        if self.ticking.swap(true, Ordering::SeqCst) {
            return;
        }

        lock(&self.running).retain(|finished| !finished.load(Ordering::SeqCst));

        loop {
            let slots_full = lock(&self.running).len() >= self.max_connections;
            if slots_full {
                break;
            }
            let Some(job) = lock(&self.queued).pop_front() else {
                break;
            };
            let finished = Arc::new(AtomicBool::new(false));
            lock(&self.running).push(finished.clone());
            let transfer = self.transfer.clone();
            tokio::spawn(async move {
                if let Err(error) = transfer(job.clone()).await {
                    warn!(url = %job.url, %error, "transfer failed");
                }
                finished.store(true, Ordering::SeqCst);
            });
        }

        if self.closed.load(Ordering::SeqCst)
            && lock(&self.running).is_empty()
            && lock(&self.queued).is_empty()
        {
            self.done.notify_waiters();
        }

        self.ticking.store(false, Ordering::SeqCst);
    }
}

/// A running job pool.
pub struct JobPool {
    inner: Arc<PoolInner>,
    ticker: JoinHandle<()>,
}

impl JobPool {
    /// A pool with the default 100ms promotion tick.
    pub fn new(max_connections: usize, transfer: TransferFn) -> Self {
        Self::with_tick(max_connections, transfer, Duration::from_millis(100))
    }

    /// A pool with a custom promotion tick.
    pub fn with_tick(max_connections: usize, transfer: TransferFn, tick: Duration) -> Self {
        let inner = Arc::new(PoolInner {
            max_connections,
            transfer,
            queued: Mutex::new(VecDeque::new()),
            running: Mutex::new(Vec::new()),
            ticking: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            done: Notify::new(),
        });
        let ticker = {
            let inner = inner.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick);
                loop {
                    interval.tick().await;
                    inner.tick();
                }
            })
        };
        Self { inner, ticker }
    }

    /// Queue a job. Jobs added after [`close`](Self::close) are dropped.
    pub fn add(&self, job: Job) {
        if self.inner.closed.load(Ordering::SeqCst) {
            warn!(url = %job.url, "job added to closed pool, dropping");
            return;
        }
        lock(&self.inner.queued).push_back(job);
    }

    /// Number of jobs waiting for a slot.
    pub fn queued(&self) -> usize {
        lock(&self.inner.queued).len()
    }

    /// Wait for every queued and running job to finish, then stop.
    pub async fn close(self) {
        let done = self.inner.done.notified();
        self.inner.closed.store(true, Ordering::SeqCst);
        done.await;
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let transfer: TransferFn = {
            let current = current.clone();
            let peak = peak.clone();
            let completed = completed.clone();
            Arc::new(move |_job| {
                let current = current.clone();
                let peak = peak.clone();
                let completed = completed.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
        };

        let pool = JobPool::with_tick(2, transfer, Duration::from_millis(10));
        for index in 0..5 {
            pool.add(Job::new(
                format!("https://example.com/{index}"),
                format!("item-{index}"),
                "jpg",
            ));
        }
        pool.close().await;

        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failed_jobs_release_their_slot() {
        let completed = Arc::new(AtomicUsize::new(0));
        let transfer: TransferFn = {
            let completed = completed.clone();
            Arc::new(move |job| {
                let completed = completed.clone();
                async move {
                    if job.name == "bad" {
                        return Err("transfer refused".into());
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
        };

        let pool = JobPool::with_tick(1, transfer, Duration::from_millis(10));
        pool.add(Job::new("https://example.com/a", "bad", "jpg"));
        pool.add(Job::new("https://example.com/b", "good", "jpg"));
        pool.close().await;

        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}
