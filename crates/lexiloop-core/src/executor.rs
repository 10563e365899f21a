//! Bounded-concurrency executor.
//!
//! Keeps a FIFO queue of submitted futures and a running counter. At most
//! `limit` tasks run at once; each completion admits the next queued task.
//! Tasks are not cancellable: they run to completion or failure.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::ReviewError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Default interval at which [`BoundedExecutor::drain`] re-checks quiescence.
pub const DEFAULT_DRAIN_POLL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Slots {
    queue: VecDeque<Job>,
    running: usize,
}

struct Inner {
    limit: usize,
    slots: Mutex<Slots>,
}

impl Inner {
    fn slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        // Jobs never run while the lock is held, so a poisoned lock still
        // holds consistent counters.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start queued jobs while there is headroom.
    fn pump(self: &Arc<Self>) {
        loop {
            let job = {
                let mut slots = self.slots();
                if slots.running >= self.limit {
                    return;
                }
                match slots.queue.pop_front() {
                    Some(job) => {
                        slots.running += 1;
                        job
                    }
                    None => return,
                }
            };

            let inner = Arc::clone(self);
            tokio::spawn(async move {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    tracing::error!("executor task panicked");
                }
                inner.slots().running -= 1;
                inner.pump();
            });
        }
    }
}

/// Caps how many submitted futures run concurrently.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct BoundedExecutor {
    inner: Arc<Inner>,
    drain_poll: Duration,
}

impl BoundedExecutor {
    /// Create an executor admitting at most `limit` concurrent tasks.
    pub fn new(limit: usize) -> Result<Self, ReviewError> {
        if limit < 1 {
            return Err(ReviewError::InvalidArgument(
                "executor concurrency limit must be at least 1".into(),
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                limit,
                slots: Mutex::new(Slots::default()),
            }),
            drain_poll: DEFAULT_DRAIN_POLL,
        })
    }

    pub fn with_drain_poll(mut self, interval: Duration) -> Self {
        self.drain_poll = interval;
        self
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.slots().running
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.slots().queue.len()
    }

    /// Enqueue `task`. It starts immediately if a slot is free. Must be
    /// called from within a tokio runtime.
    pub fn submit<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = task.await;
            // The caller may have dropped its handle; the task still counts as done.
            let _ = tx.send(output);
        });

        {
            let mut slots = self.inner.slots();
            slots.queue.push_back(job);
            tracing::debug!(
                queued = slots.queue.len(),
                running = slots.running,
                limit = self.inner.limit,
                "task submitted"
            );
        }
        self.inner.pump();

        TaskHandle { rx }
    }

    /// Resolve once nothing is queued or running.
    pub async fn drain(&self) {
        loop {
            {
                let slots = self.inner.slots();
                if slots.queue.is_empty() && slots.running == 0 {
                    return;
                }
            }
            tokio::time::sleep(self.drain_poll).await;
        }
    }
}

/// Handle to the output of a submitted task.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's output. Fails with `Internal` if the task panicked.
    pub async fn join(self) -> Result<T, ReviewError> {
        self.rx
            .await
            .map_err(|_| ReviewError::Internal("executor task ended without a result".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_limit_is_rejected() {
        let err = BoundedExecutor::new(0).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn never_exceeds_limit_and_drains() {
        let executor = BoundedExecutor::new(2).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..5 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            handles.push(executor.submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                i
            }));
        }

        assert!(executor.in_flight() <= 2);
        executor.drain().await;

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(executor.in_flight(), 0);
        assert_eq!(executor.queued(), 0);

        let mut outputs = Vec::new();
        for handle in handles {
            outputs.push(handle.join().await.unwrap());
        }
        assert_eq!(outputs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn admits_in_fifo_order() {
        let executor = BoundedExecutor::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = Arc::clone(&order);
            executor.submit(async move {
                order.lock().unwrap().push(i);
            });
        }
        executor.drain().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn panicking_task_frees_its_slot() {
        let executor = BoundedExecutor::new(1).unwrap();
        let failed = executor.submit(async {
            panic!("boom");
        });
        let ok = executor.submit(async { 7 });

        assert!(failed.join().await.is_err());
        assert_eq!(ok.join().await.unwrap(), 7);
        executor.drain().await;
    }

    #[tokio::test]
    async fn drain_on_idle_returns_immediately() {
        let executor = BoundedExecutor::new(3).unwrap();
        executor.drain().await;
        assert_eq!(executor.limit(), 3);
    }
}
