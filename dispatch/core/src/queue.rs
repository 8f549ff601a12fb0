//! Queue Controller
//!
//! The shared, ordered collection of pending jobs plus its wake signal.
//!
//! Producers call [`QueueController::enqueue`] and [`QueueController::remove`] from
//! any thread; the single worker calls [`QueueController::wait_for_work`] and
//! [`QueueController::dequeue_head`]. Every mutation goes through one mutex.
//!
//! The wake signal is a level-triggered flag kept under that mutex: set on every
//! enqueue, cleared by `dequeue_head` when it finds the queue empty. Because the
//! empty check and the clear are one critical section, an enqueue can never slip
//! between them and be missed.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::jobs::{Job, JobId, JobSummary};

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<Arc<Job>>,
    signaled: bool,
}

/// FIFO queue of pending jobs with a wake signal
#[derive(Default)]
pub struct QueueController {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl QueueController {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail and wake the worker
    pub fn enqueue(&self, job: Arc<Job>) {
        let depth = {
            let mut inner = self.inner.lock();
            inner.pending.push_back(job);
            inner.signaled = true;
            inner.pending.len()
        };
        self.notify.notify_one();
        debug!(depth, "Job enqueued");
    }

    /// Remove a pending job
    ///
    /// Returns the job if it was still waiting. A job the worker has already
    /// taken is unaffected and `None` is returned.
    pub fn remove(&self, id: &JobId) -> Option<Arc<Job>> {
        let mut inner = self.inner.lock();
        let index = inner.pending.iter().position(|job| job.id() == *id)?;
        inner.pending.remove(index)
    }

    /// Take the head of the queue (worker only)
    ///
    /// Clears the wake signal when the queue is empty.
    pub fn dequeue_head(&self) -> Option<Arc<Job>> {
        let mut inner = self.inner.lock();
        let job = inner.pending.pop_front();
        if job.is_none() {
            inner.signaled = false;
        }
        job
    }

    /// Wait until the wake signal is set (worker only)
    ///
    /// Returns immediately if it already is.
    pub async fn wait_for_work(&self) {
        loop {
            let notified = self.notify.notified();
            let signaled = self.inner.lock().signaled;
            if signaled {
                return;
            }
            notified.await;
        }
    }

    /// Whether the wake signal is set
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.inner.lock().signaled
    }

    /// Number of pending jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Whether no jobs are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    /// Pending jobs in execution order
    #[must_use]
    pub fn snapshot(&self) -> Vec<JobSummary> {
        self.inner
            .lock()
            .pending
            .iter()
            .map(|job| job.snapshot())
            .collect()
    }

    /// Remove every pending job, returning them in order
    pub fn drain(&self) -> Vec<Arc<Job>> {
        let mut inner = self.inner.lock();
        inner.signaled = false;
        inner.pending.drain(..).collect()
    }
}
