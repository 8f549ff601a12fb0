//! Worker Loop
//!
//! The single task that executes jobs. It waits on the queue's wake signal,
//! drains the queue head-first, and awaits each job to completion before taking
//! the next one, so exactly one generation call is in flight at a time.
//!
//! When idle the worker is parked on the signal; it never polls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::jobs::JobStatus;
use crate::queue::QueueController;

/// Worker counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    /// Jobs run to a terminal status
    pub jobs_run: u64,
    /// Of those, how many failed
    pub jobs_failed: u64,
    /// Times the worker woke up to drain the queue
    pub wakeups: u64,
}

#[derive(Debug, Default)]
struct Counters {
    jobs_run: AtomicU64,
    jobs_failed: AtomicU64,
    wakeups: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the running worker task
#[derive(Debug)]
pub struct WorkerHandle {
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl WorkerHandle {
    /// Current counters
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Whether the worker task is still alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the worker
    ///
    /// A job in flight is abandoned where it stands.
    pub fn shutdown(&self) {
        if !self.task.is_finished() {
            info!("Stopping worker");
            self.task.abort();
        }
    }
}

/// Spawn the worker on the current tokio runtime
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
#[must_use]
pub fn spawn(queue: Arc<QueueController>) -> WorkerHandle {
    let counters = Arc::new(Counters::default());
    let task = tokio::spawn(run_loop(queue, Arc::clone(&counters)));
    WorkerHandle { task, counters }
}

async fn run_loop(queue: Arc<QueueController>, counters: Arc<Counters>) {
    debug!("Worker started");
    loop {
        queue.wait_for_work().await;
        counters.wakeups.fetch_add(1, Ordering::Relaxed);

        while let Some(job) = queue.dequeue_head() {
            job.run().await;
            counters.jobs_run.fetch_add(1, Ordering::Relaxed);
            if job.status() == JobStatus::Failed {
                counters.jobs_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(stats = ?counters.snapshot(), "Queue drained, worker idle");
    }
}
