//! Dispatcher
//!
//! The explicitly constructed controller producers talk to. Create one at
//! startup and share it (`Arc<Dispatcher>`) with everything that submits work.
//!
//! ```text
//! submit(request)
//!   │  ui.add_row()           row handle assigned once
//!   │  Job::new(..)           status = Queued
//!   │  queue.enqueue(job)     wake signal set
//!   ▼
//! JobTicket ──wait()──> Finished | Failed | None (removed)
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::info;

use crate::backend::GenerationBackend;
use crate::jobs::{GenerationRequest, Job, JobId, JobReport, JobStatus, JobSummary};
use crate::queue::QueueController;
use crate::ui::UiBinding;
use crate::worker::{self, WorkerHandle, WorkerStats};

/// Handle to a submitted job
///
/// Holding a ticket does not keep the job alive: if the job is removed before
/// it runs, [`wait`](Self::wait) resolves to `None`.
#[derive(Debug)]
pub struct JobTicket {
    id: JobId,
    rx: watch::Receiver<JobReport>,
}

impl JobTicket {
    /// The job's identifier
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Latest status
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.rx.borrow().status
    }

    /// A receiver for every status change
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<JobReport> {
        self.rx.clone()
    }

    /// Wait for the terminal status
    ///
    /// `None` if the job was removed (or the worker shut down) before it finished.
    pub async fn wait(&mut self) -> Option<JobStatus> {
        self.report().await.map(|report| report.status)
    }

    /// Wait for the terminal report, artifact included
    pub async fn report(&mut self) -> Option<JobReport> {
        self.rx
            .wait_for(|report| report.status.is_terminal())
            .await
            .ok()
            .map(|report| report.clone())
    }
}

/// Job queue and its single worker
pub struct Dispatcher {
    queue: Arc<QueueController>,
    worker: WorkerHandle,
    backend: Arc<dyn GenerationBackend>,
    ui: Arc<dyn UiBinding>,
}

impl Dispatcher {
    /// Create the queue and spawn the worker
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(backend: Arc<dyn GenerationBackend>, ui: Arc<dyn UiBinding>) -> Self {
        let queue = Arc::new(QueueController::new());
        let worker = worker::spawn(Arc::clone(&queue));
        info!(backend = backend.name(), "Dispatcher started");
        Self {
            queue,
            worker,
            backend,
            ui,
        }
    }

    /// Submit a job; returns immediately
    pub fn submit(&self, request: GenerationRequest) -> JobTicket {
        let id = JobId::generate();
        let kind = request.modality();
        let created_at = Utc::now();
        let row = self.ui.add_row(&JobSummary {
            id,
            kind,
            prompt: request.prompt().map(str::to_string),
            status: JobStatus::Queued,
            created_at,
            started_at: None,
            elapsed: None,
            error: None,
        });

        let job = Arc::new(Job::new(
            id,
            request,
            row,
            created_at,
            Arc::clone(&self.backend),
            Arc::clone(&self.ui),
        ));
        let rx = job.subscribe();
        self.queue.enqueue(job);
        info!(job_id = %id, %kind, %row, "Job submitted");

        JobTicket { id, rx }
    }

    /// Remove a job that has not started yet
    ///
    /// Returns `false` if the job is unknown, running or finished; those are
    /// left untouched.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.queue.remove(id) {
            Some(job) => {
                self.ui.remove_row(job.row());
                info!(job_id = %id, "Job removed before start");
                true
            }
            None => false,
        }
    }

    /// Pending jobs in execution order
    #[must_use]
    pub fn pending(&self) -> Vec<JobSummary> {
        self.queue.snapshot()
    }

    /// Worker counters
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.worker.stats()
    }

    /// Stop the worker and drop everything still pending
    ///
    /// Tickets for dropped jobs resolve to `None`.
    pub fn shutdown(&self) {
        self.worker.shutdown();
        let dropped = self.queue.drain();
        for job in &dropped {
            self.ui.remove_row(job.row());
        }
        if !dropped.is_empty() {
            info!(count = dropped.len(), "Dropped pending jobs on shutdown");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
