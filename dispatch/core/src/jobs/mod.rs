//! Generation Jobs
//!
//! A [`Job`] is one unit of requested generation work: modality-specific
//! parameters, a status, and timing. Jobs are built by the
//! [`Dispatcher`](crate::Dispatcher), queued, and run exactly once by the worker.
//!
//! # Lifecycle
//!
//! ```text
//! Queued ──(worker picks up)──> Running ──(generate ok)───> Finished
//!                                  └──────(generate fails)──> Failed
//! ```
//!
//! Status only moves forward. A job never runs twice, and nothing a job does
//! can fail the worker: errors and panics from the backend are caught in
//! [`Job::run`] and reported through the UI binding.

mod artifact;
mod params;

pub use artifact::Artifact;
pub use params::{
    Attachment, AudioParams, FieldInput, GenerationRequest, ImageParams, Modality, TextParams,
    UpscaleParams, VideoParams,
};

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::GenerationBackend;
use crate::error::JobError;
use crate::ui::{status_text, RowHandle, StatusColor, UiBinding};

/// Job identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new unique job ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting in the queue
    Queued,
    /// The worker is running it
    Running,
    /// Generation succeeded
    Finished,
    /// Generation failed
    Failed,
}

impl JobStatus {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Finished => "Finished",
            Self::Failed => "Failed",
        }
    }

    /// Display color for the status
    #[must_use]
    pub fn color(&self) -> StatusColor {
        match self {
            Self::Queued => StatusColor::Gray,
            Self::Running => StatusColor::Yellow,
            Self::Finished => StatusColor::Green,
            Self::Failed => StatusColor::Red,
        }
    }

    /// Whether the job is done (finished or failed)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of a job, for queue views and logs
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobSummary {
    /// Job identifier
    pub id: JobId,
    /// Requested modality
    pub kind: Modality,
    /// The prompt, when the modality has one
    pub prompt: Option<String>,
    /// Current status
    pub status: JobStatus,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When the worker started it
    pub started_at: Option<DateTime<Utc>>,
    /// How long `generate` took, once terminal
    pub elapsed: Option<Duration>,
    /// Failure message, when failed
    pub error: Option<String>,
}

/// What a job's observers see after each transition
#[derive(Clone, Debug, PartialEq)]
pub struct JobReport {
    /// Current status
    pub status: JobStatus,
    /// Elapsed time, once terminal
    pub elapsed: Option<Duration>,
    /// The failure, when failed
    pub error: Option<JobError>,
    /// The artifact, when finished
    pub artifact: Option<Arc<Artifact>>,
}

impl JobReport {
    fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            elapsed: None,
            error: None,
            artifact: None,
        }
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
    error: Option<String>,
}

/// One unit of generation work
pub struct Job {
    id: JobId,
    request: GenerationRequest,
    row: RowHandle,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
    report_tx: watch::Sender<JobReport>,
    backend: Arc<dyn GenerationBackend>,
    ui: Arc<dyn UiBinding>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("kind", &self.request.modality())
            .field("row", &self.row)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Create a queued job
    ///
    /// `row` must already exist in the UI: it is assigned once, here, and never changes.
    /// `created_at` is the timestamp the row was added with.
    pub fn new(
        id: JobId,
        request: GenerationRequest,
        row: RowHandle,
        created_at: DateTime<Utc>,
        backend: Arc<dyn GenerationBackend>,
        ui: Arc<dyn UiBinding>,
    ) -> Self {
        let (report_tx, _) = watch::channel(JobReport::queued());
        Self {
            id,
            request,
            row,
            created_at,
            state: Mutex::new(JobState {
                status: JobStatus::Queued,
                started_at: None,
                elapsed: None,
                error: None,
            }),
            report_tx,
            backend,
            ui,
        }
    }

    /// Job identifier
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Requested modality
    #[must_use]
    pub fn kind(&self) -> Modality {
        self.request.modality()
    }

    /// The UI row this job reports to
    #[must_use]
    pub fn row(&self) -> RowHandle {
        self.row
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Subscribe to status reports
    ///
    /// The channel closes when the job is dropped. A job removed from the queue
    /// before it ran closes without ever reaching a terminal status.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobReport> {
        self.report_tx.subscribe()
    }

    /// Snapshot for queue views
    #[must_use]
    pub fn snapshot(&self) -> JobSummary {
        let state = self.state.lock();
        JobSummary {
            id: self.id,
            kind: self.request.modality(),
            prompt: self.request.prompt().map(str::to_string),
            status: state.status,
            created_at: self.created_at,
            started_at: state.started_at,
            elapsed: state.elapsed,
            error: state.error.clone(),
        }
    }

    /// Run the job to completion
    ///
    /// Never fails: every error, and any panic from the backend, ends in
    /// `Failed`. A job that is not `Queued` is left alone.
    pub async fn run(&self) {
        {
            let mut state = self.state.lock();
            if state.status != JobStatus::Queued {
                warn!(job_id = %self.id, status = %state.status, "Refusing to run job twice");
                return;
            }
            state.status = JobStatus::Running;
            state.started_at = Some(Utc::now());
        }
        let started = Instant::now();
        self.report(JobStatus::Running, None, None, None);
        info!(job_id = %self.id, kind = %self.kind(), "Job started");

        let outcome = AssertUnwindSafe(self.generate())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(&*panic))));
        let elapsed = started.elapsed();

        match outcome {
            Ok(artifact) => {
                self.finish(JobStatus::Finished, elapsed, None);
                info!(
                    job_id = %self.id,
                    kind = %self.kind(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    artifact = %artifact.describe(),
                    "Job finished"
                );
                let artifact = Arc::new(artifact);
                self.ui.show_artifact(self.row, &artifact);
                self.report(JobStatus::Finished, Some(elapsed), None, Some(artifact));
            }
            Err(err) => {
                self.finish(JobStatus::Failed, elapsed, Some(err.to_string()));
                warn!(
                    job_id = %self.id,
                    kind = %self.kind(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    error_kind = err.kind(),
                    "Job failed"
                );
                self.report(JobStatus::Failed, Some(elapsed), Some(err), None);
            }
        }
    }

    /// Validate parameters, optionally enhance the prompt, call the backend
    async fn generate(&self) -> Result<Artifact, JobError> {
        let modality = self.request.modality();
        let mut params = self.request.to_backend_request().await?;

        if let Some(prompt) = self.request.prompt_to_enhance() {
            let enhanced = self.backend.enhance_prompt(prompt).await?;
            if enhanced.trim().is_empty() {
                debug!(job_id = %self.id, "Enhancer returned nothing, keeping original prompt");
            } else {
                debug!(job_id = %self.id, enhanced = %enhanced, "Prompt enhanced");
                params.insert("prompt", enhanced);
            }
        }

        debug!(
            job_id = %self.id,
            backend = self.backend.name(),
            params = params.len(),
            "Calling backend"
        );
        let reply = self.backend.generate(modality, &params).await?;
        Artifact::from_reply(modality, reply)
    }

    fn finish(&self, status: JobStatus, elapsed: Duration, error: Option<String>) {
        let mut state = self.state.lock();
        state.status = status;
        state.elapsed = Some(elapsed);
        state.error = error;
    }

    /// Push a transition to the UI binding and to subscribers
    fn report(
        &self,
        status: JobStatus,
        elapsed: Option<Duration>,
        error: Option<JobError>,
        artifact: Option<Arc<Artifact>>,
    ) {
        let message = error.as_ref().map(ToString::to_string);
        self.ui
            .set_status(self.row, &status_text(status, elapsed, message.as_deref()));
        self.ui.set_color(self.row, status.color());
        self.report_tx.send_replace(JobReport {
            status,
            elapsed,
            error,
            artifact,
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
