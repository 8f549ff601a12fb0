//! Test doubles shared by the dispatch integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use dispatch_core::{
    Artifact, BackendReply, BackendRequest, GenerationBackend, GenerationRequest, ImageParams,
    JobError, JobSummary, Modality, ModelVariant, RowHandle, StatusColor, TextParams, UiBinding,
};

// =============================================================================
// Scripted Backend
// =============================================================================

/// What the backend does for a given prompt
#[derive(Clone, Debug)]
pub enum Script {
    /// Succeed after a delay
    Succeed(Duration),
    /// Fail after a delay
    Fail(Duration, JobError),
    /// Panic inside the adapter
    Panic,
    /// Hold the worker until the gate is opened with `notify_one`
    Gate(Arc<Notify>),
}

/// Backend whose behavior is keyed by prompt; records every call
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<BackendRequest>>,
    enhancement: Mutex<Option<Result<String, JobError>>>,
    enhance_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, prompt: &str, script: Script) {
        self.scripts.lock().insert(prompt.to_string(), script);
    }

    pub fn enhance_with(&self, result: Result<String, JobError>) {
        *self.enhancement.lock() = Some(result);
    }

    /// Prompts in the order `generate_*` was called
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().clone()
    }

    pub fn enhance_calls(&self) -> usize {
        self.enhance_calls.load(Ordering::SeqCst)
    }

    async fn perform(&self, request: &BackendRequest) -> Result<(), JobError> {
        let prompt = request
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().push(prompt.clone());
        self.requests.lock().push(request.clone());

        let script = self.scripts.lock().get(&prompt).cloned();
        match script {
            None => Ok(()),
            Some(Script::Succeed(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(Script::Fail(delay, err)) => {
                tokio::time::sleep(delay).await;
                Err(err)
            }
            Some(Script::Panic) => panic!("adapter bug for {prompt}"),
            Some(Script::Gate(gate)) => {
                gate.notified().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate_image(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.perform(request).await?;
        Ok(BackendReply::Images(vec![b"png".to_vec()]))
    }

    async fn generate_video(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.perform(request).await?;
        Ok(BackendReply::Binary(b"mp4".to_vec()))
    }

    async fn generate_audio(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.perform(request).await?;
        Ok(BackendReply::Binary(b"wav".to_vec()))
    }

    async fn generate_text(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.perform(request).await?;
        Ok(BackendReply::Text("generated".to_string()))
    }

    async fn upscale(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.perform(request).await?;
        Ok(BackendReply::Images(vec![b"big".to_vec()]))
    }

    async fn enhance_prompt(&self, prompt: &str) -> Result<String, JobError> {
        self.enhance_calls.fetch_add(1, Ordering::SeqCst);
        self.enhancement
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(prompt.to_string()))
    }

    async fn list_models(&self, _modality: Modality) -> Result<Vec<ModelVariant>, JobError> {
        Ok(vec![ModelVariant {
            name: "default".to_string(),
            description: None,
        }])
    }
}

// =============================================================================
// Recording UI Binding
// =============================================================================

/// One update seen by the binding
#[derive(Clone, Debug, PartialEq)]
pub enum UiEvent {
    Added(RowHandle, String),
    Status(RowHandle, String),
    Color(RowHandle, StatusColor),
    Artifact(RowHandle, String),
    Removed(RowHandle),
}

/// Binding that records every call in order
#[derive(Default)]
pub struct RecordingBinding {
    next_row: AtomicU64,
    events: Mutex<Vec<UiEvent>>,
    added: Mutex<Vec<JobSummary>>,
}

impl RecordingBinding {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    /// Status texts shown for one row, starting with the row's initial status
    pub fn statuses(&self, row: RowHandle) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Added(r, status) | UiEvent::Status(r, status) if *r == row => {
                    Some(status.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Rows in the order their job started running
    pub fn running_order(&self) -> Vec<RowHandle> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Status(row, text) if text == "Running" => Some(*row),
                _ => None,
            })
            .collect()
    }

    /// Summaries handed to `add_row`, in submission order
    pub fn added(&self) -> Vec<JobSummary> {
        self.added.lock().clone()
    }

    pub fn rows(&self) -> Vec<RowHandle> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Added(row, _) => Some(*row),
                _ => None,
            })
            .collect()
    }
}

impl UiBinding for RecordingBinding {
    fn set_status(&self, row: RowHandle, text: &str) {
        self.events.lock().push(UiEvent::Status(row, text.to_string()));
    }

    fn set_color(&self, row: RowHandle, color: StatusColor) {
        self.events.lock().push(UiEvent::Color(row, color));
    }

    fn show_artifact(&self, row: RowHandle, artifact: &Arc<Artifact>) {
        self.events
            .lock()
            .push(UiEvent::Artifact(row, artifact.describe()));
    }

    fn add_row(&self, job: &JobSummary) -> RowHandle {
        let row = RowHandle::new(self.next_row.fetch_add(1, Ordering::SeqCst));
        self.events
            .lock()
            .push(UiEvent::Added(row, job.status.label().to_string()));
        self.added.lock().push(job.clone());
        row
    }

    fn remove_row(&self, row: RowHandle) {
        self.events.lock().push(UiEvent::Removed(row));
    }
}

// =============================================================================
// Request Builders
// =============================================================================

pub fn text(prompt: &str) -> GenerationRequest {
    GenerationRequest::Text(TextParams {
        prompt: prompt.to_string(),
        ..Default::default()
    })
}

pub fn image(prompt: &str) -> GenerationRequest {
    GenerationRequest::Image(ImageParams {
        prompt: prompt.to_string(),
        ..Default::default()
    })
}

/// First word of a status line ("Finished in 2.0s" -> "Finished")
pub fn label(status: &str) -> &str {
    status.split_whitespace().next().unwrap_or_default()
}
