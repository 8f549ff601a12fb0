//! Shared fixtures for unit tests

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{BackendReply, BackendRequest, GenerationBackend, ModelVariant};
use crate::error::JobError;
use crate::jobs::{GenerationRequest, Job, JobId, JobStatus, JobSummary, Modality, TextParams};
use crate::ui::UiBinding;

/// Backend that answers every call immediately
pub struct NullBackend;

#[async_trait]
impl GenerationBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate_image(&self, _: &BackendRequest) -> Result<BackendReply, JobError> {
        Ok(BackendReply::Images(vec![vec![0x89, b'P', b'N', b'G']]))
    }

    async fn generate_video(&self, _: &BackendRequest) -> Result<BackendReply, JobError> {
        Ok(BackendReply::Binary(vec![0; 16]))
    }

    async fn generate_audio(&self, _: &BackendRequest) -> Result<BackendReply, JobError> {
        Ok(BackendReply::Binary(vec![0; 16]))
    }

    async fn generate_text(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        let prompt = request
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(BackendReply::Text(format!("echo: {prompt}")))
    }

    async fn upscale(&self, _: &BackendRequest) -> Result<BackendReply, JobError> {
        Ok(BackendReply::Images(vec![vec![1, 2, 3]]))
    }

    async fn enhance_prompt(&self, prompt: &str) -> Result<String, JobError> {
        Ok(format!("{prompt}, highly detailed"))
    }

    async fn list_models(&self, _: Modality) -> Result<Vec<ModelVariant>, JobError> {
        Ok(Vec::new())
    }
}

/// A queued text job with a fresh id
pub fn job(backend: Arc<dyn GenerationBackend>, ui: Arc<dyn UiBinding>) -> Job {
    let request = GenerationRequest::Text(TextParams {
        prompt: "hello".to_string(),
        ..Default::default()
    });
    let id = JobId::generate();
    let summary = summary_for(id, &request);
    let row = ui.add_row(&summary);
    Job::new(id, request, row, summary.created_at, backend, ui)
}

fn summary_for(id: JobId, request: &GenerationRequest) -> JobSummary {
    JobSummary {
        id,
        kind: request.modality(),
        prompt: request.prompt().map(str::to_string),
        status: JobStatus::Queued,
        created_at: chrono::Utc::now(),
        started_at: None,
        elapsed: None,
        error: None,
    }
}
