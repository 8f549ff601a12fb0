//! Generation Backend Traits
//!
//! Trait definitions for the remote inference backend. Jobs only ever talk to
//! a [`GenerationBackend`]; the HTTP adapter is one implementation, test doubles
//! are another.
//!
//! # Contract
//!
//! - One async operation per modality, each taking a parameter bag and
//!   returning a [`BackendReply`] or a [`JobError`]
//! - Heavy generation calls may take up to an hour; metadata calls are short
//! - Failures are returned, not panicked; the job layer still guards against panics

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::JobError;
use crate::jobs::Modality;

/// Parameter bag sent to the backend
///
/// A flat JSON object of optional named parameters. Binary attachments are
/// already base64-encoded by the time they land here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendRequest {
    params: Map<String, Value>,
}

impl BackendRequest {
    /// Create an empty request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under `name`, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    /// Insert a text field; empty or whitespace-only text is left out so the
    /// backend applies its own default
    pub fn insert_text(&mut self, name: impl Into<String>, text: &str) {
        if !text.trim().is_empty() {
            self.params
                .insert(name.into(), Value::String(text.to_string()));
        }
    }

    /// Insert a value only when present
    pub fn insert_opt<V: Into<Value>>(&mut self, name: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.params.insert(name.into(), value.into());
        }
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a parameter
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Whether a parameter is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the bag is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// JSON body for the wire
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

/// What a successful backend call produced
#[derive(Clone, Debug, PartialEq)]
pub enum BackendReply {
    /// Raw bytes (audio and video endpoints)
    Binary(Vec<u8>),
    /// Decoded images
    Images(Vec<Vec<u8>>),
    /// Generated text
    Text(String),
}

impl BackendReply {
    /// Short description for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Binary(bytes) => format!("{} bytes", bytes.len()),
            Self::Images(images) => format!("{} image(s)", images.len()),
            Self::Text(text) => format!("{} chars of text", text.chars().count()),
        }
    }
}

/// A model variant the backend can serve for some modality
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelVariant {
    /// Model identifier, passed back as the `model` parameter
    pub name: String,
    /// Human-readable description
    pub description: Option<String>,
}

/// Generation backend trait
///
/// Implement this to point the dispatch engine at a different inference service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logs (e.g., "HTTP")
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Text-to-image (or image-to-image when an init image is attached)
    async fn generate_image(&self, request: &BackendRequest) -> Result<BackendReply, JobError>;

    /// Text-to-video
    async fn generate_video(&self, request: &BackendRequest) -> Result<BackendReply, JobError>;

    /// Text-to-audio
    async fn generate_audio(&self, request: &BackendRequest) -> Result<BackendReply, JobError>;

    /// Text generation
    async fn generate_text(&self, request: &BackendRequest) -> Result<BackendReply, JobError>;

    /// Image upscaling
    async fn upscale(&self, request: &BackendRequest) -> Result<BackendReply, JobError>;

    /// Rewrite a prompt into a richer one
    async fn enhance_prompt(&self, prompt: &str) -> Result<String, JobError>;

    /// List the model variants available for a modality
    async fn list_models(&self, modality: Modality) -> Result<Vec<ModelVariant>, JobError>;

    /// Route a request to the operation for its modality
    async fn generate(
        &self,
        modality: Modality,
        request: &BackendRequest,
    ) -> Result<BackendReply, JobError> {
        match modality {
            Modality::Image => self.generate_image(request).await,
            Modality::Video => self.generate_video(request).await,
            Modality::Audio => self.generate_audio(request).await,
            Modality::Text => self.generate_text(request).await,
            Modality::Upscale => self.upscale(request).await,
        }
    }

    /// Check if a model variant exists for a modality
    async fn has_model(&self, modality: Modality, model: &str) -> Result<bool, JobError> {
        let models = self.list_models(modality).await?;
        Ok(models.iter().any(|m| m.name == model))
    }
}

/// Backend connection configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://127.0.0.1:7860`
    pub base_url: String,
    /// Timeout for generation calls
    pub generation_timeout: Duration,
    /// Timeout for listing/metadata calls
    pub metadata_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            generation_timeout: Duration::from_secs(3600),
            metadata_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Configuration for a base URL with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the generation timeout
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Set the metadata timeout
    #[must_use]
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_text_skips_blank() {
        let mut request = BackendRequest::new();
        request.insert_text("prompt", "a red fox");
        request.insert_text("negative_prompt", "");
        request.insert_text("model", "   ");

        assert_eq!(request.len(), 1);
        assert_eq!(request.get("prompt"), Some(&json!("a red fox")));
        assert!(!request.contains("negative_prompt"));
        assert!(!request.contains("model"));
    }

    #[test]
    fn test_insert_opt() {
        let mut request = BackendRequest::new();
        request.insert_opt("seed", Some(42_i64));
        request.insert_opt::<i64>("steps", None);

        assert_eq!(request.to_json(), json!({ "seed": 42 }));
    }

    #[test]
    fn test_reply_describe() {
        assert_eq!(BackendReply::Binary(vec![0; 10]).describe(), "10 bytes");
        assert_eq!(
            BackendReply::Images(vec![vec![1], vec![2]]).describe(),
            "2 image(s)"
        );
        assert_eq!(BackendReply::Text("hello".into()).describe(), "5 chars of text");
    }

    #[test]
    fn test_backend_config_default() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:7860");
        assert_eq!(config.generation_timeout, Duration::from_secs(3600));
        assert_eq!(config.metadata_timeout, Duration::from_secs(30));
    }
}
