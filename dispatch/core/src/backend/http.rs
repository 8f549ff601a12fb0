//! HTTP Backend Implementation
//!
//! Talks to a generation server over plain HTTP + JSON.
//!
//! # Endpoints
//!
//! - `POST /generate/{image,video,audio,text,upscale}` - heavy generation calls
//! - `POST /enhance` - prompt enhancement
//! - `GET /models/{modality}` - available model variants
//! - `GET /health` - liveness
//!
//! Generation endpoints answer with either raw bytes (audio/video) or JSON:
//! a bare list of base64 images, an object carrying `images`/`video`/`audio`/`text`,
//! or a `{status|success, ..., error}` envelope.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::traits::{BackendConfig, BackendReply, BackendRequest, GenerationBackend, ModelVariant};
use crate::error::JobError;
use crate::jobs::Modality;

/// HTTP generation backend
#[derive(Clone)]
pub struct HttpBackend {
    config: BackendConfig,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (TLS backend failure).
    pub fn new(config: BackendConfig) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        // A generation server on this machine is never reached through a proxy
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        let http_client = builder.build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// The configuration this backend was built with
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn generation_url(&self, modality: Modality) -> String {
        format!("{}/generate/{}", self.base_url(), modality.as_str())
    }

    fn enhance_url(&self) -> String {
        format!("{}/enhance", self.base_url())
    }

    fn models_url(&self, modality: Modality) -> String {
        format!("{}/models/{}", self.base_url(), modality.as_str())
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url())
    }

    /// POST a parameter bag to a generation endpoint and interpret the reply
    async fn post_generation(
        &self,
        modality: Modality,
        request: &BackendRequest,
    ) -> Result<BackendReply, JobError> {
        let url = self.generation_url(modality);
        debug!(url = %url, params = request.len(), "Sending generation request");

        let response = self
            .http_client
            .post(&url)
            .timeout(self.config.generation_timeout)
            .json(&request.to_json())
            .send()
            .await?;
        let response = check_status(response).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let body = response.bytes().await?;

        if is_json {
            let value: Value = serde_json::from_slice(&body)
                .map_err(|e| JobError::backend(format!("malformed response: {e}")))?;
            parse_json_reply(&value)
        } else if body.is_empty() {
            Err(JobError::backend("empty response body"))
        } else {
            Ok(BackendReply::Binary(body.to_vec()))
        }
    }

    /// GET a metadata endpoint as JSON
    async fn get_json(&self, url: &str) -> Result<Value, JobError> {
        let response = self
            .http_client
            .get(url)
            .timeout(self.config.metadata_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| JobError::backend(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.health_url())
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn generate_image(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.post_generation(Modality::Image, request).await
    }

    async fn generate_video(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.post_generation(Modality::Video, request).await
    }

    async fn generate_audio(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.post_generation(Modality::Audio, request).await
    }

    async fn generate_text(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.post_generation(Modality::Text, request).await
    }

    async fn upscale(&self, request: &BackendRequest) -> Result<BackendReply, JobError> {
        self.post_generation(Modality::Upscale, request).await
    }

    async fn enhance_prompt(&self, prompt: &str) -> Result<String, JobError> {
        let response = self
            .http_client
            .post(self.enhance_url())
            .timeout(self.config.generation_timeout)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| JobError::backend(format!("malformed response: {e}")))?;

        parse_enhanced_prompt(&value)
    }

    async fn list_models(&self, modality: Modality) -> Result<Vec<ModelVariant>, JobError> {
        let value = self.get_json(&self.models_url(modality)).await?;
        parse_model_list(&value)
    }
}

fn is_loopback(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| host == "localhost" || host.starts_with("127.") || host == "[::1]")
}

/// Turn a non-success status into a backend error carrying the body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, JobError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    Err(JobError::backend_status(status.as_u16(), message))
}

/// Interpret a JSON generation reply
pub(crate) fn parse_json_reply(value: &Value) -> Result<BackendReply, JobError> {
    let obj = match value {
        Value::Array(items) => return decode_images(items).map(BackendReply::Images),
        Value::Object(obj) => obj,
        _ => return Err(JobError::backend("malformed response: expected object or array")),
    };

    if envelope_success(obj) == Some(false) {
        return Err(JobError::backend(envelope_error(obj)));
    }

    if let Some(images) = obj.get("images").and_then(Value::as_array) {
        return decode_images(images).map(BackendReply::Images);
    }
    for key in ["video", "audio"] {
        if let Some(encoded) = obj.get(key).and_then(Value::as_str) {
            return decode_base64(key, encoded).map(BackendReply::Binary);
        }
    }
    if let Some(text) = obj.get("text").and_then(Value::as_str) {
        return Ok(BackendReply::Text(text.to_string()));
    }
    match obj.get("artifact") {
        Some(Value::String(encoded)) => {
            return decode_base64("artifact", encoded).map(BackendReply::Binary)
        }
        Some(Value::Array(items)) => return decode_images(items).map(BackendReply::Images),
        _ => {}
    }

    if envelope_success(obj) == Some(true) {
        Err(JobError::backend("response carried no artifact"))
    } else {
        Err(JobError::backend("malformed response: no recognizable artifact"))
    }
}

/// `Some(ok)` when the object is a status envelope, `None` otherwise
fn envelope_success(obj: &Map<String, Value>) -> Option<bool> {
    if let Some(ok) = obj.get("success").and_then(Value::as_bool) {
        return Some(ok);
    }
    match obj.get("status") {
        Some(Value::Bool(ok)) => Some(*ok),
        Some(Value::String(status)) => Some(matches!(
            status.to_ascii_lowercase().as_str(),
            "success" | "ok" | "completed" | "done"
        )),
        _ => None,
    }
}

fn envelope_error(obj: &Map<String, Value>) -> String {
    ["error", "errorMessage", "error_message", "message"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .unwrap_or("backend reported failure")
        .to_string()
}

fn decode_images(items: &[Value]) -> Result<Vec<Vec<u8>>, JobError> {
    items
        .iter()
        .map(|item| {
            let encoded = item
                .as_str()
                .ok_or_else(|| JobError::backend("malformed response: image is not a string"))?;
            decode_base64("image", encoded)
        })
        .collect()
}

/// Decode base64, tolerating a `data:...;base64,` prefix
fn decode_base64(what: &str, encoded: &str) -> Result<Vec<u8>, JobError> {
    let payload = match encoded.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    BASE64
        .decode(payload.trim())
        .map_err(|e| JobError::backend(format!("malformed response: {what} is not base64 ({e})")))
}

fn parse_enhanced_prompt(value: &Value) -> Result<String, JobError> {
    match value {
        Value::String(prompt) => Ok(prompt.clone()),
        Value::Object(obj) => {
            if envelope_success(obj) == Some(false) {
                return Err(JobError::backend(envelope_error(obj)));
            }
            ["prompt", "text"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .ok_or_else(|| JobError::backend("malformed response: no prompt in reply"))
        }
        _ => Err(JobError::backend("malformed response: expected prompt")),
    }
}

fn parse_model_list(value: &Value) -> Result<Vec<ModelVariant>, JobError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("models")
            .and_then(Value::as_array)
            .ok_or_else(|| JobError::backend("malformed response: no models list"))?,
        _ => return Err(JobError::backend("malformed response: expected models list")),
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(ModelVariant {
                name: name.clone(),
                description: None,
            }),
            Value::Object(obj) => Some(ModelVariant {
                name: obj.get("name")?.as_str()?.to_string(),
                description: obj
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
            }),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn b64(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    #[test]
    fn test_urls() {
        let backend = HttpBackend::new(BackendConfig::new("http://gpu-box:7860/")).unwrap();
        assert_eq!(
            backend.generation_url(Modality::Upscale),
            "http://gpu-box:7860/generate/upscale"
        );
        assert_eq!(backend.models_url(Modality::Image), "http://gpu-box:7860/models/image");
        assert_eq!(backend.enhance_url(), "http://gpu-box:7860/enhance");
        assert_eq!(backend.health_url(), "http://gpu-box:7860/health");
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback("http://127.0.0.1:7860"));
        assert!(is_loopback("http://localhost:7860/"));
        assert!(is_loopback("http://[::1]:7860"));
        assert!(!is_loopback("http://gpu-box:7860"));
        assert!(!is_loopback("not a url"));
    }

    #[test]
    fn test_bare_image_list() {
        let value = json!([b64(b"one"), b64(b"two")]);
        assert_eq!(
            parse_json_reply(&value).unwrap(),
            BackendReply::Images(vec![b"one".to_vec(), b"two".to_vec()])
        );
    }

    #[test]
    fn test_envelope_with_video() {
        let value = json!({ "status": "success", "video": b64(b"mp4data") });
        assert_eq!(
            parse_json_reply(&value).unwrap(),
            BackendReply::Binary(b"mp4data".to_vec())
        );
    }

    #[test]
    fn test_data_url_prefix() {
        let value = json!({ "images": [format!("data:image/png;base64,{}", b64(b"png"))] });
        assert_eq!(
            parse_json_reply(&value).unwrap(),
            BackendReply::Images(vec![b"png".to_vec()])
        );
    }

    #[test]
    fn test_failed_envelope() {
        let value = json!({ "status": "error", "error": "out of memory" });
        assert_eq!(
            parse_json_reply(&value).unwrap_err(),
            JobError::backend("out of memory")
        );

        let value = json!({ "success": false, "errorMessage": "bad seed" });
        assert_eq!(parse_json_reply(&value).unwrap_err(), JobError::backend("bad seed"));
    }

    #[test]
    fn test_success_without_artifact() {
        let value = json!({ "success": true });
        assert_eq!(
            parse_json_reply(&value).unwrap_err(),
            JobError::backend("response carried no artifact")
        );
    }

    #[test]
    fn test_malformed_replies() {
        assert!(parse_json_reply(&json!(42)).is_err());
        assert!(parse_json_reply(&json!({ "unexpected": true })).is_err());
        assert!(parse_json_reply(&json!({ "images": [1, 2] })).is_err());
        assert!(parse_json_reply(&json!({ "video": "!!not base64!!" })).is_err());
    }

    #[test]
    fn test_text_reply() {
        let value = json!({ "status": "ok", "text": "once upon a time" });
        assert_eq!(
            parse_json_reply(&value).unwrap(),
            BackendReply::Text("once upon a time".to_string())
        );
    }

    #[test]
    fn test_enhanced_prompt_shapes() {
        assert_eq!(parse_enhanced_prompt(&json!("richer")).unwrap(), "richer");
        assert_eq!(
            parse_enhanced_prompt(&json!({ "prompt": "richer" })).unwrap(),
            "richer"
        );
        assert!(parse_enhanced_prompt(&json!({ "success": false, "error": "x" })).is_err());
        assert!(parse_enhanced_prompt(&json!([])).is_err());
    }

    #[test]
    fn test_model_list_shapes() {
        let models = parse_model_list(&json!(["sdxl", "flux"])).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "sdxl");

        let models = parse_model_list(&json!({
            "models": [{ "name": "sdxl", "description": "base" }, { "nameless": true }]
        }))
        .unwrap();
        assert_eq!(
            models,
            vec![ModelVariant {
                name: "sdxl".to_string(),
                description: Some("base".to_string()),
            }]
        );

        assert!(parse_model_list(&json!({ "data": [] })).is_err());
    }
}
