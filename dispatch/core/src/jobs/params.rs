//! Generation Parameters
//!
//! One parameter struct per modality, joined in the [`GenerationRequest`] tagged union.
//! Numeric fields arrive as free-form text ([`FieldInput`]) and are only parsed when
//! the job turns them into a [`BackendRequest`], right before the backend call.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::backend::BackendRequest;
use crate::error::JobError;

/// The kind of generation a job requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text-to-image / image-to-image
    Image,
    /// Text-to-video
    Video,
    /// Text-to-audio
    Audio,
    /// Text generation
    Text,
    /// Image upscaling
    Upscale,
}

impl Modality {
    /// Every modality, in display order
    pub const ALL: [Self; 5] = [
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::Text,
        Self::Upscale,
    ];

    /// Lowercase name, also used as the endpoint path segment
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Upscale => "upscale",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("unknown modality: {s}"))
    }
}

/// A numeric field as the user typed it
///
/// Empty means "let the backend decide". Accepts JSON strings or numbers so
/// request files can be written either way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawField", into = "String")]
pub struct FieldInput(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawField {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawField> for FieldInput {
    fn from(raw: RawField) -> Self {
        match raw {
            RawField::Text(text) => Self(text),
            RawField::Int(n) => Self(n.to_string()),
            RawField::Float(x) => Self(x.to_string()),
        }
    }
}

impl From<FieldInput> for String {
    fn from(field: FieldInput) -> Self {
        field.0
    }
}

impl From<&str> for FieldInput {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl FieldInput {
    /// The raw text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the field was left blank
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parse as an integer; blank yields `None`
    pub fn parse_int(&self, field: &str) -> Result<Option<i64>, JobError> {
        self.parse_as(field, "integer")
    }

    /// Parse as a float; blank yields `None`
    pub fn parse_float(&self, field: &str) -> Result<Option<f64>, JobError> {
        self.parse_as(field, "number")
    }

    fn parse_as<T: FromStr>(
        &self,
        field: &str,
        expected: &'static str,
    ) -> Result<Option<T>, JobError> {
        if self.is_blank() {
            return Ok(None);
        }
        self.0
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| JobError::Validation {
                field: field.to_string(),
                value: self.0.clone(),
                expected,
            })
    }
}

/// A binary input (init image, image to upscale)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    /// Read from disk when the job runs
    File(PathBuf),
    /// Already base64-encoded
    Base64(String),
}

impl Attachment {
    /// Produce the base64 text that goes on the wire
    pub async fn encode(&self, field: &str) -> Result<String, JobError> {
        match self {
            Self::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| JobError::LocalResource {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                Ok(BASE64.encode(bytes))
            }
            Self::Base64(encoded) => {
                let trimmed = encoded.trim();
                BASE64
                    .decode(trimmed)
                    .map_err(|_| JobError::Validation {
                        field: field.to_string(),
                        value: abbreviate(trimmed),
                        expected: "base64",
                    })?;
                Ok(trimmed.to_string())
            }
        }
    }
}

/// Keep error messages readable when the offending value is a huge blob
fn abbreviate(value: &str) -> String {
    const MAX: usize = 32;
    match value.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}

/// Image generation parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageParams {
    /// What to generate
    pub prompt: String,
    /// What to steer away from
    pub negative_prompt: String,
    /// Model variant; blank for the backend default
    pub model: String,
    /// Output width in pixels
    pub width: FieldInput,
    /// Output height in pixels
    pub height: FieldInput,
    /// Sampling steps
    pub steps: FieldInput,
    /// Classifier-free guidance scale
    pub guidance: FieldInput,
    /// RNG seed
    pub seed: FieldInput,
    /// Starting image for image-to-image
    pub init_image: Option<Attachment>,
    /// Rewrite the prompt through the backend first
    pub enhance_prompt: bool,
}

/// Video generation parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    /// What to generate
    pub prompt: String,
    /// What to steer away from
    pub negative_prompt: String,
    /// Model variant; blank for the backend default
    pub model: String,
    /// Number of frames
    pub frames: FieldInput,
    /// Frames per second
    pub fps: FieldInput,
    /// Sampling steps
    pub steps: FieldInput,
    /// RNG seed
    pub seed: FieldInput,
    /// Starting image for image-to-image
    pub init_image: Option<Attachment>,
    /// Rewrite the prompt through the backend first
    pub enhance_prompt: bool,
}

/// Audio generation parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioParams {
    /// What to generate
    pub prompt: String,
    /// Model variant; blank for the backend default
    pub model: String,
    /// Clip length in seconds
    pub duration: FieldInput,
    /// Sampling steps
    pub steps: FieldInput,
    /// RNG seed
    pub seed: FieldInput,
}

/// Text generation parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextParams {
    /// What to generate
    pub prompt: String,
    /// System instructions
    pub system_prompt: String,
    /// Model variant; blank for the backend default
    pub model: String,
    /// Token limit
    pub max_tokens: FieldInput,
    /// Sampling temperature
    pub temperature: FieldInput,
    /// Rewrite the prompt through the backend first
    pub enhance_prompt: bool,
}

/// Upscale parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpscaleParams {
    /// Image to upscale
    pub image: Attachment,
    /// Model variant; blank for the backend default
    #[serde(default)]
    pub model: String,
    /// Upscale factor
    #[serde(default)]
    pub scale: FieldInput,
    /// Denoising strength, 0 to 1
    #[serde(default)]
    pub denoise_strength: FieldInput,
}

/// A generation request, tagged by modality
///
/// ```json
/// {"kind": "image", "prompt": "a lighthouse at dusk", "steps": "30", "seed": 7}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GenerationRequest {
    /// Image generation
    Image(ImageParams),
    /// Video generation
    Video(VideoParams),
    /// Audio generation
    Audio(AudioParams),
    /// Text generation
    Text(TextParams),
    /// Image upscaling
    Upscale(UpscaleParams),
}

impl GenerationRequest {
    /// Which backend operation serves this request
    #[must_use]
    pub fn modality(&self) -> Modality {
        match self {
            Self::Image(_) => Modality::Image,
            Self::Video(_) => Modality::Video,
            Self::Audio(_) => Modality::Audio,
            Self::Text(_) => Modality::Text,
            Self::Upscale(_) => Modality::Upscale,
        }
    }

    /// The user's prompt, if the modality has one
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        match self {
            Self::Image(p) => Some(&p.prompt),
            Self::Video(p) => Some(&p.prompt),
            Self::Audio(p) => Some(&p.prompt),
            Self::Text(p) => Some(&p.prompt),
            Self::Upscale(_) => None,
        }
    }

    /// The prompt to send for enhancement, when the user asked for it
    #[must_use]
    pub fn prompt_to_enhance(&self) -> Option<&str> {
        let (prompt, wanted) = match self {
            Self::Image(p) => (&p.prompt, p.enhance_prompt),
            Self::Video(p) => (&p.prompt, p.enhance_prompt),
            Self::Text(p) => (&p.prompt, p.enhance_prompt),
            Self::Audio(_) | Self::Upscale(_) => return None,
        };
        (wanted && !prompt.trim().is_empty()).then_some(prompt.as_str())
    }

    /// Validate the free-form fields and build the outgoing parameter bag
    ///
    /// # Errors
    ///
    /// `Validation` for unparseable numbers or bad inline base64,
    /// `LocalResource` for attachments that cannot be read.
    pub async fn to_backend_request(&self) -> Result<BackendRequest, JobError> {
        let mut bag = BackendRequest::new();
        match self {
            Self::Image(p) => {
                bag.insert_text("prompt", &p.prompt);
                bag.insert_text("negative_prompt", &p.negative_prompt);
                bag.insert_text("model", &p.model);
                put_int(&mut bag, "width", &p.width)?;
                put_int(&mut bag, "height", &p.height)?;
                put_int(&mut bag, "steps", &p.steps)?;
                put_float(&mut bag, "guidance", &p.guidance)?;
                put_int(&mut bag, "seed", &p.seed)?;
                put_attachment(&mut bag, "init_image", p.init_image.as_ref()).await?;
            }
            Self::Video(p) => {
                bag.insert_text("prompt", &p.prompt);
                bag.insert_text("negative_prompt", &p.negative_prompt);
                bag.insert_text("model", &p.model);
                put_int(&mut bag, "frames", &p.frames)?;
                put_int(&mut bag, "fps", &p.fps)?;
                put_int(&mut bag, "steps", &p.steps)?;
                put_int(&mut bag, "seed", &p.seed)?;
                put_attachment(&mut bag, "init_image", p.init_image.as_ref()).await?;
            }
            Self::Audio(p) => {
                bag.insert_text("prompt", &p.prompt);
                bag.insert_text("model", &p.model);
                put_float(&mut bag, "duration", &p.duration)?;
                put_int(&mut bag, "steps", &p.steps)?;
                put_int(&mut bag, "seed", &p.seed)?;
            }
            Self::Text(p) => {
                bag.insert_text("prompt", &p.prompt);
                bag.insert_text("system_prompt", &p.system_prompt);
                bag.insert_text("model", &p.model);
                put_int(&mut bag, "max_tokens", &p.max_tokens)?;
                put_float(&mut bag, "temperature", &p.temperature)?;
            }
            Self::Upscale(p) => {
                bag.insert_text("model", &p.model);
                put_float(&mut bag, "scale", &p.scale)?;
                put_float(&mut bag, "denoise_strength", &p.denoise_strength)?;
                put_attachment(&mut bag, "image", Some(&p.image)).await?;
            }
        }
        Ok(bag)
    }
}

fn put_int(bag: &mut BackendRequest, name: &str, input: &FieldInput) -> Result<(), JobError> {
    bag.insert_opt(name, input.parse_int(name)?);
    Ok(())
}

fn put_float(bag: &mut BackendRequest, name: &str, input: &FieldInput) -> Result<(), JobError> {
    bag.insert_opt(name, input.parse_float(name)?);
    Ok(())
}

async fn put_attachment(
    bag: &mut BackendRequest,
    name: &str,
    attachment: Option<&Attachment>,
) -> Result<(), JobError> {
    if let Some(attachment) = attachment {
        bag.insert(name, attachment.encode(name).await?);
    }
    Ok(())
}
