//! Generated artifacts
//!
//! What a finished job hands to the UI binding. The backend reply is loosely typed
//! (bytes, images or text); each modality expects exactly one shape.

use crate::backend::BackendReply;
use crate::error::JobError;
use crate::jobs::Modality;

/// The result of a successful job
#[derive(Clone, Debug, PartialEq)]
pub enum Artifact {
    /// One or more encoded images (PNG from most backends)
    Images(Vec<Vec<u8>>),
    /// A single encoded video clip
    Video(Vec<u8>),
    /// A single encoded audio clip
    Audio(Vec<u8>),
    /// Generated text
    Text(String),
}

impl Artifact {
    /// Map a backend reply to the artifact its modality expects
    ///
    /// # Errors
    ///
    /// `Backend` when the reply has the wrong shape or is empty.
    pub fn from_reply(modality: Modality, reply: BackendReply) -> Result<Self, JobError> {
        let artifact = match (modality, reply) {
            (Modality::Image | Modality::Upscale, BackendReply::Images(images)) => {
                Self::Images(images)
            }
            (Modality::Image | Modality::Upscale, BackendReply::Binary(bytes)) => {
                Self::Images(vec![bytes])
            }
            (Modality::Video, BackendReply::Binary(bytes)) => Self::Video(bytes),
            (Modality::Audio, BackendReply::Binary(bytes)) => Self::Audio(bytes),
            (Modality::Text, BackendReply::Text(text)) => Self::Text(text),
            (modality, reply) => {
                return Err(JobError::backend(format!(
                    "unexpected {} reply for {modality} job",
                    reply.describe()
                )))
            }
        };

        if artifact.is_empty() {
            return Err(JobError::backend(format!("empty {modality} artifact")));
        }
        Ok(artifact)
    }

    /// Whether there is nothing to show
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Images(images) => images.is_empty() || images.iter().all(Vec::is_empty),
            Self::Video(bytes) | Self::Audio(bytes) => bytes.is_empty(),
            Self::Text(_) => false,
        }
    }

    /// File extension for saving each part
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Images(_) => "png",
            Self::Video(_) => "mp4",
            Self::Audio(_) => "wav",
            Self::Text(_) => "txt",
        }
    }

    /// The individual payloads, one per output file
    #[must_use]
    pub fn parts(&self) -> Vec<&[u8]> {
        match self {
            Self::Images(images) => images.iter().map(Vec::as_slice).collect(),
            Self::Video(bytes) | Self::Audio(bytes) => vec![bytes.as_slice()],
            Self::Text(text) => vec![text.as_bytes()],
        }
    }

    /// Short description for status lines and logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Images(images) => format!("{} image(s)", images.len()),
            Self::Video(bytes) => format!("video, {} bytes", bytes.len()),
            Self::Audio(bytes) => format!("audio, {} bytes", bytes.len()),
            Self::Text(text) => format!("{} chars of text", text.chars().count()),
        }
    }
}
