//! Job Failure Taxonomy
//!
//! Every way a generation job can fail. These errors never escape a job:
//! [`Job::run`](crate::jobs::Job::run) catches them, marks the job `Failed`
//! and reports the message through the UI binding.

use std::path::PathBuf;

use thiserror::Error;

/// Why a job failed
#[derive(Clone, Debug, Error, PartialEq)]
pub enum JobError {
    /// Backend unreachable: connection refused, timed out, or the request never completed
    #[error("network error: {0}")]
    Network(String),

    /// Backend reachable but reported failure (non-2xx status or a failed envelope)
    #[error("backend error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend {
        /// HTTP status, when the failure came with one
        status: Option<u16>,
        /// What the backend said
        message: String,
    },

    /// A local input could not be prepared before sending
    #[error("could not read {}: {message}", .path.display())]
    LocalResource {
        /// The file that could not be prepared
        path: PathBuf,
        /// Underlying I/O error text
        message: String,
    },

    /// A user-supplied field could not be parsed to its declared type
    #[error("invalid {field}: {value:?} is not a valid {expected}")]
    Validation {
        /// Field name as it appears in the parameter bag
        field: String,
        /// The raw input
        value: String,
        /// Declared type ("integer", "number", "base64")
        expected: &'static str,
    },

    /// The backend adapter panicked while the job was running
    #[error("generation panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Backend failure without an HTTP status
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Backend failure with an HTTP status
    pub fn backend_status(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Short category name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Backend { .. } => "backend",
            Self::LocalResource { .. } => "local_resource",
            Self::Validation { .. } => "validation",
            Self::Panicked(_) => "panicked",
        }
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else if let Some(status) = err.status() {
            Self::backend_status(status.as_u16(), err.to_string())
        } else {
            Self::backend(err.to_string())
        }
    }
}
