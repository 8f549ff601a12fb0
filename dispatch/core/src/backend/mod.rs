//! Generation Backend Integration
//!
//! Abstracted access to the remote inference service through a common trait.
//!
//! # Available Backends
//!
//! - **HTTP**: JSON-over-HTTP generation server (default)
//!
//! # Usage
//!
//! ```ignore
//! use dispatch_core::backend::{BackendConfig, BackendRequest, GenerationBackend, HttpBackend};
//!
//! let backend = HttpBackend::new(BackendConfig::new("http://127.0.0.1:7860"))?;
//! let request = BackendRequest::new().with("prompt", "a lighthouse at dusk");
//! let reply = backend.generate_image(&request).await?;
//! ```

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{BackendConfig, BackendReply, BackendRequest, GenerationBackend, ModelVariant};
