//! Dispatch Core - Serial Job Queue for Generative-Media Backends
//!
//! Accepts heterogeneous generation jobs (image, video, audio, text, upscale)
//! from any number of producers and runs them one at a time against a single
//! remote inference backend, while UI surfaces keep working and show live status.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Producers                                │
//! │   UI forms, CLI, batch files ── submit(GenerationRequest)        │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                         DISPATCH CORE                            │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                        Dispatcher                           │  │
//! │  │  ┌──────────────────┐   wake   ┌────────────────────────┐  │  │
//! │  │  │ QueueController  │ ───────> │  Worker (one task)     │  │  │
//! │  │  │ FIFO + signal    │ <─────── │  dequeue, job.run()    │  │  │
//! │  │  └──────────────────┘  head    └───────────┬────────────┘  │  │
//! │  └────────────────────────────────────────────┼───────────────┘  │
//! │                                               │                  │
//! │                 ┌─────────────────────────────┼──────────┐       │
//! │                 ▼                             ▼          │       │
//! │       ┌──────────────────┐          ┌──────────────────┐ │       │
//! │       │ GenerationBackend│          │    UiBinding     │ │       │
//! │       │ (HTTP)           │          │ (channel / logs) │ │       │
//! │       └──────────────────┘          └──────────────────┘ │       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - Jobs run in submission order, one at a time
//! - A job runs at most once; a job removed before it starts never runs
//! - A failing or panicking job is marked `Failed` and the next job still runs
//! - Status moves strictly forward: `Queued`, `Running`, then `Finished` or `Failed`
//! - An idle worker is parked on the wake signal
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use dispatch_core::{
//!     BackendConfig, Dispatcher, GenerationRequest, HttpBackend, ImageParams, TracingBinding,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = HttpBackend::new(BackendConfig::new("http://127.0.0.1:7860"))?;
//!     let dispatcher = Dispatcher::start(Arc::new(backend), Arc::new(TracingBinding::new()));
//!
//!     let mut ticket = dispatcher.submit(GenerationRequest::Image(ImageParams {
//!         prompt: "a lighthouse at dusk".into(),
//!         steps: "30".into(),
//!         ..Default::default()
//!     }));
//!
//!     println!("{:?}", ticket.wait().await);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Generation backend abstraction (HTTP, etc.)
//! - [`config`]: TOML/env/CLI configuration
//! - [`dispatcher`]: The controller producers talk to
//! - [`error`]: Job failure taxonomy
//! - [`jobs`]: Jobs, parameters and artifacts
//! - [`queue`]: Pending-job queue and wake signal
//! - [`ui`]: UI binding seam and adapters
//! - [`worker`]: The single worker task
//!
//! # No UI Dependencies
//!
//! This crate does not depend on any UI toolkit. UI surfaces implement
//! [`UiBinding`] or drain [`UiMessage`]s from a [`ChannelBinding`]'s [`UiReceiver`].

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod ui;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use backend::{
    BackendConfig, BackendReply, BackendRequest, GenerationBackend, HttpBackend, ModelVariant,
};
pub use dispatcher::{Dispatcher, JobTicket};
pub use error::JobError;
pub use jobs::{
    Artifact, Attachment, AudioParams, FieldInput, GenerationRequest, ImageParams, Job, JobId,
    JobReport, JobStatus, JobSummary, Modality, TextParams, UpscaleParams, VideoParams,
};
pub use queue::QueueController;
pub use ui::{
    format_elapsed, status_text, ChannelBinding, RowHandle, StatusColor, TracingBinding,
    UiBinding, UiMessage, UiReceiver,
};
pub use worker::{WorkerHandle, WorkerStats};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DispatchConfig, DispatchToml,
};
