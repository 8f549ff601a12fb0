//! UI Binding
//!
//! The seam between jobs and whatever displays them. Jobs only hold an opaque
//! [`RowHandle`]; the UI owns its rows. Updates are pushed, never pulled, so a
//! UI thread can drain them at its own pace.
//!
//! # Adapters
//!
//! - [`ChannelBinding`]: posts [`UiMessage`]s to a [`UiReceiver`] on a UI thread
//! - [`TracingBinding`]: headless, renders every update as a log event

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::jobs::{Artifact, JobStatus, JobSummary};

/// Opaque reference to a row in the queue view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowHandle(u64);

impl RowHandle {
    /// Wrap a raw row id (for bindings that manage their own ids)
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw row id
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

/// Status colors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusColor {
    /// Waiting
    Gray,
    /// In progress
    Yellow,
    /// Succeeded
    Green,
    /// Failed
    Red,
}

/// Display surface for jobs
///
/// Called from the worker task, so implementations must not block.
pub trait UiBinding: Send + Sync {
    /// Replace the row's status text
    fn set_status(&self, row: RowHandle, text: &str);

    /// Replace the row's status color
    fn set_color(&self, row: RowHandle, color: StatusColor);

    /// Display a finished job's artifact
    fn show_artifact(&self, row: RowHandle, artifact: &Arc<Artifact>);

    /// Create a row for a newly submitted job
    fn add_row(&self, job: &JobSummary) -> RowHandle;

    /// Remove a row from the queue view
    fn remove_row(&self, row: RowHandle);
}

/// Updates posted by [`ChannelBinding`]
#[derive(Clone, Debug)]
pub enum UiMessage {
    /// A job was submitted
    RowAdded {
        /// The new row
        row: RowHandle,
        /// The job as submitted
        job: JobSummary,
    },
    /// Status text changed
    Status {
        /// Target row
        row: RowHandle,
        /// New status text
        text: String,
    },
    /// Status color changed
    Color {
        /// Target row
        row: RowHandle,
        /// New color
        color: StatusColor,
    },
    /// A job produced an artifact
    Artifact {
        /// Target row
        row: RowHandle,
        /// The artifact
        artifact: Arc<Artifact>,
    },
    /// A row was removed
    RowRemoved {
        /// The removed row
        row: RowHandle,
    },
}

/// Binding that posts updates to a UI thread over a channel
///
/// Never blocks the worker and never loses a row's latest state. Row lifecycle
/// messages (added, artifact, removed) are delivered in order. Status and color
/// updates are coalesced per row: a UI that falls behind skips intermediate
/// states but always sees the most recent one, so every row reaches its
/// terminal status. Memory stays bounded by the number of rows with an
/// undelivered update.
pub struct ChannelBinding {
    tx: mpsc::UnboundedSender<Envelope>,
    pending: Arc<Mutex<HashMap<RowHandle, RowUpdate>>>,
    next_row: AtomicU64,
    dropped: AtomicU64,
}

/// Latest undelivered status and color of one row
#[derive(Debug, Default)]
struct RowUpdate {
    text: Option<String>,
    color: Option<StatusColor>,
}

/// What travels on the channel; `Dirty` points the receiver at `pending`
#[derive(Debug)]
enum Envelope {
    Message(UiMessage),
    Dirty(RowHandle),
}

impl ChannelBinding {
    /// Create a binding and the receiver the UI thread drains
    #[must_use]
    pub fn new() -> (Self, UiReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashMap::new()));
        (
            Self {
                tx,
                pending: Arc::clone(&pending),
                next_row: AtomicU64::new(1),
                dropped: AtomicU64::new(0),
            },
            UiReceiver {
                rx,
                pending,
                ready: VecDeque::new(),
            },
        )
    }

    /// Number of updates lost because the receiver was dropped
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn post(&self, message: UiMessage) {
        if self.tx.send(Envelope::Message(message)).is_err() {
            self.count_dropped();
        }
    }

    /// Fold an update into the row's pending state, announcing the row once
    fn update_row(&self, row: RowHandle, apply: impl FnOnce(&mut RowUpdate)) {
        let mut pending = self.pending.lock();
        let announce = !pending.contains_key(&row);
        apply(pending.entry(row).or_default());
        if announce && self.tx.send(Envelope::Dirty(row)).is_err() {
            pending.remove(&row);
            drop(pending);
            self.count_dropped();
        }
    }

    fn count_dropped(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(dropped, "UI receiver closed, update dropped");
    }
}

impl UiBinding for ChannelBinding {
    fn set_status(&self, row: RowHandle, text: &str) {
        self.update_row(row, |update| update.text = Some(text.to_string()));
    }

    fn set_color(&self, row: RowHandle, color: StatusColor) {
        self.update_row(row, |update| update.color = Some(color));
    }

    fn show_artifact(&self, row: RowHandle, artifact: &Arc<Artifact>) {
        self.post(UiMessage::Artifact {
            row,
            artifact: Arc::clone(artifact),
        });
    }

    fn add_row(&self, job: &JobSummary) -> RowHandle {
        let row = RowHandle(self.next_row.fetch_add(1, Ordering::Relaxed));
        self.post(UiMessage::RowAdded {
            row,
            job: job.clone(),
        });
        row
    }

    fn remove_row(&self, row: RowHandle) {
        self.post(UiMessage::RowRemoved { row });
    }
}

/// Receiving end of a [`ChannelBinding`], owned by the UI thread
pub struct UiReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
    pending: Arc<Mutex<HashMap<RowHandle, RowUpdate>>>,
    ready: VecDeque<UiMessage>,
}

impl UiReceiver {
    /// Wait for the next update
    ///
    /// `None` once the binding is dropped and everything has been delivered.
    pub async fn recv(&mut self) -> Option<UiMessage> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Some(message);
            }
            let envelope = self.rx.recv().await?;
            self.unpack(envelope);
        }
    }

    /// Next update if one is ready, without waiting
    pub fn try_recv(&mut self) -> Option<UiMessage> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Some(message);
            }
            let envelope = self.rx.try_recv().ok()?;
            self.unpack(envelope);
        }
    }

    /// Everything ready right now, in order
    pub fn drain(&mut self) -> Vec<UiMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    fn unpack(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Message(message) => self.ready.push_back(message),
            Envelope::Dirty(row) => {
                let update = self.pending.lock().remove(&row);
                if let Some(update) = update {
                    if let Some(text) = update.text {
                        self.ready.push_back(UiMessage::Status { row, text });
                    }
                    if let Some(color) = update.color {
                        self.ready.push_back(UiMessage::Color { row, color });
                    }
                }
            }
        }
    }
}

/// Headless binding that logs every update
#[derive(Debug, Default)]
pub struct TracingBinding {
    next_row: AtomicU64,
}

impl TracingBinding {
    /// Create a new tracing binding
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UiBinding for TracingBinding {
    fn set_status(&self, row: RowHandle, text: &str) {
        info!(%row, status = text, "Job status");
    }

    fn set_color(&self, row: RowHandle, color: StatusColor) {
        debug!(%row, ?color, "Job color");
    }

    fn show_artifact(&self, row: RowHandle, artifact: &Arc<Artifact>) {
        info!(%row, artifact = %artifact.describe(), "Job artifact ready");
    }

    fn add_row(&self, job: &JobSummary) -> RowHandle {
        let row = RowHandle(self.next_row.fetch_add(1, Ordering::Relaxed) + 1);
        info!(%row, job_id = %job.id, kind = %job.kind, "Job queued");
        row
    }

    fn remove_row(&self, row: RowHandle) {
        info!(%row, "Job removed");
    }
}

/// Status line for a job row
///
/// `"Queued"`, `"Running"`, `"Finished in 12.3s"`, `"Failed in 850ms: <error>"`
#[must_use]
pub fn status_text(status: JobStatus, elapsed: Option<Duration>, error: Option<&str>) -> String {
    let mut text = status.label().to_string();
    if status.is_terminal() {
        if let Some(elapsed) = elapsed {
            text.push_str(" in ");
            text.push_str(&format_elapsed(elapsed));
        }
    }
    if let Some(error) = error {
        text.push_str(": ");
        text.push_str(error);
    }
    text
}

/// Compact elapsed time: `850ms`, `12.3s`, `2m 05s`, `1h 02m`
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs == 0 {
        format!("{}ms", elapsed.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
