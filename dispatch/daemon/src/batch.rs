//! Batch runner
//!
//! Reads generation requests as JSON lines, submits them all, waits for each
//! ticket in submission order and writes artifacts to the output directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use dispatch_core::{status_text, Artifact, Dispatcher, GenerationRequest, JobId, JobStatus};

/// Outcome of one job in the batch
#[derive(Debug)]
pub struct BatchLine {
    pub id: JobId,
    pub kind: &'static str,
    pub status: String,
    pub files: Vec<PathBuf>,
    pub failed: bool,
}

impl BatchLine {
    /// One line for stdout
    pub fn render(&self) -> String {
        let mut line = format!("{}  {:<7}  {}", self.id, self.kind, self.status);
        for file in &self.files {
            line.push_str("  ");
            line.push_str(&file.display().to_string());
        }
        line
    }
}

/// Read requests from a file, or stdin when `path` is `None`
pub async fn read_requests(path: Option<&Path>) -> Result<Vec<GenerationRequest>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open request file: {path:?}"))?;
            parse_requests(BufReader::new(file)).await
        }
        None => parse_requests(BufReader::new(tokio::io::stdin())).await,
    }
}

/// Parse JSON lines; blank lines and `#` comments are skipped
pub async fn parse_requests<R>(reader: R) -> Result<Vec<GenerationRequest>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut requests = Vec::new();
    let mut line_no = 0_usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let request: GenerationRequest = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid request on line {line_no}"))?;
        requests.push(request);
    }

    Ok(requests)
}

/// Write each part of an artifact as `<job-id>-<n>.<ext>`
pub async fn write_artifact(dir: &Path, id: JobId, artifact: &Artifact) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (n, part) in artifact.parts().into_iter().enumerate() {
        let path = dir.join(format!("{id}-{n}.{}", artifact.extension()));
        tokio::fs::write(&path, part)
            .await
            .with_context(|| format!("Failed to write artifact: {path:?}"))?;
        written.push(path);
    }
    Ok(written)
}

/// Submit every request and wait for all of them
pub async fn run_batch(
    dispatcher: &Dispatcher,
    requests: Vec<GenerationRequest>,
    output_dir: &Path,
) -> Result<Vec<BatchLine>> {
    let kinds: Vec<_> = requests.iter().map(|r| r.modality().as_str()).collect();
    let mut tickets: Vec<_> = requests
        .into_iter()
        .map(|request| dispatcher.submit(request))
        .collect();
    info!(count = tickets.len(), "Batch submitted");

    let mut lines = Vec::with_capacity(tickets.len());
    for (ticket, kind) in tickets.iter_mut().zip(kinds) {
        let id = ticket.id();
        let line = match ticket.report().await {
            Some(report) => {
                let files = match report.artifact {
                    Some(ref artifact) => write_artifact(output_dir, id, artifact).await?,
                    None => Vec::new(),
                };
                let error = report.error.as_ref().map(ToString::to_string);
                BatchLine {
                    id,
                    kind,
                    status: status_text(report.status, report.elapsed, error.as_deref()),
                    files,
                    failed: report.status == JobStatus::Failed,
                }
            }
            None => {
                warn!(job_id = %id, "Job dropped before it finished");
                BatchLine {
                    id,
                    kind,
                    status: "Dropped".to_string(),
                    files: Vec::new(),
                    failed: true,
                }
            }
        };
        println!("{}", line.render());
        lines.push(line);
    }

    Ok(lines)
}
