//! Dispatch Daemon - Headless Generation Job Runner
//!
//! Feeds a batch of generation requests through the dispatch engine against a
//! local media backend and writes the produced artifacts to disk.
//!
//! # Usage
//!
//! ```bash
//! # Run a batch of JSON-line requests
//! dispatch-daemon jobs.jsonl
//!
//! # Read requests from stdin
//! cat jobs.jsonl | dispatch-daemon
//!
//! # Point at another backend and output directory
//! dispatch-daemon --backend-url http://gpu-box:7860 --output-dir ./renders jobs.jsonl
//!
//! # Check the backend
//! dispatch-daemon --check
//! dispatch-daemon --list-models video
//!
//! # Verbose logging
//! RUST_LOG=debug dispatch-daemon jobs.jsonl
//! ```
//!
//! One request per line, tagged by kind:
//!
//! ```text
//! {"kind": "image", "prompt": "a lighthouse at dusk", "steps": 30, "seed": "42"}
//! {"kind": "text", "prompt": "a haiku about fog", "enhance_prompt": true}
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: stop the worker, drop pending jobs, exit non-zero

mod batch;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use dispatch_core::{
    load_config, load_config_from_path, ConfigOverrides, DispatchConfig, Dispatcher,
    GenerationBackend, HttpBackend, Modality, TracingBinding,
};

/// Dispatch Daemon - Serial generation job runner
#[derive(Parser, Debug)]
#[command(name = "dispatch-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON-lines request file (stdin when omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "DISPATCH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(short = 'b', long, value_name = "URL")]
    backend_url: Option<String>,

    /// Directory artifacts are written to
    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Per-job generation timeout in seconds
    #[arg(long, value_name = "SECS")]
    generation_timeout_secs: Option<u64>,

    /// Print the models available for a modality and exit
    #[arg(long, value_name = "MODALITY")]
    list_models: Option<Modality>,

    /// Check backend health and exit
    #[arg(long)]
    check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "DISPATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.backend_url {
            overrides = overrides.with_backend_url(url.clone());
        }
        if let Some(ref dir) = self.output_dir {
            overrides = overrides.with_output_dir(dir.clone());
        }
        if let Some(secs) = self.generation_timeout_secs {
            overrides = overrides.with_generation_timeout_secs(secs);
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("dispatch_daemon={level},dispatch_core={level}"))
    });

    // stdout carries the batch results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Resolves when SIGTERM or SIGINT arrives
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Dispatch Daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Config layers: defaults, file, environment, then CLI.
    // Read before the runtime exists.
    let mut config = match args.config {
        Some(ref path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Configuration rejected")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: DispatchConfig) -> Result<ExitCode> {
    info!(
        source = %config.source(),
        backend_url = %config.backend.base_url,
        output_dir = ?config.output_dir,
        "Configuration loaded"
    );

    let backend = HttpBackend::new(config.backend.clone()).context("Failed to build HTTP client")?;

    if args.check {
        let healthy = backend.health_check().await;
        println!(
            "{} {}",
            config.backend.base_url,
            if healthy { "healthy" } else { "unreachable" }
        );
        return Ok(if healthy {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if let Some(modality) = args.list_models {
        let models = backend
            .list_models(modality)
            .await
            .with_context(|| format!("Failed to list {modality} models"))?;
        for model in models {
            match model.description {
                Some(description) => println!("{}  {description}", model.name),
                None => println!("{}", model.name),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let requests = batch::read_requests(args.input.as_deref()).await?;
    if requests.is_empty() {
        warn!("No requests to run");
        return Ok(ExitCode::SUCCESS);
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {:?}", config.output_dir))?;

    let dispatcher = Dispatcher::start(Arc::new(backend), Arc::new(TracingBinding::new()));

    let lines = tokio::select! {
        result = batch::run_batch(&dispatcher, requests, &config.output_dir) => result,
        signal = shutdown_signal() => {
            let signal = signal?;
            info!(signal, "Received signal, shutting down");
            dispatcher.shutdown();
            return Ok(ExitCode::FAILURE);
        }
    };

    let lines = match lines {
        Ok(lines) => lines,
        Err(e) => {
            error!(error = %e, "Batch stopped with error");
            dispatcher.shutdown();
            return Err(e);
        }
    };

    let failed = lines.iter().filter(|line| line.failed).count();
    let stats = dispatcher.stats();
    info!(
        jobs = lines.len(),
        failed,
        jobs_run = stats.jobs_run,
        "Batch complete"
    );

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
