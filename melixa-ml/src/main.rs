//! melixa-ml - command-line entry point
//!
//! Loads the classifier artifact and reference corpus once, then analyzes
//! audio files, prints model metadata, or runs a health check. All output is
//! JSON on stdout; logs go to stderr or the configured log file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use melixa_common::config::{resolve_model_paths, ConfigResolver};
use melixa_common::logging::init_tracing;
use melixa_ml::MoodPipeline;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

/// Command-line arguments for melixa-ml
#[derive(Parser, Debug)]
#[command(name = "melixa-ml")]
#[command(about = "Audio mood prediction and track recommendation")]
#[command(version)]
struct Args {
    /// Config file (defaults to MELIXA_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Classifier artifact JSON
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,

    /// Reference corpus JSON
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Number of recommendations per file
    #[arg(short = 'k', long, global = true, env = "MELIXA_TOP_K")]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict mood and recommend similar tracks for each file
    Analyze {
        /// Audio files (wav, mp3, flac, ogg, m4a)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print model and corpus metadata
    Info,
    /// Run a self-check prediction and report status
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting melixa-ml v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let paths = resolve_model_paths(&config, args.artifact.as_deref(), args.corpus.as_deref());
    let top_k = args.top_k.unwrap_or(config.top_k);
    info!("Artifact: {}", paths.artifact_path.display());
    info!("Corpus: {}", paths.corpus_path.display());

    let pipeline = match MoodPipeline::load(
        &paths.artifact_path,
        &paths.corpus_path,
        &config.prediction,
        top_k,
    ) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e).context("Failed to load model context");
        }
    };
    info!(
        "Pipeline ready: {} reference tracks, top_k = {}",
        pipeline.corpus().len(),
        top_k
    );

    match args.command {
        Command::Analyze { files } => {
            let timeout = Duration::from_secs(config.request_timeout_secs);
            analyze_files(pipeline, files, timeout).await
        }
        Command::Info => print_json(&pipeline.info()),
        Command::Health => {
            let report = pipeline.health_check();
            print_json(&report)?;
            if report.status != "ok" {
                bail!("Health check reported {}", report.status);
            }
            Ok(())
        }
    }
}

/// Analyze all files concurrently, printing results in argument order
async fn analyze_files(pipeline: Arc<MoodPipeline>, files: Vec<PathBuf>, timeout: Duration) -> Result<()> {
    let total = files.len();
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| tokio::spawn(analyze_file(Arc::clone(&pipeline), path, timeout)))
        .collect();

    let mut failed = 0;
    for handle in handles {
        let output = handle.await.context("Analysis task panicked")?;
        if output.get("error").is_some() {
            failed += 1;
        }
        print_json(&output)?;
    }

    if failed > 0 {
        bail!("{} of {} files failed", failed, total);
    }
    Ok(())
}

/// Run one file on the blocking pool under the request timeout
async fn analyze_file(pipeline: Arc<MoodPipeline>, path: PathBuf, timeout: Duration) -> serde_json::Value {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => return error_output(&path, "Failed to read file", e.to_string()),
    };
    let hint = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let work = tokio::task::spawn_blocking(move || pipeline.process(bytes, hint.as_deref()));
    match tokio::time::timeout(timeout, work).await {
        Ok(Ok(Ok(report))) => json!({ "file": path, "result": report }),
        Ok(Ok(Err(e))) if e.is_user_error() => {
            warn!(file = %path.display(), error = %e, "Rejected input");
            error_output(&path, "Invalid audio file", e.to_string())
        }
        Ok(Ok(Err(e))) => {
            error!(file = %path.display(), error = %e, "Analysis failed");
            error_output(&path, "Analysis failed", e.to_string())
        }
        Ok(Err(join_error)) => {
            error!(file = %path.display(), error = %join_error, "Analysis task failed");
            error_output(&path, "Analysis failed", join_error.to_string())
        }
        Err(_) => {
            warn!(file = %path.display(), timeout_secs = timeout.as_secs(), "Analysis timed out");
            error_output(
                &path,
                "Analysis timed out",
                format!("no result within {} seconds", timeout.as_secs()),
            )
        }
    }
}

fn error_output(path: &Path, error: &str, details: String) -> serde_json::Value {
    json!({ "file": path, "error": error, "details": details })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
