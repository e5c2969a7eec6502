mod metrics;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use batchconv_core::{
    load_config, plan_jobs, validate_config, BatchEvent, BatchRunner, BatchState, Config,
    FfmpegTranscoder, JobOutcome, LogFormat, Transcoder,
};

/// Config file used when neither argv nor `BATCHCONV_CONFIG` names one.
const DEFAULT_CONFIG: &str = "batchconv.toml";

/// Conventional exit status after SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("batchconv: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    // Determine config path
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("BATCHCONV_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(config.logging.format);
    info!("Loaded configuration from {:?}", config_path);

    let registry = metrics::registry().context("Failed to register metrics")?;

    let transcoder = FfmpegTranscoder::new(config.converter.clone());
    transcoder
        .validate()
        .await
        .context("Conversion engine self-check failed")?;
    info!(
        "Using {} at {:?}",
        transcoder.name(),
        transcoder.config().ffmpeg_path
    );

    let (input_dir, output_dir) = directories(&config)?;
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let jobs = plan_jobs(
        &input_dir,
        &output_dir,
        &config.source,
        &config.converter.target_extension,
    )
    .await
    .with_context(|| format!("Failed to scan {:?}", input_dir))?;
    info!("Found {} file(s) to convert in {:?}", jobs.len(), input_dir);

    let runner = BatchRunner::new(config.batch.clone(), Arc::new(transcoder))
        .with_callback(Arc::new(log_event));
    info!("Worker pool size: {}", runner.worker_count());

    runner.start(jobs).await.context("Failed to start batch")?;

    let state = tokio::select! {
        state = runner.wait() => state,
        _ = shutdown_signal() => {
            warn!("Interrupted, cancelling batch");
            runner.cancel().await
        }
    };

    let summary = runner.status().await.summary;
    println!("{}", serde_json::to_string(&summary)?);

    if config.logging.print_metrics {
        print!("{}", metrics::encode_metrics(&registry)?);
    }

    Ok(match state {
        BatchState::Cancelled => ExitCode::from(EXIT_CANCELLED),
        _ if summary.has_failures() => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn directories(config: &Config) -> Result<(PathBuf, PathBuf)> {
    let Some(input_dir) = config.source.input_dir.clone() else {
        bail!("source.input_dir is not set");
    };
    let Some(output_dir) = config.source.output_dir.clone() else {
        bail!("source.output_dir is not set");
    };
    if same_dir(&input_dir, &output_dir) {
        warn!("Output directory is the input directory; converted files may overwrite sources");
    }
    Ok((input_dir, output_dir))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn log_event(event: BatchEvent) {
    match event {
        BatchEvent::Started { total, .. } => info!("Converting {} file(s)", total),
        BatchEvent::JobStarted { .. } => {}
        BatchEvent::JobCompleted {
            job,
            outcome,
            progress,
            ..
        } => match outcome {
            JobOutcome::Succeeded => info!(
                "[{}/{}] {} -> {}",
                progress.completed,
                progress.total,
                job.display_name(),
                job.destination.display()
            ),
            JobOutcome::Failed { error } => warn!(
                "[{}/{}] {} failed: {}",
                progress.completed,
                progress.total,
                job.display_name(),
                error
            ),
            JobOutcome::Cancelled => info!("{} cancelled", job.display_name()),
        },
        BatchEvent::BatchFinished { state, summary, .. } => info!(
            "Batch {}: {} succeeded, {} failed, {} cancelled, {} not started",
            state.as_str(),
            summary.succeeded,
            summary.failed,
            summary.cancelled,
            summary.not_started
        ),
    }
}

/// Wait for an interrupt (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
