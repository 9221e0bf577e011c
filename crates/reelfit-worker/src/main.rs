//! Batch assembly worker binary.
//!
//! Usage: `reelfit-worker <batch.json>`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelfit_media::FfmpegEngine;
use reelfit_source::PexelsClient;
use reelfit_worker::{BatchManifest, BatchScheduler, PipelineOrchestrator, WorkerConfig};

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reelfit=info".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let manifest_path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: reelfit-worker <batch.json>")?;

    info!("Starting reelfit-worker");

    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    let manifest = BatchManifest::load(&manifest_path)
        .await
        .with_context(|| format!("loading {}", manifest_path.display()))?;

    let engine = Arc::new(FfmpegEngine::new(config.timeouts));
    let mut orchestrator = PipelineOrchestrator::new(engine, config).with_presets(manifest.catalog()?);

    // Search inputs need a clip source; file and candidate inputs do not
    match PexelsClient::from_env() {
        Ok(client) => orchestrator = orchestrator.with_source(Arc::new(client)),
        Err(e) => warn!(error = %e, "No clip source configured, search jobs will fail"),
    }

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let scheduler = Arc::new(BatchScheduler::new(orchestrator).with_progress(progress_tx));

    let progress_task = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            debug!(
                job_id = %event.job_id,
                stage = %event.stage,
                "progress {}/{}",
                event.current,
                event.total
            );
        }
    });

    for job in manifest.jobs {
        scheduler.submit(job).await?;
    }

    let cancel_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal, stopping jobs at the next stage");
                scheduler.cancel_all().await;
            }
        })
    };

    let summary = scheduler.run_all().await?;
    cancel_handle.abort();

    let statuses = scheduler.get_all_statuses().await;
    println!("{}", serde_json::to_string_pretty(&statuses)?);

    drop(scheduler);
    progress_task.await.ok();

    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Worker shutdown complete"
    );
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
