use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod common;
mod config;
mod infrastructure;
mod modules;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::modules::transcode::codec;
use crate::state::WorkerContext;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("transcode_worker=info"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

/// Resolves once SIGINT or SIGTERM arrives, then cancels `token`.
async fn watch_signals(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.ok();

    info!("Received shutdown signal, finishing current job");
    token.cancel();
}

/// `transcode-worker enqueue <job.json>`: validates a job body and sends it to the input queue.
async fn enqueue(config: &AppConfig, path: &str) -> Result<()> {
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let job = codec::decode(&body).with_context(|| format!("{} is not a valid job", path))?;

    let queues = infrastructure::queue::connect(&config.queue).await?;
    queues.input.send(&codec::encode_job(&job)).await?;

    info!("📤 Enqueued job {} to {}", job.label(), config.queue.input_queue_url);
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::new().context("Invalid configuration")?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [] => {}
        [command, path] if command == "enqueue" => return enqueue(&config, path).await,
        other => bail!("Unknown arguments {:?}; usage: transcode-worker [enqueue <job.json>]", other),
    }

    info!("Starting transcode worker...");
    info!("Worker settings: {:?}", config.worker);

    let queues = infrastructure::queue::connect(&config.queue).await?;
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let ctx = WorkerContext::new(config.worker, queues.input, queues.output, shutdown);
    workers::transcoder::start_transcoder_worker(ctx).await;

    info!("Worker shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    init_tracing();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
