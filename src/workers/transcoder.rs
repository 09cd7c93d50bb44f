use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::backoff::Backoff;
use crate::common::error::WorkerError;
use crate::config::settings::IdleDelayPolicy;
use crate::infrastructure::queue::Envelope;
use crate::modules::transcode::codec;
use crate::modules::transcode::job::{Job, JobResult, TranscodeOutcome};
use crate::modules::transcode::plan::JobPlan;
use crate::state::WorkerContext;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Iteration {
    /// The poll came back empty.
    Empty,
    /// One envelope was taken off the queue and handled.
    Processed,
}

/// Runs the poll loop until the context's shutdown token is cancelled.
pub async fn start_transcoder_worker(ctx: WorkerContext) {
    info!("🎥 Starting Transcoder Worker...");

    let mut backoff = Backoff::new(ctx.settings.backoff_base, ctx.settings.backoff_max);

    while !ctx.shutdown.is_cancelled() {
        let pause = match run_iteration(&ctx).await {
            Ok(Iteration::Empty) => {
                backoff.reset();
                Some(ctx.settings.idle_delay)
            }
            Ok(Iteration::Processed) => {
                backoff.reset();
                match ctx.settings.idle_delay_policy {
                    IdleDelayPolicy::Always => Some(ctx.settings.idle_delay),
                    IdleDelayPolicy::EmptyPollOnly => None,
                }
            }
            Err(WorkerError::Cancelled) => break,
            Err(e) => {
                let delay = backoff.next_delay();
                error!(
                    "❌ Worker iteration failed ({} in a row), retrying in {:?}: {}",
                    backoff.failures(),
                    delay,
                    e
                );
                Some(delay)
            }
        };

        if let Some(pause) = pause {
            if !sleep_or_cancel(&ctx.shutdown, pause).await {
                break;
            }
        }
    }

    info!("🎥 Transcoder Worker stopped");
}

/// Returns `false` if shutdown was requested before the pause elapsed.
async fn sleep_or_cancel(shutdown: &CancellationToken, pause: Duration) -> bool {
    if pause.is_zero() {
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(pause) => true,
    }
}

/// Awaits a receive unless shutdown is requested first. Only waits that precede a job go through here.
async fn cancellable<T, E, F>(shutdown: &CancellationToken, call: F) -> Result<T, WorkerError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<WorkerError>,
{
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(WorkerError::Cancelled),
        result = call => result.map_err(Into::into),
    }
}

pub(crate) async fn run_iteration(ctx: &WorkerContext) -> Result<Iteration, WorkerError> {
    let envelope = cancellable(&ctx.shutdown, ctx.input.receive(ctx.settings.receive_wait)).await?;

    let Some(envelope) = envelope else {
        debug!("No jobs available");
        return Ok(Iteration::Empty);
    };

    info!("📦 Received transcoding job");
    process_envelope(ctx, &envelope).await?;
    Ok(Iteration::Processed)
}

async fn process_envelope(ctx: &WorkerContext, envelope: &Envelope) -> Result<(), WorkerError> {
    let job = match codec::decode(&envelope.body) {
        Ok(job) => job,
        Err(e) => {
            error!(
                "❌ Failed to parse job: {} (body: {})",
                e,
                String::from_utf8_lossy(&envelope.body)
            );
            if ctx.settings.delete_undecodable {
                acknowledge(ctx, envelope).await?;
            } else {
                warn!("Leaving undecodable envelope on the queue");
            }
            return Ok(());
        }
    };

    let result = execute_job(ctx, &job).await;

    // The transcode already happened; shutdown waits for its result to be published and acknowledged.
    ctx.publisher.publish(&result).await?;

    if result.is_failure() {
        if !ctx.settings.delete_on_transcode_failure {
            warn!("Job {} failed, leaving it for redelivery", job.label());
            return Ok(());
        }
        acknowledge(ctx, envelope).await?;
        warn!("Job {} failed, failure result published", job.label());
    } else {
        acknowledge(ctx, envelope).await?;
        info!("✅ Job {} completed: {:?}", job.label(), result);
    }

    Ok(())
}

async fn acknowledge(ctx: &WorkerContext, envelope: &Envelope) -> Result<(), WorkerError> {
    ctx.input.delete(envelope).await?;
    Ok(())
}

/// Converts and thumbnails one job. Transcoder failures degrade the result instead of erroring.
async fn execute_job(ctx: &WorkerContext, job: &Job) -> JobResult {
    let label = job.label();

    let plan = match JobPlan::resolve(job, &ctx.settings.folders) {
        Ok(plan) => plan,
        Err(e) => {
            error!("❌ Job {} has unusable arguments: {}", label, e);
            return JobResult::failed(job.id);
        }
    };

    info!(
        "Converting job {}: {} -> {}",
        label,
        plan.input_path.display(),
        plan.output_path.display()
    );

    let output_path = match ctx
        .executor
        .convert(&plan.input_path, &plan.arguments, &plan.output_path)
        .await
    {
        TranscodeOutcome {
            succeeded: true,
            output_path: Some(path),
            ..
        } => path,
        failed => {
            error!(
                "❌ Conversion failed for job {}: {}",
                label,
                failed.diagnostic_text.as_deref().unwrap_or("no diagnostic output")
            );
            return JobResult::failed(job.id);
        }
    };

    let mut result = JobResult {
        id: job.id,
        output_path: Some(output_path.to_string_lossy().into_owned()),
        thumbnail_path: None,
    };

    match ctx
        .executor
        .extract_thumbnail(&plan.input_path, &plan.thumbnail_path)
        .await
    {
        TranscodeOutcome {
            succeeded: true,
            output_path: Some(path),
            ..
        } => result.thumbnail_path = Some(path.to_string_lossy().into_owned()),
        failed => error!(
            "❌ Thumbnail creation failed for job {}: {}",
            label,
            failed.diagnostic_text.as_deref().unwrap_or("no diagnostic output")
        ),
    }

    result
}
