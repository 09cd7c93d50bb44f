use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::settings::WorkerSettings;
use crate::infrastructure::queue::MessageQueue;
use crate::modules::transcode::executor::TranscodeExecutor;
use crate::modules::transcode::publisher::ResultPublisher;

/// Everything one worker loop needs, captured once at startup.
#[derive(Clone)]
pub struct WorkerContext {
    pub settings: Arc<WorkerSettings>,
    pub input: Arc<dyn MessageQueue>,
    pub publisher: ResultPublisher,
    pub executor: TranscodeExecutor,
    pub shutdown: CancellationToken,
}

impl WorkerContext {
    pub fn new(
        settings: WorkerSettings,
        input: Arc<dyn MessageQueue>,
        output: Arc<dyn MessageQueue>,
        shutdown: CancellationToken,
    ) -> Self {
        let executor = TranscodeExecutor::new(settings.ffmpeg_path.clone());
        Self {
            settings: Arc::new(settings),
            input,
            publisher: ResultPublisher::new(output),
            executor,
            shutdown,
        }
    }
}
