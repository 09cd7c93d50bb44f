use thiserror::Error;

use crate::infrastructure::queue::QueueError;
use crate::modules::transcode::publisher::PublishError;

/// Failures that abort one worker iteration and leave the envelope for redelivery.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("shutdown requested")]
    Cancelled,
}
