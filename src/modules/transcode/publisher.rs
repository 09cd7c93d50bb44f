use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::codec::encode_result;
use super::job::JobResult;
use crate::infrastructure::queue::{MessageQueue, QueueError};

#[derive(Debug, Error)]
#[error("failed to publish result for job {job}: {source}")]
pub struct PublishError {
    pub job: String,
    #[source]
    pub source: QueueError,
}

/// Sends job results to the outbound queue. Retrying is left to the caller.
#[derive(Clone)]
pub struct ResultPublisher {
    queue: Arc<dyn MessageQueue>,
}

impl ResultPublisher {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    pub async fn publish(&self, result: &JobResult) -> Result<(), PublishError> {
        let body = encode_result(result);
        debug!("Publishing result {}", String::from_utf8_lossy(&body));

        self.queue.send(&body).await.map_err(|source| PublishError {
            job: result.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::queue::memory::MemoryQueue;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn publishes_encoded_result() {
        let queue = Arc::new(MemoryQueue::new());
        let publisher = ResultPublisher::new(queue.clone());

        publisher
            .publish(&JobResult {
                id: Some(3),
                output_path: Some("/out/x.mp4".to_string()),
                thumbnail_path: None,
            })
            .await
            .unwrap();

        assert_eq!(queue.sent_json(), vec![json!({"id": 3, "outputFilePath": "/out/x.mp4"})]);
    }

    #[tokio::test]
    async fn surfaces_transport_failure_without_retrying() {
        let queue = Arc::new(MemoryQueue::new());
        queue.fail_send.store(true, Ordering::SeqCst);
        let publisher = ResultPublisher::new(queue.clone());

        let err = publisher.publish(&JobResult::failed(Some(9))).await.unwrap_err();

        assert_eq!(err.job, "9");
        assert!(matches!(err.source, QueueError::Send { .. }));
        assert!(queue.sent_json().is_empty());
    }
}
