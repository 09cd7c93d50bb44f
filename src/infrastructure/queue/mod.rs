use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::settings::{QueueBackend, QueueConfig};

pub mod rabbitmq;
pub mod sqs;

#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to queue: {0}")]
    Connect(String),

    #[error("failed to receive from {queue}: {message}")]
    Receive { queue: String, message: String },

    #[error("failed to send to {queue}: {message}")]
    Send { queue: String, message: String },

    #[error("failed to delete envelope from {queue}: {message}")]
    Delete { queue: String, message: String },
}

/// One message taken from a queue.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub body: Vec<u8>,
    /// Opaque handle used to acknowledge the message (SQS receipt handle, AMQP delivery tag).
    pub receipt: String,
}

/// A single queue that envelopes are received from, sent to and deleted from.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-polls for at most one envelope, waiting up to `wait`.
    async fn receive(&self, wait: Duration) -> Result<Option<Envelope>, QueueError>;

    async fn send(&self, body: &[u8]) -> Result<(), QueueError>;

    /// Acknowledges the envelope so it is not redelivered.
    async fn delete(&self, envelope: &Envelope) -> Result<(), QueueError>;
}

/// Input and output queues bound to the configured backend.
pub struct QueuePair {
    pub input: Arc<dyn MessageQueue>,
    pub output: Arc<dyn MessageQueue>,
}

pub async fn connect(config: &QueueConfig) -> Result<QueuePair, QueueError> {
    match &config.backend {
        QueueBackend::Sqs(settings) => {
            let client = sqs::build_client(settings);
            Ok(QueuePair {
                input: Arc::new(sqs::SqsQueue::new(client.clone(), &config.input_queue_url)),
                output: Arc::new(sqs::SqsQueue::new(client, &config.output_queue_url)),
            })
        }
        QueueBackend::RabbitMq { amqp_url } => {
            let service = rabbitmq::RabbitMqService::new(amqp_url).await?;
            Ok(QueuePair {
                input: Arc::new(rabbitmq::RabbitMqQueue::new(service.clone(), &config.input_queue_url)),
                output: Arc::new(rabbitmq::RabbitMqQueue::new(service, &config.output_queue_url)),
            })
        }
    }
}
