use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use super::{Envelope, MessageQueue, QueueError};
use crate::config::settings::SqsSettings;

pub fn build_client(settings: &SqsSettings) -> Client {
    let credentials = Credentials::new(
        &settings.access_key,
        &settings.secret_key,
        None,
        None,
        "environment",
    );

    let mut builder = Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .credentials_provider(credentials);

    if let Some(endpoint) = &settings.endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    info!("✅ SQS client ready (region {})", settings.region);

    Client::from_conf(builder.build())
}

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: &str) -> Self {
        Self {
            client,
            queue_url: queue_url.to_string(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<Envelope>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait.as_secs().min(20) as i32)
            .send()
            .await
            .map_err(|e| QueueError::Receive {
                queue: self.queue_url.clone(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        let Some(message) = output.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let receipt = message.receipt_handle.ok_or_else(|| QueueError::Receive {
            queue: self.queue_url.clone(),
            message: "message has no receipt handle".to_string(),
        })?;

        debug!("Received SQS message {:?}", message.message_id);

        Ok(Some(Envelope {
            body: message.body.unwrap_or_default().into_bytes(),
            receipt,
        }))
    }

    async fn send(&self, body: &[u8]) -> Result<(), QueueError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(String::from_utf8_lossy(body))
            .send()
            .await
            .map_err(|e| QueueError::Send {
                queue: self.queue_url.clone(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        Ok(())
    }

    async fn delete(&self, envelope: &Envelope) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&envelope.receipt)
            .send()
            .await
            .map_err(|e| QueueError::Delete {
                queue: self.queue_url.clone(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        Ok(())
    }
}
