use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection,
    ConnectionProperties,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Envelope, MessageQueue, QueueError};

const GET_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
    // Bumped on every reconnect; delivery tags are only valid on the channel that issued them.
    generation: Arc<AtomicU64>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel), QueueError> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connect(format!("Failed to connect to RabbitMQ: {}", e)))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| QueueError::Connect(format!("Failed to create channel: {}", e)))?;

        info!("✅ Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self, QueueError> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    async fn reconnect(&self) -> Result<(), QueueError> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        let stale = std::mem::replace(&mut *self.conn.lock().await, conn);
        *self.channel.lock().await = channel;
        self.generation.fetch_add(1, Ordering::SeqCst);

        // Closing the old connection hands its unacked deliveries back to the broker now.
        if let Err(e) = stale.close(200, "reconnecting").await {
            debug!("Closing stale RabbitMQ connection failed: {}", e);
        }
        Ok(())
    }

    async fn declare(channel: &Channel, queue: &str) -> Result<(), lapin::Error> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish_internal(&self, queue: &str, payload: &[u8]) -> Result<(), String> {
        let channel = self.channel.lock().await;

        Self::declare(&channel, queue)
            .await
            .map_err(|e| format!("Failed to declare queue: {}", e))?;

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2), // Persistent
            )
            .await
            .map_err(|e| format!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| format!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    /// Publishes once. A failure reconnects for the next call and is returned as is.
    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError> {
        let message = match self.publish_internal(queue, payload).await {
            Ok(()) => return Ok(()),
            Err(message) => message,
        };

        warn!("RabbitMQ publish to '{}' failed: {}. Reconnecting.", queue, message);
        if let Err(e) = self.reconnect().await {
            warn!("{}", e);
        }

        Err(QueueError::Send {
            queue: queue.to_string(),
            message,
        })
    }

    /// Fetches one unacknowledged message, or `None` if the queue is empty.
    async fn get_internal(&self, queue: &str) -> Result<Option<Envelope>, lapin::Error> {
        let channel = self.channel.lock().await;
        Self::declare(&channel, queue).await?;

        let message = channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await?;

        Ok(message.map(|message| {
            let generation = self.generation.load(Ordering::SeqCst);
            Envelope {
                receipt: format!("{}:{}", generation, message.delivery.delivery_tag),
                body: message.delivery.data,
            }
        }))
    }

    pub async fn get(&self, queue: &str) -> Result<Option<Envelope>, QueueError> {
        match self.get_internal(queue).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                warn!("RabbitMQ get failed: {}. Reconnecting.", e);
                self.reconnect().await?;
                Err(QueueError::Receive {
                    queue: queue.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    pub async fn ack(&self, queue: &str, receipt: &str) -> Result<(), QueueError> {
        let delete_error = |message: String| QueueError::Delete {
            queue: queue.to_string(),
            message,
        };

        let (generation, tag) = receipt
            .split_once(':')
            .and_then(|(g, t)| Some((g.parse::<u64>().ok()?, t.parse::<u64>().ok()?)))
            .ok_or_else(|| delete_error(format!("malformed delivery receipt '{}'", receipt)))?;

        if generation != self.generation.load(Ordering::SeqCst) {
            // The channel that delivered this message is gone, so the broker has already requeued it.
            return Err(delete_error("delivery belongs to a closed channel".to_string()));
        }

        let channel = self.channel.lock().await;
        channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .map_err(|e| delete_error(e.to_string()))
    }
}

/// One named RabbitMQ queue. Unacked deliveries return to the queue when the channel closes.
pub struct RabbitMqQueue {
    service: RabbitMqService,
    queue: String,
}

impl RabbitMqQueue {
    pub fn new(service: RabbitMqService, queue: &str) -> Self {
        Self {
            service,
            queue: queue.to_string(),
        }
    }
}

#[async_trait]
impl MessageQueue for RabbitMqQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<Envelope>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(envelope) = self.service.get(&self.queue).await? {
                debug!("Received delivery {} from '{}'", envelope.receipt, self.queue);
                return Ok(Some(envelope));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(GET_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn send(&self, body: &[u8]) -> Result<(), QueueError> {
        self.service.publish(&self.queue, body).await
    }

    async fn delete(&self, envelope: &Envelope) -> Result<(), QueueError> {
        self.service.ack(&self.queue, &envelope.receipt).await
    }
}
