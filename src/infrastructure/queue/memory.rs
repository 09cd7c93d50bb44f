//! In-process queue used by the worker tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Envelope, MessageQueue, QueueError};

#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<Envelope>>,
    sent: Mutex<Vec<Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    receive_calls: AtomicUsize,
    next_receipt: AtomicUsize,
    pub fail_receive: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_delete: AtomicBool,
    /// When set, an empty receive waits out the full wait like a real long poll.
    pub long_poll: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a body and returns the receipt it will be delivered with.
    pub fn push(&self, body: &str) -> String {
        let receipt = format!("receipt-{}", self.next_receipt.fetch_add(1, Ordering::SeqCst));
        self.pending.lock().unwrap().push_back(Envelope {
            body: body.as_bytes().to_vec(),
            receipt: receipt.clone(),
        });
        receipt
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|body| serde_json::from_slice(body).unwrap())
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<Envelope>, QueueError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(QueueError::Receive {
                queue: "memory".to_string(),
                message: "connection reset".to_string(),
            });
        }
        let envelope = self.pending.lock().unwrap().pop_front();
        if envelope.is_none() && self.long_poll.load(Ordering::SeqCst) {
            tokio::time::sleep(wait).await;
        }
        Ok(envelope)
    }

    async fn send(&self, body: &[u8]) -> Result<(), QueueError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(QueueError::Send {
                queue: "memory".to_string(),
                message: "throttled".to_string(),
            });
        }
        self.sent.lock().unwrap().push(body.to_vec());
        Ok(())
    }

    async fn delete(&self, envelope: &Envelope) -> Result<(), QueueError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(QueueError::Delete {
                queue: "memory".to_string(),
                message: "receipt handle expired".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(envelope.receipt.clone());
        Ok(())
    }
}
