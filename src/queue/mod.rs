//! Queue Module
//!
//! Inbound side of the message queue: receive at most one delivery and
//! acknowledge it once it has been fully processed. Unacknowledged
//! deliveries become visible again and are redelivered by the queue.

mod sqs;

pub use sqs::SqsQueue;

use crate::error::TimeoutError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// A message taken off the inbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    /// Handle needed to acknowledge this particular receipt
    pub receipt: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue error: {0}")]
    Backend(String),
    #[error("queue call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimeoutError for QueueError {
    fn timeout(after: Duration) -> Self {
        QueueError::Timeout(after)
    }
}

#[async_trait]
pub trait InboundQueue: Send + Sync {
    /// Take at most one message; `None` when the queue is empty
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError>;
}

#[derive(Default)]
struct MemoryInner {
    pending: VecDeque<Delivery>,
    in_flight: Vec<Delivery>,
    acknowledged: Vec<String>,
    next_receipt: u64,
}

/// In-process queue. Received messages stay in flight until acknowledged
/// or explicitly released back for redelivery.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>, QueueError> {
        self.inner
            .lock()
            .map_err(|_| QueueError::Backend("memory queue lock poisoned".to_string()))
    }

    pub fn push(&self, message_id: impl Into<String>, body: impl Into<String>) -> Result<(), QueueError> {
        self.lock_inner()?.pending.push_back(Delivery {
            message_id: message_id.into(),
            receipt: String::new(),
            body: body.into(),
        });
        Ok(())
    }

    /// Make every unacknowledged in-flight message visible again
    pub fn release_in_flight(&self) -> Result<usize, QueueError> {
        let mut inner = self.lock_inner()?;
        let released: Vec<Delivery> = inner.in_flight.drain(..).collect();
        let count = released.len();
        for delivery in released.into_iter().rev() {
            inner.pending.push_front(delivery);
        }
        Ok(count)
    }

    pub fn pending_len(&self) -> usize {
        self.lock_inner().map(|inner| inner.pending.len()).unwrap_or(0)
    }

    pub fn in_flight_len(&self) -> usize {
        self.lock_inner().map(|inner| inner.in_flight.len()).unwrap_or(0)
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.lock_inner()
            .map(|inner| inner.acknowledged.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InboundQueue for MemoryQueue {
    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let mut inner = self.lock_inner()?;
        let Some(mut delivery) = inner.pending.pop_front() else {
            return Ok(None);
        };
        inner.next_receipt += 1;
        delivery.receipt = format!("receipt-{}", inner.next_receipt);
        inner.in_flight.push(delivery.clone());
        Ok(Some(delivery))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut inner = self.lock_inner()?;
        let position = inner
            .in_flight
            .iter()
            .position(|d| d.receipt == delivery.receipt)
            .ok_or_else(|| QueueError::Backend(format!("unknown receipt {}", delivery.receipt)))?;
        let delivery = inner.in_flight.remove(position);
        inner.acknowledged.push(delivery.message_id);
        Ok(())
    }
}
