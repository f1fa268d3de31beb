//! Relay Module
//!
//! Hands signed transactions to the next stage (broadcasting).

use crate::error::TimeoutError;
use crate::types::SignedOutboundItem;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not encode outbound item: {0}")]
    Encode(String),
    #[error("outbound queue error: {0}")]
    Backend(String),
    #[error("relay call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimeoutError for RelayError {
    fn timeout(after: Duration) -> Self {
        RelayError::Timeout(after)
    }
}

#[async_trait]
pub trait OutboundRelay: Send + Sync {
    async fn add(&self, item: SignedOutboundItem) -> Result<(), RelayError>;
}

/// In-process relay that keeps every item it was given
#[derive(Clone, Default)]
pub struct MemoryRelay {
    items: Arc<Mutex<Vec<SignedOutboundItem>>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<SignedOutboundItem> {
        self.items.lock().map(|items| items.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OutboundRelay for MemoryRelay {
    async fn add(&self, item: SignedOutboundItem) -> Result<(), RelayError> {
        self.items
            .lock()
            .map_err(|_| RelayError::Backend("memory relay lock poisoned".to_string()))?
            .push(item);
        Ok(())
    }
}
