//! Ledger Module
//!
//! Durable record of every signed transaction. Inserts only; state
//! transitions after `signed` belong to downstream services.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use crate::error::TimeoutError;
use crate::types::{LedgerReceipt, TransactionRecord};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A uniqueness constraint rejected the row
    #[error("duplicate ledger row: {0}")]
    Duplicate(String),
    #[error("ledger rejected the row: {0}")]
    Rejected(String),
    #[error("ledger error: {0}")]
    Backend(String),
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimeoutError for LedgerError {
    fn timeout(after: Duration) -> Self {
        LedgerError::Timeout(after)
    }
}

#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn create_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError>;
}
