use super::{LedgerError, TransactionLedger};
use crate::types::{LedgerReceipt, TransactionRecord};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryInner {
    rows: Vec<TransactionRecord>,
    next_id: i64,
}

/// In-process ledger for local runs and tests
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<MemoryInner>>,
    unique_hashes: bool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject a second row with the same transaction hash
    pub fn with_unique_hashes(mut self) -> Self {
        self.unique_hashes = true;
        self
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Backend("memory ledger lock poisoned".to_string()))
    }

    /// Snapshot of stored rows in insertion order
    pub fn rows(&self) -> Vec<TransactionRecord> {
        self.lock_inner().map(|inner| inner.rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TransactionLedger for MemoryLedger {
    async fn create_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError> {
        let mut inner = self.lock_inner()?;

        if self.unique_hashes && inner.rows.iter().any(|row| row.trx_hash == record.trx_hash) {
            return Err(LedgerError::Duplicate(format!("trx_hash {}", record.trx_hash)));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let mut row = record.clone();
        row.id = Some(id);
        inner.rows.push(row);

        Ok(LedgerReceipt { id })
    }
}
