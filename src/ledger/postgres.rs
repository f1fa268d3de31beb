use super::{LedgerError, TransactionLedger};
use crate::types::{LedgerReceipt, TransactionRecord};
use async_trait::async_trait;
use sqlx::postgres::PgPool;

const INSERT_TRANSACTION: &str = r#"
INSERT INTO transactions (
    trx_hash,
    chain_id,
    network_type,
    state,
    transfer_type,
    sender_address,
    recipient_address,
    amount,
    nonce,
    max_fee,
    max_priority_fee,
    is_sender_paying_gas,
    created,
    updated
)
VALUES ($1, $2, $3::network_type, $4::state, $5::transfer_type, $6, $7, $8::numeric, $9, $10::numeric, $11::numeric, $12, $13, $14)
RETURNING id::bigint
"#;

/// Ledger backed by the transactions database
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn classify(error: sqlx::Error) -> LedgerError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => LedgerError::Duplicate(db.message().to_string()),
        sqlx::Error::Database(db) if db.is_check_violation() || db.is_foreign_key_violation() => {
            LedgerError::Rejected(db.message().to_string())
        }
        _ => LedgerError::Backend(error.to_string()),
    }
}

fn chain_id_column(chain_id: u64) -> Result<i64, LedgerError> {
    i64::try_from(chain_id).map_err(|_| LedgerError::Rejected(format!("chain id {} does not fit bigint", chain_id)))
}

#[async_trait]
impl TransactionLedger for PgLedger {
    async fn create_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError> {
        let id: i64 = sqlx::query_scalar(INSERT_TRANSACTION)
            .bind(&record.trx_hash)
            .bind(chain_id_column(record.chain_id)?)
            .bind(record.network_type.as_str())
            .bind(record.state.as_str())
            .bind(record.transfer_type.as_str())
            .bind(&record.sender_address)
            .bind(&record.recipient_address)
            .bind(record.amount.to_string())
            .bind(record.nonce)
            .bind(record.max_fee)
            .bind(record.max_priority_fee)
            .bind(record.is_sender_paying_gas)
            .bind(record.created)
            .bind(record.updated)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        Ok(LedgerReceipt { id })
    }
}
