use super::{ResolverError, WalletResolver};
use crate::types::{DerivationPath, Wallet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;

const SELECT_WALLET: &str = r#"
SELECT id::bigint AS id,
       user_id::bigint AS user_id,
       address,
       chain_id::bigint AS chain_id,
       key_id,
       is_multisig,
       address_index::bigint AS address_index,
       multisig_threshold::bigint AS multisig_threshold,
       created,
       updated
FROM sender_wallets
WHERE id = $1
"#;

const SELECT_DERIVATION_PATH: &str = r#"
SELECT dp.id::bigint AS id,
       dp.wallet_id::bigint AS wallet_id,
       dp.purpose::bigint AS purpose,
       dp.coin_type::bigint AS coin_type,
       dp.account::bigint AS account,
       dp.change::bigint AS change,
       dp.created,
       dp.updated
FROM derivation_paths AS dp
INNER JOIN sender_wallets AS w ON w.id = dp.wallet_id AND w.key_id = $1
ORDER BY dp.id
LIMIT 1
"#;

#[derive(Debug, FromRow)]
struct WalletRow {
    id: i64,
    user_id: Option<i64>,
    address: String,
    chain_id: i64,
    key_id: String,
    is_multisig: bool,
    address_index: i64,
    multisig_threshold: Option<i64>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct DerivationPathRow {
    id: i64,
    wallet_id: i64,
    purpose: i64,
    coin_type: i64,
    account: i64,
    change: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = ResolverError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet {
            id: row.id,
            user_id: row.user_id,
            address: row.address,
            chain_id: row.chain_id,
            key_id: row.key_id,
            is_multisig: row.is_multisig,
            address_index: index(row.id, "address_index", row.address_index)?,
            multisig_threshold: row.multisig_threshold,
            created: row.created,
            updated: row.updated,
        })
    }
}

impl TryFrom<DerivationPathRow> for DerivationPath {
    type Error = ResolverError;

    fn try_from(row: DerivationPathRow) -> Result<Self, Self::Error> {
        Ok(DerivationPath {
            id: row.id,
            wallet_id: row.wallet_id,
            purpose: index(row.id, "purpose", row.purpose)?,
            coin_type: index(row.id, "coin_type", row.coin_type)?,
            account: index(row.id, "account", row.account)?,
            change: index(row.id, "change", row.change)?,
            created: row.created,
            updated: row.updated,
        })
    }
}

/// Derivation indices must be non-negative 32-bit values
fn index(id: i64, column: &str, value: i64) -> Result<u32, ResolverError> {
    u32::try_from(value).map_err(|_| ResolverError::InvalidRow {
        id,
        reason: format!("{} {} is not a 32-bit index", column, value),
    })
}

/// Wallet directory backed by the wallets database
#[derive(Clone)]
pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl WalletResolver for PgWalletStore {
    async fn get_wallet(&self, id: i64) -> Result<Wallet, ResolverError> {
        let row = sqlx::query_as::<_, WalletRow>(SELECT_WALLET)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ResolverError::Backend(e.to_string()))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(ResolverError::WalletNotFound(id)),
        }
    }

    async fn get_derivation_path(&self, key_id: &str) -> Result<DerivationPath, ResolverError> {
        let row = sqlx::query_as::<_, DerivationPathRow>(SELECT_DERIVATION_PATH)
            .bind(key_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ResolverError::Backend(e.to_string()))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(ResolverError::DerivationPathNotFound(key_id.to_string())),
        }
    }
}
