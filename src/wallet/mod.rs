//! Wallet Module
//!
//! Wallet directory lookups: the custodial wallet behind a request and the
//! derivation path attached to its signing key.

mod derivation_path;
mod memory;
mod postgres;

pub use derivation_path::*;
pub use memory::MemoryWalletStore;
pub use postgres::PgWalletStore;

use crate::error::TimeoutError;
use crate::types::{DerivationPath, Wallet};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("wallet {0} not found")]
    WalletNotFound(i64),
    #[error("derivation path for key {0} not found")]
    DerivationPathNotFound(String),
    #[error("wallet row {id} is invalid: {reason}")]
    InvalidRow { id: i64, reason: String },
    #[error("wallet directory error: {0}")]
    Backend(String),
    #[error("wallet directory call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimeoutError for ResolverError {
    fn timeout(after: Duration) -> Self {
        ResolverError::Timeout(after)
    }
}

/// Read access to the wallet directory
#[async_trait]
pub trait WalletResolver: Send + Sync {
    async fn get_wallet(&self, id: i64) -> Result<Wallet, ResolverError>;

    /// Derivation path of the wallet that owns `key_id`
    async fn get_derivation_path(&self, key_id: &str) -> Result<DerivationPath, ResolverError>;
}
