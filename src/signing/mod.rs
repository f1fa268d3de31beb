//! Signing Module
//!
//! The signing delegate turns an unsigned transaction plus a key identity
//! into a signed transaction. Key material never enters this process; the
//! threshold backend holds it and returns only signature components.

mod remote;
mod secrets;

pub use remote::{RemoteSigner, SignatureResponse, SignerCredentials};

use crate::error::{SignerError, TimeoutError};
use crate::tx::{SignedTransaction, UnsignedTransaction};
use crate::wallet::DerivationCoordinates;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Everything the backend needs to sign one transaction
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub tx: UnsignedTransaction,
    pub key_id: String,
    pub derivation_path: DerivationCoordinates,
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("signing backend rejected the request: {0}")]
    Rejected(String),
    #[error("signing backend unreachable: {0}")]
    Transport(String),
    #[error("signing backend returned an invalid signature: {0}")]
    InvalidResponse(String),
    #[error("transaction cannot be signed: {0}")]
    Transaction(#[from] SignerError),
    #[error("signature is bound to chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },
    #[error("signature recovers to {recovered}, expected {expected}")]
    SenderMismatch { expected: String, recovered: String },
    #[error("signing call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimeoutError for SignError {
    fn timeout(after: Duration) -> Self {
        SignError::Timeout(after)
    }
}

#[async_trait]
pub trait SigningDelegate: Send + Sync {
    async fn sign(&self, options: SignOptions) -> Result<SignedTransaction, SignError>;
}
