//! Shared types for tx-signer
//!
//! Queue payloads, wallet directory entities and ledger records. Everything
//! that crosses a collaborator boundary is defined here.

use crate::tx::LedgerAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Queue Payloads
// =============================================================================

/// A "create transaction" request delivered by the upstream producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    #[serde(default)]
    pub id: String,
    /// Hex-encoded unsigned transaction in the chain's wire format
    #[serde(rename = "raw_tx")]
    pub raw_transaction_hex: String,
    pub transaction_id: String,
    #[serde(rename = "wallet_row_id")]
    pub wallet_reference: i64,
}

impl SigningRequest {
    /// Decode a request from a queue message body
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// A signed transaction handed to the next stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOutboundItem {
    pub id: String,
    #[serde(rename = "signed_tx")]
    pub signed_transaction_hex: String,
    pub transaction_id: String,
}

// =============================================================================
// Wallet Directory
// =============================================================================

/// A custodial wallet as held by the wallet directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: Option<i64>,
    pub address: String,
    pub chain_id: i64,
    pub key_id: String,
    pub is_multisig: bool,
    pub address_index: u32,
    pub multisig_threshold: Option<i64>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// BIP-32 style coordinates attached to a signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationPath {
    pub id: i64,
    pub wallet_id: i64,
    pub purpose: u32,
    pub coin_type: u32,
    pub account: u32,
    pub change: u32,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

// =============================================================================
// Ledger
// =============================================================================

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Initiated,
    Created,
    Signed,
    Submitted,
    Settled,
    Finalized,
    Erred,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Initiated => "initiated",
            TxState::Created => "created",
            TxState::Signed => "signed",
            TxState::Submitted => "submitted",
            TxState::Settled => "settled",
            TxState::Finalized => "finalized",
            TxState::Erred => "erred",
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network the ledger row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
        }
    }
}

/// Kind of transfer the ledger row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    #[default]
    Eoa,
    SmartContract,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Eoa => "eoa",
            TransferType::SmartContract => "smart_contract",
        }
    }
}

/// A ledger row. `id` is assigned by the ledger on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Option<i64>,
    pub trx_hash: String,
    pub chain_id: u64,
    pub network_type: NetworkType,
    pub state: TxState,
    pub transfer_type: TransferType,
    pub sender_address: String,
    pub recipient_address: String,
    pub amount: LedgerAmount,
    pub nonce: i64,
    pub max_fee: i64,
    pub max_priority_fee: i64,
    pub is_sender_paying_gas: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Acknowledgement returned by the ledger for an inserted row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub id: i64,
}
