//! Transaction Types
//!
//! Unsigned and signed EVM transactions as carried through the pipeline.
//! Two envelopes are supported:
//! - Legacy transactions, signed with EIP-155 replay protection
//! - EIP-1559 dynamic-fee transactions (EIP-2718 type `0x02`)

use super::codec;
use crate::error::{SignerError, SignerResult};
use crate::utils::crypto::{keccak256, to_checksum_address};
use ethers_core::types::{Address, Signature, H256, U256};

/// EIP-2718 type byte for dynamic-fee transactions
pub const DYNAMIC_FEE_TX_TYPE: u8 = 0x02;

/// An entry of an EIP-2930 access list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

/// Legacy transaction. `chain_id` is only present when the payload carried
/// one in its EIP-155 slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: Option<u64>,
}

/// EIP-1559 dynamic-fee transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicFeeTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
}

/// A decoded transaction awaiting a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTransaction {
    Legacy(LegacyTransaction),
    DynamicFee(DynamicFeeTransaction),
}

impl UnsignedTransaction {
    pub fn nonce(&self) -> u64 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.nonce,
            UnsignedTransaction::DynamicFee(tx) => tx.nonce,
        }
    }

    pub fn to(&self) -> Option<Address> {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.to,
            UnsignedTransaction::DynamicFee(tx) => tx.to,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.value,
            UnsignedTransaction::DynamicFee(tx) => tx.value,
        }
    }

    /// Chain id carried by the payload itself, if any
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.chain_id,
            UnsignedTransaction::DynamicFee(tx) => Some(tx.chain_id),
        }
    }

    /// `(max_fee, max_priority_fee)` per gas. Legacy transactions pay their
    /// gas price for both.
    pub fn fee_caps(&self) -> (U256, U256) {
        match self {
            UnsignedTransaction::Legacy(tx) => (tx.gas_price, tx.gas_price),
            UnsignedTransaction::DynamicFee(tx) => (tx.max_fee_per_gas, tx.max_priority_fee_per_gas),
        }
    }

    /// Hash of the transaction before signing, handy for log correlation
    pub fn hash(&self) -> H256 {
        H256(keccak256(&codec::encode_unsigned(self)))
    }

    /// Digest a signature over this transaction commits to on `chain_id`
    pub fn signing_hash(&self, chain_id: u64) -> SignerResult<H256> {
        self.ensure_chain(chain_id)?;
        Ok(H256(keccak256(&codec::signing_preimage(self, chain_id))))
    }

    /// Attach a signature produced for `chain_id`
    pub fn into_signed(self, chain_id: u64, signature: TxSignature) -> SignerResult<SignedTransaction> {
        self.ensure_chain(chain_id)?;
        if signature.recovery_id > 1 {
            return Err(SignerError::invalid_transaction(format!(
                "recovery id must be 0 or 1, got {}",
                signature.recovery_id
            )));
        }

        let encoded = codec::encode_signed(&self, chain_id, &signature)?;
        Ok(SignedTransaction {
            tx: self,
            chain_id,
            signature,
            encoded,
        })
    }

    fn ensure_chain(&self, chain_id: u64) -> SignerResult<()> {
        if chain_id > codec::MAX_CHAIN_ID {
            return Err(SignerError::invalid_transaction(format!(
                "chain id {} exceeds the largest EIP-155 chain id {}",
                chain_id,
                codec::MAX_CHAIN_ID
            )));
        }
        match self.chain_id() {
            Some(own) if own != chain_id => Err(SignerError::invalid_transaction(format!(
                "transaction targets chain {} but signer is configured for chain {}",
                own, chain_id
            ))),
            _ => Ok(()),
        }
    }
}

/// ECDSA signature components with a normalized recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub r: U256,
    pub s: U256,
    /// 0 or 1
    pub recovery_id: u8,
}

impl TxSignature {
    pub fn new(r: U256, s: U256, recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// Build from a 64-byte compact `r || s` signature
    pub fn from_compact(compact: &[u8], recovery_id: u8) -> SignerResult<Self> {
        if compact.len() != 64 {
            return Err(SignerError::invalid_input(format!(
                "compact signature must be 64 bytes, got {}",
                compact.len()
            )));
        }
        Ok(Self {
            r: U256::from_big_endian(&compact[..32]),
            s: U256::from_big_endian(&compact[32..]),
            recovery_id,
        })
    }

    fn as_recoverable(&self) -> Signature {
        Signature {
            r: self.r,
            s: self.s,
            v: 27 + self.recovery_id as u64,
        }
    }
}

/// A transaction with its signature, bound to one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: UnsignedTransaction,
    chain_id: u64,
    signature: TxSignature,
    encoded: Vec<u8>,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn signature(&self) -> &TxSignature {
        &self.signature
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce()
    }

    pub fn to(&self) -> Option<Address> {
        self.tx.to()
    }

    pub fn value(&self) -> U256 {
        self.tx.value()
    }

    pub fn fee_caps(&self) -> (U256, U256) {
        self.tx.fee_caps()
    }

    /// Chain-native serialization ready for broadcast
    pub fn encode(&self) -> &[u8] {
        &self.encoded
    }

    pub fn encode_hex(&self) -> String {
        hex::encode(&self.encoded)
    }

    /// Transaction hash as seen on chain
    pub fn hash(&self) -> H256 {
        H256(keccak256(&self.encoded))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash().as_bytes()))
    }

    pub fn signing_hash(&self) -> H256 {
        H256(keccak256(&codec::signing_preimage(&self.tx, self.chain_id)))
    }

    /// Recover the account that produced the signature
    pub fn recover_sender(&self) -> SignerResult<Address> {
        self.signature
            .as_recoverable()
            .recover(self.signing_hash())
            .map_err(|e| SignerError::invalid_transaction(format!("signature does not recover: {}", e)))
    }

    /// Checksummed recipient address, if the transaction has one
    pub fn recipient_hex(&self) -> Option<String> {
        self.to().map(|to| to_checksum_address(to.as_bytes()))
    }
}
