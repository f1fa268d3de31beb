//! Transaction Wire Codec
//!
//! RLP encoding for unsigned and signed transactions.
//!
//! Unsigned payloads use the zero-signature layout: the signed field list with
//! `v`, `r` and `s` left empty. Legacy payloads may carry an EIP-155 chain id
//! in the `v` slot. The 6-item legacy layout and the 9-item dynamic-fee
//! signing preimage are accepted on input; output is always the canonical
//! zero-signature layout, so encode → decode → encode reproduces the bytes.

use super::transaction::{
    AccessListItem, DynamicFeeTransaction, LegacyTransaction, TxSignature, UnsignedTransaction,
    DYNAMIC_FEE_TX_TYPE,
};
use crate::error::{SignerError, SignerResult};
use ethers_core::types::{Address, H256, U256};
use rlp::{Rlp, RlpStream};

const LEGACY_UNSIGNED_ITEMS: usize = 6;
const LEGACY_ITEMS: usize = 9;
const DYNAMIC_FEE_UNSIGNED_ITEMS: usize = 9;
const DYNAMIC_FEE_ITEMS: usize = 12;

/// Largest chain id whose EIP-155 `v` fits in 64 bits for either recovery id
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

// =============================================================================
// Decoding
// =============================================================================

/// Decode a hex payload (with or without `0x`) into an unsigned transaction
pub fn decode_unsigned_hex(raw: &str) -> SignerResult<UnsignedTransaction> {
    let trimmed = raw.trim();
    let hex_clean = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(hex_clean)?;
    decode_unsigned(&bytes)
}

/// Decode chain-native bytes into an unsigned transaction
pub fn decode_unsigned(bytes: &[u8]) -> SignerResult<UnsignedTransaction> {
    let first = *bytes
        .first()
        .ok_or_else(|| SignerError::invalid_transaction("empty transaction payload"))?;

    match first {
        0xc0..=0xff => decode_legacy(bytes).map(UnsignedTransaction::Legacy),
        DYNAMIC_FEE_TX_TYPE => decode_dynamic_fee(&bytes[1..]).map(UnsignedTransaction::DynamicFee),
        0x00..=0x7f => Err(SignerError::unsupported_transaction(format!(
            "transaction type 0x{:02x} is not supported",
            first
        ))),
        _ => Err(SignerError::invalid_transaction(
            "payload is an RLP string, expected a transaction list",
        )),
    }
}

fn open_list(bytes: &[u8]) -> SignerResult<(Rlp<'_>, usize)> {
    let rlp = Rlp::new(bytes);
    if !rlp.is_list() {
        return Err(SignerError::invalid_transaction("transaction payload is not an RLP list"));
    }
    let info = rlp.payload_info()?;
    if info.header_len + info.value_len != bytes.len() {
        return Err(SignerError::invalid_transaction("trailing bytes after transaction payload"));
    }
    let items = rlp.item_count()?;
    Ok((rlp, items))
}

fn decode_legacy(bytes: &[u8]) -> SignerResult<LegacyTransaction> {
    let (rlp, items) = open_list(bytes)?;
    if items != LEGACY_ITEMS && items != LEGACY_UNSIGNED_ITEMS {
        return Err(SignerError::invalid_transaction(format!(
            "legacy transaction must have {} or {} fields, got {}",
            LEGACY_UNSIGNED_ITEMS, LEGACY_ITEMS, items
        )));
    }

    let chain_id = if items == LEGACY_ITEMS {
        ensure_unsigned(&rlp, 7)?;
        match rlp.val_at::<u64>(6)? {
            0 => None,
            id => Some(id),
        }
    } else {
        None
    };

    Ok(LegacyTransaction {
        nonce: rlp.val_at(0)?,
        gas_price: rlp.val_at(1)?,
        gas_limit: rlp.val_at(2)?,
        to: decode_to(&rlp, 3)?,
        value: rlp.val_at(4)?,
        data: rlp.val_at(5)?,
        chain_id,
    })
}

fn decode_dynamic_fee(bytes: &[u8]) -> SignerResult<DynamicFeeTransaction> {
    let (rlp, items) = open_list(bytes)?;
    if items != DYNAMIC_FEE_ITEMS && items != DYNAMIC_FEE_UNSIGNED_ITEMS {
        return Err(SignerError::invalid_transaction(format!(
            "dynamic-fee transaction must have {} or {} fields, got {}",
            DYNAMIC_FEE_UNSIGNED_ITEMS, DYNAMIC_FEE_ITEMS, items
        )));
    }
    if items == DYNAMIC_FEE_ITEMS {
        if rlp.val_at::<u64>(9)? != 0 {
            return Err(SignerError::invalid_transaction("transaction is already signed"));
        }
        ensure_unsigned(&rlp, 10)?;
    }

    Ok(DynamicFeeTransaction {
        chain_id: rlp.val_at(0)?,
        nonce: rlp.val_at(1)?,
        max_priority_fee_per_gas: rlp.val_at(2)?,
        max_fee_per_gas: rlp.val_at(3)?,
        gas_limit: rlp.val_at(4)?,
        to: decode_to(&rlp, 5)?,
        value: rlp.val_at(6)?,
        data: rlp.val_at(7)?,
        access_list: decode_access_list(&rlp.at(8)?)?,
    })
}

/// `r` and `s` at `index`, `index + 1` must both be zero
fn ensure_unsigned(rlp: &Rlp<'_>, index: usize) -> SignerResult<()> {
    let r: U256 = rlp.val_at(index)?;
    let s: U256 = rlp.val_at(index + 1)?;
    if !r.is_zero() || !s.is_zero() {
        return Err(SignerError::invalid_transaction("transaction is already signed"));
    }
    Ok(())
}

fn decode_to(rlp: &Rlp<'_>, index: usize) -> SignerResult<Option<Address>> {
    let field = rlp.at(index)?;
    if field.is_empty() {
        return Ok(None);
    }
    Ok(Some(field.as_val()?))
}

fn decode_access_list(rlp: &Rlp<'_>) -> SignerResult<Vec<AccessListItem>> {
    if !rlp.is_list() {
        return Err(SignerError::invalid_transaction("access list is not an RLP list"));
    }
    let mut list = Vec::with_capacity(rlp.item_count()?);
    for entry in rlp.iter() {
        if entry.item_count()? != 2 {
            return Err(SignerError::invalid_transaction("access list entry must have 2 fields"));
        }
        list.push(AccessListItem {
            address: entry.val_at(0)?,
            storage_keys: entry.list_at::<H256>(1)?,
        });
    }
    Ok(list)
}

// =============================================================================
// Encoding
// =============================================================================

/// Canonical zero-signature encoding of an unsigned transaction
pub fn encode_unsigned(tx: &UnsignedTransaction) -> Vec<u8> {
    match tx {
        UnsignedTransaction::Legacy(tx) => {
            let mut stream = RlpStream::new_list(LEGACY_ITEMS);
            append_legacy_fields(&mut stream, tx);
            stream.append(&tx.chain_id.unwrap_or(0));
            stream.append(&0u8);
            stream.append(&0u8);
            stream.out().to_vec()
        }
        UnsignedTransaction::DynamicFee(tx) => {
            let mut stream = RlpStream::new_list(DYNAMIC_FEE_ITEMS);
            append_dynamic_fee_fields(&mut stream, tx);
            stream.append(&0u8);
            stream.append(&0u8);
            stream.append(&0u8);
            typed(stream)
        }
    }
}

/// Bytes hashed to produce the signing digest on `chain_id`
pub(crate) fn signing_preimage(tx: &UnsignedTransaction, chain_id: u64) -> Vec<u8> {
    match tx {
        UnsignedTransaction::Legacy(tx) => {
            let mut stream = RlpStream::new_list(LEGACY_ITEMS);
            append_legacy_fields(&mut stream, tx);
            stream.append(&chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
            stream.out().to_vec()
        }
        UnsignedTransaction::DynamicFee(tx) => {
            let mut stream = RlpStream::new_list(DYNAMIC_FEE_UNSIGNED_ITEMS);
            append_dynamic_fee_fields(&mut stream, tx);
            typed(stream)
        }
    }
}

/// EIP-155: v = recovery_id + 35 + 2 * chain_id
pub(crate) fn eip155_v(chain_id: u64, recovery_id: u8) -> SignerResult<u64> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35))
        .and_then(|v| v.checked_add(recovery_id as u64))
        .ok_or_else(|| {
            SignerError::invalid_transaction(format!("chain id {} is too large for EIP-155", chain_id))
        })
}

pub(crate) fn encode_signed(
    tx: &UnsignedTransaction,
    chain_id: u64,
    signature: &TxSignature,
) -> SignerResult<Vec<u8>> {
    Ok(match tx {
        UnsignedTransaction::Legacy(tx) => {
            let v = eip155_v(chain_id, signature.recovery_id)?;
            let mut stream = RlpStream::new_list(LEGACY_ITEMS);
            append_legacy_fields(&mut stream, tx);
            stream.append(&v);
            stream.append(&signature.r);
            stream.append(&signature.s);
            stream.out().to_vec()
        }
        UnsignedTransaction::DynamicFee(tx) => {
            let mut stream = RlpStream::new_list(DYNAMIC_FEE_ITEMS);
            append_dynamic_fee_fields(&mut stream, tx);
            stream.append(&signature.recovery_id);
            stream.append(&signature.r);
            stream.append(&signature.s);
            typed(stream)
        }
    })
}

fn typed(stream: RlpStream) -> Vec<u8> {
    let body = stream.out();
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(DYNAMIC_FEE_TX_TYPE);
    out.extend_from_slice(&body);
    out
}

fn append_legacy_fields(stream: &mut RlpStream, tx: &LegacyTransaction) {
    stream.append(&tx.nonce);
    stream.append(&tx.gas_price);
    stream.append(&tx.gas_limit);
    append_to(stream, tx.to.as_ref());
    stream.append(&tx.value);
    stream.append(&tx.data);
}

fn append_dynamic_fee_fields(stream: &mut RlpStream, tx: &DynamicFeeTransaction) {
    stream.append(&tx.chain_id);
    stream.append(&tx.nonce);
    stream.append(&tx.max_priority_fee_per_gas);
    stream.append(&tx.max_fee_per_gas);
    stream.append(&tx.gas_limit);
    append_to(stream, tx.to.as_ref());
    stream.append(&tx.value);
    stream.append(&tx.data);
    stream.begin_list(tx.access_list.len());
    for item in &tx.access_list {
        stream.begin_list(2);
        stream.append(&item.address);
        stream.begin_list(item.storage_keys.len());
        for key in &item.storage_keys {
            stream.append(key);
        }
    }
}

fn append_to(stream: &mut RlpStream, to: Option<&Address>) {
    match to {
        Some(address) => {
            stream.append(address);
        }
        None => {
            stream.append_empty_data();
        }
    }
}
