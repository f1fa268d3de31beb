//! Crypto Utilities
//!
//! Hashing and account-address helpers shared by the codec and the pipeline.

use ethers_core::types::Address;
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to an EIP-55 checksummed address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_alphabetic() && nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Parse a 20-byte hex account address. Names and other aliases yield `None`.
pub fn parse_account_address(value: &str) -> Option<Address> {
    let trimmed = value.trim();
    let hex_clean = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))?;
    if hex_clean.len() != 40 {
        return None;
    }
    let bytes = hex::decode(hex_clean).ok()?;
    Some(Address::from_slice(&bytes))
}
