//! Key Derivation Coordinates
//!
//! The signing backend addresses a child key by five BIP-44 style indices:
//! `[purpose, coin_type, account, change, address_index]`. The first four
//! come from the derivation path row attached to the wallet's key, the last
//! one from the wallet itself.

use crate::types::{DerivationPath, Wallet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard BIP-44 purpose
pub const BIP44_PURPOSE: u32 = 44;

/// Hardened offset for BIP-32 derivation
pub const HARDENED: u32 = 0x8000_0000;

/// Ordered derivation indices handed to the signing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivationCoordinates([u32; 5]);

impl DerivationCoordinates {
    pub fn new(indices: [u32; 5]) -> Self {
        Self(indices)
    }

    /// Combine the key's path row with the wallet's address index
    pub fn assemble(path: &DerivationPath, wallet: &Wallet) -> Self {
        Self([
            path.purpose,
            path.coin_type,
            path.account,
            path.change,
            wallet.address_index,
        ])
    }

    pub fn purpose(&self) -> u32 {
        self.0[0]
    }

    pub fn coin_type(&self) -> u32 {
        self.0[1]
    }

    pub fn address_index(&self) -> u32 {
        self.0[4]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.0.to_vec()
    }

    /// Non-fatal oddities worth a log line
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.purpose() != BIP44_PURPOSE {
            warnings.push(format!(
                "purpose {} is not BIP-44; the backend may derive an unexpected key",
                self.purpose()
            ));
        }

        for (position, index) in self.0.iter().enumerate() {
            if index & HARDENED != 0 {
                warnings.push(format!(
                    "index {} at position {} already carries the hardened bit",
                    index, position
                ));
            }
        }

        warnings
    }
}

impl fmt::Display for DerivationCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

impl From<DerivationCoordinates> for Vec<u32> {
    fn from(coordinates: DerivationCoordinates) -> Self {
        coordinates.to_vec()
    }
}
