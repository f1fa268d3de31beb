//! Ledger Amount Conversion
//!
//! Transaction values arrive as 256-bit base-unit integers (wei). The ledger
//! stores them as exact decimals of whole native units with 18 fractional
//! digits and a precision of 38 significant digits. Conversion never rounds:
//! a value either fits exactly or is rejected.

use crate::error::{SignerError, SignerResult};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fractional digits of the ledger amount column
pub const LEDGER_SCALE: u32 = 18;

/// Total significant digits of the ledger amount column
pub const LEDGER_PRECISION: u32 = 38;

/// Largest base-unit value the ledger column can hold (10^38 - 1)
pub const MAX_BASE_UNITS: u128 = 99_999_999_999_999_999_999_999_999_999_999_999_999;

/// Exact amount in whole native units, stored as base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct LedgerAmount(u128);

impl LedgerAmount {
    pub const ZERO: LedgerAmount = LedgerAmount(0);

    pub fn from_base_units(base_units: u128) -> SignerResult<Self> {
        if base_units > MAX_BASE_UNITS {
            return Err(SignerError::amount_overflow(format!(
                "{} base units exceeds ledger precision {}",
                base_units, LEDGER_PRECISION
            )));
        }
        Ok(Self(base_units))
    }

    pub fn base_units(&self) -> u128 {
        self.0
    }
}

/// Convert a base-unit transaction value into a ledger amount
pub fn to_ledger_amount(value: U256) -> SignerResult<LedgerAmount> {
    if value > U256::from(MAX_BASE_UNITS) {
        return Err(SignerError::amount_overflow(format!(
            "value {} wei exceeds ledger precision {}",
            value, LEDGER_PRECISION
        )));
    }
    LedgerAmount::from_base_units(value.as_u128())
}

/// Convert a per-gas fee cap into the ledger's 64-bit fee column
pub fn fee_to_ledger(fee: U256) -> SignerResult<i64> {
    if fee > U256::from(i64::MAX as u64) {
        return Err(SignerError::amount_overflow(format!(
            "fee {} does not fit a 64-bit ledger column",
            fee
        )));
    }
    Ok(fee.as_u64() as i64)
}

impl fmt::Display for LedgerAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let multiplier = 10u128.pow(LEDGER_SCALE);
        let integer = self.0 / multiplier;
        let fractional = self.0 % multiplier;

        if fractional == 0 {
            write!(f, "{}", integer)
        } else {
            let frac_str = format!("{:0>width$}", fractional, width = LEDGER_SCALE as usize);
            write!(f, "{}.{}", integer, frac_str.trim_end_matches('0'))
        }
    }
}

impl FromStr for LedgerAmount {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (integer_str, fractional_str) = match trimmed.split_once('.') {
            Some((integer, fractional)) => (integer, fractional),
            None => (trimmed, ""),
        };

        if integer_str.is_empty() || !integer_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SignerError::invalid_input(format!("invalid amount: {:?}", s)));
        }
        if !fractional_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SignerError::invalid_input(format!("invalid amount: {:?}", s)));
        }
        if fractional_str.len() > LEDGER_SCALE as usize {
            return Err(SignerError::invalid_input(format!(
                "amount {} has more than {} decimal places",
                s, LEDGER_SCALE
            )));
        }

        let integer: u128 = integer_str
            .parse()
            .map_err(|_| SignerError::amount_overflow(format!("amount {} is too large", s)))?;
        let padded = format!("{:0<width$}", fractional_str, width = LEDGER_SCALE as usize);
        let fractional: u128 = padded
            .parse()
            .map_err(|_| SignerError::invalid_input(format!("invalid amount: {:?}", s)))?;

        let base_units = integer
            .checked_mul(10u128.pow(LEDGER_SCALE))
            .and_then(|v| v.checked_add(fractional))
            .ok_or_else(|| SignerError::amount_overflow(format!("amount {} is too large", s)))?;
        LedgerAmount::from_base_units(base_units)
    }
}

impl From<LedgerAmount> for String {
    fn from(amount: LedgerAmount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for LedgerAmount {
    type Error = SignerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
