//! Transaction Module
//!
//! Wire codec, signing hashes and ledger amount conversion for EVM
//! transactions.

mod amount;
mod codec;
mod transaction;

pub use amount::*;
pub use codec::{decode_unsigned, decode_unsigned_hex, encode_unsigned, MAX_CHAIN_ID};
pub use transaction::*;
