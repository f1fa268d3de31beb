//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod crypto;

pub use crypto::*;
