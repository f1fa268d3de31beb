//! Unified error type for tx-signer
//!
//! Codec, amount conversion, configuration and credential failures flow
//! through `SignerError`. Collaborators keep their own error enums so the
//! pipeline can tell "not found" apart from infrastructure failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main error type for signer operations outside the collaborator seams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SignerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_transaction(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransaction, msg)
    }

    pub fn unsupported_transaction(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedTransaction, msg)
    }

    pub fn amount_overflow(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AmountOverflow, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CredentialsError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SignerError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    InvalidTransaction,
    UnsupportedTransaction,

    // Parse errors
    JsonError,
    HexError,
    RlpError,

    // Conversion errors
    AmountOverflow,

    // Setup errors
    ConfigError,
    CredentialsError,
    NetworkError,
    Timeout,

    // Internal
    Internal,
}

/// Result type alias for signer operations
pub type SignerResult<T> = Result<T, SignerError>;

/// Collaborator errors that can stand for an expired call deadline
pub trait TimeoutError {
    fn timeout(after: Duration) -> Self;
}

// Conversions from common error types

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<rlp::DecoderError> for SignerError {
    fn from(e: rlp::DecoderError) -> Self {
        SignerError::new(ErrorCode::RlpError, e.to_string())
    }
}

impl From<std::io::Error> for SignerError {
    fn from(e: std::io::Error) -> Self {
        SignerError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<figment::Error> for SignerError {
    fn from(e: figment::Error) -> Self {
        SignerError::new(ErrorCode::ConfigError, e.to_string())
    }
}

impl From<url::ParseError> for SignerError {
    fn from(e: url::ParseError) -> Self {
        SignerError::new(ErrorCode::ConfigError, format!("invalid url: {}", e))
    }
}

impl From<reqwest::Error> for SignerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SignerError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            SignerError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            SignerError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}
