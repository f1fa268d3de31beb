use super::teardown::TeardownError;
use crate::error::SignerError;
use crate::ledger::LedgerError;
use crate::relay::RelayError;
use crate::signing::SignError;
use crate::wallet::ResolverError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline step, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    ResolveWallet,
    ResolveDerivationPath,
    Sign,
    DeriveRecord,
    Persist,
    Relay,
    Teardown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::ResolveWallet => "resolve_wallet",
            Stage::ResolveDerivationPath => "resolve_derivation_path",
            Stage::Sign => "sign",
            Stage::DeriveRecord => "derive_record",
            Stage::Persist => "persist",
            Stage::Relay => "relay",
            Stage::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and for which request a failure happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureContext {
    pub request_id: String,
    pub message_id: String,
    pub transaction_id: Option<String>,
    pub stage: Stage,
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage={} request_id={} message_id={}",
            self.stage, self.request_id, self.message_id
        )?;
        if let Some(ref transaction_id) = self.transaction_id {
            write!(f, " transaction_id={}", transaction_id)?;
        }
        Ok(())
    }
}

/// Fatal outcome of one invocation. No step after `context.stage` ran.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not decode request ({context}): {source}")]
    Decode {
        context: FailureContext,
        source: SignerError,
    },
    #[error("wallet {wallet_id} not found ({context})")]
    WalletNotFound { context: FailureContext, wallet_id: i64 },
    #[error("derivation path for key {key_id} not found ({context})")]
    DerivationPathNotFound { context: FailureContext, key_id: String },
    #[error("wallet directory failed ({context}): {source}")]
    Resolver {
        context: FailureContext,
        source: ResolverError,
    },
    #[error("signing failed ({context}): {source}")]
    SigningFailed {
        context: FailureContext,
        source: SignError,
    },
    #[error("amount conversion failed ({context}): {source}")]
    AmountConversion {
        context: FailureContext,
        source: SignerError,
    },
    #[error("could not persist transaction ({context}): {source}")]
    Persist {
        context: FailureContext,
        source: LedgerError,
    },
    #[error("could not relay signed transaction ({context}): {source}")]
    Relay {
        context: FailureContext,
        source: RelayError,
    },
    #[error("invocation cancelled ({context})")]
    Cancelled { context: FailureContext },
}

impl PipelineError {
    pub fn context(&self) -> &FailureContext {
        match self {
            PipelineError::Decode { context, .. }
            | PipelineError::WalletNotFound { context, .. }
            | PipelineError::DerivationPathNotFound { context, .. }
            | PipelineError::Resolver { context, .. }
            | PipelineError::SigningFailed { context, .. }
            | PipelineError::AmountConversion { context, .. }
            | PipelineError::Persist { context, .. }
            | PipelineError::Relay { context, .. }
            | PipelineError::Cancelled { context } => context,
        }
    }

    pub fn stage(&self) -> Stage {
        self.context().stage
    }

    /// Stable name of the error class, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode { .. } => "DecodeError",
            PipelineError::WalletNotFound { .. } => "WalletNotFound",
            PipelineError::DerivationPathNotFound { .. } => "DerivationPathNotFound",
            PipelineError::Resolver { .. } => "ResolverError",
            PipelineError::SigningFailed { .. } => "SigningFailed",
            PipelineError::AmountConversion { .. } => "AmountConversionError",
            PipelineError::Persist { .. } => "PersistError",
            PipelineError::Relay { .. } => "RelayError",
            PipelineError::Cancelled { .. } => "Cancelled",
        }
    }
}

/// Non-fatal teardown failure attached to a successful outcome
#[derive(Debug, Error)]
#[error("teardown warning: {0}")]
pub struct TeardownWarning(#[from] pub TeardownError);
