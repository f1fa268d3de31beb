//! tx-signer Core Library
//!
//! Queue-driven signing service for EVM transactions held by custodial
//! wallets.
//!
//! # Architecture
//!
//! This crate provides:
//! - **pipeline**: The eight-step signing pipeline and its error taxonomy
//! - **tx**: Transaction wire codec, signing hashes, ledger amounts
//! - **wallet**: Wallet directory lookups and derivation coordinates
//! - **signing**: Remote threshold-signing backend client
//! - **ledger**: Durable transaction records
//! - **relay** / **queue**: Outbound and inbound message transport
//! - **worker**: Receive, process and acknowledge loop
//!
//! Every collaborator sits behind an `async_trait` so the pipeline can be
//! driven by in-memory implementations in tests and local runs.
//!
//! # Delivery semantics
//!
//! Processing is at-least-once. A message whose invocation fails after the
//! ledger insert will be signed and persisted again when redelivered.
//!
//! # Example
//!
//! ```rust,ignore
//! use tx_signer::pipeline::{InvocationContext, SigningPipeline};
//!
//! let ctx = InvocationContext::new(message_id, shutdown, call_timeout);
//! let outcome = pipeline.process_message(&ctx, &body).await?;
//! println!("signed {}", outcome.transaction_hash);
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod relay;
pub mod runtime;
pub mod signing;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;
pub mod worker;

// Re-export key types for convenience
pub use config::SignerConfig;
pub use error::{ErrorCode, SignerError, SignerResult};
pub use pipeline::{InvocationContext, PipelineError, SignedOutcome, SigningPipeline};
pub use types::*;
pub use worker::{InvocationOutcome, Worker, WorkerError};
