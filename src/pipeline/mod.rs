//! Signing Pipeline
//!
//! One invocation turns one signing request into one signed, recorded and
//! relayed transaction:
//!
//! 1. decode the raw transaction
//! 2. resolve the wallet
//! 3. resolve the derivation path of the wallet's key
//! 4. delegate signing
//! 5. derive the ledger record
//! 6. persist the record
//! 7. relay the signed transaction
//! 8. release resources (best effort)
//!
//! Steps run strictly in order and the first failure ends the invocation.
//! Nothing is retried here; redelivery by the queue restarts from step 1.

mod context;
mod error;
mod teardown;

pub use context::{Cancelled, InvocationContext};
pub use error::{FailureContext, PipelineError, Stage, TeardownWarning};
pub use teardown::{KeepOpen, Teardown, TeardownError};

use crate::error::{SignerError, SignerResult};
use crate::ledger::TransactionLedger;
use crate::logging::{redact_address, redact_hash};
use crate::relay::OutboundRelay;
use crate::signing::{SignError, SignOptions, SigningDelegate};
use crate::tx::{decode_unsigned_hex, fee_to_ledger, to_ledger_amount, SignedTransaction, UnsignedTransaction};
use crate::types::{NetworkType, SignedOutboundItem, SigningRequest, TransactionRecord, TransferType, TxState, Wallet};
use crate::utils::crypto::parse_account_address;
use crate::wallet::{DerivationCoordinates, ResolverError, WalletResolver};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Values stamped on every ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chain_id: u64,
    pub network_type: NetworkType,
    pub transfer_type: TransferType,
}

impl PipelineSettings {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            network_type: NetworkType::default(),
            transfer_type: TransferType::default(),
        }
    }
}

/// Successful invocation
#[derive(Debug)]
pub struct SignedOutcome {
    pub transaction_hash: String,
    pub ledger_id: i64,
    pub teardown_warning: Option<TeardownWarning>,
}

pub struct SigningPipeline {
    settings: PipelineSettings,
    wallets: Arc<dyn WalletResolver>,
    signer: Arc<dyn SigningDelegate>,
    ledger: Arc<dyn TransactionLedger>,
    relay: Arc<dyn OutboundRelay>,
    teardown: Arc<dyn Teardown>,
}

impl SigningPipeline {
    pub fn new(
        settings: PipelineSettings,
        wallets: Arc<dyn WalletResolver>,
        signer: Arc<dyn SigningDelegate>,
        ledger: Arc<dyn TransactionLedger>,
        relay: Arc<dyn OutboundRelay>,
    ) -> Self {
        Self {
            settings,
            wallets,
            signer,
            ledger,
            relay,
            teardown: Arc::new(KeepOpen),
        }
    }

    pub fn with_teardown(mut self, teardown: Arc<dyn Teardown>) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Decode a queue message body and process it
    pub async fn process_message(
        &self,
        ctx: &InvocationContext,
        body: &str,
    ) -> Result<SignedOutcome, PipelineError> {
        let request = SigningRequest::from_json(body).map_err(|e| {
            let error = PipelineError::Decode {
                context: failure(ctx, None, Stage::Decode),
                source: SignerError::from(e),
            };
            ctx.span().in_scope(|| {
                warn!(error = %error, kind = error.kind(), "could not decode queue message");
            });
            error
        })?;
        self.process(ctx, request).await
    }

    pub async fn process(
        &self,
        ctx: &InvocationContext,
        request: SigningRequest,
    ) -> Result<SignedOutcome, PipelineError> {
        ctx.record_transaction_id(&request.transaction_id);

        let result = self.run(ctx, &request).instrument(ctx.span().clone()).await;

        ctx.span().in_scope(|| match &result {
            Ok(outcome) => info!(
                trx_hash = %redact_hash(&outcome.transaction_hash),
                ledger_id = outcome.ledger_id,
                teardown_warning = outcome.teardown_warning.is_some(),
                "transaction signed and relayed"
            ),
            Err(error) => warn!(
                error = %error,
                kind = error.kind(),
                stage = %error.stage(),
                "signing invocation failed"
            ),
        });

        result
    }

    async fn run(&self, ctx: &InvocationContext, request: &SigningRequest) -> Result<SignedOutcome, PipelineError> {
        let transaction_id = Some(request.transaction_id.as_str());

        // 1. decode
        let tx = decode_request(&request.raw_transaction_hex).map_err(|source| PipelineError::Decode {
            context: failure(ctx, transaction_id, Stage::Decode),
            source,
        })?;
        debug!(nonce = tx.nonce(), unsigned_hash = %redact_hash(&format!("{:?}", tx.hash())), "transaction decoded");

        // 2. wallet
        let wallet = settle(
            ctx.call(self.wallets.get_wallet(request.wallet_reference)).await,
            ctx,
            transaction_id,
            Stage::ResolveWallet,
            |context, source| match source {
                ResolverError::WalletNotFound(wallet_id) => PipelineError::WalletNotFound { context, wallet_id },
                source => PipelineError::Resolver { context, source },
            },
        )?;
        debug!(wallet_id = wallet.id, address = %redact_address(&wallet.address), "wallet resolved");

        // 3. derivation path
        let path = settle(
            ctx.call(self.wallets.get_derivation_path(&wallet.key_id)).await,
            ctx,
            transaction_id,
            Stage::ResolveDerivationPath,
            |context, source| match source {
                ResolverError::DerivationPathNotFound(key_id) => {
                    PipelineError::DerivationPathNotFound { context, key_id }
                }
                source => PipelineError::Resolver { context, source },
            },
        )?;
        let coordinates = DerivationCoordinates::assemble(&path, &wallet);
        for warning in coordinates.warnings() {
            warn!(key_id = %wallet.key_id, derivation_path = %coordinates, "{}", warning);
        }

        // 4. sign
        let signed = settle(
            ctx.call(self.sign(tx, &wallet, coordinates)).await,
            ctx,
            transaction_id,
            Stage::Sign,
            |context, source| PipelineError::SigningFailed { context, source },
        )?;

        // 5. record
        let record = self
            .derive_record(&signed, &wallet)
            .map_err(|source| PipelineError::AmountConversion {
                context: failure(ctx, transaction_id, Stage::DeriveRecord),
                source,
            })?;

        // 6. persist
        let receipt = settle(
            ctx.call(self.ledger.create_transaction(&record)).await,
            ctx,
            transaction_id,
            Stage::Persist,
            |context, source| PipelineError::Persist { context, source },
        )?;
        debug!(ledger_id = receipt.id, "transaction persisted");

        // 7. relay
        let item = SignedOutboundItem {
            id: ctx.message_id().to_string(),
            signed_transaction_hex: signed.encode_hex(),
            transaction_id: request.transaction_id.clone(),
        };
        settle(
            ctx.call(self.relay.add(item)).await,
            ctx,
            transaction_id,
            Stage::Relay,
            |context, source| PipelineError::Relay { context, source },
        )?;

        // 8. teardown
        let teardown_warning = match ctx.call(self.teardown.release()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(TeardownWarning(e)),
            Err(Cancelled) => Some(TeardownWarning(TeardownError::Cancelled)),
        };
        if let Some(ref warning) = teardown_warning {
            warn!(warning = %warning, "teardown failed after a successful invocation");
        }

        Ok(SignedOutcome {
            transaction_hash: record.trx_hash,
            ledger_id: receipt.id,
            teardown_warning,
        })
    }

    /// Delegate signing and check the result against the configured chain
    /// and, when it is a hex account, the wallet address
    async fn sign(
        &self,
        tx: UnsignedTransaction,
        wallet: &Wallet,
        derivation_path: DerivationCoordinates,
    ) -> Result<SignedTransaction, SignError> {
        let signed = self
            .signer
            .sign(SignOptions {
                tx,
                key_id: wallet.key_id.clone(),
                derivation_path,
            })
            .await?;

        if signed.chain_id() != self.settings.chain_id {
            return Err(SignError::ChainMismatch {
                expected: self.settings.chain_id,
                actual: signed.chain_id(),
            });
        }

        if let Some(expected) = parse_account_address(&wallet.address) {
            let recovered = signed
                .recover_sender()
                .map_err(|e| SignError::InvalidResponse(e.message))?;
            if recovered != expected {
                return Err(SignError::SenderMismatch {
                    expected: wallet.address.clone(),
                    recovered: format!("{:?}", recovered),
                });
            }
        }

        Ok(signed)
    }

    fn derive_record(&self, signed: &SignedTransaction, wallet: &Wallet) -> SignerResult<TransactionRecord> {
        let (max_fee, max_priority_fee) = signed.fee_caps();
        let nonce = i64::try_from(signed.nonce())
            .map_err(|_| SignerError::amount_overflow(format!("nonce {} does not fit bigint", signed.nonce())))?;
        let now = Utc::now();

        Ok(TransactionRecord {
            id: None,
            trx_hash: signed.hash_hex(),
            chain_id: signed.chain_id(),
            network_type: self.settings.network_type,
            state: TxState::Signed,
            transfer_type: self.settings.transfer_type,
            sender_address: wallet.address.clone(),
            recipient_address: signed.recipient_hex().unwrap_or_default(),
            amount: to_ledger_amount(signed.value())?,
            nonce,
            max_fee: fee_to_ledger(max_fee)?,
            max_priority_fee: fee_to_ledger(max_priority_fee)?,
            is_sender_paying_gas: false,
            created: now,
            updated: now,
        })
    }
}

fn decode_request(raw: &str) -> SignerResult<UnsignedTransaction> {
    let tx = decode_unsigned_hex(raw)?;
    if tx.to().is_none() {
        return Err(SignerError::unsupported_transaction(
            "contract creation transactions are not supported",
        ));
    }
    Ok(tx)
}

fn failure(ctx: &InvocationContext, transaction_id: Option<&str>, stage: Stage) -> FailureContext {
    FailureContext {
        request_id: ctx.request_id().to_string(),
        message_id: ctx.message_id().to_string(),
        transaction_id: transaction_id.map(str::to_string),
        stage,
    }
}

/// Fold a guarded collaborator call into the pipeline's error taxonomy
fn settle<T, E>(
    outcome: Result<Result<T, E>, Cancelled>,
    ctx: &InvocationContext,
    transaction_id: Option<&str>,
    stage: Stage,
    fail: impl FnOnce(FailureContext, E) -> PipelineError,
) -> Result<T, PipelineError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(fail(failure(ctx, transaction_id, stage), source)),
        Err(Cancelled) => Err(PipelineError::Cancelled {
            context: failure(ctx, transaction_id, stage),
        }),
    }
}
