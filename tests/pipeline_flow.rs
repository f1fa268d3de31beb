//! End-to-end pipeline runs against in-memory collaborators.
//!
//! Every double records the calls it receives so each scenario can assert
//! which steps ran and which never started.

use async_trait::async_trait;
use chrono::Utc;
use ethers_core::types::{Address, U256};
use secp256k1::{Message, Secp256k1, SecretKey};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tx_signer::ledger::{LedgerError, MemoryLedger, TransactionLedger};
use tx_signer::pipeline::{
    InvocationContext, PipelineError, PipelineSettings, SignedOutcome, SigningPipeline, Stage, Teardown,
    TeardownError,
};
use tx_signer::queue::{Delivery, InboundQueue, MemoryQueue, QueueError};
use tx_signer::relay::{MemoryRelay, OutboundRelay, RelayError};
use tx_signer::runtime::Shutdown;
use tx_signer::signing::{SignError, SignOptions, SigningDelegate};
use tx_signer::tx::{
    encode_unsigned, LegacyTransaction, SignedTransaction, TxSignature, UnsignedTransaction, MAX_BASE_UNITS,
};
use tx_signer::types::{
    DerivationPath, LedgerReceipt, SignedOutboundItem, TransactionRecord, TxState, Wallet,
};
use tx_signer::utils::crypto::keccak256;
use tx_signer::wallet::{MemoryWalletStore, ResolverError, WalletResolver};
use tx_signer::worker::{InvocationOutcome, Worker, WorkerError};

const CHAIN_ID: u64 = 614;
const SECRET: [u8; 32] = [0x46; 32];
const SECRET_ADDRESS: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";
const RECIPIENT: &str = "0x3535353535353535353535353535353535353535";

// =============================================================================
// Recording doubles
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fault {
    Fail,
    Stall,
}

#[derive(Default)]
struct Faults {
    wallet: Option<Fault>,
    sign: Option<Fault>,
    persist: Option<Fault>,
    relay: Option<Fault>,
    teardown: Option<Fault>,
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<&'static str>>>,
    faults: Arc<Mutex<Faults>>,
    sign_requests: Arc<Mutex<Vec<(String, Vec<u32>)>>>,
}

impl Recorder {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn fault(&self, pick: impl Fn(&Faults) -> Option<Fault>) -> Option<Fault> {
        pick(&self.faults.lock().unwrap())
    }

    fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }
}

async fn stall() {
    std::future::pending::<()>().await
}

struct RecordingWallets {
    store: MemoryWalletStore,
    recorder: Recorder,
}

#[async_trait]
impl WalletResolver for RecordingWallets {
    async fn get_wallet(&self, id: i64) -> Result<Wallet, ResolverError> {
        self.recorder.record("get_wallet");
        match self.recorder.fault(|f| f.wallet) {
            Some(Fault::Fail) => Err(ResolverError::Backend("directory offline".to_string())),
            Some(Fault::Stall) => {
                stall().await;
                unreachable!()
            }
            None => self.store.get_wallet(id).await,
        }
    }

    async fn get_derivation_path(&self, key_id: &str) -> Result<DerivationPath, ResolverError> {
        self.recorder.record("get_derivation_path");
        self.store.get_derivation_path(key_id).await
    }
}

/// Signs with a fixed local key in place of the threshold backend
struct LocalKeySigner {
    secret: SecretKey,
    chain_id: u64,
    recorder: Recorder,
}

impl LocalKeySigner {
    fn sign_with_key(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, SignError> {
        let digest = tx.signing_hash(self.chain_id)?;
        let message = Message::from_digest(digest.0);
        let signature = Secp256k1::new().sign_ecdsa_recoverable(&message, &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();
        let signature = TxSignature::from_compact(&compact, recovery_id.to_i32() as u8)?;
        Ok(tx.into_signed(self.chain_id, signature)?)
    }
}

#[async_trait]
impl SigningDelegate for LocalKeySigner {
    async fn sign(&self, options: SignOptions) -> Result<SignedTransaction, SignError> {
        self.recorder.record("sign");
        self.recorder
            .sign_requests
            .lock()
            .unwrap()
            .push((options.key_id.clone(), options.derivation_path.to_vec()));
        match self.recorder.fault(|f| f.sign) {
            Some(Fault::Fail) => Err(SignError::Rejected("key is locked".to_string())),
            Some(Fault::Stall) => {
                stall().await;
                unreachable!()
            }
            None => self.sign_with_key(options.tx),
        }
    }
}

struct RecordingLedger {
    ledger: MemoryLedger,
    recorder: Recorder,
}

#[async_trait]
impl TransactionLedger for RecordingLedger {
    async fn create_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError> {
        self.recorder.record("create_transaction");
        match self.recorder.fault(|f| f.persist) {
            Some(Fault::Fail) => Err(LedgerError::Backend("connection reset".to_string())),
            Some(Fault::Stall) => {
                stall().await;
                unreachable!()
            }
            None => self.ledger.create_transaction(record).await,
        }
    }
}

struct RecordingRelay {
    relay: MemoryRelay,
    recorder: Recorder,
}

#[async_trait]
impl OutboundRelay for RecordingRelay {
    async fn add(&self, item: SignedOutboundItem) -> Result<(), RelayError> {
        self.recorder.record("relay");
        match self.recorder.fault(|f| f.relay) {
            Some(Fault::Fail) => Err(RelayError::Backend("queue unavailable".to_string())),
            Some(Fault::Stall) => {
                stall().await;
                unreachable!()
            }
            None => self.relay.add(item).await,
        }
    }
}

struct RecordingTeardown {
    recorder: Recorder,
}

#[async_trait]
impl Teardown for RecordingTeardown {
    async fn release(&self) -> Result<(), TeardownError> {
        self.recorder.record("teardown");
        match self.recorder.fault(|f| f.teardown) {
            Some(Fault::Fail) => Err(TeardownError::Release("pool already closed".to_string())),
            Some(Fault::Stall) => {
                stall().await;
                unreachable!()
            }
            None => Ok(()),
        }
    }
}

/// Delivers normally but never manages to acknowledge
struct StuckAckQueue {
    queue: MemoryQueue,
}

#[async_trait]
impl InboundQueue for StuckAckQueue {
    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        self.queue.receive().await
    }

    async fn acknowledge(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        Err(QueueError::Backend("receipt handle expired".to_string()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Harness {
    recorder: Recorder,
    store: MemoryWalletStore,
    ledger: MemoryLedger,
    relay: MemoryRelay,
    shutdown: Shutdown,
    call_timeout: Duration,
}

fn wallet(id: i64, address: &str, key_id: &str) -> Wallet {
    Wallet {
        id,
        user_id: Some(3),
        address: address.to_string(),
        chain_id: CHAIN_ID as i64,
        key_id: key_id.to_string(),
        is_multisig: false,
        address_index: 0,
        multisig_threshold: None,
        created: Utc::now(),
        updated: Utc::now(),
    }
}

fn derivation_path(wallet_id: i64) -> DerivationPath {
    DerivationPath {
        id: 100 + wallet_id,
        wallet_id,
        purpose: 44,
        coin_type: 614,
        account: 4,
        change: 0,
        created: Utc::now(),
        updated: Utc::now(),
    }
}

impl Harness {
    fn new() -> Self {
        Self::with_timeout(Duration::from_secs(2))
    }

    fn with_timeout(call_timeout: Duration) -> Self {
        let store = MemoryWalletStore::new();
        // 1: named wallet, 2: no derivation path, 3: hex address of the signing key,
        // 4: hex address of some other key
        store.insert_wallet(wallet(1, "mara.eth", "K1")).unwrap();
        store.insert_derivation_path(derivation_path(1)).unwrap();
        store.insert_wallet(wallet(2, "nopath.eth", "K2")).unwrap();
        store.insert_wallet(wallet(3, SECRET_ADDRESS, "K3")).unwrap();
        store.insert_derivation_path(derivation_path(3)).unwrap();
        store
            .insert_wallet(wallet(4, "0x0000000000000000000000000000000000000001", "K4"))
            .unwrap();
        store.insert_derivation_path(derivation_path(4)).unwrap();

        Self {
            recorder: Recorder::default(),
            store,
            ledger: MemoryLedger::new(),
            relay: MemoryRelay::new(),
            shutdown: Shutdown::new(),
            call_timeout,
        }
    }

    /// A pipeline over this harness's shared doubles
    fn pipeline(&self) -> SigningPipeline {
        SigningPipeline::new(
            PipelineSettings::new(CHAIN_ID),
            Arc::new(RecordingWallets {
                store: self.store.clone(),
                recorder: self.recorder.clone(),
            }),
            Arc::new(LocalKeySigner {
                secret: SecretKey::from_slice(&SECRET).unwrap(),
                chain_id: CHAIN_ID,
                recorder: self.recorder.clone(),
            }),
            Arc::new(RecordingLedger {
                ledger: self.ledger.clone(),
                recorder: self.recorder.clone(),
            }),
            Arc::new(RecordingRelay {
                relay: self.relay.clone(),
                recorder: self.recorder.clone(),
            }),
        )
        .with_teardown(Arc::new(RecordingTeardown {
            recorder: self.recorder.clone(),
        }))
    }

    fn worker(&self, queue: &MemoryQueue) -> Worker {
        Worker::new(
            Arc::new(queue.clone()),
            self.pipeline(),
            self.shutdown.clone(),
            self.call_timeout,
        )
    }

    async fn submit(&self, message_id: &str, body: &str) -> Result<SignedOutcome, PipelineError> {
        let ctx = InvocationContext::new(message_id, self.shutdown.clone(), self.call_timeout);
        self.pipeline().process_message(&ctx, body).await
    }
}

fn unsigned(value: U256) -> UnsignedTransaction {
    unsigned_on(CHAIN_ID, value)
}

fn unsigned_on(chain_id: u64, value: U256) -> UnsignedTransaction {
    UnsignedTransaction::Legacy(LegacyTransaction {
        nonce: 9,
        gas_price: U256::from(20_000_000_000u64),
        gas_limit: 21_000,
        to: Some(RECIPIENT.parse::<Address>().unwrap()),
        value,
        data: Vec::new(),
        chain_id: Some(chain_id),
    })
}

fn one_ether() -> U256 {
    U256::from(1_000_000_000_000_000_000u64)
}

fn body_for(tx: &UnsignedTransaction, wallet_id: i64) -> String {
    serde_json::json!({
        "id": "req-1",
        "raw_tx": hex::encode(encode_unsigned(tx)),
        "transaction_id": "T1",
        "wallet_row_id": wallet_id,
    })
    .to_string()
}

fn request_body(wallet_id: i64) -> String {
    body_for(&unsigned(one_ether()), wallet_id)
}

const ALL_STEPS: [&str; 6] = [
    "get_wallet",
    "get_derivation_path",
    "sign",
    "create_transaction",
    "relay",
    "teardown",
];

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
async fn signs_persists_and_relays() {
    let harness = Harness::new();
    let outcome = harness.submit("M1", &request_body(1)).await.unwrap();

    assert_eq!(harness.recorder.calls(), ALL_STEPS.to_vec());
    assert!(outcome.teardown_warning.is_none());
    assert_eq!(outcome.ledger_id, 1);

    let sign_requests = harness.recorder.sign_requests.lock().unwrap().clone();
    assert_eq!(sign_requests, vec![("K1".to_string(), vec![44, 614, 4, 0, 0])]);

    let rows = harness.ledger.rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.state, TxState::Signed);
    assert_eq!(row.sender_address, "mara.eth");
    assert_eq!(row.recipient_address.to_ascii_lowercase(), RECIPIENT);
    assert_eq!(row.amount.to_string(), "1");
    assert_eq!(row.nonce, 9);
    assert_eq!(row.max_fee, 20_000_000_000);
    assert_eq!(row.max_priority_fee, 20_000_000_000);
    assert_eq!(row.chain_id, CHAIN_ID);
    assert!(!row.is_sender_paying_gas);
    assert_eq!(row.trx_hash, outcome.transaction_hash);

    let items = harness.relay.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "M1");
    assert_eq!(items[0].transaction_id, "T1");
    assert!(!items[0].signed_transaction_hex.starts_with("0x"));

    let signed_bytes = hex::decode(&items[0].signed_transaction_hex).unwrap();
    assert_eq!(row.trx_hash, format!("0x{}", hex::encode(keccak256(&signed_bytes))));
}

#[tokio::test]
async fn hex_wallet_address_must_match_the_signature() {
    let harness = Harness::new();
    harness.submit("M1", &request_body(3)).await.unwrap();
    assert_eq!(harness.ledger.rows()[0].sender_address, SECRET_ADDRESS);

    let err = harness.submit("M2", &request_body(4)).await.unwrap_err();
    match err {
        PipelineError::SigningFailed { ref context, ref source } => {
            assert_eq!(context.stage, Stage::Sign);
            assert!(matches!(source, SignError::SenderMismatch { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.ledger.rows().len(), 1);
    assert_eq!(harness.relay.items().len(), 1);
}

#[tokio::test]
async fn unknown_wallet_stops_before_any_other_call() {
    let harness = Harness::new();
    let err = harness.submit("M1", &request_body(999)).await.unwrap_err();

    assert!(matches!(err, PipelineError::WalletNotFound { wallet_id: 999, .. }));
    assert_eq!(err.context().transaction_id.as_deref(), Some("T1"));
    assert_eq!(err.context().message_id, "M1");
    assert_eq!(harness.recorder.calls(), vec!["get_wallet"]);
    assert!(harness.ledger.rows().is_empty());
    assert!(harness.relay.items().is_empty());
}

#[tokio::test]
async fn malformed_input_makes_no_calls() {
    let harness = Harness::new();

    let bad_hex = serde_json::json!({
        "raw_tx": "zz-not-hex",
        "transaction_id": "T1",
        "wallet_row_id": 1,
    })
    .to_string();
    let err = harness.submit("M1", &bad_hex).await.unwrap_err();
    assert!(matches!(err, PipelineError::Decode { .. }));
    assert_eq!(err.context().transaction_id.as_deref(), Some("T1"));

    let err = harness.submit("M2", "{not json").await.unwrap_err();
    assert!(matches!(err, PipelineError::Decode { .. }));
    assert_eq!(err.context().transaction_id, None);
    assert_eq!(err.stage(), Stage::Decode);

    assert!(harness.recorder.calls().is_empty());
}

#[tokio::test]
async fn missing_derivation_path() {
    let harness = Harness::new();
    let err = harness.submit("M1", &request_body(2)).await.unwrap_err();

    match err {
        PipelineError::DerivationPathNotFound { ref key_id, .. } => assert_eq!(key_id, "K2"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.recorder.calls(), vec!["get_wallet", "get_derivation_path"]);
}

#[tokio::test]
async fn signing_failure_writes_nothing() {
    let harness = Harness::new();
    harness.recorder.set_faults(Faults {
        sign: Some(Fault::Fail),
        ..Faults::default()
    });

    let err = harness.submit("M1", &request_body(1)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SigningFailed {
            source: SignError::Rejected(_),
            ..
        }
    ));
    assert_eq!(harness.recorder.calls(), ALL_STEPS[..3].to_vec());
    assert!(harness.ledger.rows().is_empty());
}

#[tokio::test]
async fn persist_failure_then_redelivery() {
    let harness = Harness::new();
    harness.recorder.set_faults(Faults {
        persist: Some(Fault::Fail),
        ..Faults::default()
    });

    let err = harness.submit("M1", &request_body(1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Persist { .. }));
    assert_eq!(harness.recorder.calls(), ALL_STEPS[..4].to_vec());
    assert!(harness.relay.items().is_empty());

    harness.recorder.set_faults(Faults::default());
    harness.recorder.reset_calls();
    harness.submit("M1", &request_body(1)).await.unwrap();

    assert_eq!(harness.recorder.calls(), ALL_STEPS.to_vec());
    assert_eq!(harness.ledger.rows().len(), 1);
    assert_eq!(harness.relay.items().len(), 1);
}

#[tokio::test]
async fn relay_failure_leaves_the_ledger_row() {
    let harness = Harness::new();
    harness.recorder.set_faults(Faults {
        relay: Some(Fault::Fail),
        ..Faults::default()
    });

    let err = harness.submit("M1", &request_body(1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Relay { .. }));
    assert_eq!(harness.recorder.calls(), ALL_STEPS[..5].to_vec());
    assert_eq!(harness.ledger.rows().len(), 1);
    assert!(harness.relay.items().is_empty());

    // redelivery signs and persists again: delivery is at-least-once
    harness.recorder.set_faults(Faults::default());
    harness.submit("M1", &request_body(1)).await.unwrap();

    let rows = harness.ledger.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].trx_hash, rows[1].trx_hash);
    assert_eq!(harness.relay.items().len(), 1);
}

#[tokio::test]
async fn teardown_failure_is_only_a_warning() {
    let harness = Harness::new();
    harness.recorder.set_faults(Faults {
        teardown: Some(Fault::Fail),
        ..Faults::default()
    });

    let outcome = harness.submit("M1", &request_body(1)).await.unwrap();
    let warning = outcome.teardown_warning.expect("teardown warning");
    assert!(matches!(warning.0, TeardownError::Release(_)));
    assert_eq!(harness.ledger.rows().len(), 1);
    assert_eq!(harness.relay.items().len(), 1);
}

#[tokio::test]
async fn shutdown_cancels_before_the_first_call() {
    let harness = Harness::new();
    harness.shutdown.trigger().await;

    let err = harness.submit("M1", &request_body(1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));
    assert_eq!(err.stage(), Stage::ResolveWallet);
    assert!(harness.recorder.calls().is_empty());
}

#[tokio::test]
async fn shutdown_interrupts_a_stuck_call() {
    let harness = Harness::new();
    harness.recorder.set_faults(Faults {
        sign: Some(Fault::Stall),
        ..Faults::default()
    });

    let shutdown = harness.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger().await;
    });

    let err = harness.submit("M1", &request_body(1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));
    assert_eq!(err.stage(), Stage::Sign);
    assert!(harness.ledger.rows().is_empty());
}

#[tokio::test]
async fn stuck_collaborators_time_out() {
    let harness = Harness::with_timeout(Duration::from_millis(50));
    harness.recorder.set_faults(Faults {
        persist: Some(Fault::Stall),
        ..Faults::default()
    });
    let err = harness.submit("M1", &request_body(1)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Persist {
            source: LedgerError::Timeout(_),
            ..
        }
    ));
    assert!(!harness.recorder.calls().contains(&"relay"));

    harness.recorder.set_faults(Faults {
        wallet: Some(Fault::Stall),
        ..Faults::default()
    });
    let err = harness.submit("M2", &request_body(1)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Resolver {
            source: ResolverError::Timeout(_),
            ..
        }
    ));
}

#[tokio::test]
async fn stuck_teardown_still_succeeds() {
    let harness = Harness::with_timeout(Duration::from_millis(50));
    harness.recorder.set_faults(Faults {
        teardown: Some(Fault::Stall),
        ..Faults::default()
    });

    let outcome = harness.submit("M1", &request_body(1)).await.unwrap();
    let warning = outcome.teardown_warning.expect("teardown warning");
    assert!(matches!(warning.0, TeardownError::Timeout(_)));
}

#[tokio::test]
async fn amount_beyond_ledger_precision() {
    let harness = Harness::new();
    let tx = unsigned(U256::from(MAX_BASE_UNITS) + U256::one());

    let err = harness.submit("M1", &body_for(&tx, 1)).await.unwrap_err();
    assert!(matches!(err, PipelineError::AmountConversion { .. }));
    assert_eq!(err.stage(), Stage::DeriveRecord);
    assert_eq!(harness.recorder.calls(), ALL_STEPS[..3].to_vec());
    assert!(harness.ledger.rows().is_empty());
}

#[tokio::test]
async fn payload_for_another_chain_is_not_signed() {
    let harness = Harness::new();
    let tx = unsigned_on(1, one_ether());

    let err = harness.submit("M1", &body_for(&tx, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SigningFailed {
            source: SignError::Transaction(_),
            ..
        }
    ));
    assert!(harness.ledger.rows().is_empty());
}

// =============================================================================
// Worker
// =============================================================================

#[tokio::test]
async fn worker_acknowledges_only_successful_messages() {
    let harness = Harness::new();
    let queue = MemoryQueue::new();
    queue.push("M1", request_body(1)).unwrap();
    queue.push("M2", request_body(999)).unwrap();
    let worker = harness.worker(&queue);

    let first = worker.run_once().await.unwrap();
    assert!(matches!(first, InvocationOutcome::Acknowledged(_)));
    assert!(first.is_success());

    let second = worker.run_once().await.unwrap();
    assert!(matches!(second, InvocationOutcome::Failed(PipelineError::WalletNotFound { .. })));
    assert!(!second.is_success());

    assert_eq!(queue.acknowledged(), vec!["M1".to_string()]);
    assert_eq!(queue.in_flight_len(), 1);
    assert_eq!(harness.relay.items()[0].id, "M1");
}

#[tokio::test]
async fn worker_treats_an_empty_queue_as_success() {
    let harness = Harness::new();
    let queue = MemoryQueue::new();
    let worker = harness.worker(&queue);

    let outcome = worker.run_once().await.unwrap();
    assert!(matches!(outcome, InvocationOutcome::Empty));
    assert!(outcome.is_success());
    assert!(harness.recorder.calls().is_empty());
}

#[tokio::test]
async fn failed_message_is_redelivered() {
    let harness = Harness::new();
    harness.recorder.set_faults(Faults {
        relay: Some(Fault::Fail),
        ..Faults::default()
    });
    let queue = MemoryQueue::new();
    queue.push("M1", request_body(1)).unwrap();
    let worker = harness.worker(&queue);

    assert!(matches!(worker.run_once().await.unwrap(), InvocationOutcome::Failed(_)));
    assert!(queue.acknowledged().is_empty());

    harness.recorder.set_faults(Faults::default());
    assert_eq!(queue.release_in_flight().unwrap(), 1);
    assert!(matches!(worker.run_once().await.unwrap(), InvocationOutcome::Acknowledged(_)));
    assert_eq!(queue.acknowledged(), vec!["M1".to_string()]);
    assert_eq!(harness.ledger.rows().len(), 2);
}

#[tokio::test]
async fn worker_loop_drains_the_queue_until_shutdown() {
    let harness = Harness::new();
    let queue = MemoryQueue::new();
    for n in 0..3 {
        queue.push(format!("M{}", n), request_body(1)).unwrap();
    }
    let worker = harness.worker(&queue);
    let shutdown = harness.shutdown.clone();
    let task = tokio::spawn(async move { worker.run().await });

    for _ in 0..100 {
        if queue.acknowledged().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.trigger().await;
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    assert_eq!(queue.acknowledged(), vec!["M0", "M1", "M2"]);
    assert_eq!(harness.relay.items().len(), 3);
}

#[tokio::test]
async fn stopped_worker_takes_nothing() {
    let harness = Harness::new();
    let queue = MemoryQueue::new();
    queue.push("M1", request_body(1)).unwrap();
    let worker = harness.worker(&queue);
    harness.shutdown.trigger().await;

    assert!(matches!(worker.run_once().await.unwrap(), InvocationOutcome::Stopped));
    assert_eq!(queue.pending_len(), 1);
}

#[tokio::test]
async fn redelivery_is_rejected_by_a_unique_hash_ledger() {
    let mut harness = Harness::new();
    harness.ledger = MemoryLedger::new().with_unique_hashes();
    harness.recorder.set_faults(Faults {
        relay: Some(Fault::Fail),
        ..Faults::default()
    });
    let queue = MemoryQueue::new();
    queue.push("M1", request_body(1)).unwrap();
    let worker = harness.worker(&queue);

    assert!(matches!(
        worker.run_once().await.unwrap(),
        InvocationOutcome::Failed(PipelineError::Relay { .. })
    ));

    harness.recorder.set_faults(Faults::default());
    harness.recorder.reset_calls();
    assert_eq!(queue.release_in_flight().unwrap(), 1);

    let outcome = worker.run_once().await.unwrap();
    assert!(matches!(
        outcome,
        InvocationOutcome::Failed(PipelineError::Persist {
            source: LedgerError::Duplicate(_),
            ..
        })
    ));
    assert!(harness.recorder.calls().contains(&"create_transaction"));
    assert!(!harness.recorder.calls().contains(&"relay"));
    assert!(queue.acknowledged().is_empty());
    assert_eq!(harness.ledger.rows().len(), 1);
    assert!(harness.relay.items().is_empty());
}

#[tokio::test]
async fn acknowledge_failure_is_reported_separately_from_receive() {
    let harness = Harness::new();
    let queue = MemoryQueue::new();
    queue.push("M1", request_body(1)).unwrap();
    let worker = Worker::new(
        Arc::new(StuckAckQueue { queue: queue.clone() }),
        harness.pipeline(),
        harness.shutdown.clone(),
        harness.call_timeout,
    );

    let err = worker.run_once().await.unwrap_err();
    match err {
        WorkerError::Acknowledge { ref message_id, .. } => assert_eq!(message_id, "M1"),
        ref other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("could not acknowledge message M1"));
    assert_eq!(harness.relay.items().len(), 1);
    assert_eq!(queue.in_flight_len(), 1);
}
