use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tx_signer::config::{ResolvedConfig, SignerConfig};
use tx_signer::db::{connect_pool, PoolRelease};
use tx_signer::ledger::PgLedger;
use tx_signer::logging::{init_logging, redact_dsn};
use tx_signer::pipeline::{PipelineSettings, SigningPipeline};
use tx_signer::queue::SqsQueue;
use tx_signer::runtime::install_signal_handlers;
use tx_signer::signing::{RemoteSigner, SignerCredentials};
use tx_signer::wallet::PgWalletStore;
use tx_signer::worker::{InvocationOutcome, Worker, WorkerError};

#[derive(Parser, Debug)]
#[command(name = "tx-signer")]
#[command(about = "Signs queued EVM transactions for custodial wallets", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Process at most one message, release resources and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error); overrides LOG_LEVEL
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), false);
            error!(error = %format!("{:#}", e), "could not load configuration");
            return ExitCode::FAILURE;
        }
    };

    let filter = if config.is_local() {
        format!("{},sqlx=debug", config.log_level)
    } else {
        config.log_level.clone()
    };
    init_logging(&filter, config.log_json);

    match run(cli.once, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{:#}", e), "tx-signer failed to start");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<SignerConfig> {
    let mut config = SignerConfig::load(cli.config.as_deref())?;
    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
        config.validate()?;
    }
    Ok(config)
}

/// Returns whether the run ended successfully
async fn run(once: bool, config: SignerConfig) -> Result<bool> {
    let resolved = config.resolve()?;
    info!(
        service = %config.service_name,
        environment = %config.environment,
        chain_id = resolved.chain_id,
        chain_rpc = %resolved.chain_rpc,
        once,
        "starting tx-signer"
    );

    let shutdown = install_signal_handlers();
    let call_timeout = config.call_timeout();

    let credentials = SignerCredentials::load(&resolved.signer_credentials)
        .await
        .context("could not load signing backend credentials")?;
    let signer = RemoteSigner::new(credentials, resolved.chain_id, call_timeout)?;

    let (wallets_pool, transactions_pool) = connect_pools(&resolved).await?;
    let queue = Arc::new(
        SqsQueue::connect(&resolved)
            .await
            .context("could not connect to SQS")?,
    );

    let settings = PipelineSettings {
        chain_id: resolved.chain_id,
        network_type: config.network_type,
        transfer_type: config.transfer_type,
    };
    let mut pipeline = SigningPipeline::new(
        settings,
        Arc::new(PgWalletStore::new(wallets_pool.clone())),
        Arc::new(signer),
        Arc::new(PgLedger::new(transactions_pool.clone())),
        queue.clone(),
    );
    if once {
        pipeline = pipeline.with_teardown(Arc::new(PoolRelease::new(vec![
            wallets_pool.clone(),
            transactions_pool.clone(),
        ])));
    }

    let long_poll = std::time::Duration::from_secs(config.sqs_wait_time_secs.max(0) as u64);
    let worker = Worker::new(queue, pipeline, shutdown, call_timeout).with_long_poll(long_poll);

    let success = if once {
        match worker.run_once().await {
            Ok(InvocationOutcome::Failed(_)) => false,
            Ok(outcome) => {
                info!(outcome = outcome_name(&outcome), "invocation finished");
                true
            }
            Err(e @ WorkerError::Receive(_)) => {
                error!(error = %e, "could not receive from the inbound queue");
                false
            }
            Err(e @ WorkerError::Acknowledge { .. }) => {
                error!(error = %e, "message was signed but could not be acknowledged");
                false
            }
        }
    } else {
        worker.run().await;
        true
    };

    wallets_pool.close().await;
    transactions_pool.close().await;
    Ok(success)
}

async fn connect_pools(
    resolved: &ResolvedConfig,
) -> Result<(sqlx::PgPool, sqlx::PgPool)> {
    let max_connections = resolved.base.db_max_connections;
    let timeout = resolved.base.call_timeout();

    let wallets = connect_pool(&resolved.wallets_postgres_dsn, max_connections, timeout)
        .await
        .with_context(|| format!("wallets database {}", redact_dsn(&resolved.wallets_postgres_dsn)))?;
    let transactions = connect_pool(&resolved.transactions_postgres_dsn, max_connections, timeout)
        .await
        .with_context(|| {
            format!(
                "transactions database {}",
                redact_dsn(&resolved.transactions_postgres_dsn)
            )
        })?;
    Ok((wallets, transactions))
}

fn outcome_name(outcome: &InvocationOutcome) -> &'static str {
    match outcome {
        InvocationOutcome::Empty => "empty",
        InvocationOutcome::Stopped => "stopped",
        InvocationOutcome::Acknowledged(_) => "acknowledged",
        InvocationOutcome::Failed(_) => "failed",
    }
}
