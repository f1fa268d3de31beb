//! Configuration loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Optional TOML file (`--config`)
//! 3. Environment variables (`CHAIN_ID`, `SQS_REGION`, ...)
//!
//! Keys are flat; a TOML file uses the lowercase form of the environment
//! name (`chain_id = 614`).

use crate::error::{SignerError, SignerResult};
use crate::tx::MAX_CHAIN_ID;
use crate::types::{NetworkType, TransferType};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_CHAIN_RPC: &str = "http://localhost:8545";
const DEFAULT_SQS_REGION: &str = "eu-west-2";
const DEFAULT_SQS_LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";
const DEFAULT_SERVICE_NAME: &str = "tx-signer";
const DEFAULT_SIGNER_SECRET_REGION: &str = "eu-west-2";
const DEFAULT_SIGNER_LOCALSTACK_ENDPOINT: &str = "http://host.docker.internal:4566";

/// Environment variables read by the loader
const ENV_KEYS: &[&str] = &[
    "LOG_LEVEL",
    "LOG_JSON",
    "ENVIRONMENT",
    "SERVICE_NAME",
    "CHAIN_RPC",
    "CHAIN_ID",
    "NETWORK_TYPE",
    "TRANSFER_TYPE",
    "WALLETS_POSTGRES_DSN",
    "TRANSACTIONS_POSTGRES_DSN",
    "DB_MAX_CONNECTIONS",
    "SQS_REGION",
    "SQS_READ_QUEUE_NAME",
    "SQS_WRITE_QUEUE_NAME",
    "SQS_LOCALSTACK_ENDPOINT",
    "SQS_WAIT_TIME_SECS",
    "SIGNER_CREDENTIALS_PATH",
    "SIGNER_SECRET_NAME",
    "SIGNER_SECRET_REGION",
    "SIGNER_LOCALSTACK_ENDPOINT",
    "CALL_TIMEOUT_MS",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    pub log_level: String,
    pub log_json: bool,
    pub environment: String,
    pub service_name: String,

    pub chain_rpc: String,
    pub chain_id: Option<u64>,
    pub network_type: NetworkType,
    pub transfer_type: TransferType,

    pub wallets_postgres_dsn: Option<String>,
    pub transactions_postgres_dsn: Option<String>,
    pub db_max_connections: u32,

    pub sqs_region: String,
    pub sqs_read_queue_name: Option<String>,
    pub sqs_write_queue_name: Option<String>,
    pub sqs_localstack_endpoint: String,
    pub sqs_wait_time_secs: i32,

    pub signer_credentials_path: Option<PathBuf>,
    pub signer_secret_name: Option<String>,
    pub signer_secret_region: String,
    pub signer_localstack_endpoint: String,
    pub call_timeout_ms: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: true,
            environment: "production".to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            chain_rpc: DEFAULT_CHAIN_RPC.to_string(),
            chain_id: None,
            network_type: NetworkType::Mainnet,
            transfer_type: TransferType::Eoa,
            wallets_postgres_dsn: None,
            transactions_postgres_dsn: None,
            db_max_connections: 5,
            sqs_region: DEFAULT_SQS_REGION.to_string(),
            sqs_read_queue_name: None,
            sqs_write_queue_name: None,
            sqs_localstack_endpoint: DEFAULT_SQS_LOCALSTACK_ENDPOINT.to_string(),
            sqs_wait_time_secs: 20,
            signer_credentials_path: None,
            signer_secret_name: None,
            signer_secret_region: DEFAULT_SIGNER_SECRET_REGION.to_string(),
            signer_localstack_endpoint: DEFAULT_SIGNER_LOCALSTACK_ENDPOINT.to_string(),
            call_timeout_ms: 10_000,
        }
    }
}

/// Where the signing backend credentials are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// JSON file on local disk
    File(PathBuf),
    /// Current version of a Secrets Manager secret holding the same JSON
    SecretsManager {
        secret_name: String,
        region: String,
        /// Set in local mode to reach localstack
        endpoint: Option<String>,
    },
}

/// Settings with every required key present, ready to wire collaborators
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub chain_id: u64,
    pub chain_rpc: Url,
    pub wallets_postgres_dsn: String,
    pub transactions_postgres_dsn: String,
    pub sqs_read_queue_name: String,
    pub sqs_write_queue_name: String,
    pub signer_credentials: CredentialsSource,
    pub base: SignerConfig,
}

impl SignerConfig {
    /// Load defaults, the optional file and the process environment
    pub fn load(path: Option<&Path>) -> SignerResult<Self> {
        let figment = Self::figment(path)?.merge(Env::raw().only(ENV_KEYS));
        Self::from_figment(figment)
    }

    /// Defaults plus the optional file, without the environment layer
    pub fn figment(path: Option<&Path>) -> SignerResult<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(SignerConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(SignerError::config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment)
    }

    pub fn from_figment(figment: Figment) -> SignerResult<Self> {
        let config: SignerConfig = figment.extract()?;
        config.validate()?;
        debug!(
            environment = %config.environment,
            chain_id = ?config.chain_id,
            sqs_region = %config.sqs_region,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> SignerResult<()> {
        let level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(SignerError::config(format!(
                "unrecognized LOG_LEVEL value: {}",
                self.log_level
            )));
        }
        if self.call_timeout_ms == 0 {
            return Err(SignerError::config("CALL_TIMEOUT_MS must be greater than zero"));
        }
        if self.db_max_connections == 0 {
            return Err(SignerError::config("DB_MAX_CONNECTIONS must be greater than zero"));
        }
        if !(0..=20).contains(&self.sqs_wait_time_secs) {
            return Err(SignerError::config("SQS_WAIT_TIME_SECS must be between 0 and 20"));
        }
        if let Some(chain_id) = self.chain_id {
            if chain_id == 0 || chain_id > MAX_CHAIN_ID {
                return Err(SignerError::config(format!(
                    "CHAIN_ID must be between 1 and {}, got {}",
                    MAX_CHAIN_ID, chain_id
                )));
            }
        }
        Url::parse(&self.chain_rpc)?;
        Url::parse(&self.sqs_localstack_endpoint)?;
        Url::parse(&self.signer_localstack_endpoint)?;
        Ok(())
    }

    /// Check every key the worker needs and return them unwrapped
    pub fn resolve(&self) -> SignerResult<ResolvedConfig> {
        Ok(ResolvedConfig {
            chain_id: required(self.chain_id, "CHAIN_ID")?,
            chain_rpc: Url::parse(&self.chain_rpc)?,
            wallets_postgres_dsn: required(self.wallets_postgres_dsn.clone(), "WALLETS_POSTGRES_DSN")?,
            transactions_postgres_dsn: required(
                self.transactions_postgres_dsn.clone(),
                "TRANSACTIONS_POSTGRES_DSN",
            )?,
            sqs_read_queue_name: required(self.sqs_read_queue_name.clone(), "SQS_READ_QUEUE_NAME")?,
            sqs_write_queue_name: required(self.sqs_write_queue_name.clone(), "SQS_WRITE_QUEUE_NAME")?,
            signer_credentials: self.credentials_source()?,
            base: self.clone(),
        })
    }

    /// A secret name wins over a credentials file
    pub fn credentials_source(&self) -> SignerResult<CredentialsSource> {
        if let Some(secret_name) = non_blank(self.signer_secret_name.as_deref()) {
            let region = non_blank(Some(self.signer_secret_region.as_str()))
                .unwrap_or(DEFAULT_SIGNER_SECRET_REGION)
                .to_string();
            return Ok(CredentialsSource::SecretsManager {
                secret_name: secret_name.to_string(),
                region,
                endpoint: self.is_local().then(|| self.signer_localstack_endpoint.clone()),
            });
        }

        match self.signer_credentials_path {
            Some(ref path) => Ok(CredentialsSource::File(path.clone())),
            None => Err(SignerError::config(
                "SIGNER_SECRET_NAME or SIGNER_CREDENTIALS_PATH is required",
            )),
        }
    }

    /// Local mode enables debug instrumentation and local endpoints
    pub fn is_local(&self) -> bool {
        self.environment.eq_ignore_ascii_case("local")
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<T>(value: Option<T>, key: &str) -> SignerResult<T> {
    value.ok_or_else(|| SignerError::config(format!("{} is required", key)))
}
