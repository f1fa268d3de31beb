//! Remote threshold-signing backend client
//!
//! `POST {endpoint}/v1/keys/{key_id}/sign` with a bearer token and
//! `{ derivation_path, message_hash }`; the backend answers with
//! `{ r, s, recovery_id }`. The signature is checked to recover before the
//! signed transaction is handed back.

use super::{SignError, SignOptions, SigningDelegate};
use crate::error::{SignerError, SignerResult};
use crate::logging::{redact_hash, redact_value};
use crate::tx::{SignedTransaction, TxSignature, UnsignedTransaction};
use crate::wallet::DerivationCoordinates;
use async_trait::async_trait;
use ethers_core::types::U256;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Credentials file contents
pub struct SignerCredentials {
    pub endpoint: Url,
    pub api_token: SecretString,
}

#[derive(Deserialize)]
struct CredentialsFile {
    endpoint: String,
    api_token: String,
}

impl SignerCredentials {
    pub fn from_json(json: &str) -> SignerResult<Self> {
        let raw: CredentialsFile = serde_json::from_str(json)
            .map_err(|e| SignerError::credentials(format!("malformed credentials: {}", e)))?;
        if raw.api_token.trim().is_empty() {
            return Err(SignerError::credentials("api_token is empty"));
        }
        Ok(Self {
            endpoint: Url::parse(&raw.endpoint)?,
            api_token: SecretString::from(raw.api_token),
        })
    }

    pub fn from_file(path: &Path) -> SignerResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SignerError::credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

impl std::fmt::Debug for SignerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerCredentials")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_token", &redact_value(self.api_token.expose_secret()))
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SignRequestBody<'a> {
    derivation_path: &'a DerivationCoordinates,
    message_hash: String,
}

/// Signature components as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResponse {
    pub r: String,
    pub s: String,
    pub recovery_id: u8,
}

impl SignatureResponse {
    /// Attach the components to `tx` and check that they recover
    pub fn assemble(&self, tx: UnsignedTransaction, chain_id: u64) -> Result<SignedTransaction, SignError> {
        let r = parse_component("r", &self.r)?;
        let s = parse_component("s", &self.s)?;
        let recovery_id = match self.recovery_id {
            0 | 1 => self.recovery_id,
            27 | 28 => self.recovery_id - 27,
            other => {
                return Err(SignError::InvalidResponse(format!("recovery id {} out of range", other)));
            }
        };

        let signed = tx.into_signed(chain_id, TxSignature::new(r, s, recovery_id))?;
        signed
            .recover_sender()
            .map_err(|e| SignError::InvalidResponse(e.message))?;
        Ok(signed)
    }
}

fn parse_component(name: &str, value: &str) -> Result<U256, SignError> {
    let trimmed = value.trim();
    let hex_clean = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_clean.is_empty() || hex_clean.len() > 64 {
        return Err(SignError::InvalidResponse(format!("{} has invalid length", name)));
    }
    let component = U256::from_str_radix(hex_clean, 16)
        .map_err(|_| SignError::InvalidResponse(format!("{} is not hex", name)))?;
    if component.is_zero() {
        return Err(SignError::InvalidResponse(format!("{} is zero", name)));
    }
    Ok(component)
}

/// HTTPS client for the threshold-signing backend
pub struct RemoteSigner {
    client: reqwest::Client,
    credentials: SignerCredentials,
    chain_id: u64,
}

impl RemoteSigner {
    pub fn new(credentials: SignerCredentials, chain_id: u64, timeout: Duration) -> SignerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignerError::internal(format!("cannot build http client: {}", e)))?;

        info!(
            endpoint = %credentials.endpoint,
            chain_id,
            "remote signer initialized"
        );

        Ok(Self {
            client,
            credentials,
            chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sign_url(&self, key_id: &str) -> Result<Url, SignError> {
        let mut url = self.credentials.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| SignError::Transport("signing endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v1", "keys", key_id, "sign"]);
        Ok(url)
    }
}

#[async_trait]
impl SigningDelegate for RemoteSigner {
    async fn sign(&self, options: SignOptions) -> Result<SignedTransaction, SignError> {
        let hash = options.tx.signing_hash(self.chain_id)?;
        let message_hash = format!("0x{}", hex::encode(hash.as_bytes()));

        debug!(
            key_id = %options.key_id,
            derivation_path = %options.derivation_path,
            message_hash = %redact_hash(&message_hash),
            "requesting signature"
        );

        let response = self
            .client
            .post(self.sign_url(&options.key_id)?)
            .bearer_auth(self.credentials.api_token.expose_secret())
            .json(&SignRequestBody {
                derivation_path: &options.derivation_path,
                message_hash,
            })
            .send()
            .await
            .map_err(|e| SignError::Transport(SignerError::from(e).message))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignError::Rejected(format!("{}: {}", status, body)));
        }

        let signature: SignatureResponse = response
            .json()
            .await
            .map_err(|e| SignError::InvalidResponse(e.to_string()))?;

        signature.assemble(options.tx, self.chain_id)
    }
}
