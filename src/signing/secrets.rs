//! Credentials sources
//!
//! The backend credentials JSON either sits on disk or lives in the
//! current version of a Secrets Manager secret.

use super::SignerCredentials;
use crate::config::CredentialsSource;
use crate::error::{SignerError, SignerResult};
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use tracing::info;

const CURRENT_VERSION_STAGE: &str = "AWSCURRENT";

impl SignerCredentials {
    pub async fn load(source: &CredentialsSource) -> SignerResult<Self> {
        match source {
            CredentialsSource::File(path) => Self::from_file(path),
            CredentialsSource::SecretsManager {
                secret_name,
                region,
                endpoint,
            } => {
                let mut loader =
                    aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));
                if let Some(endpoint) = endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                let shared = loader.load().await;
                let client = Client::new(&shared);

                let json = fetch_secret(&client, secret_name).await?;
                info!(secret = %secret_name, region = %region, "loaded signing backend credentials");
                Self::from_json(&json)
            }
        }
    }
}

async fn fetch_secret(client: &Client, secret_name: &str) -> SignerResult<String> {
    let output = client
        .get_secret_value()
        .secret_id(secret_name)
        .version_stage(CURRENT_VERSION_STAGE)
        .send()
        .await
        .map_err(|e| {
            SignerError::credentials(format!(
                "cannot read secret {}: {}",
                secret_name,
                DisplayErrorContext(&e)
            ))
        })?;

    output
        .secret_string()
        .map(str::to_string)
        .ok_or_else(|| SignerError::credentials(format!("secret {} has no string value", secret_name)))
}
