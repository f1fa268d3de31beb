//! SQS transport
//!
//! One client serves both directions: it long-polls the read queue for
//! signing requests and writes signed items to the write queue. Queue URLs
//! are resolved once at construction.

use super::{Delivery, InboundQueue, QueueError};
use crate::config::ResolvedConfig;
use crate::error::{ErrorCode, SignerError, SignerResult};
use crate::relay::{OutboundRelay, RelayError};
use crate::types::SignedOutboundItem;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use tracing::{debug, info};

pub struct SqsQueue {
    client: Client,
    read_queue_url: String,
    write_queue_url: String,
    wait_time_secs: i32,
}

impl SqsQueue {
    pub async fn connect(config: &ResolvedConfig) -> SignerResult<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.base.sqs_region.clone()));
        if config.base.is_local() {
            loader = loader.endpoint_url(config.base.sqs_localstack_endpoint.clone());
        }
        let shared = loader.load().await;
        let client = Client::new(&shared);

        let read_queue_url = resolve_queue_url(&client, &config.sqs_read_queue_name).await?;
        let write_queue_url = resolve_queue_url(&client, &config.sqs_write_queue_name).await?;

        info!(
            region = %config.base.sqs_region,
            read_queue = %config.sqs_read_queue_name,
            write_queue = %config.sqs_write_queue_name,
            "sqs queues resolved"
        );

        Ok(Self {
            client,
            read_queue_url,
            write_queue_url,
            wait_time_secs: config.base.sqs_wait_time_secs,
        })
    }
}

async fn resolve_queue_url(client: &Client, name: &str) -> SignerResult<String> {
    let output = client
        .get_queue_url()
        .queue_name(name)
        .send()
        .await
        .map_err(|e| {
            SignerError::new(
                ErrorCode::NetworkError,
                format!("could not resolve queue {}: {}", name, DisplayErrorContext(&e)),
            )
        })?;

    output
        .queue_url()
        .map(str::to_string)
        .ok_or_else(|| SignerError::config(format!("queue {} has no url", name)))
}

#[async_trait]
impl InboundQueue for SqsQueue {
    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.read_queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_secs)
            .send()
            .await
            .map_err(|e| QueueError::Backend(DisplayErrorContext(&e).to_string()))?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };

        let delivery = Delivery {
            message_id: message.message_id().unwrap_or_default().to_string(),
            receipt: message
                .receipt_handle()
                .ok_or_else(|| QueueError::Backend("message has no receipt handle".to_string()))?
                .to_string(),
            body: message.body().unwrap_or_default().to_string(),
        };
        debug!(message_id = %delivery.message_id, "message received");
        Ok(Some(delivery))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.read_queue_url)
            .receipt_handle(&delivery.receipt)
            .send()
            .await
            .map_err(|e| QueueError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl OutboundRelay for SqsQueue {
    async fn add(&self, item: SignedOutboundItem) -> Result<(), RelayError> {
        let body = serde_json::to_string(&item).map_err(|e| RelayError::Encode(e.to_string()))?;

        self.client
            .send_message()
            .queue_url(&self.write_queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| RelayError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
