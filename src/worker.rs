//! Queue worker
//!
//! Receives at most one message per invocation, runs the pipeline on it and
//! acknowledges the message only when the pipeline succeeded. A failed
//! message is left on the queue so its visibility timeout expires and the
//! queue redelivers it.

use crate::error::TimeoutError;
use crate::pipeline::{InvocationContext, PipelineError, SignedOutcome, SigningPipeline};
use crate::queue::{Delivery, InboundQueue, QueueError};
use crate::runtime::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);
const IDLE_BACKOFF: Duration = Duration::from_millis(200);

/// What a single invocation did
#[derive(Debug)]
pub enum InvocationOutcome {
    /// Nothing to do
    Empty,
    /// Shutdown arrived while waiting for a message
    Stopped,
    Acknowledged(SignedOutcome),
    /// Left on the queue for redelivery
    Failed(PipelineError),
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, InvocationOutcome::Failed(_))
    }
}

/// Queue failures, split by the side of the pipeline run they happened on
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("could not receive from the inbound queue: {0}")]
    Receive(#[source] QueueError),
    /// The message was processed but will be redelivered
    #[error("could not acknowledge message {message_id}: {source}")]
    Acknowledge {
        message_id: String,
        #[source]
        source: QueueError,
    },
}

pub struct Worker {
    queue: Arc<dyn InboundQueue>,
    pipeline: SigningPipeline,
    shutdown: Shutdown,
    call_timeout: Duration,
    receive_timeout: Duration,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn InboundQueue>,
        pipeline: SigningPipeline,
        shutdown: Shutdown,
        call_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            pipeline,
            shutdown,
            call_timeout,
            receive_timeout: call_timeout,
        }
    }

    /// Allow receive calls to block for a long poll on top of the call timeout
    pub fn with_long_poll(mut self, wait: Duration) -> Self {
        self.receive_timeout = self.call_timeout + wait;
        self
    }

    pub fn pipeline(&self) -> &SigningPipeline {
        &self.pipeline
    }

    /// Receive and process at most one message
    pub async fn run_once(&self) -> Result<InvocationOutcome, WorkerError> {
        let received = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(InvocationOutcome::Stopped),
            received = tokio::time::timeout(self.receive_timeout, self.queue.receive()) => received,
        };
        let delivery = match received {
            Ok(Ok(Some(delivery))) => delivery,
            Ok(Ok(None)) => return Ok(InvocationOutcome::Empty),
            Ok(Err(e)) => return Err(WorkerError::Receive(e)),
            Err(_) => return Err(WorkerError::Receive(QueueError::timeout(self.receive_timeout))),
        };

        let ctx = InvocationContext::new(delivery.message_id.clone(), self.shutdown.clone(), self.call_timeout);
        match self.pipeline.process_message(&ctx, &delivery.body).await {
            Ok(outcome) => {
                self.acknowledge(&ctx, &delivery)
                    .await
                    .map_err(|source| WorkerError::Acknowledge {
                        message_id: delivery.message_id.clone(),
                        source,
                    })?;
                Ok(InvocationOutcome::Acknowledged(outcome))
            }
            Err(e) => Ok(InvocationOutcome::Failed(e)),
        }
    }

    async fn acknowledge(&self, ctx: &InvocationContext, delivery: &Delivery) -> Result<(), QueueError> {
        // acknowledging is not cancelled: the work is already done
        let result = tokio::time::timeout(self.call_timeout, self.queue.acknowledge(delivery))
            .await
            .unwrap_or_else(|_| Err(QueueError::timeout(self.call_timeout)));

        if let Err(ref e) = result {
            ctx.span().in_scope(|| {
                error!(error = %e, "could not acknowledge message; it will be redelivered and signed again");
            });
        }
        result
    }

    /// Process messages until shutdown
    pub async fn run(&self) {
        info!("worker started");
        while !self.shutdown.is_triggered().await {
            match self.run_once().await {
                Ok(InvocationOutcome::Stopped) => break,
                Ok(InvocationOutcome::Empty) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "queue error");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        info!("worker stopped");
    }
}
