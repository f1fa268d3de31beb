//! Per-invocation context
//!
//! Carries the identifiers attached to every log line of one invocation, the
//! tracing span they live on, and the cancellation and deadline applied to
//! each collaborator call.

use crate::error::TimeoutError;
use crate::runtime::Shutdown;
use std::future::Future;
use std::time::Duration;
use tracing::field::Empty;
use tracing::Span;
use uuid::Uuid;

/// Returned by [`InvocationContext::call`] when shutdown interrupted the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: String,
    message_id: String,
    span: Span,
    shutdown: Shutdown,
    call_timeout: Duration,
}

impl InvocationContext {
    pub fn new(message_id: impl Into<String>, shutdown: Shutdown, call_timeout: Duration) -> Self {
        let request_id = Uuid::new_v4().to_string();
        let message_id = message_id.into();
        let span = tracing::info_span!(
            "invocation",
            request_id = %request_id,
            message_id = %message_id,
            transaction_id = Empty,
        );

        Self {
            request_id,
            message_id,
            span,
            shutdown,
            call_timeout,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn record_transaction_id(&self, transaction_id: &str) {
        self.span.record("transaction_id", transaction_id);
    }

    /// Run one collaborator call under the invocation's deadline and
    /// cancellation handle. A missed deadline becomes the collaborator's own
    /// timeout error.
    pub async fn call<T, E, F>(&self, future: F) -> Result<Result<T, E>, Cancelled>
    where
        E: TimeoutError,
        F: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Cancelled),
            result = tokio::time::timeout(self.call_timeout, future) => {
                Ok(result.unwrap_or_else(|_| Err(E::timeout(self.call_timeout))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayError;

    fn context(timeout_ms: u64) -> (InvocationContext, Shutdown) {
        let shutdown = Shutdown::new();
        let ctx = InvocationContext::new("m-1", shutdown.clone(), Duration::from_millis(timeout_ms));
        (ctx, shutdown)
    }

    #[test]
    fn test_fresh_request_ids() {
        let (a, _) = context(10);
        let (b, _) = context(10);
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.message_id(), "m-1");
        assert!(Uuid::parse_str(a.request_id()).is_ok());
    }

    #[tokio::test]
    async fn test_call_passes_result_through() {
        let (ctx, _) = context(1_000);
        let result = ctx.call(async { Ok::<_, RelayError>(7) }).await;
        assert!(matches!(result, Ok(Ok(7))));
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let (ctx, _) = context(10);
        let result = ctx
            .call(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, RelayError>(())
            })
            .await;
        assert!(matches!(result, Ok(Err(RelayError::Timeout(_)))));
    }

    #[tokio::test]
    async fn test_call_after_shutdown_is_cancelled() {
        let (ctx, shutdown) = context(1_000);
        shutdown.trigger().await;
        let result = ctx.call(async { Ok::<_, RelayError>(()) }).await;
        assert_eq!(result.unwrap_err(), Cancelled);
    }
}
