use crate::error::TimeoutError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("could not release resources: {0}")]
    Release(String),
    #[error("teardown interrupted by shutdown")]
    Cancelled,
    #[error("teardown timed out after {0:?}")]
    Timeout(Duration),
}

impl TimeoutError for TeardownError {
    fn timeout(after: Duration) -> Self {
        TeardownError::Timeout(after)
    }
}

/// Releases per-invocation resources after the signed item has been relayed
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn release(&self) -> Result<(), TeardownError>;
}

/// Keeps everything open; used when the process serves many invocations
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepOpen;

#[async_trait]
impl Teardown for KeepOpen {
    async fn release(&self) -> Result<(), TeardownError> {
        Ok(())
    }
}
