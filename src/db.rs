//! Postgres connection pools
//!
//! Two databases back the service: the wallet directory and the transaction
//! ledger. Pools are opened at startup and released by `PoolRelease` when
//! the process only serves a single invocation.

use crate::error::{ErrorCode, SignerError, SignerResult};
use crate::logging::redact_dsn;
use crate::pipeline::{Teardown, TeardownError};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub async fn connect_pool(dsn: &str, max_connections: u32, acquire_timeout: Duration) -> SignerResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(dsn)
        .await
        .map_err(|e| {
            SignerError::new(
                ErrorCode::NetworkError,
                format!("could not connect to {}", redact_dsn(dsn)),
            )
            .with_details(e.to_string())
        })?;

    info!(database = %redact_dsn(dsn), max_connections, "postgres pool ready");
    Ok(pool)
}

/// Closes every pool it holds
pub struct PoolRelease {
    pools: Vec<PgPool>,
}

impl PoolRelease {
    pub fn new(pools: Vec<PgPool>) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl Teardown for PoolRelease {
    async fn release(&self) -> Result<(), TeardownError> {
        for pool in &self.pools {
            pool.close().await;
        }
        if self.pools.iter().any(|pool| !pool.is_closed()) {
            return Err(TeardownError::Release("a database pool is still open".to_string()));
        }
        Ok(())
    }
}
