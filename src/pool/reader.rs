//! Pool State Reader
//!
//! `getReserves()` of a pair, pinned to the head block seen just before the
//! call so `observed_at_block` is exact. Failures are returned, never
//! retried here.
//!
//! Created: 2026-10-19

use crate::chain::ChainClient;
use crate::error::ReadError;
use crate::types::ReserveState;
use alloy::primitives::Address;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct PoolStateReader {
    client: Arc<dyn ChainClient>,
}

impl PoolStateReader {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub async fn read(&self, pool: Address) -> Result<ReserveState, ReadError> {
        let block = self
            .client
            .block_number()
            .await
            .map_err(|source| ReadError { pool, source })?;

        let (reserve0, reserve1) = self
            .client
            .get_reserves(pool, block)
            .await
            .map_err(|source| ReadError { pool, source })?;

        debug!("Reserves of {} at block {}: {} / {}", pool, block, reserve0, reserve1);
        Ok(ReserveState {
            pool,
            reserve0,
            reserve1,
            observed_at_block: block,
        })
    }
}
