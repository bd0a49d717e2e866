//! Chain access boundary
//!
//! The network client and the key custody are external collaborators.
//! Everything upstream talks to them through the two traits below so the
//! pipeline can run against alloy in production and in-memory fakes in tests.
//!
//! Created: 2026-10-19

pub mod alloy_client;
pub mod signer;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::{ChainError, SignError};
use crate::types::{PoolCreatedEvent, Receipt, SignedTransaction, UnsignedTransaction};
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub use alloy_client::AlloyChainClient;
pub use signer::LocalKeySigner;

/// Live `PairCreated` notifications from a push subscription
pub type LogStream = Pin<Box<dyn Stream<Item = Result<PoolCreatedEvent, ChainError>> + Send>>;

/// Network client capability
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Push subscription to `PairCreated` logs of `factory`.
    /// Returns `ChainError::Unsupported` when the transport has no pubsub.
    async fn subscribe_pair_created(&self, factory: Address) -> Result<LogStream, ChainError>;

    /// `PairCreated` logs of `factory` in the inclusive block range
    async fn poll_pair_created(
        &self,
        factory: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PoolCreatedEvent>, ChainError>;

    /// Current head block number
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// `getReserves()` of a V2 pair evaluated at `block`
    async fn get_reserves(&self, pool: Address, block: u64) -> Result<(U256, U256), ChainError>;

    /// Pending transaction count (next nonce) of `account`
    async fn transaction_count(&self, account: Address) -> Result<u64, ChainError>;

    /// Broadcast a signed transaction
    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash, ChainError>;

    /// Receipt for `hash`, or None while not yet included
    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ChainError>;
}

/// Account/key custody capability.
///
/// Implementations own sequence number assignment for their account: two
/// concurrent `sign` calls must never receive the same nonce.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    async fn sign(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, SignError>;

    /// Forget the cached sequence so the next `sign` refetches it.
    /// Called when a signed transaction never reached the network.
    async fn resync(&self) {}
}
