//! Error taxonomy
//!
//! Typed errors for every network and pipeline boundary. Transient vs
//! permanent is encoded in the variant so callers can decide retry policy
//! without string matching.
//!
//! Created: 2026-10-19

use alloy::primitives::Address;
use thiserror::Error;

/// Errors surfaced by the network client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Network blip, dropped subscription, timeout. Retryable.
    #[error("transport error: {0}")]
    Transport(String),
    /// The transport cannot provide the requested capability (e.g. pubsub over HTTP)
    #[error("capability unsupported: {0}")]
    Unsupported(String),
    /// The node refused a transaction (malformed, underpriced, insufficient funds)
    #[error("rejected by node: {0}")]
    Rejected(String),
    /// Log or return data could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Pool state fetch failed. Not retried by the reader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("reserve read failed for {pool}: {source}")]
pub struct ReadError {
    pub pool: Address,
    #[source]
    pub source: ChainError,
}

/// Malformed intent or execution parameters
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("decision is not eligible: {0}")]
    NotEligible(String),
    #[error("trade amount must be positive")]
    NonPositiveAmount,
    #[error("deadline offset must be positive, got {0}s")]
    NonPositiveDeadline(i64),
    #[error("slippage tolerance must be within 0..=100 percent, got {0}")]
    InvalidSlippage(String),
    #[error("deadline {deadline} is not after now ({now})")]
    DeadlineNotInFuture { deadline: u64, now: u64 },
}

/// Signer failure (unreachable custody, bad key, encoding)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    #[error("nonce lookup failed: {0}")]
    Nonce(#[from] ChainError),
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Fatal feed failure; the orchestrator must reopen the feed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed could not be established: {0}")]
    Open(ChainError),
    #[error("feed lost after {attempts} reconnect attempts: {last}")]
    ReconnectExhausted { attempts: u32, last: ChainError },
    #[error("feed stream ended")]
    Closed,
}

/// Orchestrator level failures
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("feed restart budget exhausted after {restarts} restarts: {last}")]
    RestartBudgetExhausted { restarts: u32, last: FeedError },
}
