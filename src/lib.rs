//! New-Pair Sniper Library
//!
//! Watches a Uniswap V2 style factory for `PairCreated`, gates each new
//! pool on reserves and quote token, and buys the other side through the
//! router with bounded submit and inclusion retries.
//!
//! Created: 2026-10-19

pub mod alerts;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod execution;
pub mod feed;
pub mod filters;
pub mod pool;
pub mod retry;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, load_config_from_file, BotConfig};
pub use engine::Engine;
pub use error::{BuildError, ChainError, EngineError, FeedError, ReadError, SignError};
pub use types::{EligibilityDecision, PipelineOutcome, PoolCreatedEvent, ReserveState, SwapIntent};
