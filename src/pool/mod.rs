//! Pool state access
//!
//! Reserve reads for freshly created V2 pairs. Nothing is cached: each
//! evaluation sees the chain as of its own read.
//!
//! Created: 2026-10-19

pub mod reader;

pub use reader::PoolStateReader;
