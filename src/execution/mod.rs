//! Swap execution
//!
//! Builder encodes the buy, tracker signs it and follows it to a receipt.
//!
//! Created: 2026-10-19

pub mod builder;
pub mod tracker;

pub use builder::{Clock, FixedClock, SystemClock, TransactionBuilder};
pub use tracker::SubmissionTracker;
