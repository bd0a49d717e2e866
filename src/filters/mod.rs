//! Pool filtering
//!
//! Decides whether a freshly created pool is worth buying into.
//!
//! Created: 2026-10-19

pub mod eligibility;

pub use eligibility::evaluate;
