//! Exponential backoff helper shared by the feed, tracker and engine
//!
//! Created: 2026-10-19

use std::time::Duration;

/// Double `current`, capped at `max`
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    let next_ms = current.as_millis().saturating_mul(2) as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(next_ms.min(max_ms))
}
