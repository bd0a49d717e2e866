//! Eligibility Gate
//!
//! Pure decision over (event, reserves, quote token). Policy, in order:
//!   1. either reserve is zero          -> Ineligible "zero-reserve"
//!   2. token0 is the quote token       -> Eligible, target = token1
//!   3. token1 is the quote token       -> Eligible, target = token0
//!   4. otherwise                       -> Ineligible "no-quote-token-pair"
//!
//! Inconsistent inputs (reserves read for another pool, or a pair whose
//! two sides are both the quote token) are Indeterminate and checked first.
//!
//! Created: 2026-10-19

use crate::types::{EligibilityDecision, PoolCreatedEvent, ReserveState};
use alloy::primitives::Address;

pub const ZERO_RESERVE: &str = "zero-reserve";
pub const NO_QUOTE_TOKEN_PAIR: &str = "no-quote-token-pair";
pub const RESERVE_POOL_MISMATCH: &str = "reserve-pool-mismatch";
pub const DEGENERATE_PAIR: &str = "degenerate-pair";

pub fn evaluate(
    event: &PoolCreatedEvent,
    reserves: &ReserveState,
    quote_token: Address,
) -> EligibilityDecision {
    if reserves.pool != event.pool {
        return EligibilityDecision::Indeterminate {
            reason: RESERVE_POOL_MISMATCH,
        };
    }
    if event.token0 == quote_token && event.token1 == quote_token {
        return EligibilityDecision::Indeterminate {
            reason: DEGENERATE_PAIR,
        };
    }

    if reserves.has_zero_reserve() {
        EligibilityDecision::Ineligible {
            reason: ZERO_RESERVE,
        }
    } else if event.token0 == quote_token {
        EligibilityDecision::Eligible {
            target_token: event.token1,
            quote_token: event.token0,
        }
    } else if event.token1 == quote_token {
        EligibilityDecision::Eligible {
            target_token: event.token0,
            quote_token: event.token1,
        }
    } else {
        EligibilityDecision::Ineligible {
            reason: NO_QUOTE_TOKEN_PAIR,
        }
    }
}
