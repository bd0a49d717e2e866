//! Transaction Builder
//!
//! Turns an eligible decision into a `SwapIntent` and encodes it into a
//! V2 router call. Deterministic for a given (decision, quote, config, now).
//!
//! Created: 2026-10-19

use crate::config::ExecutionConfig;
use crate::contracts::IUniswapV2Router02;
use crate::error::BuildError;
use crate::types::{EligibilityDecision, FundingMode, PoolQuote, SwapIntent, UnsignedTransaction};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Wall clock in unix seconds
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock pinned to one instant
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0
    }
}

/// Slippage resolution: 1/10_000 of a percent
const SLIPPAGE_SCALE: u64 = 1_000_000;

pub struct TransactionBuilder {
    config: ExecutionConfig,
    recipient: Address,
}

impl TransactionBuilder {
    pub fn new(config: ExecutionConfig, recipient: Address) -> Self {
        if config.max_slippage_percent.is_none() {
            warn!("MAX_SLIPPAGE_PERCENT not set - swaps will accept any output (no slippage protection)");
        }
        Self { config, recipient }
    }

    pub fn funding(&self) -> FundingMode {
        if self.config.pay_native {
            FundingMode::Native
        } else {
            FundingMode::Token
        }
    }

    pub fn build(
        &self,
        pool: Address,
        decision: &EligibilityDecision,
        quote: Option<&PoolQuote>,
        now: i64,
    ) -> Result<SwapIntent, BuildError> {
        let EligibilityDecision::Eligible {
            target_token,
            quote_token,
        } = decision
        else {
            return Err(BuildError::NotEligible(decision.to_string()));
        };

        if self.config.amount_in.is_zero() {
            return Err(BuildError::NonPositiveAmount);
        }
        let offset = self.config.deadline_offset_secs;
        if offset <= 0 {
            return Err(BuildError::NonPositiveDeadline(offset));
        }

        let deadline = now.saturating_add(offset);
        if deadline <= now || deadline <= 0 {
            return Err(BuildError::DeadlineNotInFuture {
                deadline: deadline.max(0) as u64,
                now: now.max(0) as u64,
            });
        }

        let min_amount_out = self.min_amount_out(quote)?;

        Ok(SwapIntent {
            pool,
            from_token: *quote_token,
            to_token: *target_token,
            amount_in: self.config.amount_in,
            min_amount_out,
            recipient: self.recipient,
            deadline_unix_secs: deadline as u64,
            funding: self.funding(),
        })
    }

    fn min_amount_out(&self, quote: Option<&PoolQuote>) -> Result<U256, BuildError> {
        let Some(pct) = self.config.max_slippage_percent else {
            return Ok(U256::ZERO);
        };
        if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(BuildError::InvalidSlippage(pct.to_string()));
        }
        let Some(quote) = quote else {
            warn!("No reserve quote available - minAmountOut set to 0");
            return Ok(U256::ZERO);
        };

        let expected = quote.amount_out(self.config.amount_in);
        let keep = ((Decimal::ONE_HUNDRED - pct) * Decimal::from(SLIPPAGE_SCALE / 100))
            .trunc()
            .to_u64()
            .ok_or_else(|| BuildError::InvalidSlippage(pct.to_string()))?;

        let min_out = expected.saturating_mul(U256::from(keep)) / U256::from(SLIPPAGE_SCALE);
        debug!("Expected out {}, min out {} ({}% slippage)", expected, min_out, pct);
        Ok(min_out)
    }

    /// Router call for an intent. Nonce is left to the signer.
    pub fn encode(&self, intent: &SwapIntent) -> UnsignedTransaction {
        let path = vec![intent.from_token, intent.to_token];
        let deadline = U256::from(intent.deadline_unix_secs);

        let (input, value) = match intent.funding {
            FundingMode::Native => (
                IUniswapV2Router02::swapExactETHForTokensCall {
                    amountOutMin: intent.min_amount_out,
                    path,
                    to: intent.recipient,
                    deadline,
                }
                .abi_encode(),
                intent.amount_in,
            ),
            FundingMode::Token => (
                IUniswapV2Router02::swapExactTokensForTokensCall {
                    amountIn: intent.amount_in,
                    amountOutMin: intent.min_amount_out,
                    path,
                    to: intent.recipient,
                    deadline,
                }
                .abi_encode(),
                U256::ZERO,
            ),
        };

        UnsignedTransaction {
            to: self.config.router,
            value,
            input: input.into(),
            gas_limit: self.config.gas_limit,
            max_fee_per_gas: self.config.max_fee_per_gas,
            max_priority_fee_per_gas: self.config.max_priority_fee_per_gas,
        }
    }
}
