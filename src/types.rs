//! Core data structures for the new-pair pipeline
//!
//! Event, reserve, decision, intent and submission types shared by the
//! feed, gate, builder and tracker. All on-chain amounts are U256.
//!
//! Created: 2026-10-19

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::Serialize;
use std::fmt;

/// Identity of a pool-created notification: (transaction hash, pool address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    pub tx_hash: TxHash,
    pub pool: Address,
}

/// A decoded `PairCreated` log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCreatedEvent {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub factory: Address,
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
}

impl PoolCreatedEvent {
    pub fn id(&self) -> EventId {
        EventId {
            tx_hash: self.tx_hash,
            pool: self.pool,
        }
    }
}

impl fmt::Display for PoolCreatedEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "pool {} (token0={} token1={}) tx={} block={}",
            self.pool, self.token0, self.token1, self.tx_hash, self.block_number
        )
    }
}

/// Pool reserves observed at a given block. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveState {
    pub pool: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub observed_at_block: u64,
}

impl ReserveState {
    pub fn has_zero_reserve(&self) -> bool {
        self.reserve0.is_zero() || self.reserve1.is_zero()
    }
}

/// Output of the eligibility gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityDecision {
    Eligible {
        target_token: Address,
        quote_token: Address,
    },
    Ineligible {
        reason: &'static str,
    },
    Indeterminate {
        reason: &'static str,
    },
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }
}

impl fmt::Display for EligibilityDecision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Eligible {
                target_token,
                quote_token,
            } => write!(f, "eligible (target={} quote={})", target_token, quote_token),
            Self::Ineligible { reason } => write!(f, "ineligible ({})", reason),
            Self::Indeterminate { reason } => write!(f, "indeterminate ({})", reason),
        }
    }
}

/// Reserves oriented for a swap from the quote token into the target token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolQuote {
    pub reserve_in: U256,
    pub reserve_out: U256,
}

impl PoolQuote {
    /// Orient the observed reserves along an eligible decision.
    /// Returns None for non-eligible decisions.
    pub fn for_decision(
        event: &PoolCreatedEvent,
        reserves: &ReserveState,
        decision: &EligibilityDecision,
    ) -> Option<Self> {
        let EligibilityDecision::Eligible { quote_token, .. } = decision else {
            return None;
        };
        if *quote_token == event.token0 {
            Some(Self {
                reserve_in: reserves.reserve0,
                reserve_out: reserves.reserve1,
            })
        } else {
            Some(Self {
                reserve_in: reserves.reserve1,
                reserve_out: reserves.reserve0,
            })
        }
    }

    /// Constant product output (x * y = k) with the 0.3% V2 fee
    pub fn amount_out(&self, amount_in: U256) -> U256 {
        if amount_in.is_zero() || self.reserve_in.is_zero() || self.reserve_out.is_zero() {
            return U256::ZERO;
        }
        let amount_in_with_fee = amount_in.saturating_mul(U256::from(997u64));
        let numerator = amount_in_with_fee.saturating_mul(self.reserve_out);
        let denominator = self
            .reserve_in
            .saturating_mul(U256::from(1000u64))
            .saturating_add(amount_in_with_fee);
        numerator / denominator
    }
}

/// How the router is funded for the buy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FundingMode {
    /// swapExactETHForTokens, quote token paid as native currency
    Native,
    /// swapExactTokensForTokens, quote token paid from an ERC20 balance
    Token,
}

/// A fully specified buy, ready to be encoded and signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub pool: Address,
    pub from_token: Address,
    pub to_token: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub recipient: Address,
    pub deadline_unix_secs: u64,
    pub funding: FundingMode,
}

/// Router call derived from a SwapIntent (nonce is assigned by the signer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Signed, RLP encoded transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    pub raw: Bytes,
    pub nonce: u64,
}

/// Inclusion receipt as reported by the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
    pub gas_used: u64,
}

/// A submission being tracked until a terminal outcome
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub intent: SwapIntent,
    pub signed_hash: TxHash,
    pub submitted_at_block: u64,
    pub attempt: u32,
}

/// Submission lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed(FailureReason),
}

/// Terminal failure reasons for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    SignError,
    Rejected,
    SubmitExhausted,
    InclusionTimeout,
    Reverted,
    DuplicateHash,
    Abandoned,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignError => "sign-error",
            Self::Rejected => "rejected",
            Self::SubmitExhausted => "submit-exhausted",
            Self::InclusionTimeout => "inclusion-timeout",
            Self::Reverted => "reverted",
            Self::DuplicateHash => "duplicate-hash",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome reported by the submission tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Confirmed {
        tx_hash: TxHash,
        block_number: Option<u64>,
    },
    Failed {
        reason: FailureReason,
        tx_hash: Option<TxHash>,
        detail: String,
    },
}

impl SubmissionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Pipeline stage names used when reporting per-event outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Dedup,
    Read,
    Gate,
    Build,
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Dedup => write!(f, "dedup"),
            Stage::Read => write!(f, "read"),
            Stage::Gate => write!(f, "gate"),
            Stage::Build => write!(f, "build"),
            Stage::Submit => write!(f, "submit"),
        }
    }
}

/// Per-event result of the orchestrator pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Duplicate,
    ReadFailed { pool: Address, error: String },
    Ineligible { pool: Address, reason: &'static str },
    Indeterminate { pool: Address, reason: &'static str },
    BuildFailed { pool: Address, error: String },
    DryRun { pool: Address, intent: SwapIntent },
    Confirmed { pool: Address, tx_hash: TxHash, block_number: Option<u64> },
    Failed { pool: Address, reason: FailureReason, tx_hash: Option<TxHash>, detail: String },
}

impl PipelineOutcome {
    /// Stage at which the pipeline stopped
    pub fn stage(&self) -> Stage {
        match self {
            Self::Duplicate => Stage::Dedup,
            Self::ReadFailed { .. } => Stage::Read,
            Self::Ineligible { .. } | Self::Indeterminate { .. } => Stage::Gate,
            Self::BuildFailed { .. } | Self::DryRun { .. } => Stage::Build,
            Self::Confirmed { .. } | Self::Failed { .. } => Stage::Submit,
        }
    }
}
