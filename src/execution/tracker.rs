//! Submission & Confirmation Tracker
//!
//! Drives one swap through Built -> Signed -> Submitted -> Confirmed | Failed.
//! Submit retries resend the exact signed bytes so every attempt carries the
//! same hash. Inclusion is polled a bounded number of times.
//!
//! Created: 2026-10-19

use crate::chain::{ChainClient, Signer};
use crate::config::RetryPolicy;
use crate::error::ChainError;
use crate::retry::next_backoff;
use crate::types::{
    FailureReason, PendingSubmission, SignedTransaction, SubmissionOutcome, SubmissionState,
    SwapIntent, UnsignedTransaction,
};
use alloy::primitives::{Address, TxHash};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct SubmissionTracker {
    client: Arc<dyn ChainClient>,
    signer: Arc<dyn Signer>,
    policy: RetryPolicy,
    /// Broadcast submissions awaiting inclusion, keyed by signed hash, one owner each
    pending: DashMap<TxHash, PendingSubmission>,
    shutdown: watch::Receiver<bool>,
}

impl SubmissionTracker {
    pub fn new(
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn Signer>,
        policy: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            signer,
            policy,
            pending: DashMap::new(),
            shutdown,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sign, submit and confirm one intent. Always returns a terminal outcome.
    pub async fn execute(&self, intent: SwapIntent, tx: UnsignedTransaction) -> SubmissionOutcome {
        let pool = intent.pool;
        self.transition(pool, None, SubmissionState::Built);

        if *self.shutdown.borrow() {
            return failed(FailureReason::Abandoned, None, "shutdown requested before signing");
        }

        let signed = match self.signer.sign(tx).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Signing failed for pool {}: {}", pool, e);
                return failed(FailureReason::SignError, None, e.to_string());
            }
        };
        let hash = signed.hash;
        self.transition(pool, Some(hash), SubmissionState::Signed);

        if self.pending.contains_key(&hash) {
            warn!("Refusing duplicate submission {} for pool {}", hash, pool);
            // Signed but never broadcast: the cached nonce is no longer trustworthy
            self.signer.resync().await;
            return failed(
                FailureReason::DuplicateHash,
                Some(hash),
                "hash already has a pending submission",
            );
        }

        let attempt = match self.submit(&signed).await {
            Ok(attempt) => attempt,
            Err(outcome) => return outcome,
        };

        let submitted_at_block = match self.client.block_number().await {
            Ok(block) => block,
            Err(e) => {
                warn!("Head lookup after submitting {} failed: {}", hash, e);
                0
            }
        };

        match self.pending.entry(hash) {
            Entry::Occupied(_) => {
                warn!("{} is already tracked by another worker", hash);
                return failed(
                    FailureReason::DuplicateHash,
                    Some(hash),
                    "hash already has a pending submission",
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingSubmission {
                    intent,
                    signed_hash: hash,
                    submitted_at_block,
                    attempt,
                });
            }
        }
        self.transition(pool, Some(hash), SubmissionState::Submitted);

        let outcome = self.await_inclusion(hash).await;
        match &outcome {
            SubmissionOutcome::Confirmed { .. } => {
                self.transition(pool, Some(hash), SubmissionState::Confirmed)
            }
            SubmissionOutcome::Failed { reason, .. } => {
                self.transition(pool, Some(hash), SubmissionState::Failed(*reason))
            }
        }
        self.pending.remove(&hash);
        outcome
    }

    /// Broadcast with bounded retries. Ok carries the accepted attempt,
    /// Err the terminal outcome.
    async fn submit(&self, signed: &SignedTransaction) -> Result<u32, SubmissionOutcome> {
        let hash = signed.hash;
        let max = self.policy.submit_max_attempts.max(1);
        let mut delay = self.policy.submit_backoff_base;

        for attempt in 1..=max {
            let err = match self.client.submit(signed).await {
                Ok(_) => {
                    info!("Submitted {} (nonce {}, attempt {}/{})", hash, signed.nonce, attempt, max);
                    return Ok(attempt);
                }
                Err(e) => e,
            };

            match err {
                ChainError::Rejected(msg) if attempt > 1 && is_already_known(&msg) => {
                    info!("Submission {} already known to node after retry", hash);
                    return Ok(attempt);
                }
                ChainError::Rejected(msg) => {
                    warn!("Submission {} rejected: {}", hash, msg);
                    self.signer.resync().await;
                    return Err(failed(FailureReason::Rejected, Some(hash), msg));
                }
                other if attempt == max => {
                    warn!("Submission {} failed after {} attempts: {}", hash, max, other);
                    // The node may never have seen this nonce
                    self.signer.resync().await;
                    return Err(failed(FailureReason::SubmitExhausted, Some(hash), other.to_string()));
                }
                other => {
                    warn!(
                        "Submit attempt {}/{} for {} failed: {} - retrying in {:?}",
                        attempt, max, hash, other, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay, self.policy.submit_backoff_max);
                }
            }
        }

        self.signer.resync().await;
        Err(failed(FailureReason::SubmitExhausted, Some(hash), "no submit attempts"))
    }

    async fn await_inclusion(&self, hash: TxHash) -> SubmissionOutcome {
        let max = self.policy.inclusion_max_attempts.max(1);

        for attempt in 1..=max {
            match self.client.get_receipt(hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    return SubmissionOutcome::Confirmed {
                        tx_hash: hash,
                        block_number: receipt.block_number,
                    };
                }
                Ok(Some(receipt)) => {
                    return failed(
                        FailureReason::Reverted,
                        Some(hash),
                        format!("reverted in block {:?} (gas used {})", receipt.block_number, receipt.gas_used),
                    );
                }
                Ok(None) => debug!("{} not yet included ({}/{})", hash, attempt, max),
                Err(e) => warn!("Receipt poll {}/{} for {} failed: {}", attempt, max, hash, e),
            }
            if attempt < max {
                tokio::time::sleep(self.policy.inclusion_poll_interval).await;
            }
        }

        failed(
            FailureReason::InclusionTimeout,
            Some(hash),
            format!("no receipt after {} polls", max),
        )
    }

    fn transition(&self, pool: Address, hash: Option<TxHash>, state: SubmissionState) {
        debug!("Swap for pool {} -> {:?} (tx {:?})", pool, state, hash);
    }
}

fn is_already_known(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("already known") || msg.contains("known transaction")
}

fn failed(reason: FailureReason, tx_hash: Option<TxHash>, detail: impl Into<String>) -> SubmissionOutcome {
    SubmissionOutcome::Failed {
        reason,
        tx_hash,
        detail: detail.into(),
    }
}
