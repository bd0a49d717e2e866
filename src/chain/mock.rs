//! In-memory chain and signer for unit tests
//!
//! Scripted responses per capability. Defaults are the happy path: pubsub
//! available, submissions accepted, receipts mined successfully.

use super::{ChainClient, LogStream, Signer};
use crate::error::{ChainError, SignError};
use crate::types::{PoolCreatedEvent, Receipt, SignedTransaction, UnsignedTransaction};
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type LiveSender = mpsc::UnboundedSender<Result<PoolCreatedEvent, ChainError>>;

/// One scripted answer to `get_receipt`
#[derive(Debug, Clone)]
pub enum ReceiptStep {
    Pending,
    Error(ChainError),
    Mined { success: bool },
}

pub struct MockChain {
    head: AtomicU64,
    head_fails: AtomicBool,
    /// Events visible to getLogs
    logs: Mutex<Vec<PoolCreatedEvent>>,
    subscribe_unsupported: AtomicBool,
    subscribe_errors: Mutex<VecDeque<ChainError>>,
    subscribers: Mutex<Vec<LiveSender>>,
    pub subscribe_calls: AtomicU32,
    poll_errors: Mutex<VecDeque<ChainError>>,
    pub poll_ranges: Mutex<Vec<(u64, u64)>>,
    reserves: Mutex<HashMap<Address, (U256, U256)>>,
    reserve_failures: Mutex<HashMap<Address, u32>>,
    pub reserve_reads: Mutex<Vec<(Address, u64)>>,
    nonce: AtomicU64,
    nonce_fails: AtomicBool,
    submit_script: Mutex<VecDeque<Result<(), ChainError>>>,
    pub submitted: Mutex<Vec<SignedTransaction>>,
    receipt_script: Mutex<VecDeque<ReceiptStep>>,
    pub receipt_polls: AtomicU32,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            head: AtomicU64::new(100),
            head_fails: AtomicBool::new(false),
            logs: Mutex::new(Vec::new()),
            subscribe_unsupported: AtomicBool::new(false),
            subscribe_errors: Mutex::new(VecDeque::new()),
            subscribers: Mutex::new(Vec::new()),
            subscribe_calls: AtomicU32::new(0),
            poll_errors: Mutex::new(VecDeque::new()),
            poll_ranges: Mutex::new(Vec::new()),
            reserves: Mutex::new(HashMap::new()),
            reserve_failures: Mutex::new(HashMap::new()),
            reserve_reads: Mutex::new(Vec::new()),
            nonce: AtomicU64::new(0),
            nonce_fails: AtomicBool::new(false),
            submit_script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            receipt_script: Mutex::new(VecDeque::new()),
            receipt_polls: AtomicU32::new(0),
        }
    }

    pub fn set_head(&self, block: u64) {
        self.head.store(block, Ordering::SeqCst);
    }

    pub fn fail_head(&self, fail: bool) {
        self.head_fails.store(fail, Ordering::SeqCst);
    }

    /// Make an event visible to getLogs (and move the head if needed)
    pub fn add_log(&self, event: PoolCreatedEvent) {
        self.head.fetch_max(event.block_number, Ordering::SeqCst);
        self.logs.lock().unwrap().push(event);
    }

    pub fn set_subscribe_unsupported(&self, unsupported: bool) {
        self.subscribe_unsupported.store(unsupported, Ordering::SeqCst);
    }

    pub fn push_subscribe_error(&self, err: ChainError) {
        self.subscribe_errors.lock().unwrap().push_back(err);
    }

    /// Deliver an item to every live subscription
    pub fn emit(&self, item: Result<PoolCreatedEvent, ChainError>) {
        if let Ok(ev) = &item {
            self.head.fetch_max(ev.block_number, Ordering::SeqCst);
        }
        let subs = self.subscribers.lock().unwrap();
        for tx in subs.iter() {
            let _ = tx.send(item.clone());
        }
    }

    /// End every live subscription stream
    pub fn drop_subscriptions(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn live_subscriptions(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.is_closed())
            .count()
    }

    pub fn push_poll_error(&self, err: ChainError) {
        self.poll_errors.lock().unwrap().push_back(err);
    }

    pub fn set_reserves(&self, pool: Address, reserve0: u64, reserve1: u64) {
        self.reserves
            .lock()
            .unwrap()
            .insert(pool, (U256::from(reserve0), U256::from(reserve1)));
    }

    /// The next `count` reserve reads of `pool` fail with a transport error
    pub fn fail_reserves(&self, pool: Address, count: u32) {
        self.reserve_failures.lock().unwrap().insert(pool, count);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    pub fn fail_nonce(&self, fail: bool) {
        self.nonce_fails.store(fail, Ordering::SeqCst);
    }

    pub fn script_submit(&self, steps: Vec<Result<(), ChainError>>) {
        self.submit_script.lock().unwrap().extend(steps);
    }

    pub fn script_receipts(&self, steps: Vec<ReceiptStep>) {
        self.receipt_script.lock().unwrap().extend(steps);
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn subscribe_pair_created(&self, _factory: Address) -> Result<LogStream, ChainError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.subscribe_unsupported.load(Ordering::SeqCst) {
            return Err(ChainError::Unsupported("pubsub not available over http".into()));
        }
        if let Some(err) = self.subscribe_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn poll_pair_created(
        &self,
        factory: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PoolCreatedEvent>, ChainError> {
        if let Some(err) = self.poll_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.poll_ranges.lock().unwrap().push((from_block, to_block));
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.factory == factory)
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        if self.head_fails.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("eth_blockNumber timed out".into()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_reserves(&self, pool: Address, block: u64) -> Result<(U256, U256), ChainError> {
        self.reserve_reads.lock().unwrap().push((pool, block));
        {
            let mut failures = self.reserve_failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&pool) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ChainError::Transport("connection reset".into()));
                }
            }
        }
        self.reserves
            .lock()
            .unwrap()
            .get(&pool)
            .copied()
            .ok_or_else(|| ChainError::Decode("getReserves returned no data".into()))
    }

    async fn transaction_count(&self, _account: Address) -> Result<u64, ChainError> {
        if self.nonce_fails.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("nonce lookup timed out".into()));
        }
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash, ChainError> {
        self.submitted.lock().unwrap().push(tx.clone());
        match self.submit_script.lock().unwrap().pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(tx.hash),
        }
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ChainError> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .receipt_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ReceiptStep::Mined { success: true });
        match step {
            ReceiptStep::Pending => Ok(None),
            ReceiptStep::Error(e) => Err(e),
            ReceiptStep::Mined { success } => Ok(Some(Receipt {
                tx_hash: hash,
                block_number: Some(self.head.load(Ordering::SeqCst) + 1),
                success,
                gas_used: 120_000,
            })),
        }
    }
}

/// Signer with a plain counter nonce and deterministic hashes
pub struct MockSigner {
    address: Address,
    nonce: AtomicU64,
    fails: AtomicBool,
    pub resyncs: AtomicU32,
    pub signed: AtomicU32,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0x5e),
            nonce: AtomicU64::new(0),
            fails: AtomicBool::new(false),
            resyncs: AtomicU32::new(0),
            signed: AtomicU32::new(0),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fails.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, SignError> {
        if self.fails.load(Ordering::SeqCst) {
            return Err(SignError::Unavailable("hsm offline".into()));
        }
        self.signed.fetch_add(1, Ordering::SeqCst);
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut preimage = nonce.to_be_bytes().to_vec();
        preimage.extend_from_slice(&tx.input);
        Ok(SignedTransaction {
            hash: keccak256(&preimage),
            raw: Bytes::from(preimage),
            nonce,
        })
    }

    async fn resync(&self) {
        self.resyncs.fetch_add(1, Ordering::SeqCst);
    }
}
