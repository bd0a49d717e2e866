//! Alloy-backed network client
//!
//! One `DynProvider` built from the RPC URL. ws:// and ipc:// endpoints get
//! pubsub; http(s):// endpoints report subscriptions as unsupported, which
//! the event feed turns into getLogs polling.
//!
//! Created: 2026-10-19

use super::{ChainClient, LogStream};
use crate::contracts::{IUniswapV2Factory, IUniswapV2Pair};
use crate::error::ChainError;
use crate::types::{PoolCreatedEvent, Receipt, SignedTransaction};
use alloy::eips::BlockId;
use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

/// JSON-RPC "method not found"
const METHOD_NOT_FOUND: i64 = -32601;

pub struct AlloyChainClient {
    provider: DynProvider,
}

impl AlloyChainClient {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }

    /// Connect using the URL scheme to pick the transport (http, ws, ipc)
    pub async fn connect(rpc_url: &str) -> Result<Self, ChainError> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(classify)?
            .erased();
        info!("RPC provider connected");
        Ok(Self { provider })
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

/// Log filter for `PairCreated` emitted by `factory`
pub fn pair_created_filter(factory: Address) -> Filter {
    Filter::new()
        .address(factory)
        .event_signature(IUniswapV2Factory::PairCreated::SIGNATURE_HASH)
}

/// Decode a raw RPC log into a PoolCreatedEvent
pub fn decode_pair_created(log: &Log) -> Result<PoolCreatedEvent, ChainError> {
    let decoded = log
        .log_decode::<IUniswapV2Factory::PairCreated>()
        .map_err(|e| ChainError::Decode(format!("PairCreated: {}", e)))?;
    let event = &decoded.inner.data;

    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| ChainError::Decode("PairCreated log has no transaction hash".into()))?;
    let block_number = log
        .block_number
        .ok_or_else(|| ChainError::Decode("PairCreated log has no block number".into()))?;

    Ok(PoolCreatedEvent {
        tx_hash,
        block_number,
        factory: log.inner.address,
        pool: event.pair,
        token0: event.token0,
        token1: event.token1,
    })
}

/// Generic classification: node error responses and IO are transient for reads
fn classify(err: TransportError) -> ChainError {
    match &err {
        RpcError::DeserError { .. } => ChainError::Decode(err.to_string()),
        _ => ChainError::Transport(err.to_string()),
    }
}

/// Subscription errors: "no pubsub" is a capability problem, not a blip
fn classify_subscribe(err: TransportError) -> ChainError {
    match &err {
        RpcError::Transport(TransportErrorKind::PubsubUnavailable) => {
            ChainError::Unsupported(err.to_string())
        }
        RpcError::ErrorResp(payload)
            if payload.code == METHOD_NOT_FOUND
                || payload.message.to_lowercase().contains("not supported") =>
        {
            ChainError::Unsupported(payload.message.to_string())
        }
        _ => classify(err),
    }
}

/// Submission errors: any JSON-RPC error response is the node refusing the tx
fn classify_submit(err: TransportError) -> ChainError {
    match &err {
        RpcError::ErrorResp(payload) => ChainError::Rejected(payload.message.to_string()),
        _ => classify(err),
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn subscribe_pair_created(&self, factory: Address) -> Result<LogStream, ChainError> {
        let filter = pair_created_filter(factory);
        let sub = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(classify_subscribe)?;

        let stream = sub.into_stream().filter_map(|log| async move {
            if log.removed {
                debug!("Ignoring removed PairCreated log (reorg): {:?}", log.transaction_hash);
                return None;
            }
            Some(decode_pair_created(&log))
        });
        Ok(Box::pin(stream))
    }

    async fn poll_pair_created(
        &self,
        factory: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PoolCreatedEvent>, ChainError> {
        let filter = pair_created_filter(factory)
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await.map_err(classify)?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs.iter().filter(|l| !l.removed) {
            match decode_pair_created(log) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping undecodable PairCreated log: {}", e),
            }
        }
        Ok(events)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(classify)
    }

    async fn get_reserves(&self, pool: Address, block: u64) -> Result<(U256, U256), ChainError> {
        let calldata = IUniswapV2Pair::getReservesCall {}.abi_encode();
        let tx = TransactionRequest::default()
            .to(pool)
            .input(calldata.into());

        let output = self
            .provider
            .call(tx)
            .block(BlockId::number(block))
            .await
            .map_err(classify)?;

        let reserves = IUniswapV2Pair::getReservesCall::abi_decode_returns(&output)
            .map_err(|e| ChainError::Decode(format!("getReserves: {}", e)))?;

        let r0: u128 = reserves.reserve0.to();
        let r1: u128 = reserves.reserve1.to();
        Ok((U256::from(r0), U256::from(r1)))
    }

    async fn transaction_count(&self, account: Address) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(account)
            .pending()
            .await
            .map_err(classify)
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(&tx.raw)
            .await
            .map_err(classify_submit)?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(classify)?;

        Ok(receipt.map(|r| Receipt {
            tx_hash: r.transaction_hash,
            block_number: r.block_number,
            success: r.status(),
            gas_used: r.gas_used,
        }))
    }
}
