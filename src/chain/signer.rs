//! Local private key signer
//!
//! Signs EIP-1559 transactions with an in-process key and owns the nonce
//! sequence for the account. The nonce lock is held across signing so two
//! concurrent intents can never share a sequence number.
//!
//! Created: 2026-10-19

use super::{ChainClient, Signer};
use crate::config::SecretKey;
use crate::error::SignError;
use crate::types::{SignedTransaction, UnsignedTransaction};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct LocalKeySigner {
    key: PrivateKeySigner,
    chain_id: u64,
    client: Arc<dyn ChainClient>,
    /// Next nonce to hand out. None = fetch from the network on next sign.
    next_nonce: Mutex<Option<u64>>,
}

impl LocalKeySigner {
    pub fn new(key: PrivateKeySigner, chain_id: u64, client: Arc<dyn ChainClient>) -> Self {
        Self {
            key,
            chain_id,
            client,
            next_nonce: Mutex::new(None),
        }
    }

    /// Parse a hex private key (with or without 0x)
    pub fn from_secret(
        secret: &SecretKey,
        chain_id: u64,
        client: Arc<dyn ChainClient>,
    ) -> Result<Self, SignError> {
        let raw = secret.expose().trim().trim_start_matches("0x");
        let key = PrivateKeySigner::from_str(raw)
            .map_err(|_| SignError::Unavailable("PRIVATE_KEY is not a valid secp256k1 key".into()))?;
        info!("Signer loaded: {}", key.address());
        Ok(Self::new(key, chain_id, client))
    }
}

#[async_trait]
impl Signer for LocalKeySigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    async fn sign(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, SignError> {
        let mut guard = self.next_nonce.lock().await;
        let nonce = match *guard {
            Some(n) => n,
            None => {
                let n = self.client.transaction_count(self.key.address()).await?;
                debug!("Fetched account nonce {}", n);
                n
            }
        };

        let unsigned = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit: tx.gas_limit,
            max_fee_per_gas: tx.max_fee_per_gas,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.input,
            access_list: Default::default(),
        };

        let signature = self
            .key
            .sign_hash_sync(&unsigned.signature_hash())
            .map_err(|e| SignError::Signing(e.to_string()))?;
        let signed = unsigned.into_signed(signature);
        let hash = *signed.hash();
        let raw: Bytes = TxEnvelope::from(signed).encoded_2718().into();

        *guard = Some(nonce + 1);
        Ok(SignedTransaction { hash, raw, nonce })
    }

    async fn resync(&self) {
        let mut guard = self.next_nonce.lock().await;
        if guard.take().is_some() {
            warn!("Nonce cache dropped, will refetch on next sign");
        }
    }
}
