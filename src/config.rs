//! Configuration management
//! Load settings from a .env file (or the process environment)
//!
//! Required: RPC_URL, PRIVATE_KEY, CHAIN_ID, QUOTE_TOKEN, FACTORY_ADDRESS,
//! ROUTER_ADDRESS, TRADE_AMOUNT_WEI. Everything else has a default.
//!
//! Created: 2026-10-19

use alloy::primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Private key material. Never printed.
#[derive(Clone)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// What to do when the reserve read for a new pool fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailurePolicy {
    /// Drop the event (reference behavior, keeps the reaction window tight)
    Skip,
    /// Re-read up to `attempts` more times, `delay` apart
    Retry { attempts: u32, delay: Duration },
}

impl ReadFailurePolicy {
    /// Parse "skip" or "retry:N" (optionally "retry:N:DELAY_MS")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        if s == "skip" {
            return Ok(Self::Skip);
        }
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("retry"), Some(n), delay) => {
                let attempts: u32 = n.parse().with_context(|| format!("bad retry count '{}'", n))?;
                let delay_ms: u64 = match delay {
                    Some(d) => d.parse().with_context(|| format!("bad retry delay '{}'", d))?,
                    None => 250,
                };
                Ok(Self::Retry {
                    attempts,
                    delay: Duration::from_millis(delay_ms),
                })
            }
            _ => bail!("Invalid READ_FAILURE_POLICY '{}': expected skip or retry:N[:DELAY_MS]", s),
        }
    }
}

/// Event feed tuning
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Interval between getLogs polls in fallback mode
    pub poll_interval: Duration,
    /// Immediate reconnect attempts before the feed reports a fatal error
    pub reconnect_attempts: u32,
    /// First reconnect delay (doubled per attempt)
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Buffered events between the feed driver and the orchestrator
    pub channel_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2_000),
            reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(200),
            reconnect_max_delay: Duration::from_secs(5),
            channel_size: 256,
        }
    }
}

/// Swap construction parameters
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub router: Address,
    pub quote_token: Address,
    pub amount_in: U256,
    /// Max slippage vs constant-product quote, percent. None = no protection.
    pub max_slippage_percent: Option<Decimal>,
    pub deadline_offset_secs: i64,
    /// Pay the quote token as native currency (swapExactETHForTokens)
    pub pay_native: bool,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Submission and inclusion retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub submit_max_attempts: u32,
    pub submit_backoff_base: Duration,
    pub submit_backoff_max: Duration,
    pub inclusion_poll_interval: Duration,
    pub inclusion_max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            submit_max_attempts: 3,
            submit_backoff_base: Duration::from_millis(250),
            submit_backoff_max: Duration::from_secs(4),
            inclusion_poll_interval: Duration::from_secs(3),
            inclusion_max_attempts: 10,
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    // Network
    pub rpc_url: String,
    pub chain_id: u64,

    // Wallet
    pub private_key: SecretKey,

    // Exchange
    pub factory: Address,

    pub execution: ExecutionConfig,
    pub retry: RetryPolicy,
    pub feed: FeedConfig,

    // Orchestrator
    pub read_failure_policy: ReadFailurePolicy,
    pub dedup_window_blocks: u64,
    pub feed_max_restarts: u32,
    pub shutdown_grace: Duration,
    pub stats_interval: Duration,

    /// Sign and submit for real. Off = dry run (log intents only).
    pub live_mode: bool,
    pub discord_webhook: Option<String>,
}

/// Load configuration from `.env` in the working directory
pub fn load_config() -> Result<BotConfig> {
    load_config_from_file(".env")
}

/// Load a specific env file, then read the environment.
/// A missing file is not an error: variables may come from the process env.
pub fn load_config_from_file(path: &str) -> Result<BotConfig> {
    if dotenv::from_filename(path).is_err() {
        tracing::warn!("Env file {} not found - using process environment only", path);
    }
    BotConfig::from_lookup(|key| std::env::var(key).ok())
}

impl BotConfig {
    /// First 40 characters of the RPC URL, for startup logs
    pub fn rpc_url_preview(&self) -> String {
        self.rpc_url.chars().take(40).collect()
    }

    /// Build from any key lookup (environment, map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let max_slippage_percent = match env.optional("MAX_SLIPPAGE_PERCENT") {
            Some(raw) => {
                let pct = Decimal::from_str(raw.trim())
                    .with_context(|| format!("MAX_SLIPPAGE_PERCENT '{}' is not a decimal", raw))?;
                if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                    bail!("MAX_SLIPPAGE_PERCENT must be within 0..=100, got {}", pct);
                }
                Some(pct)
            }
            None => None,
        };

        let amount_in = U256::from_str(env.required("TRADE_AMOUNT_WEI")?.trim())
            .context("TRADE_AMOUNT_WEI is not an integer")?;

        let execution = ExecutionConfig {
            router: env.address("ROUTER_ADDRESS")?,
            quote_token: env.address("QUOTE_TOKEN")?,
            amount_in,
            max_slippage_percent,
            deadline_offset_secs: env.parse_or("DEADLINE_OFFSET_SECS", 1800)?,
            pay_native: env.parse_or("PAY_NATIVE", true)?,
            gas_limit: env.parse_or("GAS_LIMIT", 300_000)?,
            max_fee_per_gas: gwei(env.parse_or("MAX_FEE_GWEI", 50u64)?),
            max_priority_fee_per_gas: gwei(env.parse_or("PRIORITY_FEE_GWEI", 2u64)?),
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            submit_max_attempts: env.parse_or("SUBMIT_MAX_ATTEMPTS", defaults.submit_max_attempts)?,
            submit_backoff_base: ms(env.parse_or("SUBMIT_BACKOFF_MS", 250)?),
            submit_backoff_max: ms(env.parse_or("SUBMIT_BACKOFF_MAX_MS", 4_000)?),
            inclusion_poll_interval: ms(env.parse_or("INCLUSION_POLL_MS", 3_000)?),
            inclusion_max_attempts: env.parse_or("INCLUSION_RETRIES", defaults.inclusion_max_attempts)?,
        };
        if retry.submit_max_attempts == 0 || retry.inclusion_max_attempts == 0 {
            bail!("SUBMIT_MAX_ATTEMPTS and INCLUSION_RETRIES must be at least 1");
        }

        let feed_defaults = FeedConfig::default();
        let feed = FeedConfig {
            poll_interval: ms(env.parse_or("POLL_INTERVAL_MS", 2_000)?),
            reconnect_attempts: env.parse_or("FEED_RECONNECT_ATTEMPTS", feed_defaults.reconnect_attempts)?,
            reconnect_base_delay: ms(env.parse_or("FEED_RECONNECT_BASE_MS", 200)?),
            reconnect_max_delay: ms(env.parse_or("FEED_RECONNECT_MAX_MS", 5_000)?),
            channel_size: env.parse_or("FEED_CHANNEL_SIZE", feed_defaults.channel_size)?,
        };

        let read_failure_policy = match env.optional("READ_FAILURE_POLICY") {
            Some(raw) => ReadFailurePolicy::parse(&raw)?,
            None => ReadFailurePolicy::Skip,
        };

        Ok(BotConfig {
            rpc_url: env.required("RPC_URL")?,
            chain_id: env.parse_required("CHAIN_ID")?,
            private_key: SecretKey::new(env.required("PRIVATE_KEY")?),
            factory: env.address("FACTORY_ADDRESS")?,
            execution,
            retry,
            feed,
            read_failure_policy,
            dedup_window_blocks: env.parse_or("DEDUP_WINDOW_BLOCKS", 1_000)?,
            feed_max_restarts: env.parse_or("FEED_MAX_RESTARTS", 10)?,
            shutdown_grace: Duration::from_secs(env.parse_or("SHUTDOWN_GRACE_SECS", 30)?),
            stats_interval: Duration::from_secs(env.parse_or("STATS_INTERVAL_SECS", 300)?),
            live_mode: env.parse_or("LIVE_MODE", false)?,
            discord_webhook: env.optional("DISCORD_WEBHOOK"),
        })
    }
}

fn gwei(value: u64) -> u128 {
    value as u128 * 1_000_000_000
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<'a, F> Env<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| anyhow!("{} not set", key))
    }

    fn address(&self, key: &str) -> Result<Address> {
        let raw = self.required(key)?;
        Address::from_str(raw.trim()).with_context(|| format!("{} is not a valid address: {}", key, raw))
    }

    fn parse_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let raw = self.required(key)?;
        raw.trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(_) => self.parse_required(key),
            None => Ok(default),
        }
    }
}

/// Handy for tests and tools: config from a literal key/value list
pub fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<BotConfig> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    BotConfig::from_lookup(|key| map.get(key).cloned())
}
