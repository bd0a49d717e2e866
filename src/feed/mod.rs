//! New Pair Event Feed
//!
//! Produces `PairCreated` notifications for one factory. `open()` probes the
//! transport once: a push subscription when pubsub is available, otherwise
//! getLogs polling over `[last_seen + 1, head]` windows. Either way a
//! spawned driver feeds a bounded channel and the caller gets the same
//! `EventStream`.
//!
//! Transient failures are reconnected internally. When reconnects run out
//! the stream yields one `FeedError` and ends; the caller re-opens.
//!
//! Created: 2026-10-19

use crate::chain::{ChainClient, LogStream};
use crate::config::FeedConfig;
use crate::error::{ChainError, FeedError};
use crate::retry::next_backoff;
use crate::types::PoolCreatedEvent;
use alloy::primitives::Address;
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

pub type FeedItem = Result<PoolCreatedEvent, FeedError>;

/// Transport mode selected when the feed was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Subscription,
    Polling,
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeedMode::Subscription => write!(f, "subscription"),
            FeedMode::Polling => write!(f, "polling"),
        }
    }
}

/// Stream of pool-created events, identical for both modes.
/// Dropping it stops the driver task.
pub struct EventStream {
    mode: FeedMode,
    inner: ReceiverStream<FeedItem>,
}

impl EventStream {
    pub fn mode(&self) -> FeedMode {
        self.mode
    }
}

impl Stream for EventStream {
    type Item = FeedItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

pub struct EventFeed {
    client: Arc<dyn ChainClient>,
    factory: Address,
    config: FeedConfig,
}

impl EventFeed {
    pub fn new(client: Arc<dyn ChainClient>, factory: Address, config: FeedConfig) -> Self {
        Self {
            client,
            factory,
            config,
        }
    }

    /// Establish the feed from the current head. Events before the head at
    /// open time are not replayed.
    pub async fn open(&self) -> Result<EventStream, FeedError> {
        let head = self.client.block_number().await.map_err(FeedError::Open)?;
        let (tx, rx) = mpsc::channel(self.config.channel_size.max(1));

        let driver = Driver {
            client: self.client.clone(),
            factory: self.factory,
            config: self.config.clone(),
            last_seen: head,
            tx,
        };

        let mode = match self.client.subscribe_pair_created(self.factory).await {
            Ok(live) => {
                info!("Event feed: subscribed to PairCreated on {} (head {})", self.factory, head);
                tokio::spawn(driver.run_subscription(live));
                FeedMode::Subscription
            }
            Err(ChainError::Unsupported(reason)) => {
                info!(
                    "Event feed: subscriptions unsupported ({}), polling getLogs every {:?} from block {}",
                    reason, self.config.poll_interval, head
                );
                tokio::spawn(driver.run_polling());
                FeedMode::Polling
            }
            Err(e) => return Err(FeedError::Open(e)),
        };

        Ok(EventStream {
            mode,
            inner: ReceiverStream::new(rx),
        })
    }
}

struct Driver {
    client: Arc<dyn ChainClient>,
    factory: Address,
    config: FeedConfig,
    last_seen: u64,
    tx: mpsc::Sender<FeedItem>,
}

impl Driver {
    async fn deliver(&mut self, event: PoolCreatedEvent) -> bool {
        self.last_seen = self.last_seen.max(event.block_number);
        self.tx.send(Ok(event)).await.is_ok()
    }

    async fn run_subscription(mut self, mut live: LogStream) {
        loop {
            let item = tokio::select! {
                _ = self.tx.closed() => {
                    debug!("Event feed consumer dropped, stopping subscription driver");
                    return;
                }
                item = live.next() => item,
            };

            let cause = match item {
                Some(Ok(event)) => {
                    if !self.deliver(event).await {
                        return;
                    }
                    continue;
                }
                Some(Err(ChainError::Decode(e))) => {
                    warn!("Skipping undecodable PairCreated log: {}", e);
                    continue;
                }
                Some(Err(e)) => e,
                None => ChainError::Transport("subscription stream ended".into()),
            };

            warn!("Event feed: subscription lost ({}), reconnecting", cause);
            live = match self.resubscribe(cause).await {
                Ok(stream) => stream,
                Err(fatal) => {
                    error!("Event feed: {}", fatal);
                    let _ = self.tx.send(Err(fatal)).await;
                    return;
                }
            };
            if !self.backfill().await {
                return;
            }
        }
    }

    async fn resubscribe(&self, cause: ChainError) -> Result<LogStream, FeedError> {
        let attempts = self.config.reconnect_attempts;
        let mut last = cause;
        let mut delay = self.config.reconnect_base_delay;

        for attempt in 1..=attempts {
            tokio::time::sleep(delay).await;
            if self.tx.is_closed() {
                return Err(FeedError::ReconnectExhausted { attempts: attempt, last });
            }
            match self.client.subscribe_pair_created(self.factory).await {
                Ok(stream) => {
                    info!("Event feed: resubscribed (attempt {}/{})", attempt, attempts);
                    return Ok(stream);
                }
                Err(e) => {
                    warn!("Event feed: resubscribe {}/{} failed: {}", attempt, attempts, e);
                    last = e;
                }
            }
            delay = next_backoff(delay, self.config.reconnect_max_delay);
        }

        Err(FeedError::ReconnectExhausted { attempts, last })
    }

    /// One getLogs window over the reconnect gap. The last seen block is
    /// included since only part of it may have been delivered.
    async fn backfill(&mut self) -> bool {
        let head = match self.client.block_number().await {
            Ok(h) => h,
            Err(e) => {
                warn!("Event feed: backfill skipped, head unavailable: {}", e);
                return true;
            }
        };
        if head < self.last_seen {
            return true;
        }
        match self.client.poll_pair_created(self.factory, self.last_seen, head).await {
            Ok(events) => {
                if !events.is_empty() {
                    info!(
                        "Event feed: backfilled {} events from blocks {}..={}",
                        events.len(),
                        self.last_seen,
                        head
                    );
                }
                for event in events {
                    if !self.deliver(event).await {
                        return false;
                    }
                }
                self.last_seen = self.last_seen.max(head);
            }
            Err(e) => warn!(
                "Event feed: backfill of blocks {}..={} failed: {}",
                self.last_seen, head, e
            ),
        }
        true
    }

    async fn run_polling(mut self) {
        let mut interval =
            tokio::time::interval(self.config.poll_interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = self.tx.closed() => {
                    debug!("Event feed consumer dropped, stopping poll driver");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.poll_once().await {
                Ok(true) => failures = 0,
                Ok(false) => return,
                Err(e) => {
                    failures += 1;
                    if failures > self.config.reconnect_attempts {
                        let fatal = FeedError::ReconnectExhausted {
                            attempts: self.config.reconnect_attempts,
                            last: e,
                        };
                        error!("Event feed: {}", fatal);
                        let _ = self.tx.send(Err(fatal)).await;
                        return;
                    }
                    warn!(
                        "Event feed: poll failed ({}/{}): {}",
                        failures, self.config.reconnect_attempts, e
                    );
                }
            }
        }
    }

    /// Poll `[last_seen + 1, head]`. Ok(false) when the consumer is gone.
    async fn poll_once(&mut self) -> Result<bool, ChainError> {
        let head = self.client.block_number().await?;
        if head <= self.last_seen {
            return Ok(true);
        }
        let from = self.last_seen + 1;
        let mut events = self.client.poll_pair_created(self.factory, from, head).await?;
        events.sort_by_key(|e| e.block_number);
        debug!("Event feed: polled blocks {}..={} ({} events)", from, head, events.len());

        for event in events {
            if !self.deliver(event).await {
                return Ok(false);
            }
        }
        self.last_seen = head;
        Ok(true)
    }
}
