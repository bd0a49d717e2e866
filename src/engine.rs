//! Sniper Engine
//!
//! Wires feed -> reader -> gate -> builder -> tracker for every new pair.
//! The feed loop only dispatches: each event runs in its own JoinSet task,
//! so a slow confirmation never holds up the next notification.
//!
//! Feed-level failures re-open the feed with backoff until the restart
//! budget is spent. On shutdown, in-flight workers get a grace period and
//! are then detached, never aborted.
//!
//! Created: 2026-10-19

use crate::alerts::DiscordAlerter;
use crate::chain::{ChainClient, Signer};
use crate::config::{BotConfig, ReadFailurePolicy};
use crate::dedup::{Admission, DedupSet};
use crate::error::{EngineError, FeedError, ReadError};
use crate::execution::{Clock, SubmissionTracker, TransactionBuilder};
use crate::feed::EventFeed;
use crate::filters::evaluate;
use crate::pool::PoolStateReader;
use crate::retry::next_backoff;
use crate::stats::PipelineStats;
use crate::types::{
    EligibilityDecision, PipelineOutcome, PoolCreatedEvent, PoolQuote, ReserveState,
    SubmissionOutcome,
};
use alloy::primitives::Address;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Per-event processing shared by all workers
pub struct Pipeline {
    reader: PoolStateReader,
    builder: TransactionBuilder,
    tracker: SubmissionTracker,
    dedup: DedupSet,
    stats: Arc<PipelineStats>,
    alerter: DiscordAlerter,
    clock: Arc<dyn Clock>,
    quote_token: Address,
    read_policy: ReadFailurePolicy,
    live_mode: bool,
}

impl Pipeline {
    pub fn new(
        config: &BotConfig,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let recipient = signer.address();
        Self {
            reader: PoolStateReader::new(client.clone()),
            builder: TransactionBuilder::new(config.execution.clone(), recipient),
            tracker: SubmissionTracker::new(client, signer, config.retry.clone(), shutdown),
            dedup: DedupSet::new(config.dedup_window_blocks),
            stats: Arc::new(PipelineStats::new()),
            alerter: DiscordAlerter::new(config.discord_webhook.clone()),
            clock,
            quote_token: config.execution.quote_token,
            read_policy: config.read_failure_policy,
            live_mode: config.live_mode,
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Process one event to its terminal outcome, then log, count and alert
    pub async fn handle(&self, event: PoolCreatedEvent) -> PipelineOutcome {
        let outcome = self.process(&event).await;
        report(&outcome);
        self.stats.record(&outcome);
        if self.alerter.is_enabled() {
            self.alerter.send_outcome(&outcome).await;
        }
        outcome
    }

    pub async fn process(&self, event: &PoolCreatedEvent) -> PipelineOutcome {
        let pool = event.pool;

        match self.dedup.admit(event) {
            Admission::New => {}
            Admission::Duplicate => return PipelineOutcome::Duplicate,
            Admission::Stale => {
                debug!("Dropping stale event for {} from block {}", pool, event.block_number);
                return PipelineOutcome::Duplicate;
            }
        }
        info!("New pair: {}", event);

        let reserves = match self.read(pool).await {
            Ok(r) => r,
            Err(e) => {
                return PipelineOutcome::ReadFailed {
                    pool,
                    error: e.to_string(),
                }
            }
        };

        let decision = evaluate(event, &reserves, self.quote_token);
        match decision {
            EligibilityDecision::Ineligible { reason } => {
                return PipelineOutcome::Ineligible { pool, reason }
            }
            EligibilityDecision::Indeterminate { reason } => {
                return PipelineOutcome::Indeterminate { pool, reason }
            }
            EligibilityDecision::Eligible { .. } => {}
        }

        let quote = PoolQuote::for_decision(event, &reserves, &decision);
        let intent = match self
            .builder
            .build(pool, &decision, quote.as_ref(), self.clock.now_unix())
        {
            Ok(intent) => intent,
            Err(e) => {
                return PipelineOutcome::BuildFailed {
                    pool,
                    error: e.to_string(),
                }
            }
        };

        if !self.live_mode {
            return PipelineOutcome::DryRun { pool, intent };
        }

        let tx = self.builder.encode(&intent);
        match self.tracker.execute(intent, tx).await {
            SubmissionOutcome::Confirmed {
                tx_hash,
                block_number,
            } => PipelineOutcome::Confirmed {
                pool,
                tx_hash,
                block_number,
            },
            SubmissionOutcome::Failed {
                reason,
                tx_hash,
                detail,
            } => PipelineOutcome::Failed {
                pool,
                reason,
                tx_hash,
                detail,
            },
        }
    }

    async fn read(&self, pool: Address) -> Result<ReserveState, ReadError> {
        let (retries, delay) = match self.read_policy {
            ReadFailurePolicy::Skip => (0, Duration::ZERO),
            ReadFailurePolicy::Retry { attempts, delay } => (attempts, delay),
        };

        let mut attempt = 0;
        loop {
            match self.reader.read(pool).await {
                Ok(r) => return Ok(r),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!("Reserve read for {} failed ({}), retry {}/{}", pool, e.source, attempt, retries);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn report(outcome: &PipelineOutcome) {
    let stage = outcome.stage();
    match outcome {
        PipelineOutcome::Duplicate => debug!("[{}] duplicate event ignored", stage),
        PipelineOutcome::ReadFailed { pool, error } => {
            warn!("[{}] pool {} skipped: {}", stage, pool, error)
        }
        PipelineOutcome::Ineligible { pool, reason } => {
            info!("[{}] pool {} ineligible: {}", stage, pool, reason)
        }
        PipelineOutcome::Indeterminate { pool, reason } => {
            warn!("[{}] pool {} indeterminate: {}", stage, pool, reason)
        }
        PipelineOutcome::BuildFailed { pool, error } => {
            error!("[{}] pool {} build failed: {}", stage, pool, error)
        }
        PipelineOutcome::DryRun { pool, intent } => info!(
            "DRY RUN: would buy {} with {} wei of {} via pool {} (min out {}, deadline {})",
            intent.to_token,
            intent.amount_in,
            intent.from_token,
            pool,
            intent.min_amount_out,
            intent.deadline_unix_secs
        ),
        PipelineOutcome::Confirmed {
            pool,
            tx_hash,
            block_number,
        } => info!(
            "CONFIRMED: buy into pool {} tx {} (block {:?})",
            pool, tx_hash, block_number
        ),
        PipelineOutcome::Failed {
            pool,
            reason,
            tx_hash,
            detail,
        } => error!(
            "FAILED [{}] pool {} reason={} tx={:?}: {}",
            stage, pool, reason, tx_hash, detail
        ),
    }
}

/// Orchestrator timing knobs
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub feed_max_restarts: u32,
    pub restart_base_delay: Duration,
    pub restart_max_delay: Duration,
    pub shutdown_grace: Duration,
    pub stats_interval: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            feed_max_restarts: config.feed_max_restarts,
            restart_base_delay: config.feed.reconnect_base_delay,
            restart_max_delay: config.feed.reconnect_max_delay,
            shutdown_grace: config.shutdown_grace,
            stats_interval: config.stats_interval,
        }
    }
}

pub struct Engine {
    feed: EventFeed,
    pipeline: Arc<Pipeline>,
    settings: EngineSettings,
    shutdown: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(
        config: &BotConfig,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let feed = EventFeed::new(client.clone(), config.factory, config.feed.clone());
        let pipeline = Pipeline::new(config, client, signer, clock, shutdown.clone());
        Self {
            feed,
            pipeline: Arc::new(pipeline),
            settings: EngineSettings::from_config(config),
            shutdown,
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.pipeline.stats()
    }

    /// Run until shutdown (Ok) or until the feed cannot be restarted (Err)
    pub async fn run(self) -> Result<(), EngineError> {
        let stats = self.pipeline.stats();
        let mut shutdown = self.shutdown.clone();
        let mut workers: JoinSet<()> = JoinSet::new();
        let mut restarts = 0u32;
        let mut delay = self.settings.restart_base_delay;

        let mut stats_tick =
            tokio::time::interval(self.settings.stats_interval.max(Duration::from_secs(1)));
        stats_tick.tick().await;

        let result = 'feed: loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let fatal = match self.feed.open().await {
                Ok(mut stream) => {
                    info!("Event feed open ({} mode)", stream.mode());
                    loop {
                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    info!("Shutdown requested - stopping event feed");
                                    break 'feed Ok(());
                                }
                            }
                            _ = stats_tick.tick() => {
                                info!("Stats: {} | in flight: {}", stats, workers.len());
                            }
                            Some(joined) = workers.join_next(), if !workers.is_empty() => {
                                if let Err(e) = joined {
                                    error!("Pipeline worker crashed: {}", e);
                                }
                            }
                            item = stream.next() => match item {
                                Some(Ok(event)) => {
                                    restarts = 0;
                                    delay = self.settings.restart_base_delay;
                                    stats.record_event();
                                    let pipeline = self.pipeline.clone();
                                    workers.spawn(async move {
                                        pipeline.handle(event).await;
                                    });
                                }
                                Some(Err(e)) => break e,
                                None => break FeedError::Closed,
                            }
                        }
                    }
                }
                Err(e) => e,
            };

            restarts += 1;
            stats.record_restart();
            if restarts > self.settings.feed_max_restarts {
                error!("Event feed failed {} times in a row: {}", restarts, fatal);
                break Err(EngineError::RestartBudgetExhausted {
                    restarts,
                    last: fatal,
                });
            }
            warn!(
                "Event feed failed ({}), restart {}/{} in {:?}",
                fatal, restarts, self.settings.feed_max_restarts, delay
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break Ok(());
                    }
                }
            }
            delay = next_backoff(delay, self.settings.restart_max_delay);
        };

        drain(workers, self.settings.shutdown_grace).await;
        info!("Final stats: {}", stats);
        result
    }
}

/// Wait up to `grace` for in-flight workers, then detach the rest
async fn drain(mut workers: JoinSet<()>, grace: Duration) {
    if workers.is_empty() {
        return;
    }
    info!("Waiting up to {:?} for {} in-flight swaps", grace, workers.len());
    let finished = tokio::time::timeout(grace, async {
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Pipeline worker crashed: {}", e);
            }
        }
    })
    .await;

    if finished.is_err() {
        warn!("Grace period over - detaching {} workers", workers.len());
        workers.detach_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{MockChain, MockSigner, ReceiptStep};
    use crate::config::config_from_pairs;
    use crate::error::ChainError;
    use crate::execution::FixedClock;
    use crate::types::FailureReason;
    use alloy::primitives::TxHash;
    use std::sync::atomic::Ordering;

    const Q: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    const FACTORY: &str = "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f";
    const NOW: i64 = 1_760_000_000;

    fn quote_token() -> Address {
        Q.parse().unwrap()
    }

    fn factory() -> Address {
        FACTORY.parse().unwrap()
    }

    fn config(live: bool) -> BotConfig {
        let mut config = config_from_pairs(&[
            ("RPC_URL", "ws://localhost:8546"),
            ("CHAIN_ID", "1"),
            ("PRIVATE_KEY", "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"),
            ("QUOTE_TOKEN", Q),
            ("FACTORY_ADDRESS", FACTORY),
            ("ROUTER_ADDRESS", "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
            ("TRADE_AMOUNT_WEI", "10000000000000000"),
        ])
        .unwrap();
        config.live_mode = live;
        config.retry.submit_backoff_base = Duration::from_millis(1);
        config.retry.inclusion_poll_interval = Duration::from_millis(1);
        config.feed.reconnect_base_delay = Duration::from_millis(1);
        config.feed.reconnect_max_delay = Duration::from_millis(5);
        config.feed.poll_interval = Duration::from_millis(5);
        config.shutdown_grace = Duration::from_millis(500);
        config
    }

    fn event(n: u8, token0: Address, token1: Address) -> PoolCreatedEvent {
        PoolCreatedEvent {
            tx_hash: TxHash::repeat_byte(n),
            block_number: 101,
            factory: factory(),
            pool: Address::repeat_byte(n),
            token0,
            token1,
        }
    }

    struct Harness {
        chain: Arc<MockChain>,
        signer: Arc<MockSigner>,
        pipeline: Pipeline,
        _shutdown: watch::Sender<bool>,
    }

    fn harness(config: &BotConfig) -> Harness {
        let chain = Arc::new(MockChain::new());
        let signer = Arc::new(MockSigner::new());
        let (tx, rx) = watch::channel(false);
        let pipeline = Pipeline::new(config, chain.clone(), signer.clone(), Arc::new(FixedClock(NOW)), rx);
        Harness {
            chain,
            signer,
            pipeline,
            _shutdown: tx,
        }
    }

    #[tokio::test]
    async fn test_quote_pair_builds_buy_of_other_token() {
        let cfg = config(false);
        let h = harness(&cfg);
        let x = Address::repeat_byte(0x42);
        let ev = event(1, quote_token(), x);
        h.chain.set_reserves(ev.pool, 5_000_000, 9_000_000);

        match h.pipeline.process(&ev).await {
            PipelineOutcome::DryRun { intent, .. } => {
                assert_eq!(intent.from_token, quote_token());
                assert_eq!(intent.to_token, x);
                assert_eq!(intent.amount_in, cfg.execution.amount_in);
                assert_eq!(intent.deadline_unix_secs, (NOW + 1800) as u64);
            }
            other => panic!("expected dry run, got {:?}", other),
        }
        assert_eq!(h.signer.signed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_quote_pair_builds_nothing() {
        let h = harness(&config(true));
        let ev = event(2, Address::repeat_byte(0x0a), Address::repeat_byte(0x0b));
        h.chain.set_reserves(ev.pool, 1_000, 1_000);

        let outcome = h.pipeline.process(&ev).await;
        assert_eq!(
            outcome,
            PipelineOutcome::Ineligible {
                pool: ev.pool,
                reason: "no-quote-token-pair"
            }
        );
        assert_eq!(h.signer.signed.load(Ordering::SeqCst), 0);
        assert!(h.chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_empty_pool_is_ineligible() {
        let h = harness(&config(true));
        let ev = event(3, quote_token(), Address::repeat_byte(0x42));
        h.chain.set_reserves(ev.pool, 0, 0);
        assert_eq!(
            h.pipeline.process(&ev).await,
            PipelineOutcome::Ineligible {
                pool: ev.pool,
                reason: "zero-reserve"
            }
        );
    }

    #[tokio::test]
    async fn test_live_mode_submits_and_confirms() {
        let h = harness(&config(true));
        let ev = event(4, Address::repeat_byte(0x42), quote_token());
        h.chain.set_reserves(ev.pool, 9_000_000, 5_000_000);

        let outcome = h.pipeline.handle(ev.clone()).await;
        assert!(matches!(outcome, PipelineOutcome::Confirmed { pool, .. } if pool == ev.pool));
        assert_eq!(h.chain.submitted().len(), 1);
        assert_eq!(h.pipeline.stats().confirmed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_same_event_processed_at_most_once() {
        let h = harness(&config(true));
        let ev = event(5, quote_token(), Address::repeat_byte(0x42));
        h.chain.set_reserves(ev.pool, 1_000_000, 1_000_000);

        assert!(matches!(h.pipeline.process(&ev).await, PipelineOutcome::Confirmed { .. }));
        assert_eq!(h.pipeline.process(&ev).await, PipelineOutcome::Duplicate);
        assert_eq!(h.chain.reserve_reads.lock().unwrap().len(), 1);
        assert_eq!(h.chain.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_skips_by_default() {
        let h = harness(&config(true));
        let ev = event(6, quote_token(), Address::repeat_byte(0x42));
        h.chain.set_reserves(ev.pool, 1_000, 1_000);
        h.chain.fail_reserves(ev.pool, 1);

        assert!(matches!(h.pipeline.process(&ev).await, PipelineOutcome::ReadFailed { .. }));
        assert_eq!(h.chain.reserve_reads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_retry_policy() {
        let mut cfg = config(false);
        cfg.read_failure_policy = ReadFailurePolicy::Retry {
            attempts: 2,
            delay: Duration::from_millis(1),
        };
        let h = harness(&cfg);
        let ev = event(7, quote_token(), Address::repeat_byte(0x42));
        h.chain.set_reserves(ev.pool, 1_000, 1_000);
        h.chain.fail_reserves(ev.pool, 2);

        assert!(matches!(h.pipeline.process(&ev).await, PipelineOutcome::DryRun { .. }));
        assert_eq!(h.chain.reserve_reads.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_submission_failure_is_reported() {
        let h = harness(&config(true));
        let ev = event(8, quote_token(), Address::repeat_byte(0x42));
        h.chain.set_reserves(ev.pool, 1_000_000, 1_000_000);
        h.chain.script_receipts(vec![ReceiptStep::Mined { success: false }]);

        match h.pipeline.process(&ev).await {
            PipelineOutcome::Failed { pool, reason, tx_hash, .. } => {
                assert_eq!(pool, ev.pool);
                assert_eq!(reason, FailureReason::Reverted);
                assert!(tx_hash.is_some());
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_engine_isolates_per_event_failures() {
        let cfg = config(true);
        let chain = Arc::new(MockChain::new());
        let signer = Arc::new(MockSigner::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(&cfg, chain.clone(), signer, Arc::new(FixedClock(NOW)), shutdown_rx);
        let stats = engine.stats();
        let handle = tokio::spawn(engine.run());

        let c = chain.clone();
        wait_until(move || c.live_subscriptions() == 1).await;

        let broken = event(9, quote_token(), Address::repeat_byte(0x42));
        let good = event(10, quote_token(), Address::repeat_byte(0x43));
        chain.fail_reserves(broken.pool, 1);
        chain.set_reserves(broken.pool, 1_000, 1_000);
        chain.set_reserves(good.pool, 1_000_000, 1_000_000);

        chain.emit(Ok(broken.clone()));
        chain.emit(Ok(good.clone()));
        chain.emit(Ok(good.clone()));

        let s = stats.clone();
        wait_until(move || {
            s.confirmed.load(Ordering::Relaxed) + s.read_failures.load(Ordering::Relaxed) == 2
                && s.duplicates.load(Ordering::Relaxed) == 1
        })
        .await;

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(stats.events.load(Ordering::Relaxed), 3);
        assert_eq!(stats.confirmed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.read_failures.load(Ordering::Relaxed), 1);
        assert_eq!(chain.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_confirmation_does_not_block_next_pool() {
        let mut cfg = config(true);
        cfg.retry.inclusion_poll_interval = Duration::from_millis(100);
        let chain = Arc::new(MockChain::new());
        chain.script_receipts(vec![ReceiptStep::Pending; 10]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(&cfg, chain.clone(), Arc::new(MockSigner::new()), Arc::new(FixedClock(NOW)), shutdown_rx);
        let stats = engine.stats();
        let handle = tokio::spawn(engine.run());

        let c = chain.clone();
        wait_until(move || c.live_subscriptions() == 1).await;

        let slow = event(12, quote_token(), Address::repeat_byte(0x42));
        chain.set_reserves(slow.pool, 1_000_000, 1_000_000);
        chain.emit(Ok(slow));
        let c = chain.clone();
        wait_until(move || c.submitted().len() == 1).await;

        let next = event(13, Address::repeat_byte(0x0a), Address::repeat_byte(0x0b));
        chain.set_reserves(next.pool, 1_000, 1_000);
        chain.emit(Ok(next));
        let s = stats.clone();
        wait_until(move || s.ineligible.load(Ordering::Relaxed) == 1).await;

        // First swap is still polling for its receipt
        assert_eq!(stats.confirmed.load(Ordering::Relaxed), 0);
        assert_eq!(stats.failed.load(Ordering::Relaxed), 0);

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_detaches_in_flight_swap_after_grace() {
        let mut cfg = config(true);
        cfg.retry.inclusion_poll_interval = Duration::from_millis(200);
        cfg.shutdown_grace = Duration::from_millis(50);
        let chain = Arc::new(MockChain::new());
        chain.script_receipts(vec![ReceiptStep::Pending; 10]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(&cfg, chain.clone(), Arc::new(MockSigner::new()), Arc::new(FixedClock(NOW)), shutdown_rx);
        let stats = engine.stats();
        let handle = tokio::spawn(engine.run());

        let c = chain.clone();
        wait_until(move || c.live_subscriptions() == 1).await;

        let ev = event(14, quote_token(), Address::repeat_byte(0x42));
        chain.set_reserves(ev.pool, 1_000_000, 1_000_000);
        chain.emit(Ok(ev));
        let c = chain.clone();
        wait_until(move || c.submitted().len() == 1).await;

        let started = tokio::time::Instant::now();
        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_millis(500), "{:?}", started.elapsed());

        // Swap was broadcast and left running, not abandoned
        assert_eq!(chain.submitted().len(), 1);
        assert_eq!(stats.confirmed.load(Ordering::Relaxed), 0);
        assert_eq!(stats.failed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_engine_gives_up_after_restart_budget() {
        let mut cfg = config(true);
        cfg.feed_max_restarts = 2;
        let chain = Arc::new(MockChain::new());
        for _ in 0..5 {
            chain.push_subscribe_error(ChainError::Transport("refused".into()));
        }
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(&cfg, chain.clone(), Arc::new(MockSigner::new()), Arc::new(FixedClock(NOW)), shutdown_rx);

        let result = tokio::time::timeout(Duration::from_secs(3), engine.run()).await.unwrap();
        match result {
            Err(EngineError::RestartBudgetExhausted { restarts, last }) => {
                assert_eq!(restarts, 3);
                assert!(matches!(last, FeedError::Open(_)));
            }
            other => panic!("expected restart budget error, got {:?}", other),
        }
        assert_eq!(chain.subscribe_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_engine_reopens_feed_after_fatal_error() {
        let mut cfg = config(false);
        cfg.feed.reconnect_attempts = 0;
        let chain = Arc::new(MockChain::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(&cfg, chain.clone(), Arc::new(MockSigner::new()), Arc::new(FixedClock(NOW)), shutdown_rx);
        let stats = engine.stats();
        let handle = tokio::spawn(engine.run());

        let c = chain.clone();
        wait_until(move || c.live_subscriptions() == 1).await;
        chain.drop_subscriptions();

        let c = chain.clone();
        wait_until(move || c.subscribe_calls.load(Ordering::SeqCst) == 2 && c.live_subscriptions() == 1).await;
        assert_eq!(stats.feed_restarts.load(Ordering::Relaxed), 1);

        let ev = event(11, quote_token(), Address::repeat_byte(0x42));
        chain.set_reserves(ev.pool, 1_000, 1_000);
        chain.emit(Ok(ev));
        let s = stats.clone();
        wait_until(move || s.dry_runs.load(Ordering::Relaxed) == 1).await;

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
