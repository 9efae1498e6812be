//! Pipeline ingestion - the single cooperative loop of the runtime
//!
//! One task owns the window and the indexer. Broker messages and aggregation
//! ticks are multiplexed with `tokio::select!`, so a tick never observes a
//! half-applied message. Per message, in order:
//! 1. Decode (malformed payloads are logged and dropped)
//! 2. Append to the sliding window
//! 3. Publish the raw record to live observers
//! 4. Enqueue for bulk indexing
//!
//! Connection loss sends the loop into a fixed-delay reconnect wait that keeps
//! the aggregation tick running. Shutdown never flushes a partial batch.

use super::broadcast::{Broadcaster, PublishReport};
use super::indexer::{BatchIndexer, FlushOutcome};
use super::types::LogRecord;
use super::windows::{RollingWindow, SlidingWindow};
use crate::clock::Clock;
use crate::streamer_core::codec;
use crate::streamer_core::config::CommitPolicy;
use crate::streamer_core::error_handler::FixedDelay;
use crate::streamer_core::source::{ConsumerError, MessageSource, RawMessage, SourceConnector};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Subscribed,
    Running,
    Reconnecting,
    ShutdownRequested,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub decoded: u64,
    pub dropped: u64,
    pub commit_failures: u64,
    pub snapshots_published: u64,
    pub reconnects: u64,
    /// Bulk requests sent, copied from the indexer
    pub flushes: u64,
    pub failed_flushes: u64,
    pub records_indexed: u64,
    pub records_lost: u64,
}

/// Result of running one payload through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Payload failed to decode; nothing downstream was touched
    Dropped,
    Processed { flush: Option<FlushOutcome> },
}

enum SessionEvent {
    Shutdown,
    Tick,
    Message(Result<RawMessage, ConsumerError>),
}

pub struct IngestPipeline {
    window: SlidingWindow,
    broadcaster: Arc<Broadcaster>,
    indexer: BatchIndexer,
    clock: Arc<dyn Clock>,
    commit_policy: CommitPolicy,
    aggregate_interval: Duration,
    state: ConsumerState,
    stats: IngestStats,
    rate_count: u64,
    last_log_time: Instant,
}

impl IngestPipeline {
    pub fn new(
        window: SlidingWindow,
        broadcaster: Arc<Broadcaster>,
        indexer: BatchIndexer,
        clock: Arc<dyn Clock>,
        commit_policy: CommitPolicy,
        aggregate_interval: Duration,
    ) -> Self {
        Self {
            window,
            broadcaster,
            indexer,
            clock,
            commit_policy,
            aggregate_interval,
            state: ConsumerState::Disconnected,
            stats: IngestStats::default(),
            rate_count: 0,
            last_log_time: Instant::now(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn stats(&self) -> IngestStats {
        let indexer = self.indexer.stats();
        IngestStats {
            flushes: indexer.flushes,
            failed_flushes: indexer.failed_flushes,
            records_indexed: indexer.records_indexed,
            records_lost: indexer.records_lost,
            ..self.stats
        }
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn indexer(&self) -> &BatchIndexer {
        &self.indexer
    }

    /// Decode one payload and drive window, broadcaster and indexer with it
    pub async fn process_payload(&mut self, payload: &[u8]) -> ProcessOutcome {
        let record: LogRecord = match codec::decode(payload, self.clock.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                self.stats.dropped += 1;
                log::warn!("⚠️  Dropping malformed message: {}", e);
                return ProcessOutcome::Dropped;
            }
        };
        self.stats.decoded += 1;

        self.window.append(record.clone());
        self.broadcaster.publish_raw(&record);
        let flush = self.indexer.enqueue(record).await;

        ProcessOutcome::Processed { flush }
    }

    /// Aggregation tick: snapshot the window and push it to observers
    pub fn publish_snapshot(&mut self) -> Option<PublishReport> {
        let snapshot = self.window.snapshot()?;
        let report = self.broadcaster.publish_aggregate(&snapshot);
        self.stats.snapshots_published += 1;

        log::debug!(
            "📊 Snapshot: {} logs, {} users | delivered {} skipped {}",
            snapshot.total_logs,
            snapshot.unique_users,
            report.delivered,
            report.skipped
        );
        Some(report)
    }

    /// Consume until `cancel` fires, reconnecting forever on broker errors
    pub async fn run<C: SourceConnector>(
        &mut self,
        connector: &C,
        reconnect_delay: Duration,
        cancel: CancellationToken,
    ) {
        log::info!("🚀 Starting ingest loop");
        log::info!("   ├─ Broker: {}", connector.describe());
        log::info!("   ├─ Window: {}ms", self.window.duration_ms());
        log::info!("   ├─ Aggregate interval: {}ms", self.aggregate_interval.as_millis());
        log::info!("   ├─ Offset commit: {:?}", self.commit_policy);
        log::info!("   └─ Flush failure policy: {}", self.indexer.policy_name());

        let mut ticker = interval(self.aggregate_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retry = FixedDelay::new(reconnect_delay);

        loop {
            self.set_state(ConsumerState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = connector.connect() => result,
            };

            let error = match connected {
                Ok(mut source) => {
                    retry.reset();
                    let result = self.run_session(&mut source, &mut ticker, &cancel).await;
                    source.close();
                    match result {
                        Ok(()) => break,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            log::error!("❌ Consumer error: {}", error);
            self.set_state(ConsumerState::Reconnecting);
            self.stats.reconnects += 1;

            let delay = retry.next_delay();
            if !self.wait_before_reconnect(delay, &mut ticker, &cancel).await {
                break;
            }
        }

        self.set_state(ConsumerState::ShutdownRequested);
        let stats = self.stats();
        log::info!(
            "✅ Ingest loop stopped: {} received, {} decoded, {} dropped, {} pending unflushed",
            stats.received,
            stats.decoded,
            stats.dropped,
            self.indexer.pending()
        );
        log::info!(
            "   └─ Flushes: {} ok, {} failed | {} indexed, {} lost",
            stats.flushes - stats.failed_flushes,
            stats.failed_flushes,
            stats.records_indexed,
            stats.records_lost
        );
    }

    /// Returns `Ok(())` on shutdown, `Err` when the source must be replaced
    async fn run_session<S: MessageSource>(
        &mut self,
        source: &mut S,
        ticker: &mut Interval,
        cancel: &CancellationToken,
    ) -> Result<(), ConsumerError> {
        source.subscribe().await?;
        self.set_state(ConsumerState::Subscribed);
        self.set_state(ConsumerState::Running);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => SessionEvent::Shutdown,
                _ = ticker.tick() => SessionEvent::Tick,
                message = source.recv() => SessionEvent::Message(message),
            };

            match event {
                SessionEvent::Shutdown => return Ok(()),
                SessionEvent::Tick => {
                    self.publish_snapshot();
                }
                SessionEvent::Message(message) => {
                    self.handle_message(source, message?).await;
                }
            }
        }
    }

    async fn handle_message<S: MessageSource>(&mut self, source: &mut S, message: RawMessage) {
        self.stats.received += 1;

        if self.commit_policy == CommitPolicy::BeforeProcessing {
            self.commit(source, &message).await;
        }

        self.process_payload(&message.payload).await;

        if self.commit_policy == CommitPolicy::AfterProcessing {
            self.commit(source, &message).await;
        }

        self.rate_count += 1;
        if self.last_log_time.elapsed().as_secs() >= 10 {
            let per_sec = self.rate_count as f64 / self.last_log_time.elapsed().as_secs_f64();
            log::info!(
                "📊 Ingestion rate: {:.1} logs/sec (window: {}, pending batch: {})",
                per_sec,
                self.window.len(),
                self.indexer.pending()
            );
            self.last_log_time = Instant::now();
            self.rate_count = 0;
        }
    }

    async fn commit<S: MessageSource>(&mut self, source: &mut S, message: &RawMessage) {
        if let Err(e) = source.commit(message).await {
            self.stats.commit_failures += 1;
            log::warn!(
                "⚠️  Offset commit failed (partition {}, offset {}): {}",
                message.partition,
                message.offset,
                e
            );
        }
    }

    /// Sleep out the reconnect delay while still serving aggregation ticks
    ///
    /// Returns `false` if shutdown was requested during the wait.
    async fn wait_before_reconnect(
        &mut self,
        delay: Duration,
        ticker: &mut Interval,
        cancel: &CancellationToken,
    ) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                _ = ticker.tick() => {
                    self.publish_snapshot();
                }
            }
        }
    }

    fn set_state(&mut self, state: ConsumerState) {
        if self.state != state {
            log::info!("🔄 Consumer state: {:?} → {:?}", self.state, state);
            self.state = state;
        }
    }
}
