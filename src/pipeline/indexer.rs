//! Batch indexer - accumulates decoded records and bulk-writes them
//!
//! The pending batch is cleared on every flush attempt, whether or not the
//! bulk write succeeds. What happens to a refused batch is decided by
//! `FlushFailurePolicy`; nothing is retried.

use super::dead_letter::DeadLetterWriter;
use super::types::LogRecord;
use crate::store::{BulkOutcome, SearchStore};
use std::sync::Arc;

/// Default number of records per bulk write
pub const BATCH_SIZE: usize = 10;

pub enum FlushFailurePolicy {
    /// Drop the refused batch and continue from empty
    Discard,
    /// Append the refused batch to a JSONL file, then continue from empty
    DeadLetter(DeadLetterWriter),
}

impl FlushFailurePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            FlushFailurePolicy::Discard => "discard",
            FlushFailurePolicy::DeadLetter(_) => "dead-letter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Indexed(BulkOutcome),
    Discarded { records: usize },
    DeadLettered { records: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    pub flushes: u64,
    pub failed_flushes: u64,
    pub records_indexed: u64,
    pub records_lost: u64,
}

pub struct BatchIndexer {
    store: Arc<dyn SearchStore>,
    batch: Vec<LogRecord>,
    batch_size: usize,
    policy: FlushFailurePolicy,
    stats: IndexerStats,
}

impl BatchIndexer {
    pub fn new(store: Arc<dyn SearchStore>, batch_size: usize, policy: FlushFailurePolicy) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            policy,
            stats: IndexerStats::default(),
        }
    }

    /// Add a record; flushes once the batch reaches `batch_size`
    pub async fn enqueue(&mut self, record: LogRecord) -> Option<FlushOutcome> {
        self.batch.push(record);

        if self.batch.len() >= self.batch_size {
            Some(self.flush().await)
        } else {
            None
        }
    }

    /// Submit the pending batch as one bulk write
    pub async fn flush(&mut self) -> FlushOutcome {
        let batch = std::mem::take(&mut self.batch);
        self.batch.reserve(self.batch_size);
        self.stats.flushes += 1;

        match self.store.bulk_index(&batch).await {
            Ok(outcome) => {
                self.stats.records_indexed += outcome.indexed as u64;
                self.stats.records_lost += outcome.failed as u64;
                log::debug!(
                    "✅ Indexed {} logs to {}",
                    outcome.indexed,
                    self.store.backend_type()
                );
                FlushOutcome::Indexed(outcome)
            }
            Err(e) => {
                self.stats.failed_flushes += 1;
                log::error!("❌ Bulk indexing error ({} logs): {}", batch.len(), e);
                self.handle_failed_batch(&batch)
            }
        }
    }

    fn handle_failed_batch(&mut self, batch: &[LogRecord]) -> FlushOutcome {
        let records = batch.len();

        if let FlushFailurePolicy::DeadLetter(writer) = &mut self.policy {
            match writer.write_batch(batch) {
                Ok(()) => {
                    log::warn!("📮 Wrote {} logs to dead-letter file", records);
                    return FlushOutcome::DeadLettered { records };
                }
                Err(e) => {
                    log::error!("❌ Dead-letter write failed: {}", e);
                }
            }
        }

        self.stats.records_lost += records as u64;
        log::warn!("🗑️  Discarded {} logs after failed flush", records);
        FlushOutcome::Discarded { records }
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn stats(&self) -> IndexerStats {
        self.stats
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}
