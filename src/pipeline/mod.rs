//! # Stream processing pipeline
//!
//! Everything on the ingest hot path lives here:
//! - `windows`: 30s sliding window and its aggregate snapshot
//! - `broadcast`: non-blocking fan-out to live observers
//! - `indexer`: batched bulk writes to the search store
//! - `dead_letter`: optional JSONL sink for batches the store refused
//! - `ingestion`: the select loop that drives all of the above per message
//!
//! The window and the indexer are owned by the ingest task alone. Only the
//! broadcaster is shared, because observers connect from websocket tasks.

pub mod broadcast;
pub mod config;
pub mod dead_letter;
pub mod indexer;
pub mod ingestion;
pub mod types;
pub mod windows;

pub use broadcast::{Broadcaster, PublishReport};
pub use config::PipelineConfig;
pub use dead_letter::{DeadLetterError, DeadLetterWriter};
pub use indexer::{BatchIndexer, FlushFailurePolicy, FlushOutcome, IndexerStats};
pub use ingestion::{ConsumerState, IngestPipeline, IngestStats, ProcessOutcome};
pub use types::{AggregateSnapshot, LogRecord};
pub use windows::{RollingWindow, SlidingWindow, WINDOW_DURATION_MS};
