//! StreamLens - real-time playback log pipeline
//!
//! ```text
//! Kafka topic → streamer_core (decode) → pipeline::ingestion
//!     ├─ SlidingWindow (30s) ──tick──→ AggregateSnapshot ─┐
//!     ├─ Broadcaster (raw_log) ───────────────────────────┴→ websocket observers
//!     └─ BatchIndexer → SearchStore (Elasticsearch "logs")
//!                            ↑
//!              query::QueryService ← server::http (/api/v1/logs...)
//! ```

pub mod clock;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod store;
pub mod streamer_core;
pub mod traffic;
