//! Search store seam shared by the batch indexer (write path) and the query
//! service (read path)

pub mod elasticsearch;

use crate::pipeline::types::LogRecord;
use async_trait::async_trait;
use serde_json::Value;

pub use elasticsearch::ElasticsearchStore;

#[derive(Debug)]
pub enum StoreError {
    /// Store unreachable or the request never completed
    Connection(String),
    /// Store answered with a non-success status
    Backend { status: u16, detail: Option<Value> },
    Serialization(serde_json::Error),
    /// Response did not have the expected shape
    UnexpectedResponse(String),
}

impl StoreError {
    /// Backend-provided error body, when the store sent one
    pub fn detail(&self) -> Option<&Value> {
        match self {
            StoreError::Backend { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Connection(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connection(e) => write!(f, "Store connection error: {}", e),
            StoreError::Backend { status, detail } => match detail {
                Some(d) => write!(f, "Store returned {}: {}", status, d),
                None => write!(f, "Store returned {}", status),
            },
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::UnexpectedResponse(msg) => write!(f, "Unexpected store response: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Result of one bulk write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub indexed: usize,
    /// Items the store rejected individually inside an accepted bulk request
    pub failed: usize,
}

#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Write all records as one bulk request
    async fn bulk_index(&self, records: &[LogRecord]) -> Result<BulkOutcome, StoreError>;

    /// Run a search request body against the log collection and return the
    /// raw response
    async fn search(&self, body: Value) -> Result<Value, StoreError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
