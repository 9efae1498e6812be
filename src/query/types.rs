use crate::pipeline::types::LogRecord;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 1000;
/// Deepest `from + size` the store serves for a paged search
pub const MAX_RESULT_WINDOW: u64 = 10_000;
pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 100;
pub const EVENT_DISTRIBUTION_SIZE: usize = 10;
/// Fixed cap on records returned for a time interval
pub const INTERVAL_RESULT_CAP: usize = 1000;
pub const DEFAULT_INTERVAL: &str = "1h";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    /// 1-based
    pub page: u64,
    pub page_size: u64,
    /// Optional shorthand duration restricting `processed_at`
    pub interval: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            interval: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub records: Vec<LogRecord>,
    pub total_records: u64,
    pub page_number: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl QueryResult {
    pub fn empty(page_number: u64, page_size: u64) -> Self {
        Self {
            records: Vec::new(),
            total_records: 0,
            page_number,
            page_size,
            total_pages: 0,
        }
    }
}

/// `ceil(total_records / page_size)`, zero when either is zero
pub fn total_pages(total_records: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_records.div_ceil(page_size)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCount {
    pub video_title: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    pub user_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    pub event: String,
    pub count: u64,
}
