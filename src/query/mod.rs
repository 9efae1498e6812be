//! Read path over the search store
//!
//! Stateless: every operation builds one search body, runs it, and parses the
//! response. Nothing here touches the ingest-side window, batch or observers.

pub mod interval;
pub mod types;

use crate::clock::Clock;
use crate::pipeline::types::LogRecord;
use crate::store::{SearchStore, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;

pub use interval::{parse_interval, IntervalError};
pub use types::{
    total_pages, EventCount, QueryRequest, QueryResult, UserCount, VideoCount, DEFAULT_INTERVAL,
    DEFAULT_PAGE_SIZE, DEFAULT_TOP_K, EVENT_DISTRIBUTION_SIZE, INTERVAL_RESULT_CAP, MAX_PAGE_SIZE,
    MAX_RESULT_WINDOW, MAX_TOP_K,
};

#[derive(Debug)]
pub enum QueryError {
    /// Caller input rejected before reaching the store
    Validation(String),
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        QueryError::Store(err)
    }
}

impl From<IntervalError> for QueryError {
    fn from(err: IntervalError) -> Self {
        QueryError::Validation(err.to_string())
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Validation(msg) => write!(f, "Invalid query: {}", msg),
            QueryError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QueryError {}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn SearchStore>,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    pub fn new(store: Arc<dyn SearchStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Paginated match on `user_id`, exact `video_title`, or `video_title`
    /// substring
    pub async fn query_records(&self, request: QueryRequest) -> Result<QueryResult, QueryError> {
        if request.page == 0 {
            return Err(QueryError::Validation("page must be at least 1".to_string()));
        }
        if request.page_size == 0 || request.page_size > MAX_PAGE_SIZE {
            return Err(QueryError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let range = match request.interval.as_deref() {
            Some(token) => Some(self.interval_range(token)?),
            None => None,
        };

        let query = request.query.trim();
        if query.is_empty() {
            return Ok(QueryResult::empty(request.page, request.page_size));
        }

        let mut filter = Vec::new();
        if let Some((from, to)) = range {
            filter.push(processed_at_range(from, to));
        }

        let matcher = json!({
            "bool": {
                "should": [
                    { "term": { "user_id": { "value": query, "boost": 2.0 } } },
                    { "term": { "video_title.keyword": { "value": query, "boost": 2.0 } } },
                    { "wildcard": { "video_title.keyword": {
                        "value": format!("*{}*", escape_wildcard(query))
                    } } }
                ],
                "minimum_should_match": 1,
                "filter": filter
            }
        });

        // Pages past the store's result window are answered with a count only
        let offset = (request.page - 1)
            .checked_mul(request.page_size)
            .filter(|from| from.saturating_add(request.page_size) <= MAX_RESULT_WINDOW);

        let body = match offset {
            Some(from) => json!({
                "from": from,
                "size": request.page_size,
                "track_total_hits": true,
                "query": matcher
            }),
            None => json!({
                "size": 0,
                "track_total_hits": true,
                "query": matcher
            }),
        };

        let response = self.store.search(body).await?;
        let total_records = parse_total(&response)?;
        let records = match offset {
            Some(_) => parse_hits(&response)?,
            None => Vec::new(),
        };

        log::debug!(
            "🔎 Query '{}' page {}: {} of {} records",
            query,
            request.page,
            records.len(),
            total_records
        );

        Ok(QueryResult {
            records,
            total_records,
            page_number: request.page,
            page_size: request.page_size,
            total_pages: total_pages(total_records, request.page_size),
        })
    }

    pub async fn top_videos(&self, k: usize) -> Result<Vec<VideoCount>, QueryError> {
        let buckets = self.terms_buckets("video_title.keyword", checked_k(k)?).await?;
        Ok(buckets
            .into_iter()
            .map(|(video_title, count)| VideoCount { video_title, count })
            .collect())
    }

    pub async fn top_users(&self, k: usize) -> Result<Vec<UserCount>, QueryError> {
        let buckets = self.terms_buckets("user_id", checked_k(k)?).await?;
        Ok(buckets
            .into_iter()
            .map(|(user_id, count)| UserCount { user_id, count })
            .collect())
    }

    pub async fn event_distribution(&self) -> Result<Vec<EventCount>, QueryError> {
        let buckets = self.terms_buckets("event", EVENT_DISTRIBUTION_SIZE).await?;
        Ok(buckets
            .into_iter()
            .map(|(event, count)| EventCount { event, count })
            .collect())
    }

    /// Records with `processed_at` in `[now - interval, now]`, newest first
    pub async fn records_in_interval(&self, interval: &str) -> Result<Vec<LogRecord>, QueryError> {
        let (from, to) = self.interval_range(interval)?;

        let body = json!({
            "size": INTERVAL_RESULT_CAP,
            "query": processed_at_range(from, to),
            "sort": [{ "processed_at": { "order": "desc" } }]
        });

        let response = self.store.search(body).await?;
        Ok(parse_hits(&response)?)
    }

    /// Closed `[now - interval, now]` range in epoch milliseconds
    pub fn interval_range(&self, token: &str) -> Result<(i64, i64), QueryError> {
        let duration_ms = parse_interval(token)?;
        let now = self.clock.now_millis();
        let from = now.saturating_sub(i64::try_from(duration_ms).unwrap_or(i64::MAX));
        Ok((from, now))
    }

    async fn terms_buckets(&self, field: &str, size: usize) -> Result<Vec<(String, u64)>, QueryError> {
        let body = json!({
            "size": 0,
            "aggs": {
                "groups": { "terms": { "field": field, "size": size } }
            }
        });

        let response = self.store.search(body).await?;
        Ok(parse_buckets(&response, "groups")?)
    }
}

fn checked_k(k: usize) -> Result<usize, QueryError> {
    if k == 0 || k > MAX_TOP_K {
        return Err(QueryError::Validation(format!(
            "k must be between 1 and {}",
            MAX_TOP_K
        )));
    }
    Ok(k)
}

fn processed_at_range(from: i64, to: i64) -> Value {
    json!({
        "range": {
            "processed_at": { "gte": from, "lte": to, "format": "epoch_millis" }
        }
    })
}

/// Escape characters that carry meaning inside a wildcard pattern
fn escape_wildcard(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `hits.total` is `{ "value": n }` on current versions and a bare number on
/// old ones
fn parse_total(response: &Value) -> Result<u64, StoreError> {
    let total = &response["hits"]["total"];
    total
        .get("value")
        .and_then(Value::as_u64)
        .or_else(|| total.as_u64())
        .ok_or_else(|| StoreError::UnexpectedResponse("missing hits.total".to_string()))
}

fn parse_hits(response: &Value) -> Result<Vec<LogRecord>, StoreError> {
    let hits = response["hits"]["hits"]
        .as_array()
        .ok_or_else(|| StoreError::UnexpectedResponse("missing hits.hits".to_string()))?;

    hits.iter()
        .map(|hit| -> Result<LogRecord, StoreError> {
            let source = hit
                .get("_source")
                .cloned()
                .ok_or_else(|| StoreError::UnexpectedResponse("hit without _source".to_string()))?;
            Ok(serde_json::from_value(source)?)
        })
        .collect()
}

fn parse_buckets(response: &Value, name: &str) -> Result<Vec<(String, u64)>, StoreError> {
    let buckets = response["aggregations"][name]["buckets"]
        .as_array()
        .ok_or_else(|| {
            StoreError::UnexpectedResponse(format!("missing aggregations.{}.buckets", name))
        })?;

    buckets
        .iter()
        .map(|bucket| -> Result<(String, u64), StoreError> {
            let key = match &bucket["key"] {
                Value::String(s) => s.clone(),
                Value::Null => {
                    return Err(StoreError::UnexpectedResponse("bucket without key".to_string()))
                }
                other => other.to_string(),
            };
            let count = bucket["doc_count"].as_u64().ok_or_else(|| {
                StoreError::UnexpectedResponse("bucket without doc_count".to_string())
            })?;
            Ok((key, count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::BulkOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Store returning one canned response and recording request bodies
    struct CannedStore {
        response: Value,
        bodies: Mutex<Vec<Value>>,
    }

    impl CannedStore {
        fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn bodies(&self) -> Vec<Value> {
            self.bodies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchStore for CannedStore {
        async fn bulk_index(&self, _records: &[LogRecord]) -> Result<BulkOutcome, StoreError> {
            unreachable!("query path never writes")
        }

        async fn search(&self, body: Value) -> Result<Value, StoreError> {
            self.bodies.lock().unwrap().push(body);
            Ok(self.response.clone())
        }

        fn backend_type(&self) -> &'static str {
            "Canned"
        }
    }

    fn service(store: Arc<CannedStore>) -> QueryService {
        QueryService::new(store, Arc::new(MockClock::at_millis(10_000_000)))
    }

    #[test]
    fn test_escape_wildcard() {
        assert_eq!(escape_wildcard("Big Buck"), "Big Buck");
        assert_eq!(escape_wildcard("a*b?c"), "a\\*b\\?c");
    }

    #[test]
    fn test_parse_total_both_shapes() {
        assert_eq!(parse_total(&json!({"hits": {"total": {"value": 7}}})).unwrap(), 7);
        assert_eq!(parse_total(&json!({"hits": {"total": 4}})).unwrap(), 4);
        assert!(matches!(
            parse_total(&json!({"hits": {}})),
            Err(StoreError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_interval_range_is_closed_window_ending_now() {
        let svc = service(CannedStore::new(json!({})));
        assert_eq!(svc.interval_range("10m").unwrap(), (10_000_000 - 600_000, 10_000_000));
        assert!(matches!(svc.interval_range("5x"), Err(QueryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_query_skips_store() {
        let store = CannedStore::new(json!({}));
        let svc = service(store.clone());

        let result = svc.query_records(QueryRequest::new("   ")).await.unwrap();

        assert_eq!(result, QueryResult::empty(1, DEFAULT_PAGE_SIZE));
        assert!(store.bodies().is_empty());
    }

    #[tokio::test]
    async fn test_query_body_matches_three_ways() {
        let store = CannedStore::new(json!({"hits": {"total": {"value": 0}, "hits": []}}));
        let svc = service(store.clone());

        let mut request = QueryRequest::new("Sintel");
        request.page = 3;
        request.page_size = 10;
        svc.query_records(request).await.unwrap();

        let body = &store.bodies()[0];
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
        let should = body["query"]["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 3);
        assert_eq!(should[0]["term"]["user_id"]["value"], "Sintel");
        assert_eq!(should[1]["term"]["video_title.keyword"]["value"], "Sintel");
        assert_eq!(should[2]["wildcard"]["video_title.keyword"]["value"], "*Sintel*");
        assert_eq!(body["query"]["bool"]["minimum_should_match"], 1);
    }

    #[tokio::test]
    async fn test_bad_paging_is_validation_error() {
        let svc = service(CannedStore::new(json!({})));

        let mut request = QueryRequest::new("x");
        request.page = 0;
        assert!(matches!(svc.query_records(request).await, Err(QueryError::Validation(_))));

        let mut request = QueryRequest::new("x");
        request.page_size = MAX_PAGE_SIZE + 1;
        assert!(matches!(svc.query_records(request).await, Err(QueryError::Validation(_))));

        assert!(matches!(svc.top_users(0).await, Err(QueryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_page_past_result_window_sends_count_only() {
        let store = CannedStore::new(json!({"hits": {"total": {"value": 25}, "hits": []}}));
        let svc = service(store.clone());

        let mut request = QueryRequest::new("Sintel");
        request.page = 1001;
        request.page_size = 10;
        let result = svc.query_records(request).await.unwrap();

        let body = &store.bodies()[0];
        assert_eq!(body["size"], 0);
        assert!(body.get("from").is_none());
        assert_eq!(body["query"]["bool"]["minimum_should_match"], 1);
        assert!(result.records.is_empty());
        assert_eq!(result.total_records, 25);
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.page_number, 1001);
    }

    #[tokio::test]
    async fn test_last_page_inside_result_window_is_fetched() {
        let store = CannedStore::new(json!({"hits": {"total": {"value": 0}, "hits": []}}));
        let svc = service(store.clone());

        let mut request = QueryRequest::new("Sintel");
        request.page = 1000;
        request.page_size = 10;
        svc.query_records(request).await.unwrap();

        assert_eq!(store.bodies()[0]["from"], 9_990);
        assert_eq!(store.bodies()[0]["size"], 10);
    }

    #[tokio::test]
    async fn test_overflowing_offset_is_empty_page() {
        let store = CannedStore::new(json!({"hits": {"total": {"value": 4}, "hits": []}}));
        let svc = service(store.clone());

        let mut request = QueryRequest::new("Sintel");
        request.page = u64::MAX;
        request.page_size = MAX_PAGE_SIZE;
        let result = svc.query_records(request).await.unwrap();

        assert_eq!(store.bodies()[0]["size"], 0);
        assert!(result.records.is_empty());
        assert_eq!(result.total_records, 4);
        assert_eq!(result.total_pages, 1);
    }

    #[tokio::test]
    async fn test_top_k_is_bounded_separately_from_page_size() {
        let store = CannedStore::new(json!({
            "hits": {"total": {"value": 0}, "hits": []},
            "aggregations": {"groups": {"buckets": []}}
        }));
        let svc = service(store.clone());

        assert!(svc.top_users(MAX_TOP_K).await.unwrap().is_empty());
        assert_eq!(store.bodies()[0]["aggs"]["groups"]["terms"]["size"], MAX_TOP_K);

        assert!(matches!(
            svc.top_users(MAX_TOP_K + 1).await,
            Err(QueryError::Validation(_))
        ));
        assert!(matches!(
            svc.top_videos(MAX_PAGE_SIZE as usize).await,
            Err(QueryError::Validation(_))
        ));
        assert_eq!(store.bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_aggregation_is_unexpected_response() {
        let svc = service(CannedStore::new(json!({"hits": {}})));

        let result = svc.event_distribution().await;
        assert!(matches!(
            result,
            Err(QueryError::Store(StoreError::UnexpectedResponse(_)))
        ));
    }
}
