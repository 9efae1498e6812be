//! Elasticsearch-backed search store
//!
//! Writes go through the Bulk API as NDJSON; reads are plain `_search`
//! requests whose bodies are built by the query service.

use super::{BulkOutcome, SearchStore, StoreError};
use crate::pipeline::types::LogRecord;
use crate::streamer_core::FixedDelay;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ElasticsearchStore {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticsearchStore {
    pub fn new(base_url: &str, index: &str) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_client(base_url, index, client))
    }

    /// Create with an injected reqwest client
    pub fn with_client(base_url: &str, index: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Create the index with an explicit mapping unless it already exists
    ///
    /// `user_id` and `event` are keywords so terms aggregations work on them
    /// directly; `video_title` keeps a `keyword` subfield for exact and
    /// wildcard matching.
    pub async fn ensure_index(&self) -> Result<bool, StoreError> {
        let url = format!("{}/{}", self.base_url, self.index);

        let response = self
            .client
            .put(&url)
            .json(&index_mapping())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            log::info!("📚 Created index '{}'", self.index);
            return Ok(true);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let already_exists = status == StatusCode::BAD_REQUEST
            && body["error"]["type"] == "resource_already_exists_exception";

        if already_exists {
            log::info!("📚 Index '{}' already exists", self.index);
            Ok(false)
        } else {
            Err(StoreError::Backend {
                status: status.as_u16(),
                detail: body.get("error").cloned(),
            })
        }
    }

    /// Keep calling `ensure_index` until the cluster answers
    ///
    /// Unreachable clusters and 5xx answers are retried on a fixed delay;
    /// any other refusal is returned. `Ok(None)` means `cancel` fired first.
    pub async fn ensure_index_until_ready(
        &self,
        retry_delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<bool>, StoreError> {
        let mut retry = FixedDelay::new(retry_delay);

        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                result = self.ensure_index() => result,
            };

            match attempt {
                Ok(created) => return Ok(Some(created)),
                Err(e) if is_transient(&e) => {
                    log::warn!("⚠️  Index '{}' not ready: {}", self.index, e);
                }
                Err(e) => return Err(e),
            }

            let delay = retry.next_delay();
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn bulk_url(&self) -> String {
        // wait_for makes flushed records searchable without forcing a refresh per batch
        format!("{}/_bulk?refresh=wait_for", self.base_url)
    }
}

fn is_transient(error: &StoreError) -> bool {
    match error {
        StoreError::Connection(_) => true,
        StoreError::Backend { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Mapping used when the index is created by this service
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "event": { "type": "keyword" },
                "user_id": { "type": "keyword" },
                "video_title": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
                },
                "processed_at": { "type": "date", "format": "epoch_millis" }
            }
        }
    })
}

/// Build the NDJSON body for a Bulk API request
///
/// ```text
/// {"index":{"_index":"logs"}}
/// {"event":"play","user_id":"User-1",...}
/// ```
pub fn build_bulk_body(index: &str, records: &[LogRecord]) -> Result<String, StoreError> {
    let action = serde_json::to_string(&json!({ "index": { "_index": index } }))?;
    let mut body = String::new();

    for record in records {
        body.push_str(&action);
        body.push('\n');
        body.push_str(&serde_json::to_string(record)?);
        body.push('\n');
    }

    Ok(body)
}

/// Count per-item failures in a bulk response
pub fn count_item_failures(response: &Value) -> usize {
    if response.get("errors") != Some(&Value::Bool(true)) {
        return 0;
    }

    response["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.as_object()
                        .and_then(|op| op.values().next())
                        .map(|result| result.get("error").is_some())
                        .unwrap_or(false)
                })
                .count()
        })
        .unwrap_or(0)
}

#[async_trait]
impl SearchStore for ElasticsearchStore {
    async fn bulk_index(&self, records: &[LogRecord]) -> Result<BulkOutcome, StoreError> {
        if records.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let body = build_bulk_body(&self.index, records)?;
        let url = self.bulk_url();

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail: Option<Value> = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|b| b.get("error").cloned());
            return Err(StoreError::Backend {
                status: status.as_u16(),
                detail,
            });
        }

        let resp_body: Value = response.json().await.map_err(|e| {
            StoreError::UnexpectedResponse(format!("failed to parse bulk response: {}", e))
        })?;

        let failed = count_item_failures(&resp_body);
        if failed > 0 {
            log::warn!(
                "⚠️  Bulk response reported {} of {} item(s) rejected",
                failed,
                records.len()
            );
        }

        Ok(BulkOutcome {
            indexed: records.len() - failed.min(records.len()),
            failed,
        })
    }

    async fn search(&self, body: Value) -> Result<Value, StoreError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        let resp_body: Value = response.json().await.map_err(|e| {
            StoreError::UnexpectedResponse(format!("failed to parse search response: {}", e))
        })?;

        if !status.is_success() {
            return Err(StoreError::Backend {
                status: status.as_u16(),
                detail: resp_body.get("error").cloned(),
            });
        }

        Ok(resp_body)
    }

    fn backend_type(&self) -> &'static str {
        "Elasticsearch"
    }
}
