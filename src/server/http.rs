//! HTTP query API over `QueryService`

use super::error::{ApiError, INVALID_INTERVAL_MESSAGE};
use crate::pipeline::types::LogRecord;
use crate::query::{
    EventCount, QueryError, QueryRequest, QueryResult, QueryService, UserCount, VideoCount,
    DEFAULT_INTERVAL, DEFAULT_PAGE_SIZE, DEFAULT_TOP_K,
};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    pub query: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalParams {
    pub interval: Option<String>,
}

pub fn api_router(service: QueryService) -> Router {
    Router::new()
        .route("/api/v1/logs", get(handle_logs))
        .route("/api/v1/logs/aggregate/top-videos", get(handle_top_videos))
        .route("/api/v1/logs/aggregate/top-users", get(handle_top_users))
        .route("/api/v1/logs/aggregate/event-distribution", get(handle_event_distribution))
        .route("/api/v1/logs/aggregate/time-interval", get(handle_time_interval))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Serve the query API on `listener` until `cancel` fires
pub async fn serve_api(
    listener: TcpListener,
    service: QueryService,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("🌐 Query API listening on http://{}/api/v1", addr);
    }

    axum::serve(listener, api_router(service))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    log::info!("✅ Query API stopped");
    Ok(())
}

async fn handle_logs(
    State(service): State<QueryService>,
    Query(params): Query<LogsParams>,
) -> Result<Json<QueryResult>, ApiError> {
    let request = QueryRequest {
        query: params.query.unwrap_or_default(),
        page: params.page.unwrap_or(1),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        interval: params.interval.filter(|i| !i.is_empty()),
    };

    service
        .query_records(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Failed to fetch logs from Elasticsearch"))
}

async fn handle_top_videos(
    State(service): State<QueryService>,
    Query(params): Query<TopParams>,
) -> Result<Json<Vec<VideoCount>>, ApiError> {
    service
        .top_videos(params.k.unwrap_or(DEFAULT_TOP_K))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Failed to fetch aggregation data"))
}

async fn handle_top_users(
    State(service): State<QueryService>,
    Query(params): Query<TopParams>,
) -> Result<Json<Vec<UserCount>>, ApiError> {
    service
        .top_users(params.k.unwrap_or(DEFAULT_TOP_K))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Failed to fetch aggregation data"))
}

async fn handle_event_distribution(
    State(service): State<QueryService>,
) -> Result<Json<Vec<EventCount>>, ApiError> {
    service
        .event_distribution()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_query(e, "Failed to fetch aggregation data"))
}

async fn handle_time_interval(
    State(service): State<QueryService>,
    Query(params): Query<IntervalParams>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let interval = params.interval.unwrap_or_else(|| DEFAULT_INTERVAL.to_string());

    match service.records_in_interval(&interval).await {
        Ok(records) => Ok(Json(records)),
        Err(QueryError::Validation(_)) => {
            Err(ApiError::BadRequest(INVALID_INTERVAL_MESSAGE.to_string()))
        }
        Err(e) => Err(ApiError::from_query(e, "Failed to fetch logs for time interval")),
    }
}
