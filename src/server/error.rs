use crate::query::QueryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub const INVALID_INTERVAL_MESSAGE: &str =
    "Invalid interval format. Use '5m', '1h', '6h', '1d', etc.";

/// Error returned by the query API as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    /// 400 with a client-facing message
    BadRequest(String),
    /// 500 carrying the backend's error detail, or `fallback` when it sent none
    Internal {
        detail: Option<Value>,
        fallback: &'static str,
    },
}

impl ApiError {
    /// Map a query failure, using `fallback` when the store gave no detail
    pub fn from_query(err: QueryError, fallback: &'static str) -> Self {
        match err {
            QueryError::Validation(msg) => ApiError::BadRequest(msg),
            QueryError::Store(store_err) => {
                log::error!("❌ {}: {}", fallback, store_err);
                ApiError::Internal {
                    detail: store_err.detail().cloned(),
                    fallback,
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::BadRequest(msg) => json!({ "error": msg }),
            ApiError::Internal { detail: Some(detail), .. } => json!({ "error": detail }),
            ApiError::Internal { detail: None, fallback } => json!({ "error": fallback }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
