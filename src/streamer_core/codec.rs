//! Record codec: raw broker payload → `LogRecord`

use crate::clock::Clock;
use crate::pipeline::types::LogRecord;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug)]
pub enum DecodeError {
    Utf8(std::str::Utf8Error),
    Json(serde_json::Error),
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(err: std::str::Utf8Error) -> Self {
        DecodeError::Utf8(err)
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Utf8(e) => write!(f, "payload is not valid UTF-8: {}", e),
            DecodeError::Json(e) => write!(f, "payload is not a log record: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Producer-side shape of a log message
#[derive(Deserialize)]
struct WireEvent {
    event: String,
    user_id: String,
    video_title: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Decode a raw payload and stamp `processed_at` from `clock`
///
/// Any `processed_at` sent by the producer is discarded.
pub fn decode(payload: &[u8], clock: &dyn Clock) -> Result<LogRecord, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let WireEvent {
        event,
        user_id,
        video_title,
        mut extra,
    } = serde_json::from_str(text)?;

    extra.remove("processed_at");

    Ok(LogRecord {
        event,
        user_id,
        video_title,
        processed_at: clock.now_millis(),
        extra,
    })
}
