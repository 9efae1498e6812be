//! Core data types flowing through the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A decoded playback log record
///
/// `processed_at` is stamped by the codec at decode time (epoch millis) and is
/// never taken from the producer. Fields beyond the three core ones (e.g.
/// `video_id`, `time_seconds`) are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub event: String,
    pub user_id: String,
    pub video_title: String,
    pub processed_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Point-in-time aggregate over the sliding window
///
/// Field names match the frames the dashboard already consumes
/// (`eventCounts`, `videoCounts`, `unique_users`, `total_logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "eventCounts")]
    pub event_counts: BTreeMap<String, u64>,
    #[serde(rename = "videoCounts")]
    pub video_counts: BTreeMap<String, u64>,
    pub unique_users: usize,
    pub total_logs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes_dashboard_field_names() {
        let snapshot = AggregateSnapshot {
            timestamp: Utc::now(),
            event_counts: BTreeMap::from([("play".to_string(), 2)]),
            video_counts: BTreeMap::from([("A".to_string(), 2)]),
            unique_users: 1,
            total_logs: 2,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["eventCounts"]["play"], 2);
        assert_eq!(json["videoCounts"]["A"], 2);
        assert_eq!(json["unique_users"], 1);
        assert_eq!(json["total_logs"], 2);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_record_keeps_extra_fields_flat() {
        let mut extra = Map::new();
        extra.insert("video_id".to_string(), Value::from("tm84618"));

        let record = LogRecord {
            event: "play".to_string(),
            user_id: "User-1".to_string(),
            video_title: "Taxi Driver".to_string(),
            processed_at: 1_700_000_000_000,
            extra,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["video_id"], "tm84618");
        assert!(json.get("extra").is_none());

        let back: LogRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
