//! Pipeline configuration from environment variables

use super::dead_letter::{DeadLetterError, DeadLetterWriter};
use super::indexer::{FlushFailurePolicy, BATCH_SIZE};
use super::windows::WINDOW_DURATION_MS;
use std::env;

/// Tick period of the `standard` aggregation profile
pub const STANDARD_TICK_MS: u64 = 10_000;

/// Tick period of the `realtime` aggregation profile
pub const REALTIME_TICK_MS: u64 = 500;

/// Configuration for the processing side of the runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sliding window length in milliseconds
    pub window_duration_ms: i64,

    /// Aggregate snapshot period in milliseconds
    pub aggregate_interval_ms: u64,

    /// Records per bulk write
    pub batch_size: usize,

    pub elasticsearch_host: String,
    pub elasticsearch_index: String,

    /// Websocket listener port for live observers
    pub ws_port: u16,

    /// HTTP query API port
    pub api_port: u16,

    /// Per-observer frame queue depth
    pub observer_buffer: usize,

    /// When set, refused batches are written here instead of discarded
    pub dead_letter_path: Option<String>,
    pub dead_letter_max_size_mb: u64,
    pub dead_letter_max_rotations: u32,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `WINDOW_DURATION_MS` (default: 30000)
    /// - `AGGREGATE_PROFILE` (`standard` = 10000ms, `realtime` = 500ms)
    /// - `AGGREGATE_INTERVAL_MS` (overrides the profile)
    /// - `INDEX_BATCH_SIZE` (default: 10)
    /// - `ELASTICSEARCH_HOST` (default: http://elasticsearch:9200)
    /// - `ELASTICSEARCH_INDEX` (default: logs)
    /// - `WS_PORT` (default: 9000), `API_PORT` (default: 9001)
    /// - `OBSERVER_BUFFER` (default: 256)
    /// - `DEAD_LETTER_PATH` (default: unset, failed batches are discarded)
    /// - `DEAD_LETTER_MAX_SIZE_MB` (default: 100), `DEAD_LETTER_MAX_ROTATIONS` (default: 10)
    pub fn from_env() -> Self {
        let profile_tick = match env::var("AGGREGATE_PROFILE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "realtime" => REALTIME_TICK_MS,
            "" | "standard" => STANDARD_TICK_MS,
            other => {
                log::warn!("Invalid AGGREGATE_PROFILE '{}', defaulting to standard", other);
                STANDARD_TICK_MS
            }
        };

        Self {
            window_duration_ms: parse_var("WINDOW_DURATION_MS").unwrap_or(WINDOW_DURATION_MS),

            aggregate_interval_ms: parse_var("AGGREGATE_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(profile_tick),

            batch_size: parse_var("INDEX_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(BATCH_SIZE),

            elasticsearch_host: env::var("ELASTICSEARCH_HOST")
                .unwrap_or_else(|_| "http://elasticsearch:9200".to_string()),

            elasticsearch_index: env::var("ELASTICSEARCH_INDEX")
                .unwrap_or_else(|_| "logs".to_string()),

            ws_port: parse_var("WS_PORT").unwrap_or(9000),
            api_port: parse_var("API_PORT").unwrap_or(9001),
            observer_buffer: parse_var("OBSERVER_BUFFER").unwrap_or(256),

            dead_letter_path: env::var("DEAD_LETTER_PATH").ok().filter(|p| !p.is_empty()),
            dead_letter_max_size_mb: parse_var("DEAD_LETTER_MAX_SIZE_MB").unwrap_or(100),
            dead_letter_max_rotations: parse_var("DEAD_LETTER_MAX_ROTATIONS").unwrap_or(10),
        }
    }

    /// Build the flush failure policy this config asks for
    pub fn flush_failure_policy(&self) -> Result<FlushFailurePolicy, DeadLetterError> {
        match &self.dead_letter_path {
            Some(path) => Ok(FlushFailurePolicy::DeadLetter(DeadLetterWriter::new(
                path,
                self.dead_letter_max_size_mb,
                self.dead_letter_max_rotations,
            )?)),
            None => Ok(FlushFailurePolicy::Discard),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
