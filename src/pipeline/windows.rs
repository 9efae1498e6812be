//! Sliding time window over recent log records
//!
//! The window is the only in-memory view observers see. Records are purged
//! on append, never on read: a snapshot reflects the window exactly as the
//! last completed append left it.

use super::types::{AggregateSnapshot, LogRecord};
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

/// Default window length (30 seconds)
pub const WINDOW_DURATION_MS: i64 = 30_000;

/// Trait for a single rolling time window
pub trait RollingWindow {
    /// Add a record, then evict everything older than the window
    fn append(&mut self, record: LogRecord);

    /// Remove records whose age at `now_ms` exceeds the window duration
    fn evict_expired(&mut self, now_ms: i64);

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;
}

/// Insertion-ordered window of records, exclusively owned by the ingest loop
pub struct SlidingWindow {
    records: VecDeque<LogRecord>,
    duration_ms: i64,
    clock: Arc<dyn Clock>,
}

impl SlidingWindow {
    pub fn new(duration_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: VecDeque::with_capacity(256),
            duration_ms,
            clock,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    /// Recompute the aggregate over the current contents
    ///
    /// Returns `None` for an empty window; no zero snapshot is ever produced.
    pub fn snapshot(&self) -> Option<AggregateSnapshot> {
        if self.records.is_empty() {
            return None;
        }

        let mut event_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut video_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut unique_users: HashSet<&str> = HashSet::new();

        for record in &self.records {
            *event_counts.entry(record.event.clone()).or_insert(0) += 1;
            *video_counts.entry(record.video_title.clone()).or_insert(0) += 1;
            unique_users.insert(record.user_id.as_str());
        }

        Some(AggregateSnapshot {
            timestamp: DateTime::<Utc>::from(self.clock.now()),
            event_counts,
            video_counts,
            unique_users: unique_users.len(),
            total_logs: self.records.len(),
        })
    }
}

impl RollingWindow for SlidingWindow {
    fn append(&mut self, record: LogRecord) {
        self.records.push_back(record);
        let now = self.clock.now_millis();
        self.evict_expired(now);
    }

    fn evict_expired(&mut self, now_ms: i64) {
        let duration = self.duration_ms;
        self.records.retain(|r| now_ms - r.processed_at <= duration);
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use serde_json::Map;
    use std::time::Duration;

    fn make_record(clock: &MockClock, event: &str, title: &str, user: &str) -> LogRecord {
        LogRecord {
            event: event.to_string(),
            user_id: user.to_string(),
            video_title: title.to_string(),
            processed_at: clock.now_millis(),
            extra: Map::new(),
        }
    }

    fn window_with_clock() -> (Arc<MockClock>, SlidingWindow) {
        let clock = Arc::new(MockClock::at_millis(1_700_000_000_000));
        let window = SlidingWindow::new(WINDOW_DURATION_MS, clock.clone());
        (clock, window)
    }

    #[test]
    fn test_single_append_snapshot() {
        let (clock, mut window) = window_with_clock();
        window.append(make_record(&clock, "play", "A", "u1"));

        let snapshot = window.snapshot().unwrap();
        assert_eq!(snapshot.event_counts, BTreeMap::from([("play".to_string(), 1)]));
        assert_eq!(snapshot.video_counts, BTreeMap::from([("A".to_string(), 1)]));
        assert_eq!(snapshot.unique_users, 1);
        assert_eq!(snapshot.total_logs, 1);
    }

    #[test]
    fn test_expired_record_purged_on_next_append() {
        let (clock, mut window) = window_with_clock();
        window.append(make_record(&clock, "play", "A", "u1"));

        clock.advance(Duration::from_millis(WINDOW_DURATION_MS as u64 + 1));
        window.append(make_record(&clock, "pause", "B", "u2"));

        assert_eq!(window.len(), 1);
        let snapshot = window.snapshot().unwrap();
        assert_eq!(snapshot.total_logs, 1);
        assert_eq!(snapshot.video_counts.get("B"), Some(&1));
        assert!(snapshot.video_counts.get("A").is_none());
    }

    #[test]
    fn test_record_exactly_at_boundary_is_kept() {
        let (clock, mut window) = window_with_clock();
        window.append(make_record(&clock, "play", "A", "u1"));

        clock.advance(Duration::from_millis(WINDOW_DURATION_MS as u64));
        window.append(make_record(&clock, "play", "A", "u1"));

        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_snapshot_does_not_purge() {
        let (clock, mut window) = window_with_clock();
        window.append(make_record(&clock, "play", "A", "u1"));

        clock.advance(Duration::from_secs(60));
        assert_eq!(window.snapshot().unwrap().total_logs, 1);
    }

    #[test]
    fn test_empty_window_produces_no_snapshot() {
        let (_clock, window) = window_with_clock();
        assert!(window.snapshot().is_none());
    }

    #[test]
    fn test_window_invariants_over_mixed_sequence() {
        let (clock, mut window) = window_with_clock();
        let users = ["u1", "u2", "u3", "u1", "u2"];
        let events = ["play", "pause", "seek", "buffering", "stop"];

        for step in 0..200u64 {
            let idx = (step % 5) as usize;
            window.append(make_record(&clock, events[idx], "Title", users[idx]));

            let now = clock.now_millis();
            for record in window.records() {
                assert!(now - record.processed_at <= WINDOW_DURATION_MS);
            }

            let snapshot = window.snapshot().unwrap();
            let event_total: u64 = snapshot.event_counts.values().sum();
            assert_eq!(event_total as usize, snapshot.total_logs);
            assert_eq!(snapshot.total_logs, window.len());

            let distinct: HashSet<&str> = window.records().map(|r| r.user_id.as_str()).collect();
            assert_eq!(snapshot.unique_users, distinct.len());
            assert!(snapshot.unique_users <= snapshot.total_logs);

            clock.advance(Duration::from_millis(700 + (step % 3) * 300));
        }
    }
}
