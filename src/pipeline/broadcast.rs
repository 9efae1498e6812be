//! Live fan-out to connected observers
//!
//! Each observer owns a bounded frame queue drained by its websocket task.
//! Publishing never awaits: a full queue drops the frame for that observer
//! only, a closed queue unregisters the observer. Per-observer frame order is
//! the publish order.

use super::types::{AggregateSnapshot, LogRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};

pub type ObserverId = u64;

/// Serialized frame shared by every observer queue
pub type Frame = Arc<str>;

/// First frame every observer receives
pub const GREETING: &str = r#"{"message":"connected to log stream"}"#;

pub const RAW_LOG: &str = "raw_log";
pub const AGGREGATE_DATA: &str = "aggregate_data";

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a T,
}

/// Outcome of one publish across all observers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Observers whose queue was full; the frame was dropped for them
    pub skipped: usize,
    /// Observers found closed and unregistered
    pub removed: usize,
}

pub struct Broadcaster {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<Frame>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    /// `buffer` is the per-observer queue depth
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register an observer; the greeting is already queued on the receiver
    pub fn connect(&self) -> (ObserverId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let _ = tx.try_send(Arc::from(GREETING));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut observers = self.lock();
            observers.insert(id, tx);
            observers.len()
        };

        log::info!("👀 Observer {} connected ({} active)", id, count);
        (id, rx)
    }

    pub fn disconnect(&self, id: ObserverId) {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log::info!("👋 Observer {} disconnected", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    pub fn publish_raw(&self, record: &LogRecord) -> PublishReport {
        self.publish(RAW_LOG, record)
    }

    pub fn publish_aggregate(&self, snapshot: &AggregateSnapshot) -> PublishReport {
        self.publish(AGGREGATE_DATA, snapshot)
    }

    fn publish<T: Serialize>(&self, kind: &'static str, data: &T) -> PublishReport {
        let mut report = PublishReport::default();

        let frame: Frame = match serde_json::to_string(&Envelope { kind, data }) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                log::error!("Failed to serialize {} frame: {}", kind, e);
                return report;
            }
        };

        let mut observers = self.lock();
        observers.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::debug!("Observer {} is lagging, dropped {} frame", id, kind);
                report.skipped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                report.removed += 1;
                false
            }
        });

        if report.removed > 0 {
            log::info!("🧹 Removed {} closed observer(s)", report.removed);
        }

        report
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, mpsc::Sender<Frame>>> {
        self.observers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn make_record(user: &str) -> LogRecord {
        LogRecord {
            event: "play".to_string(),
            user_id: user.to_string(),
            video_title: "A".to_string(),
            processed_at: 1_000,
            extra: Map::new(),
        }
    }

    fn parse(frame: &Frame) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn test_greeting_is_first_frame() {
        let broadcaster = Broadcaster::new(8);
        let (_id, mut rx) = broadcaster.connect();

        let frame = rx.try_recv().unwrap();
        assert_eq!(&*frame, GREETING);
    }

    #[test]
    fn test_raw_frames_reach_every_observer_in_order() {
        let broadcaster = Broadcaster::new(8);
        let (_a, mut rx_a) = broadcaster.connect();
        let (_b, mut rx_b) = broadcaster.connect();
        let _ = rx_a.try_recv();
        let _ = rx_b.try_recv();

        for user in ["u1", "u2", "u3"] {
            let report = broadcaster.publish_raw(&make_record(user));
            assert_eq!(report.delivered, 2);
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for user in ["u1", "u2", "u3"] {
                let frame = parse(&rx.try_recv().unwrap());
                assert_eq!(frame["type"], RAW_LOG);
                assert_eq!(frame["data"]["user_id"], user);
            }
        }
    }

    #[test]
    fn test_closed_observer_is_removed() {
        let broadcaster = Broadcaster::new(8);
        let (_a, rx_a) = broadcaster.connect();
        let (_b, mut rx_b) = broadcaster.connect();
        drop(rx_a);

        let report = broadcaster.publish_raw(&make_record("u1"));
        assert_eq!(report, PublishReport { delivered: 1, skipped: 0, removed: 1 });
        assert_eq!(broadcaster.observer_count(), 1);

        let _ = rx_b.try_recv();
        assert_eq!(parse(&rx_b.try_recv().unwrap())["data"]["user_id"], "u1");
    }

    #[test]
    fn test_slow_observer_does_not_block_others() {
        let broadcaster = Broadcaster::new(2);
        let (_slow, _rx_slow) = broadcaster.connect(); // greeting fills 1 of 2
        let (_fast, mut rx_fast) = broadcaster.connect();

        let mut skipped = 0;
        for i in 0..5 {
            let _ = rx_fast.try_recv();
            let report = broadcaster.publish_raw(&make_record(&format!("u{}", i)));
            skipped += report.skipped;
        }

        assert_eq!(skipped, 4);
        assert_eq!(broadcaster.observer_count(), 2);
        assert_eq!(parse(&rx_fast.try_recv().unwrap())["data"]["user_id"], "u4");
    }

    #[test]
    fn test_disconnect_unregisters() {
        let broadcaster = Broadcaster::new(8);
        let (id, _rx) = broadcaster.connect();
        broadcaster.disconnect(id);

        assert_eq!(broadcaster.observer_count(), 0);
        assert_eq!(broadcaster.publish_raw(&make_record("u1")).delivered, 0);
    }
}
