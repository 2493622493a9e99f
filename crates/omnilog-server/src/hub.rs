use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use omnilog_types::{facility_name, severity_name, LogRecord};

/// A stored record enriched with human-readable severity/facility names,
/// as delivered to live subscribers.
#[derive(Clone, Debug, Serialize)]
pub struct LiveRecord {
    #[serde(flatten)]
    pub record: LogRecord,
    pub severity_name: Option<String>,
    pub facility_name: Option<String>,
}

impl LiveRecord {
    fn new(record: &LogRecord) -> Self {
        Self {
            record: record.clone(),
            severity_name: record.severity.map(severity_name),
            facility_name: record.facility.map(facility_name),
        }
    }
}

/// A live-stream subscription handle.
///
/// Dropping the subscription (or just its receiver) is enough to leave the
/// hub: the next publish detects the closed channel and evicts the sender.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::UnboundedReceiver<Arc<LiveRecord>>,
}

/// In-memory registry of live subscribers.
///
/// Publishing is best-effort and never blocks ingestion: each subscriber gets
/// its own channel, failed sends evict that subscriber, and the rest are
/// unaffected. Records arrive at each subscriber in publish order. There is no
/// replay on subscribe; history catch-up goes through the store.
#[derive(Default)]
pub struct RecordHub {
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<Arc<LiveRecord>>>>,
    next_id: AtomicU64,
}

impl RecordHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Only records published after this call are
    /// delivered.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(id, tx);
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber explicitly.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }

    /// Deliver a record to every current subscriber.
    pub fn publish(&self, record: &LogRecord) {
        let live = Arc::new(LiveRecord::new(record));
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }

        let dead: Vec<u64> = subscribers
            .iter()
            .filter(|(_, tx)| tx.send(Arc::clone(&live)).is_err())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            subscribers.remove(&id);
            tracing::debug!(subscriber = id, "removed unreachable subscriber");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
