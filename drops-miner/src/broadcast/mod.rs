//! Fan-out of status and log events to push subscribers.

mod channel;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{LogEvent, StatusSnapshot};

pub use channel::ChannelSubscriber;

/// Tagged payload pushed to subscribers: `{"type": "status"|"log", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum MinerEvent {
    Status(StatusSnapshot),
    Log(LogEvent),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriberDeliveryError {
    #[error("subscriber is closed")]
    Closed,
    #[error("subscriber buffer is full")]
    Full,
}

/// A push target. Implementations must not block.
pub trait Subscriber: Send + Sync {
    fn deliver(&self, event: &MinerEvent) -> Result<(), SubscriberDeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Entry = (SubscriberId, Arc<dyn Subscriber>);

/// Best-effort delivery to every registered subscriber.
///
/// A subscriber whose delivery fails is dropped; the others still receive
/// the event. New subscribers get the latest status immediately.
pub struct Broadcaster {
    subscribers: RwLock<Vec<Entry>>,
    latest_status: Mutex<StatusSnapshot>,
    next_id: AtomicU64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(StatusSnapshot::default())
    }
}

impl Broadcaster {
    pub fn new(initial_status: StatusSnapshot) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            latest_status: Mutex::new(initial_status),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber and send it the current status. Returns `None`
    /// if that first delivery already fails.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> Option<SubscriberId> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // Holding the write lock orders the initial status before any
        // publish that snapshots the list after this insert.
        let mut subscribers = self.subscribers.write();
        let status = self.latest_status.lock().clone();
        if let Err(e) = subscriber.deliver(&MinerEvent::Status(status)) {
            debug!(error = %e, "Subscriber rejected initial status");
            return None;
        }
        subscribers.push((id, subscriber));
        debug!(subscriber = id.0, total = subscribers.len(), "Subscriber registered");
        Some(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    /// Drop every subscriber. Channel-backed subscribers see their
    /// receiver close once in-flight publishes finish.
    pub fn close(&self) -> usize {
        let dropped = std::mem::take(&mut *self.subscribers.write());
        dropped.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn latest_status(&self) -> StatusSnapshot {
        self.latest_status.lock().clone()
    }

    pub fn publish_status(&self, status: StatusSnapshot) {
        *self.latest_status.lock() = status.clone();
        self.publish(&MinerEvent::Status(status));
    }

    pub fn publish_log(&self, event: LogEvent) {
        self.publish(&MinerEvent::Log(event));
    }

    pub fn publish(&self, event: &MinerEvent) {
        let snapshot: Vec<Entry> = self.subscribers.read().clone();

        let failed: Vec<SubscriberId> = snapshot
            .iter()
            .filter_map(|(id, subscriber)| match subscriber.deliver(event) {
                Ok(()) => None,
                Err(e) => {
                    warn!(subscriber = id.0, error = %e, "Dropping subscriber after failed delivery");
                    Some(*id)
                }
            })
            .collect();

        if !failed.is_empty() {
            self.subscribers
                .write()
                .retain(|(id, _)| !failed.contains(id));
        }
    }
}
