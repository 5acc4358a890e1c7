//! Fan-out hub.
//!
//! Each subscriber owns a bounded queue. Broadcasting never waits: a
//! subscriber whose queue is full or whose receiver is gone is removed on
//! the spot, so one slow client cannot stall the others.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

/// Identifier handed out by [`TelemetryHub::subscribe`].
pub type SubscriberId = u64;

/// Encoded frame shared by all subscribers.
pub type Payload = Arc<str>;

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Payload>,
}

/// Registry of live subscribers.
pub struct TelemetryHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl TelemetryHub {
    /// Hub whose subscribers may queue up to `buffer` frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber and return its id and frame queue.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Payload>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut subscribers = self.subscribers.lock();
        subscribers.push(Subscriber { id, tx });
        info!("telemetry client {} connected ({} total)", id, subscribers.len());
        (id, rx)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        if subscribers.len() < before {
            info!("telemetry client {} disconnected ({} total)", id, subscribers.len());
        }
    }

    /// Offer `payload` to every subscriber without waiting.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn broadcast(&self, payload: Payload) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|s| match s.tx.try_send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!("dropping telemetry client {}: queue full", s.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("dropping telemetry client {}: receiver closed", s.id);
                false
            }
        });
        delivered
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for TelemetryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHub")
            .field("subscribers", &self.subscriber_count())
            .field("buffer", &self.buffer)
            .finish()
    }
}
