//! Cross-tab change notification.
//!
//! A `SyncBus` plays the role of same-origin shared storage whose writes fire an event in
//! every *other* tab. Each tab attaches a [`SyncPort`] with its own origin id; a
//! [`SyncListener`] never yields messages published from its own port.

use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use crate::constants::SYNC_EVENT_KEY;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct BusMessage {
    origin: Uuid,
    key: String,
    new_value: Option<String>,
}

/// A change observed on the shared channel, as another tab would see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
}

impl StorageEvent {
    /// Synthetic doorbell used when messages were dropped; carries no envelope.
    fn overflow() -> Self {
        Self {
            key: SYNC_EVENT_KEY.to_string(),
            new_value: None,
        }
    }
}

/// The shared channel. Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct SyncBus {
    sender: broadcast::Sender<BusMessage>,
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SyncBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach a new tab to the bus.
    #[must_use]
    pub fn attach(&self) -> SyncPort {
        SyncPort {
            origin: Uuid::new_v4(),
            sender: self.sender.clone(),
        }
    }
}

/// One tab's publishing handle.
#[derive(Debug, Clone)]
pub struct SyncPort {
    origin: Uuid,
    sender: broadcast::Sender<BusMessage>,
}

impl SyncPort {
    #[must_use]
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Write `key` on the shared channel. Only other tabs observe it.
    pub fn publish(&self, key: &str, new_value: Option<String>) {
        let message = BusMessage {
            origin: self.origin,
            key: key.to_string(),
            new_value,
        };
        if self.sender.send(message).is_err() {
            tracing::debug!(sync.key = key, "no listeners attached to sync bus");
        }
    }

    /// Listen for other tabs' writes from now on.
    #[must_use]
    pub fn listen(&self) -> SyncListener {
        SyncListener {
            origin: self.origin,
            receiver: self.sender.subscribe(),
        }
    }
}

/// One tab's receiving end.
#[derive(Debug)]
pub struct SyncListener {
    origin: Uuid,
    receiver: broadcast::Receiver<BusMessage>,
}

impl SyncListener {
    /// Next pending event from another tab without waiting.
    ///
    /// If this listener fell behind, one synthetic doorbell stands in for everything missed.
    pub fn try_next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) if message.origin == self.origin => continue,
                Ok(message) => {
                    return Some(StorageEvent {
                        key: message.key,
                        new_value: message.new_value,
                    });
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(sync.skipped = skipped, "sync listener lagged");
                    return Some(StorageEvent::overflow());
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next event from another tab; `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.origin == self.origin => continue,
                Ok(message) => {
                    return Some(StorageEvent {
                        key: message.key,
                        new_value: message.new_value,
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(sync.skipped = skipped, "sync listener lagged");
                    return Some(StorageEvent::overflow());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain every pending event.
    pub fn drain(&mut self) -> Vec<StorageEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
