//! Publish/subscribe channel keyed by collection name.
//!
//! Delivery is at-least-once to listeners subscribed at publish time. Missed
//! events are not persisted: a subscriber that falls behind receives one
//! synthetic event for its key, which tells it to re-read the collection.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

pub const DEFAULT_CAPACITY: usize = 256;

/// "The collection at `key` changed."
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Notify every current subscriber. Returns how many receivers were live.
    pub fn publish(&self, key: &str) -> usize {
        self.tx
            .send(ChangeEvent {
                key: key.to_string(),
            })
            .unwrap_or(0)
    }

    pub fn subscribe(&self, key: &str) -> Subscription {
        Subscription {
            key: key.to_string(),
            rx: self.tx.subscribe(),
        }
    }

    /// Raw receiver for every key; callers handle `Lagged` themselves.
    pub fn subscribe_all(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

/// A listener for one collection key.
#[derive(Debug)]
pub struct Subscription {
    key: String,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next change to this key. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if ev.key == self.key => return Some(ev),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(key = %self.key, missed, "subscriber lagged");
                    return Some(self.synthetic());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(ev) if ev.key == self.key => return Some(ev),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(_)) => return Some(self.synthetic()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn synthetic(&self) -> ChangeEvent {
        ChangeEvent {
            key: self.key.clone(),
        }
    }
}
