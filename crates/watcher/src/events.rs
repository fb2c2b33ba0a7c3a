//! Event Bus - notifications about what the waiters are doing
//!
//! Design: plain enum events over a tokio broadcast channel.
//! Consumers (log consoles, test harnesses) subscribe; nobody has to.

use dom::{NodeId, ObserverId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaiterKind {
    ElementAvailable,
    AllElementsAvailable,
    AllElementsClickHandled,
    InputHasValue,
}

/// Waiter and delivery events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEvent {
    BatchDelivered { observer: ObserverId, records: usize },
    WaiterRegistered { waiter: Uuid, kind: WaiterKind },
    WaiterResolved { waiter: Uuid, kind: WaiterKind },
    ClickBound { node: NodeId },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<WatchEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: WatchEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
