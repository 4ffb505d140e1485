//! Scheduler pubsub events and the broadcast event bus.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::storage::FrameworkId;

/// The resource manager accepted this scheduler's registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverRegistered {
    pub framework_id: FrameworkId,
}

/// Events exchanged between scheduler subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    DriverRegistered(DriverRegistered),
    /// Published once the leader is registered and serving.
    SchedulerActive,
}

/// Anything events can be posted to.
pub trait EventSink: Send + Sync {
    fn post(&self, event: SchedulerEvent);
}

/// In-process event bus backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSink for EventBus {
    fn post(&self, event: SchedulerEvent) {
        // Posting with no subscribers is not an error for the poster.
        if self.tx.send(event).is_err() {
            debug!("event posted with no subscribers");
        }
    }
}
