//! In-process event bus
//!
//! Broadcasts committed session and access changes to any number of
//! observers with no coupling back into the state machines. Publishers
//! always persist to the local store before broadcasting, so a reload never
//! observes an event that did not also survive to disk.

use tokio::sync::broadcast;

use meridian_types::AppEvent;

const DEFAULT_CAPACITY: usize = 64;

/// Broadcast bus for [`AppEvent`]s
///
/// Cloning shares the underlying channel; a bus with no subscribers accepts
/// publishes without error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus with the default buffer capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit buffer capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: AppEvent) {
        tracing::trace!(?event, "publishing event");
        // send only errors when no subscriber exists, which is not a fault
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
