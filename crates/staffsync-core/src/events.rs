//! Event bus for engine notifications

use tokio::sync::broadcast;

use crate::engine::SyncReport;
use crate::models::{ConflictId, RecordId, Resolution};

/// Notifications published by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connectivity flipped
    NetworkChanged { online: bool },

    /// A write was queued
    RecordQueued {
        record_id: RecordId,
        entity_type: String,
    },

    /// One more record of the current run was processed
    SyncProgress { processed: usize, total: usize },

    /// A run finished its snapshot
    SyncCompleted(SyncReport),

    /// The remote refused a write because the entity diverged
    ConflictDetected {
        conflict_id: ConflictId,
        record_id: RecordId,
        entity_type: String,
    },

    /// A conflict was settled
    ConflictResolved {
        conflict_id: ConflictId,
        resolution: Resolution,
    },
}

/// Broadcast channel shared by the engine and its monitor
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();

        bus.emit(SyncEvent::NetworkChanged { online: false });

        assert_eq!(
            receiver.recv().await.unwrap(),
            SyncEvent::NetworkChanged { online: false }
        );
    }

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        EventBus::default().emit(SyncEvent::SyncProgress {
            processed: 1,
            total: 2,
        });
    }
}
