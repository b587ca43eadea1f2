//! Connectivity tracking.
//!
//! The monitor never probes the network itself; the platform reports
//! online/offline signals and the monitor turns them into transitions. The
//! debounced automatic run lives on [`SyncEngine::set_online`].
//!
//! [`SyncEngine::set_online`]: crate::engine::SyncEngine::set_online

use tokio::sync::watch;

use crate::events::{EventBus, SyncEvent};

/// A change in reported connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// offline → online
    Restored,
    /// online → offline
    Lost,
}

/// Observable connectivity state
pub struct NetworkMonitor {
    online: watch::Sender<bool>,
    events: EventBus,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool, events: EventBus) -> Self {
        let (online, _) = watch::channel(initially_online);
        Self { online, events }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Record a platform signal. Returns the transition, or `None` when the
    /// signal repeats the current state.
    pub fn report(&self, online: bool) -> Option<Transition> {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return None;
        }

        tracing::info!(
            "Network is now {}",
            if online { "online" } else { "offline" }
        );
        self.events.emit(SyncEvent::NetworkChanged { online });

        Some(if online {
            Transition::Restored
        } else {
            Transition::Lost
        })
    }

    /// Watch connectivity changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}
