//! Notification Broadcast Adapter
//!
//! `Notifier` implementation on a tokio broadcast channel. Sending never
//! blocks: without receivers the notification is only logged, and a slow
//! receiver lags instead of stalling the router.

use tokio::sync::broadcast;

use crate::application::ports::{Notification, NotificationLevel, Notifier};

/// Default channel capacity.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Fans notifications out to any number of receivers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` messages per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Get a new receiver.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                tracing::warn!(message = %notification.message, "Notification");
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(message = %notification.message, "Notification");
            }
        }
        // No receivers is fine
        let _ = self.tx.send(notification);
    }
}
