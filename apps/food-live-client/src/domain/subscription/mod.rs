//! Topic Subscription Tracking
//!
//! Tracks the single food the client is watching and decides which
//! subscribe/unsubscribe intents a change produces.
//!
//! # Design
//!
//! The manager is pure: it never touches the connection. Callers pass in
//! whether the connection is open and forward the returned intents. This
//! keeps the swap ordering (unsubscribe old, then subscribe new) in one
//! place and makes it testable without a socket.
//!
//! While disconnected only the latest topic is remembered, so a burst of
//! changes collapses into a single subscribe once the connection opens.

use crate::domain::feed::{FoodId, OutboundIntent};

// =============================================================================
// Topic Swap
// =============================================================================

/// Outcome of a topic change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSwap {
    /// Topic that was active before the change.
    pub previous: Option<FoodId>,
    /// Intents to send, in order. Empty when the connection is not open.
    pub intents: Vec<OutboundIntent>,
}

// =============================================================================
// Subscription Manager
// =============================================================================

/// Holds the active topic and derives the intents that keep the server in sync.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionManager {
    current: Option<FoodId>,
}

impl SubscriptionManager {
    /// Create a manager with no active topic.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// The topic currently watched.
    #[must_use]
    pub const fn current(&self) -> Option<&FoodId> {
        self.current.as_ref()
    }

    /// Whether `topic` is the topic currently watched.
    #[must_use]
    pub fn is_current(&self, topic: &FoodId) -> bool {
        self.current.as_ref() == Some(topic)
    }

    /// Switch to a new topic.
    ///
    /// Returns `None` when `topic` is already active. Otherwise the new topic
    /// is recorded and, if `open`, the returned swap carries an unsubscribe
    /// for the old topic followed by a subscribe for the new one.
    pub fn set_topic(&mut self, topic: Option<FoodId>, open: bool) -> Option<TopicSwap> {
        if self.current == topic {
            return None;
        }

        let previous = std::mem::replace(&mut self.current, topic);
        let mut intents = Vec::with_capacity(2);

        if open {
            if let Some(old) = &previous {
                intents.push(OutboundIntent::Unsubscribe(old.clone()));
            }
            if let Some(new) = &self.current {
                intents.push(OutboundIntent::Subscribe(new.clone()));
            }
        }

        Some(TopicSwap { previous, intents })
    }

    /// Intent to send when a connection becomes open.
    #[must_use]
    pub fn on_open(&self) -> Option<OutboundIntent> {
        self.current.clone().map(OutboundIntent::Subscribe)
    }
}
