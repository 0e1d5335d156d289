//! Live Client
//!
//! Caller-facing handle tying together the session, the router and the
//! connection manager. A presentation layer drives it with `set_topic`,
//! `rate` and `post_comment`, and reads back the connection state, the
//! merged comment view and the rating to display.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::connection::ConnectionManager;
use super::heartbeat::HeartbeatConfig;
use super::reconnect::ReconnectConfig;
use crate::application::ports::{Connector, Notification, Notifier};
use crate::application::services::{ClientContext, LiveClientError, LiveSession, MessageRouter};
use crate::domain::connection::ConnectionState;
use crate::domain::feed::{Comment, FoodDetail, FoodId, OutboundIntent};
use crate::domain::reconcile::{DEFAULT_LIVE_CAPACITY, LiveRating};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::metrics;

/// Shown when an intent is attempted without an open connection.
pub const NOT_CONNECTED_MESSAGE: &str = "Not connected. Trying to reconnect...";

// =============================================================================
// Configuration
// =============================================================================

/// Settings for one live client.
#[derive(Debug, Clone)]
pub struct LiveClientConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Reconnect schedule.
    pub reconnect: ReconnectConfig,
    /// Heartbeat, `None` to disable.
    pub heartbeat: Option<HeartbeatConfig>,
    /// Live comments kept for the watched food.
    pub live_capacity: usize,
}

impl LiveClientConfig {
    /// Defaults for `url`: fixed 3s reconnect, default heartbeat.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
            heartbeat: Some(HeartbeatConfig::default()),
            live_capacity: DEFAULT_LIVE_CAPACITY,
        }
    }

    /// Derive from the environment configuration.
    #[must_use]
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            url: config.socket_url(),
            reconnect: ReconnectConfig::from_settings(&config.socket),
            heartbeat: HeartbeatConfig::from_settings(&config.socket),
            live_capacity: config.socket.live_buffer_capacity,
        }
    }

    /// Override the reconnect schedule.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Override the heartbeat.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Option<HeartbeatConfig>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Override the live buffer capacity.
    #[must_use]
    pub const fn with_live_capacity(mut self, capacity: usize) -> Self {
        self.live_capacity = capacity;
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// Realtime client for the food feed.
#[derive(Debug)]
pub struct LiveClient {
    session: Arc<Mutex<LiveSession>>,
    router: Arc<MessageRouter>,
    connection: ConnectionManager,
}

impl LiveClient {
    /// Build an idle client.
    #[must_use]
    pub fn new(
        config: LiveClientConfig,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = Arc::new(Mutex::new(LiveSession::new(config.live_capacity)));
        let router = Arc::new(MessageRouter::new(notifier));
        let connection = ConnectionManager::new(
            config.url,
            connector,
            Arc::clone(&session),
            Arc::clone(&router),
            config.reconnect,
            config.heartbeat,
        );
        Self {
            session,
            router,
            connection,
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Connect. Idempotent while connecting or open.
    pub fn start(&self) {
        self.connection.start();
    }

    /// Disconnect and stop reconnecting.
    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    /// Connection state updates.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.session.lock().watch_state()
    }

    /// Counter bumped whenever the merged view or live rating may have changed.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.session.lock().changes()
    }

    /// Replace user id and callbacks used for subsequent events.
    pub fn set_context(&self, context: ClientContext) {
        self.router.set_context(context);
    }

    // -------------------------------------------------------------------------
    // Topic
    // -------------------------------------------------------------------------

    /// Food being watched.
    #[must_use]
    pub fn topic(&self) -> Option<FoodId> {
        self.session.lock().topic().cloned()
    }

    /// Watch `topic` (or nothing). Clears live data when it changes.
    pub fn set_topic(&self, topic: Option<FoodId>) {
        let queued = self.session.lock().set_topic(topic.clone());
        match queued {
            Some(intents) => tracing::debug!(
                topic = topic.as_ref().map(FoodId::as_str),
                queued = intents.len(),
                "Topic changed"
            ),
            None => tracing::trace!("Topic unchanged"),
        }
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    /// Send an intent on the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`LiveClientError::NotConnected`] when the connection is not
    /// open; an error notification is raised as well. Nothing is queued.
    pub fn send(&self, intent: OutboundIntent) -> Result<(), LiveClientError> {
        let kind = intent.kind();
        let result = self.session.lock().send(intent);
        if let Err(e) = &result {
            tracing::debug!(kind, error = %e, "Intent rejected");
            metrics::record_send_rejected(kind);
            self.router.notify(Notification::error(NOT_CONNECTED_MESSAGE));
        }
        result
    }

    /// Rate the watched food.
    ///
    /// # Errors
    ///
    /// [`LiveClientError::NoActiveTopic`] without a topic, otherwise as [`send`](Self::send).
    pub fn rate(&self, score: u8) -> Result<(), LiveClientError> {
        let food_id = self.topic().ok_or(LiveClientError::NoActiveTopic)?;
        self.send(OutboundIntent::RateEntity { food_id, score })
    }

    /// Comment on the watched food. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// [`LiveClientError::EmptyComment`] for blank text,
    /// [`LiveClientError::NoActiveTopic`] without a topic, otherwise as [`send`](Self::send).
    pub fn post_comment(&self, text: &str) -> Result<(), LiveClientError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(LiveClientError::EmptyComment);
        }
        let food_id = self.topic().ok_or(LiveClientError::NoActiveTopic)?;
        self.send(OutboundIntent::PostComment {
            food_id,
            content: content.to_string(),
        })
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// Live comments for the watched food, newest first.
    #[must_use]
    pub fn live_comments(&self) -> Vec<Comment> {
        self.session.lock().live_comments()
    }

    /// Latest live rating for the watched food.
    #[must_use]
    pub fn live_rating(&self) -> Option<LiveRating> {
        self.session.lock().live_rating()
    }

    /// Live comments merged with `snapshot`'s, deduplicated by id.
    #[must_use]
    pub fn merged_view(&self, snapshot: &FoodDetail) -> Vec<Comment> {
        self.session.lock().merged_view(snapshot)
    }

    /// Average rating to display.
    #[must_use]
    pub fn display_rating(&self, snapshot: Option<&FoodDetail>) -> f64 {
        self.session.lock().display_rating(snapshot)
    }
}
