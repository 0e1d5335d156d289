//! Inbound Message Router
//!
//! Dispatches decoded inbound events: topic-scoped data goes into the live
//! session, acknowledgements turn into notifications and callbacks.
//!
//! Events for a topic other than the active one are discarded. The topic
//! check and the session mutation happen under one lock; callbacks and
//! notifications run after the lock is released.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::session::LiveSession;
use crate::application::ports::{Notification, Notifier};
use crate::domain::feed::{Ack, AckAction, AckStatus, Comment, FoodId, InboundEvent, RatingUpdate};

/// Fallback text for rejected requests without a message.
const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// Callback invoked when the server confirms a rating.
pub type RateSuccessCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked with every rating change of the active topic.
pub type RatingCallback = Arc<dyn Fn(RatingUpdate) + Send + Sync>;

// =============================================================================
// Client Context
// =============================================================================

/// Caller-supplied configuration read by the router at dispatch time.
#[derive(Clone, Default)]
pub struct ClientContext {
    /// Id of the signed-in user; their own comments raise no notification.
    pub current_user_id: Option<String>,
    /// Invoked after a rating was accepted.
    pub on_rate_success: Option<RateSuccessCallback>,
    /// Invoked on rating changes, typically to refetch the snapshot.
    pub on_new_rating: Option<RatingCallback>,
}

impl ClientContext {
    /// Set the signed-in user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.current_user_id = Some(user_id.into());
        self
    }

    /// Set the rate-success callback.
    #[must_use]
    pub fn on_rate_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_rate_success = Some(Arc::new(callback));
        self
    }

    /// Set the rating-changed callback.
    #[must_use]
    pub fn on_new_rating(mut self, callback: impl Fn(RatingUpdate) + Send + Sync + 'static) -> Self {
        self.on_new_rating = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("current_user_id", &self.current_user_id)
            .field("on_rate_success", &self.on_rate_success.is_some())
            .field("on_new_rating", &self.on_new_rating.is_some())
            .finish()
    }
}

// =============================================================================
// Routing
// =============================================================================

/// What the router did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Event was for a topic that is not active.
    StaleTopic,
    /// Comment was added to the live buffer.
    CommentBuffered,
    /// Rating was recorded and the callback invoked.
    RatingDispatched,
    /// Server accepted a rating or comment.
    AckSucceeded,
    /// Server rejected a request.
    ServerRejected {
        /// Message shown to the user.
        message: String,
    },
    /// Acknowledgement with no handler.
    Ignored,
}

/// Routes inbound events to the session, callbacks and notifier.
pub struct MessageRouter {
    context: RwLock<Arc<ClientContext>>,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("context", &*self.context.read())
            .finish_non_exhaustive()
    }
}

impl MessageRouter {
    /// Create a router with an empty context.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            context: RwLock::new(Arc::new(ClientContext::default())),
            notifier,
        }
    }

    /// Replace the context used for subsequent events.
    pub fn set_context(&self, context: ClientContext) {
        *self.context.write() = Arc::new(context);
    }

    /// Current context.
    #[must_use]
    pub fn context(&self) -> Arc<ClientContext> {
        Arc::clone(&self.context.read())
    }

    /// Raise a notification.
    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Route one inbound event.
    pub fn route(&self, session: &Mutex<LiveSession>, event: InboundEvent) -> RouteOutcome {
        match event {
            InboundEvent::CommentAdded { food_id, comment } => {
                self.on_comment(session, &food_id, comment)
            }
            InboundEvent::RatingChanged {
                food_id,
                average,
                total,
            } => self.on_rating(session, food_id, average, total),
            InboundEvent::Ack(ack) => self.on_ack(ack),
        }
    }

    fn on_comment(
        &self,
        session: &Mutex<LiveSession>,
        food_id: &FoodId,
        comment: Comment,
    ) -> RouteOutcome {
        let author = comment.user.clone();
        if !session.lock().push_comment(food_id, comment) {
            tracing::debug!(topic = %food_id, "Discarding comment for inactive topic");
            return RouteOutcome::StaleTopic;
        }

        let context = self.context();
        if context.current_user_id.as_deref() != Some(author.id.as_str()) {
            self.notify(Notification::info(format!(
                "New comment from {}",
                author.username
            )));
        }
        RouteOutcome::CommentBuffered
    }

    fn on_rating(
        &self,
        session: &Mutex<LiveSession>,
        food_id: FoodId,
        average: f64,
        total: u32,
    ) -> RouteOutcome {
        if !session.lock().record_rating(&food_id, average, total) {
            tracing::debug!(topic = %food_id, "Discarding rating for inactive topic");
            return RouteOutcome::StaleTopic;
        }

        if let Some(callback) = &self.context().on_new_rating {
            callback(RatingUpdate {
                food_id,
                average,
                total,
            });
        }
        RouteOutcome::RatingDispatched
    }

    fn on_ack(&self, ack: Ack) -> RouteOutcome {
        if ack.status == AckStatus::Error {
            let message = ack
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
            tracing::warn!(action = ?ack.action, message = %message, "Server rejected request");
            self.notify(Notification::error(message.clone()));
            return RouteOutcome::ServerRejected { message };
        }

        match (&ack.action, ack.status.is_success()) {
            (AckAction::RateFood, true) => {
                self.notify(Notification::success("Rating submitted!"));
                if let Some(callback) = &self.context().on_rate_success {
                    callback();
                }
                RouteOutcome::AckSucceeded
            }
            (AckAction::SubmitComment, true) => {
                self.notify(Notification::success("Comment posted!"));
                RouteOutcome::AckSucceeded
            }
            _ => {
                tracing::trace!(action = ?ack.action, status = ?ack.status, "Ignoring acknowledgement");
                RouteOutcome::Ignored
            }
        }
    }
}
