//! Live Session State
//!
//! The state shared between the caller-facing client, the connection driver
//! and the message router: connection state, the outbound link of the open
//! connection, the active topic, the live buffer and the live rating.
//!
//! All of it sits behind one mutex so that topic checks and the mutations
//! they guard happen atomically. In particular a topic swap and the
//! resubscribe on open can never interleave, which keeps the wire order
//! "unsubscribe old, subscribe new" and stops a stale topic from being
//! subscribed after a reconnect.

use tokio::sync::{mpsc, watch};

use crate::domain::connection::ConnectionState;
use crate::domain::feed::{Comment, FoodDetail, FoodId, OutboundIntent};
use crate::domain::reconcile::{LiveBuffer, LiveRating, merge_comments};
use crate::domain::subscription::SubscriptionManager;

/// Sender half of the open connection's outbound queue.
pub type IntentLink = mpsc::UnboundedSender<OutboundIntent>;

// =============================================================================
// Errors
// =============================================================================

/// Errors returned to callers of the live client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveClientError {
    /// The connection is not open; nothing was sent.
    #[error("not connected")]
    NotConnected,
    /// No food is being watched.
    #[error("no active topic")]
    NoActiveTopic,
    /// Comment text is blank.
    #[error("comment is empty")]
    EmptyComment,
}

// =============================================================================
// Session
// =============================================================================

/// Mutable live state of one client.
#[derive(Debug)]
pub struct LiveSession {
    state: ConnectionState,
    link: Option<IntentLink>,
    subscriptions: SubscriptionManager,
    buffer: LiveBuffer,
    rating: Option<LiveRating>,
    state_tx: watch::Sender<ConnectionState>,
    revision: watch::Sender<u64>,
}

impl LiveSession {
    /// Create an idle session keeping at most `live_capacity` live comments.
    #[must_use]
    pub fn new(live_capacity: usize) -> Self {
        Self {
            state: ConnectionState::Idle,
            link: None,
            subscriptions: SubscriptionManager::new(),
            buffer: LiveBuffer::with_capacity(live_capacity),
            rating: None,
            state_tx: watch::Sender::new(ConnectionState::Idle),
            revision: watch::Sender::new(0),
        }
    }

    // -------------------------------------------------------------------------
    // Connection state
    // -------------------------------------------------------------------------

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Move to a non-open state. Drops the outbound link.
    pub fn transition(&mut self, next: ConnectionState) {
        if !next.is_open() {
            self.link = None;
        }
        self.state = next;
        self.state_tx.send_replace(next);
    }

    /// Mark the connection open with `link` as its outbound queue.
    ///
    /// The active topic, if any, is resubscribed before any other intent can
    /// be queued. Returns the resubscribe intent that was queued.
    pub fn open(&mut self, link: IntentLink) -> Option<OutboundIntent> {
        let resubscribe = self.subscriptions.on_open();
        if let Some(intent) = &resubscribe {
            // The receiver is owned by the caller and alive at this point.
            let _ = link.send(intent.clone());
        }
        self.link = Some(link);
        self.state = ConnectionState::Open;
        self.state_tx.send_replace(ConnectionState::Open);
        resubscribe
    }

    /// Queue an intent on the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`LiveClientError::NotConnected`] if the connection is not open.
    pub fn send(&self, intent: OutboundIntent) -> Result<(), LiveClientError> {
        match (&self.link, self.state.is_open()) {
            (Some(link), true) => link.send(intent).map_err(|_| LiveClientError::NotConnected),
            _ => Err(LiveClientError::NotConnected),
        }
    }

    // -------------------------------------------------------------------------
    // Topic
    // -------------------------------------------------------------------------

    /// Active topic.
    #[must_use]
    pub const fn topic(&self) -> Option<&FoodId> {
        self.subscriptions.current()
    }

    /// Switch topic, clearing live data and queuing swap intents when open.
    ///
    /// Returns the intents that were queued, or `None` if the topic did not change.
    pub fn set_topic(&mut self, topic: Option<FoodId>) -> Option<Vec<OutboundIntent>> {
        let open = self.state.is_open() && self.link.is_some();
        let swap = self.subscriptions.set_topic(topic.clone(), open)?;

        tracing::debug!(
            previous = swap.previous.as_ref().map(FoodId::as_str),
            current = topic.as_ref().map(FoodId::as_str),
            queued = swap.intents.len(),
            "Topic changed"
        );
        self.buffer.reset(topic);
        self.rating = None;

        for intent in &swap.intents {
            if self.send(intent.clone()).is_err() {
                break;
            }
        }
        self.bump();
        Some(swap.intents)
    }

    // -------------------------------------------------------------------------
    // Live data
    // -------------------------------------------------------------------------

    /// Buffer a live comment. Returns `false` if `topic` is not active.
    pub fn push_comment(&mut self, topic: &FoodId, comment: Comment) -> bool {
        if !self.subscriptions.is_current(topic) {
            return false;
        }
        let accepted = self.buffer.push(topic, comment);
        if accepted {
            self.bump();
        }
        accepted
    }

    /// Record a live rating. Returns `false` if `topic` is not active.
    pub fn record_rating(&mut self, topic: &FoodId, average: f64, total: u32) -> bool {
        if !self.subscriptions.is_current(topic) {
            return false;
        }
        self.rating = Some(LiveRating { average, total });
        self.bump();
        true
    }

    /// Buffered live comments, newest first.
    #[must_use]
    pub fn live_comments(&self) -> Vec<Comment> {
        self.buffer.comments().cloned().collect()
    }

    /// Latest live rating for the active topic.
    #[must_use]
    pub const fn live_rating(&self) -> Option<LiveRating> {
        self.rating
    }

    /// Comments to display for `snapshot`.
    ///
    /// Live comments are only merged in when the snapshot is of the active topic.
    #[must_use]
    pub fn merged_view(&self, snapshot: &FoodDetail) -> Vec<Comment> {
        if self.subscriptions.is_current(snapshot.id()) {
            merge_comments(self.buffer.comments(), &snapshot.comments)
        } else {
            merge_comments(std::iter::empty(), &snapshot.comments)
        }
    }

    /// Average to display: live value, else snapshot value, else zero.
    #[must_use]
    pub fn display_rating(&self, snapshot: Option<&FoodDetail>) -> f64 {
        self.rating
            .map(|r| r.average)
            .or_else(|| snapshot.and_then(|s| s.average_rating))
            .unwrap_or(0.0)
    }

    /// Subscribe to the change counter bumped on every live data or topic change.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::feed::{FoodListItem, User};

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            content: format!("comment {id}"),
            created_at: Utc::now(),
            user: User {
                id: "u1".to_string(),
                username: "ana".to_string(),
            },
        }
    }

    fn detail(id: &str, comments: Vec<Comment>, average: Option<f64>) -> FoodDetail {
        FoodDetail {
            item: FoodListItem {
                id: id.into(),
                name: "Ramen".to_string(),
                mood: "cozy".to_string(),
                is_available: true,
            },
            average_rating: average,
            comments,
            ratings: Vec::new(),
        }
    }

    fn open_session() -> (LiveSession, mpsc::UnboundedReceiver<OutboundIntent>) {
        let mut session = LiveSession::new(16);
        let (tx, rx) = mpsc::unbounded_channel();
        session.open(tx);
        (session, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundIntent>) -> Vec<OutboundIntent> {
        let mut out = Vec::new();
        while let Ok(intent) = rx.try_recv() {
            out.push(intent);
        }
        out
    }

    #[test]
    fn send_while_idle_is_rejected() {
        let session = LiveSession::new(16);
        assert_eq!(
            session.send(OutboundIntent::Subscribe("t1".into())),
            Err(LiveClientError::NotConnected)
        );
    }

    #[test]
    fn send_after_close_is_rejected() {
        let (mut session, mut rx) = open_session();
        session.transition(ConnectionState::Closed);
        assert_eq!(
            session.send(OutboundIntent::Subscribe("t1".into())),
            Err(LiveClientError::NotConnected)
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn swap_while_open_queues_in_order() {
        let (mut session, mut rx) = open_session();
        session.set_topic(Some("t1".into()));
        session.set_topic(Some("t2".into()));

        assert_eq!(
            drain(&mut rx),
            vec![
                OutboundIntent::Subscribe("t1".into()),
                OutboundIntent::Unsubscribe("t1".into()),
                OutboundIntent::Subscribe("t2".into()),
            ]
        );
    }

    #[test]
    fn open_resubscribes_latest_topic_only() {
        let mut session = LiveSession::new(16);
        session.set_topic(Some("t1".into()));
        session.set_topic(Some("t2".into()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let resubscribe = session.open(tx);

        assert_eq!(resubscribe, Some(OutboundIntent::Subscribe("t2".into())));
        assert_eq!(drain(&mut rx), vec![OutboundIntent::Subscribe("t2".into())]);
    }

    #[test]
    fn topic_change_clears_live_data() {
        let (mut session, _rx) = open_session();
        session.set_topic(Some("t1".into()));
        assert!(session.push_comment(&"t1".into(), comment("c1")));
        assert!(session.record_rating(&"t1".into(), 4.0, 2));

        session.set_topic(Some("t2".into()));
        assert!(session.live_comments().is_empty());
        assert!(session.live_rating().is_none());
    }

    #[test]
    fn stale_topic_data_is_rejected() {
        let (mut session, _rx) = open_session();
        session.set_topic(Some("t2".into()));
        assert!(!session.push_comment(&"t1".into(), comment("c1")));
        assert!(!session.record_rating(&"t1".into(), 4.5, 10));
        assert!(session.live_rating().is_none());
    }

    #[test]
    fn merged_view_only_merges_active_snapshot() {
        let (mut session, _rx) = open_session();
        session.set_topic(Some("t1".into()));
        session.push_comment(&"t1".into(), comment("c2"));

        let own = detail("t1", vec![comment("c1"), comment("c2")], None);
        let ids: Vec<_> = session.merged_view(&own).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["c2", "c1"]);

        let other = detail("t9", vec![comment("c7")], None);
        let ids: Vec<_> = session.merged_view(&other).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["c7"]);
    }

    #[test]
    fn display_rating_prefers_live_value() {
        let (mut session, _rx) = open_session();
        session.set_topic(Some("t1".into()));
        let snapshot = detail("t1", Vec::new(), Some(3.0));

        assert!((session.display_rating(None) - 0.0).abs() < f64::EPSILON);
        assert!((session.display_rating(Some(&snapshot)) - 3.0).abs() < f64::EPSILON);

        session.record_rating(&"t1".into(), 4.5, 10);
        assert!((session.display_rating(Some(&snapshot)) - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn changes_bump_on_mutation() {
        let (mut session, _rx) = open_session();
        let changes = session.changes();
        let before = *changes.borrow();

        session.set_topic(Some("t1".into()));
        session.push_comment(&"t1".into(), comment("c1"));
        assert_eq!(*changes.borrow(), before + 2);
    }

    #[test]
    fn state_is_observable() {
        let mut session = LiveSession::new(16);
        let state = session.watch_state();
        session.transition(ConnectionState::Connecting);
        assert_eq!(*state.borrow(), ConnectionState::Connecting);
    }
}
