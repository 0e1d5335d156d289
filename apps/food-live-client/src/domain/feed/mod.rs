//! Feed Domain Types
//!
//! Entities served by the food feed (foods, comments, ratings) and the
//! typed messages exchanged over the realtime channel.
//!
//! Outbound intents are what the client asks the server to do; inbound
//! events are what the server pushes. Both carry the food they concern,
//! which is the unit of subscription (the "topic").

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Server-assigned identifier of a food item. Also the subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FoodId(String);

impl FoodId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FoodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FoodId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FoodId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Author of a comment or rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id.
    pub id: String,
    /// Display name.
    pub username: String,
}

/// A single comment on a food item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Server-assigned comment id.
    pub id: String,
    /// Comment text.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Author.
    pub user: User,
}

/// A single user's rating of a food item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    /// Score given by the user.
    pub rating: u8,
    /// Author.
    pub user: User,
}

/// Catalog entry as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodListItem {
    /// Food id.
    pub id: FoodId,
    /// Display name.
    pub name: String,
    /// Mood tag the food is associated with.
    pub mood: String,
    /// Whether the food is currently offered.
    pub is_available: bool,
}

/// Point-in-time snapshot of a food item with its comments and ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDetail {
    /// Catalog fields.
    #[serde(flatten)]
    pub item: FoodListItem,
    /// Average score at snapshot time, absent when nobody rated yet.
    #[serde(default)]
    pub average_rating: Option<f64>,
    /// Comments at snapshot time.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Ratings at snapshot time.
    #[serde(default)]
    pub ratings: Vec<Rating>,
}

impl FoodDetail {
    /// Id of the food this snapshot describes.
    #[must_use]
    pub const fn id(&self) -> &FoodId {
        &self.item.id
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPage {
    /// Items on this page.
    pub items: Vec<FoodListItem>,
    /// Cursor of the following page.
    #[serde(default)]
    pub next_cursor: Option<String>,
    /// Cursor of the preceding page.
    #[serde(default)]
    pub prev_cursor: Option<String>,
}

// =============================================================================
// Outbound Intents
// =============================================================================

/// A request the client sends to the server over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundIntent {
    /// Start receiving events for a food.
    Subscribe(FoodId),
    /// Stop receiving events for a food.
    Unsubscribe(FoodId),
    /// Rate a food.
    RateEntity {
        /// Food being rated.
        food_id: FoodId,
        /// Score.
        score: u8,
    },
    /// Comment on a food.
    PostComment {
        /// Food being commented on.
        food_id: FoodId,
        /// Comment text.
        content: String,
    },
}

impl OutboundIntent {
    /// Food the intent concerns.
    #[must_use]
    pub const fn topic(&self) -> &FoodId {
        match self {
            Self::Subscribe(id) | Self::Unsubscribe(id) => id,
            Self::RateEntity { food_id, .. } | Self::PostComment { food_id, .. } => food_id,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::RateEntity { .. } => "rate_food",
            Self::PostComment { .. } => "submit_comment",
        }
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Action an acknowledgement refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckAction {
    /// A `rate_food` request.
    RateFood,
    /// A `submit_comment` request.
    SubmitComment,
    /// Any other action name.
    Other(String),
}

impl AckAction {
    /// Parse the wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "rate_food" => Self::RateFood,
            "submit_comment" => Self::SubmitComment,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Result reported by an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckStatus {
    /// Generic success.
    Success,
    /// Comment accepted.
    Posted,
    /// Request rejected.
    Error,
    /// Any other status string.
    Other(String),
}

impl AckStatus {
    /// Parse the wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "posted" => Self::Posted,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the server accepted the request.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Posted)
    }
}

/// Server acknowledgement of a client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Which request this answers.
    pub action: AckAction,
    /// Outcome.
    pub status: AckStatus,
    /// Optional human-readable detail.
    pub message: Option<String>,
}

/// A message pushed by the server over the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Someone commented on a food.
    CommentAdded {
        /// Food commented on.
        food_id: FoodId,
        /// The new comment.
        comment: Comment,
    },
    /// The aggregate rating of a food changed.
    RatingChanged {
        /// Food rated.
        food_id: FoodId,
        /// New average score.
        average: f64,
        /// Number of ratings behind the average.
        total: u32,
    },
    /// Acknowledgement of a client request. Not scoped to a topic.
    Ack(Ack),
}

impl InboundEvent {
    /// Food the event concerns, if any.
    #[must_use]
    pub const fn topic(&self) -> Option<&FoodId> {
        match self {
            Self::CommentAdded { food_id, .. } | Self::RatingChanged { food_id, .. } => {
                Some(food_id)
            }
            Self::Ack(_) => None,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CommentAdded { .. } => "new_comment",
            Self::RatingChanged { .. } => "new_rating",
            Self::Ack(_) => "ack",
        }
    }
}

/// Rating update handed to the rating callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingUpdate {
    /// Food rated.
    pub food_id: FoodId,
    /// New average score.
    pub average: f64,
    /// Number of ratings behind the average.
    pub total: u32,
}
