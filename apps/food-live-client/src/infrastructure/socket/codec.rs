//! Realtime Wire Codec
//!
//! JSON encoding of outbound intents and decoding of inbound frames.
//!
//! # Outbound
//!
//! ```json
//! {"type":"subscribe","payload":{"foodId":"f1"}}
//! {"type":"rate_food","payload":{"foodId":"f1","rating":4}}
//! {"type":"submit_comment","payload":{"foodId":"f1","content":"nice"}}
//! ```
//!
//! # Inbound
//!
//! ```json
//! {"type":"new_comment","id":"c1","foodId":"f1","content":"nice","createdAt":"...","user":{...}}
//! {"type":"new_rating","foodId":"f1","averageRating":4.5,"totalRatings":10}
//! {"type":"ack","action":"rate_food","status":"success","message":"..."}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::feed::{
    Ack, AckAction, AckStatus, Comment, FoodId, InboundEvent, OutboundIntent, User,
};

/// Codec errors. Any of these makes a frame malformed.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Object has no string `type` field.
    #[error("message has no type")]
    MissingType,

    /// Unknown message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Fields parsed but violate a constraint.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

// =============================================================================
// Wire Shapes
// =============================================================================

#[derive(Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
enum OutboundWire<'a> {
    Subscribe {
        #[serde(rename = "foodId")]
        food_id: &'a str,
    },
    Unsubscribe {
        #[serde(rename = "foodId")]
        food_id: &'a str,
    },
    RateFood {
        #[serde(rename = "foodId")]
        food_id: &'a str,
        rating: u8,
    },
    SubmitComment {
        #[serde(rename = "foodId")]
        food_id: &'a str,
        content: &'a str,
    },
}

impl<'a> From<&'a OutboundIntent> for OutboundWire<'a> {
    fn from(intent: &'a OutboundIntent) -> Self {
        match intent {
            OutboundIntent::Subscribe(id) => Self::Subscribe {
                food_id: id.as_str(),
            },
            OutboundIntent::Unsubscribe(id) => Self::Unsubscribe {
                food_id: id.as_str(),
            },
            OutboundIntent::RateEntity { food_id, score } => Self::RateFood {
                food_id: food_id.as_str(),
                rating: *score,
            },
            OutboundIntent::PostComment { food_id, content } => Self::SubmitComment {
                food_id: food_id.as_str(),
                content,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewCommentWire {
    id: String,
    food_id: FoodId,
    content: String,
    created_at: DateTime<Utc>,
    user: User,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewRatingWire {
    food_id: FoodId,
    average_rating: f64,
    total_ratings: u32,
}

#[derive(Deserialize)]
struct AckWire {
    action: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// Codec
// =============================================================================

/// JSON codec for the realtime channel.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON, has no known `type`, is
    /// missing fields for its type, or carries empty ids or a bad average.
    pub fn decode(&self, text: &str) -> Result<InboundEvent, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            let snippet: String = trimmed.chars().take(50).collect();
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {snippet}..."
            )));
        }

        let value: serde_json::Value = serde_json::from_str(trimmed)?;
        let msg_type = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or(CodecError::MissingType)?;

        match msg_type.as_str() {
            "new_comment" => {
                let m: NewCommentWire = serde_json::from_value(value)?;
                require_id("foodId", m.food_id.as_str())?;
                require_id("id", &m.id)?;
                Ok(InboundEvent::CommentAdded {
                    food_id: m.food_id,
                    comment: Comment {
                        id: m.id,
                        content: m.content,
                        created_at: m.created_at,
                        user: m.user,
                    },
                })
            }
            "new_rating" => {
                let m: NewRatingWire = serde_json::from_value(value)?;
                require_id("foodId", m.food_id.as_str())?;
                if !m.average_rating.is_finite() || m.average_rating < 0.0 {
                    return Err(CodecError::Invalid {
                        field: "averageRating",
                        reason: "must be a finite non-negative number",
                    });
                }
                Ok(InboundEvent::RatingChanged {
                    food_id: m.food_id,
                    average: m.average_rating,
                    total: m.total_ratings,
                })
            }
            "ack" => {
                let m: AckWire = serde_json::from_value(value)?;
                Ok(InboundEvent::Ack(Ack {
                    action: AckAction::parse(&m.action),
                    status: AckStatus::parse(&m.status),
                    message: m.message,
                }))
            }
            other => Err(CodecError::UnknownMessageType(other.to_string())),
        }
    }

    /// Encode an intent as a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, intent: &OutboundIntent) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&OutboundWire::from(intent))?)
    }
}

fn require_id(field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.is_empty() {
        return Err(CodecError::Invalid {
            field,
            reason: "must not be empty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn encode(intent: &OutboundIntent) -> serde_json::Value {
        let text = JsonCodec::new().encode(intent).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn encode_subscribe() {
        assert_eq!(
            encode(&OutboundIntent::Subscribe("f1".into())),
            json!({"type": "subscribe", "payload": {"foodId": "f1"}})
        );
    }

    #[test]
    fn encode_unsubscribe() {
        assert_eq!(
            encode(&OutboundIntent::Unsubscribe("f1".into())),
            json!({"type": "unsubscribe", "payload": {"foodId": "f1"}})
        );
    }

    #[test]
    fn encode_rate() {
        let intent = OutboundIntent::RateEntity {
            food_id: "f1".into(),
            score: 4,
        };
        assert_eq!(
            encode(&intent),
            json!({"type": "rate_food", "payload": {"foodId": "f1", "rating": 4}})
        );
    }

    #[test]
    fn encode_comment() {
        let intent = OutboundIntent::PostComment {
            food_id: "f1".into(),
            content: "so \"good\"".to_string(),
        };
        assert_eq!(
            encode(&intent),
            json!({"type": "submit_comment", "payload": {"foodId": "f1", "content": "so \"good\""}})
        );
    }

    #[test]
    fn decode_new_comment() {
        let text = r#"{"type":"new_comment","id":"c1","foodId":"f1","content":"nice","createdAt":"2024-05-01T12:00:00.000Z","user":{"id":"u2","username":"bo"}}"#;
        let event = JsonCodec::new().decode(text).unwrap();

        let InboundEvent::CommentAdded { food_id, comment } = event else {
            panic!("expected comment, got {event:?}");
        };
        assert_eq!(food_id.as_str(), "f1");
        assert_eq!(comment.id, "c1");
        assert_eq!(comment.user.username, "bo");
    }

    #[test]
    fn decode_new_rating() {
        let text = r#"{"type":"new_rating","foodId":"f1","averageRating":4.5,"totalRatings":10}"#;
        let event = JsonCodec::new().decode(text).unwrap();
        assert_eq!(
            event,
            InboundEvent::RatingChanged {
                food_id: "f1".into(),
                average: 4.5,
                total: 10,
            }
        );
    }

    #[test]
    fn decode_ack_without_message() {
        let text = r#"{"type":"ack","action":"submit_comment","status":"posted"}"#;
        let event = JsonCodec::new().decode(text).unwrap();
        assert_eq!(
            event,
            InboundEvent::Ack(Ack {
                action: AckAction::SubmitComment,
                status: AckStatus::Posted,
                message: None,
            })
        );
    }

    #[test_case("not json at all" ; "plain text")]
    #[test_case("[1,2,3]" ; "array")]
    #[test_case("{\"type\":" ; "truncated")]
    #[test_case("{\"foodId\":\"f1\"}" ; "no type")]
    #[test_case("{\"type\":42}" ; "numeric type")]
    #[test_case("{\"type\":\"party\"}" ; "unknown type")]
    #[test_case("{\"type\":\"new_rating\",\"foodId\":\"f1\"}" ; "missing fields")]
    #[test_case("{\"type\":\"new_rating\",\"foodId\":\"\",\"averageRating\":1,\"totalRatings\":1}" ; "empty topic")]
    #[test_case("{\"type\":\"new_rating\",\"foodId\":\"f1\",\"averageRating\":-1,\"totalRatings\":1}" ; "negative average")]
    #[test_case("{\"type\":\"new_comment\",\"id\":\"\",\"foodId\":\"f1\",\"content\":\"x\",\"createdAt\":\"2024-05-01T12:00:00Z\",\"user\":{\"id\":\"u\",\"username\":\"n\"}}" ; "empty comment id")]
    #[test_case("{\"type\":\"new_comment\",\"id\":\"c1\",\"foodId\":\"f1\",\"content\":\"x\",\"createdAt\":\"yesterday\",\"user\":{\"id\":\"u\",\"username\":\"n\"}}" ; "bad timestamp")]
    fn decode_rejects_malformed(text: &str) {
        assert!(JsonCodec::new().decode(text).is_err());
    }

    #[test]
    fn decode_reports_unknown_type() {
        let err = JsonCodec::new().decode(r#"{"type":"party"}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnknownMessageType(t) if t == "party"));
    }

    #[test]
    fn decode_snippet_handles_multibyte() {
        let text = "é".repeat(80);
        let err = JsonCodec::new().decode(&text).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }
}
