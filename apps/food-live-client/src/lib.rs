#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Food Live Client - Realtime Feed Synchronization
//!
//! Keeps one WebSocket connection to the food feed server, tracks which
//! food is being watched, and reconciles pushed comments and ratings with
//! the snapshot fetched over HTTP.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and rules
//!   - `feed`: Foods, comments, ratings, inbound events and outbound intents
//!   - `connection`: Connection lifecycle states
//!   - `subscription`: Active topic and the subscribe/unsubscribe it implies
//!   - `reconcile`: Live comment buffer and snapshot merging
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport connector, notifier
//!   - `services`: Live session state, inbound message routing
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `socket`: WebSocket connector, wire codec, reconnect, heartbeat, `LiveClient`
//!   - `http`: REST API client with single-flight session refresh
//!   - `notify`: Broadcast notifier
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Prometheus and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//!                 set_topic / rate / post_comment
//!                              │
//!                              ▼
//!  Server WS ◄──── intents ── LiveSession ──► merged view, live rating
//!      │                           ▲
//!      └──── frames ──► codec ──► MessageRouter ──► Notifier
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core feed types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::ConnectionState;
pub use domain::feed::{
    Ack, AckAction, AckStatus, Comment, FoodDetail, FoodId, FoodListItem, FoodPage, InboundEvent,
    OutboundIntent, Rating, RatingUpdate, User,
};
pub use domain::reconcile::{LiveBuffer, LiveRating, merge_comments};
pub use domain::subscription::SubscriptionManager;

// Ports and services
pub use application::ports::{
    Connector, Frame, FrameSink, FrameStream, Notification, NotificationLevel, Notifier,
    TransportError,
};
pub use application::services::{ClientContext, LiveClientError, RouteOutcome};

// Infrastructure
pub use infrastructure::config::{ApiSettings, ClientConfig, ConfigError, SocketSettings};
pub use infrastructure::http::{ApiClient, ApiError};
pub use infrastructure::notify::BroadcastNotifier;
pub use infrastructure::socket::{
    CodecError, HeartbeatConfig, JsonCodec, LiveClient, LiveClientConfig, ReconnectConfig,
    TungsteniteConnector,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
