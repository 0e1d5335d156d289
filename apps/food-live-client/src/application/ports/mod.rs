//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Connector`: Opens the realtime transport and hands back a frame sink/stream pair
//! - `Notifier`: Fire-and-forget surface for human-readable messages

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

// =============================================================================
// Transport
// =============================================================================

/// One discrete message on the realtime transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 payload.
    Text(String),
    /// Keep-alive probe.
    Ping(Vec<u8>),
    /// Keep-alive answer.
    Pong(Vec<u8>),
    /// Peer is closing.
    Close,
}

/// Transport failure. Always leads to a reconnect.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The connection was closed by the peer or timed out.
    #[error("connection closed: {0}")]
    Closed(String),
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),
}

impl TransportError {
    /// Short label used in metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Closed(_) => "closed",
            Self::Send(_) => "send",
        }
    }
}

/// Outgoing half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Incoming half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Opens realtime connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url`, returning the write and read halves.
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}

// =============================================================================
// Notifications
// =============================================================================

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Something happened.
    Info,
    /// A request went through.
    Success,
    /// A request failed.
    Error,
}

/// Human-readable message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Text to display.
    pub message: String,
}

impl Notification {
    /// Informational notification.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    /// Success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// Error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Non-blocking sink for notifications. Implementations must not await.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Deliver a notification.
    fn notify(&self, notification: Notification);
}
