//! Connection Lifecycle
//!
//! States of the single realtime connection. The state machine is driven by
//! the connection manager; everything else only observes it.
//!
//! ```text
//! Idle ──start──► Connecting ──opened──► Open
//!                    ▲   │                 │
//!                    │   └──failed──┐      │ closed
//!                    │              ▼      ▼
//!                    └──backoff── Closed ◄─┘
//! ```

use std::fmt;

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Never started, or shut down.
    #[default]
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The channel is usable.
    Open,
    /// The channel dropped; a reconnect may be pending.
    Closed,
}

impl ConnectionState {
    /// Whether intents can be sent.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Lowercase label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Numeric encoding for the state gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Connecting => 1.0,
            Self::Open => 2.0,
            Self::Closed => 3.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
