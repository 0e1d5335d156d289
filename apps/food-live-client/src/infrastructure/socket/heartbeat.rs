//! Heartbeat Monitor
//!
//! Keeps an open connection honest with periodic pings. Any inbound frame
//! counts as a sign of life; if a ping goes unanswered for longer than the
//! timeout the connection is treated as closed and the normal reconnect
//! path takes over.
//!
//! Uses tokio's clock so paused-time tests drive it deterministically.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::infrastructure::config::SocketSettings;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// How long an unanswered ping may stay outstanding.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(20),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }

    /// Create configuration from `SocketSettings`. `None` when disabled.
    #[must_use]
    pub const fn from_settings(settings: &SocketSettings) -> Option<Self> {
        if settings.heartbeat_interval.is_zero() {
            return None;
        }
        Some(Self {
            ping_interval: settings.heartbeat_interval,
            pong_timeout: settings.heartbeat_timeout,
        })
    }
}

/// What the connection loop should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a ping frame.
    SendPing,
    /// The peer went silent; drop the connection.
    Timeout,
}

/// Per-connection heartbeat state.
#[derive(Debug)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    interval: Interval,
    last_seen: Instant,
    waiting_for_pong: bool,
}

impl Heartbeat {
    /// Start monitoring a freshly opened connection.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        let start = Instant::now() + config.ping_interval;
        let mut interval = tokio::time::interval_at(start, config.ping_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            config,
            interval,
            last_seen: Instant::now(),
            waiting_for_pong: false,
        }
    }

    /// Record inbound traffic (any frame, pongs included).
    pub fn record_activity(&mut self) {
        self.last_seen = Instant::now();
        self.waiting_for_pong = false;
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub const fn is_waiting_for_pong(&self) -> bool {
        self.waiting_for_pong
    }

    /// Wait for the next tick and decide what to do.
    pub async fn tick(&mut self) -> HeartbeatEvent {
        self.interval.tick().await;

        if self.waiting_for_pong {
            let elapsed = self.last_seen.elapsed();
            if elapsed > self.config.pong_timeout {
                tracing::warn!(
                    elapsed_secs = elapsed.as_secs(),
                    timeout_secs = self.config.pong_timeout.as_secs(),
                    "Heartbeat timeout detected"
                );
                return HeartbeatEvent::Timeout;
            }
        }

        self.waiting_for_pong = true;
        HeartbeatEvent::SendPing
    }
}

/// Tick an optional heartbeat; never resolves when disabled.
pub async fn tick_optional(heartbeat: Option<&mut Heartbeat>) -> HeartbeatEvent {
    match heartbeat {
        Some(hb) => hb.tick().await,
        None => std::future::pending().await,
    }
}
