//! Client Configuration Settings
//!
//! Configuration types for the live client, loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::domain::reconcile::DEFAULT_LIVE_CAPACITY;

/// Request/response API settings.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Absolute base URL of the API, e.g. `https://host/api/v1`.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Realtime socket settings.
#[derive(Debug, Clone)]
pub struct SocketSettings {
    /// Host, optional port and path of the WebSocket endpoint.
    pub host: String,
    /// Heartbeat ping interval (zero disables the heartbeat).
    pub heartbeat_interval: Duration,
    /// Heartbeat timeout before considering the connection dead.
    pub heartbeat_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier (1.0 keeps the delay fixed).
    pub reconnect_delay_multiplier: f64,
    /// Reconnection jitter as a fraction of the delay.
    pub reconnect_jitter: f64,
    /// Maximum consecutive reconnection attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Live comments kept for the watched food.
    pub live_buffer_capacity: usize,
    /// Capacity of the notification broadcast channel.
    pub notification_capacity: usize,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            host: "localhost:3000".to_string(),
            heartbeat_interval: Duration::from_secs(20),
            heartbeat_timeout: Duration::from_secs(20),
            reconnect_delay_initial: Duration::from_millis(3000),
            reconnect_delay_max: Duration::from_millis(3000),
            reconnect_delay_multiplier: 1.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 0, // Unlimited
            live_buffer_capacity: DEFAULT_LIVE_CAPACITY,
            notification_capacity: 64,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API settings.
    pub api: ApiSettings,
    /// Socket settings.
    pub socket: SocketSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing, empty or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing, empty or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = required(&lookup, "FOODFEED_API_URL")?;
        let host = required(&lookup, "FOODFEED_SOCKET_HOST")?;

        let base_url = Url::parse(&api_url).map_err(|e| ConfigError::InvalidUrl {
            key: "FOODFEED_API_URL",
            reason: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                key: "FOODFEED_API_URL",
                reason: format!("unsupported scheme {}", base_url.scheme()),
            });
        }

        let defaults = SocketSettings::default();
        let mut socket = SocketSettings {
            host: host.trim_end_matches('/').to_string(),
            heartbeat_interval: parse_env_duration_secs(
                &lookup,
                "FOODFEED_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                &lookup,
                "FOODFEED_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                &lookup,
                "FOODFEED_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_millis(
                &lookup,
                "FOODFEED_RECONNECT_DELAY_MAX_MS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env(
                &lookup,
                "FOODFEED_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_env(
                &lookup,
                "FOODFEED_RECONNECT_JITTER",
                defaults.reconnect_jitter,
            ),
            max_reconnect_attempts: parse_env(
                &lookup,
                "FOODFEED_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            live_buffer_capacity: parse_env(
                &lookup,
                "FOODFEED_LIVE_BUFFER_CAPACITY",
                defaults.live_buffer_capacity,
            ),
            notification_capacity: parse_env(
                &lookup,
                "FOODFEED_NOTIFICATION_CAPACITY",
                defaults.notification_capacity,
            ),
        };
        validate_reconnect(&mut socket)?;

        let api = ApiSettings {
            base_url,
            timeout: parse_env_duration_secs(
                &lookup,
                "FOODFEED_HTTP_TIMEOUT_SECS",
                Duration::from_secs(10),
            ),
        };

        Ok(Self {
            api,
            socket,
            metrics_port: parse_env(&lookup, "FOODFEED_METRICS_PORT", 0),
        })
    }

    /// WebSocket URL: `wss` when the API is served over https, `ws` otherwise.
    #[must_use]
    pub fn socket_url(&self) -> String {
        let scheme = if self.api.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        format!("{scheme}://{}", self.socket.host)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(&'static str),
    /// Environment variable is not a usable URL.
    #[error("environment variable {key} is not a valid URL: {reason}")]
    InvalidUrl {
        /// Variable name.
        key: &'static str,
        /// Parse failure.
        reason: String,
    },
    /// Environment variable parsed but is out of range.
    #[error("environment variable {key} is invalid: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Constraint that was violated.
        reason: &'static str,
    },
}

/// Reject reconnect settings that would panic or spin the driver, and raise
/// the cap to the initial delay when it is below it.
fn validate_reconnect(socket: &mut SocketSettings) -> Result<(), ConfigError> {
    if socket.reconnect_delay_initial.is_zero() {
        return Err(ConfigError::InvalidValue {
            key: "FOODFEED_RECONNECT_DELAY_INITIAL_MS",
            reason: "must be greater than zero",
        });
    }
    if !socket.reconnect_delay_multiplier.is_finite() || socket.reconnect_delay_multiplier < 1.0 {
        return Err(ConfigError::InvalidValue {
            key: "FOODFEED_RECONNECT_DELAY_MULTIPLIER",
            reason: "must be a finite number of at least 1.0",
        });
    }
    if !(0.0..=1.0).contains(&socket.reconnect_jitter) {
        return Err(ConfigError::InvalidValue {
            key: "FOODFEED_RECONNECT_JITTER",
            reason: "must be between 0.0 and 1.0",
        });
    }
    socket.reconnect_delay_max = socket.reconnect_delay_max.max(socket.reconnect_delay_initial);
    Ok(())
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or(ConfigError::MissingEnvVar(key))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key));
    }
    Ok(value.trim().to_string())
}

fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
