//! Reconnection Policy
//!
//! Delay schedule for re-establishing the realtime connection after it drops.
//!
//! The default is a fixed 3 second delay retried forever. Setting a
//! multiplier above one, a jitter factor and a cap turns it into capped
//! exponential backoff; a non-zero `max_attempts` makes the client give up.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::SocketSettings;

/// Delay between reconnect attempts when nothing else is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt (1.0 keeps it fixed).
    pub multiplier: f64,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Maximum number of consecutive attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Same delay before every attempt, retried forever.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Doubling backoff from one second up to thirty, with 10% jitter.
    #[must_use]
    pub const fn exponential() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }

    /// Create configuration from `SocketSettings`.
    #[must_use]
    pub const fn from_settings(settings: &SocketSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: settings.reconnect_jitter,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Reconnection policy implementing the configured delay schedule.
///
/// # Example
///
/// ```rust
/// use food_live_client::infrastructure::socket::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(3)));
///
/// // Connection opened again
/// policy.reset();
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub fn new(mut config: ReconnectConfig) -> Self {
        config.max_delay = config.max_delay.max(config.initial_delay);
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Get the next delay, or `None` once `max_attempts` is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count += 1;
        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        // Never shrink below the initial delay
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis
            .max(self.config.initial_delay.as_millis())
            .min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay_with_jitter)
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if !self.config.jitter_factor.is_finite() || self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_three_seconds_forever() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        for _ in 0..50 {
            assert_eq!(policy.next_delay(), Some(Duration::from_millis(3000)));
        }
        assert!(policy.should_retry());
    }

    #[test]
    fn exponential_backoff_doubles() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        };
        let mut policy = ReconnectPolicy::new(config);

        let delays: Vec<_> = (0..4).map(|_| policy.next_delay().unwrap()).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 800].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn delay_is_capped() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
            multiplier: 4.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        };
        let mut policy = ReconnectPolicy::new(config);

        let _ = policy.next_delay();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let config = ReconnectConfig {
            max_attempts: 3,
            ..ReconnectConfig::fixed(Duration::from_millis(10))
        };
        let mut policy = ReconnectPolicy::new(config);

        for expected in 1..=3 {
            assert!(policy.next_delay().is_some());
            assert_eq!(policy.attempt_count(), expected);
        }
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
    }

    #[test]
    fn reset_restores_initial_state() {
        let config = ReconnectConfig {
            max_attempts: 3,
            ..ReconnectConfig::exponential()
        };
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            jitter_factor: 0.0,
            ..config
        });

        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn non_finite_jitter_is_ignored() {
        for jitter_factor in [f64::NAN, f64::INFINITY] {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                jitter_factor,
                ..ReconnectConfig::default()
            });
            assert_eq!(policy.next_delay(), Some(DEFAULT_RECONNECT_DELAY));
        }
    }

    #[test]
    fn shrinking_multiplier_keeps_initial_delay() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(10),
            multiplier: -1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        });
        for _ in 0..4 {
            assert_eq!(policy.next_delay(), Some(Duration::from_secs(3)));
        }
    }

    #[test]
    fn cap_below_initial_delay_is_raised() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(3),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        });
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                initial_delay: Duration::from_millis(1000),
                ..ReconnectConfig::exponential()
            });

            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of range");
        }
    }
}
