//! Configuration Module
//!
//! Environment-driven configuration for the live client.

mod settings;

pub use settings::{ApiSettings, ClientConfig, ConfigError, SocketSettings};
