//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loaded from the environment.
pub mod config;

/// REST API client with session refresh.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Broadcast channel notifier.
pub mod notify;

/// WebSocket connector, codec and connection driver.
pub mod socket;

/// OpenTelemetry tracing integration.
pub mod telemetry;
