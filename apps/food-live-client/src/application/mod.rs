//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (transport, notifications).
pub mod ports;

/// Application services for live state and message routing.
pub mod services;
