//! Domain Layer - Core feed types and pure state machines.
//!
//! This layer holds the feed entities, the realtime message types and the
//! pure logic for topic tracking and comment reconciliation. Nothing here
//! performs I/O.

/// Connection lifecycle states.
pub mod connection;

/// Feed entities and realtime message types.
pub mod feed;

/// Live buffer and merged comment view.
pub mod reconcile;

/// Active topic tracking and swap intents.
pub mod subscription;
