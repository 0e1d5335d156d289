//! Request/Response API Adapter
//!
//! Thin reqwest client for the food feed REST API. It shares its cookie jar
//! with the WebSocket handshake so both transports carry the same session.
//!
//! - `client`: Endpoints, envelope decoding, refresh-on-401
//! - `error`: `ApiError`
//! - `single_flight`: Deduplicates concurrent session refreshes

pub mod client;
pub mod error;
pub mod single_flight;

pub use client::{ApiClient, DEFAULT_PAGE_SIZE};
pub use error::ApiError;
pub use single_flight::SingleFlight;
