//! Realtime Socket Adapters
//!
//! Everything that touches the WebSocket: wire codec, reconnect policy,
//! heartbeat, the tungstenite connector, the connection driver and the
//! `LiveClient` facade built on top of them.

pub mod client;
pub mod codec;
pub mod connection;
pub mod heartbeat;
pub mod reconnect;
pub mod transport;

pub use client::{LiveClient, LiveClientConfig, NOT_CONNECTED_MESSAGE};
pub use codec::{CodecError, JsonCodec};
pub use connection::ConnectionManager;
pub use heartbeat::HeartbeatConfig;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use transport::TungsteniteConnector;
