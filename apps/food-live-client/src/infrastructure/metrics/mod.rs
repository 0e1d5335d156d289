//! Prometheus Metrics Module
//!
//! Exposes client metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Inbound frames by kind, malformed frames dropped, stale events
//! - **Intents**: Outbound intents by kind, sends rejected while disconnected
//! - **Connection**: State gauge, reconnect attempts, transport errors by kind
//!
//! Without an installed recorder every call below is a no-op.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::connection::ConnectionState;

// =============================================================================
// Installation
// =============================================================================

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be set up.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();
    Ok(addr)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "food_live_frames_received_total",
        "Total inbound frames decoded, by message kind"
    );
    describe_counter!(
        "food_live_frames_dropped_total",
        "Total inbound frames dropped as malformed"
    );
    describe_counter!(
        "food_live_stale_events_total",
        "Total inbound events discarded for an inactive topic"
    );
    describe_counter!(
        "food_live_intents_sent_total",
        "Total outbound intents written, by kind"
    );
    describe_counter!(
        "food_live_send_rejected_total",
        "Total intents rejected because the connection was not open"
    );
    describe_counter!(
        "food_live_reconnects_total",
        "Total reconnection attempts scheduled"
    );
    describe_counter!(
        "food_live_transport_errors_total",
        "Total transport failures, by kind"
    );
    describe_gauge!(
        "food_live_connection_state",
        "Connection state (0 idle, 1 connecting, 2 open, 3 closed)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a decoded inbound frame.
pub fn record_frame_received(kind: &'static str) {
    counter!("food_live_frames_received_total", "kind" => kind).increment(1);
}

/// Record a malformed inbound frame.
pub fn record_frame_dropped() {
    counter!("food_live_frames_dropped_total").increment(1);
}

/// Record an event discarded for an inactive topic.
pub fn record_stale_event(kind: &'static str) {
    counter!("food_live_stale_events_total", "kind" => kind).increment(1);
}

/// Record an outbound intent written to the socket.
pub fn record_intent_sent(kind: &'static str) {
    counter!("food_live_intents_sent_total", "kind" => kind).increment(1);
}

/// Record an intent rejected while disconnected.
pub fn record_send_rejected(kind: &'static str) {
    counter!("food_live_send_rejected_total", "kind" => kind).increment(1);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("food_live_reconnects_total").increment(1);
}

/// Record a transport failure.
pub fn record_transport_error(kind: &'static str) {
    counter!("food_live_transport_errors_total", "kind" => kind).increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("food_live_connection_state").set(state.as_gauge());
}

// =============================================================================
// Tests
// =============================================================================
