//! Connection Manager
//!
//! Owns the single realtime connection and drives its lifecycle:
//!
//! ```text
//! start ──► Connecting ──► Open ──(drop)──► Closed ──(backoff)──► Connecting ...
//!                                                                    │
//! shutdown (any state) ──────────────────────────────────────────► Idle
//! ```
//!
//! One driver task runs per manager. It connects, marks the session open
//! (which queues the resubscribe), pumps outbound intents and inbound frames
//! until the connection drops, then waits out the reconnect delay. The
//! manager keeps the task handle, so a second `start` never spawns a second
//! socket; while a reconnect is pending it only cuts the wait short.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::codec::JsonCodec;
use super::heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatEvent, tick_optional};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{Connector, Frame, FrameSink, TransportError};
use crate::application::services::{LiveSession, MessageRouter, RouteOutcome};
use crate::domain::connection::ConnectionState;
use crate::domain::feed::OutboundIntent;
use crate::infrastructure::metrics;

/// Upper bound on flushing a close frame during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Driver State
// =============================================================================

struct Shared {
    url: String,
    connector: Arc<dyn Connector>,
    session: Arc<Mutex<LiveSession>>,
    router: Arc<MessageRouter>,
    reconnect: ReconnectConfig,
    heartbeat: Option<HeartbeatConfig>,
    codec: JsonCodec,
    driver: Mutex<Option<DriverHandle>>,
}

/// Slot for the running driver. The driver clears its own slot when it gives
/// up, under the same lock `start` checks, so a start is never swallowed.
struct DriverHandle {
    cancel: CancellationToken,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
    restart_requested: bool,
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Owns the realtime connection of one client.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.url)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager. Nothing connects until [`start`](Self::start).
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        session: Arc<Mutex<LiveSession>>,
        router: Arc<MessageRouter>,
        reconnect: ReconnectConfig,
        heartbeat: Option<HeartbeatConfig>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                connector,
                session,
                router,
                reconnect,
                heartbeat,
                codec: JsonCodec::new(),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Whether a driver task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared
            .driver
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Begin connecting.
    ///
    /// No-op while connecting or open. While a reconnect is pending the
    /// backoff is skipped and the attempt budget starts over. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        let mut driver = self.shared.driver.lock();

        if let Some(handle) = driver.as_mut()
            && !handle.task.is_finished()
        {
            if self.shared.session.lock().state() == ConnectionState::Closed {
                tracing::debug!("Start requested during backoff, reconnecting now");
                handle.restart_requested = true;
                handle.wake.notify_one();
            }
            return;
        }

        self.shared.set_state(ConnectionState::Connecting);

        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(Arc::clone(&self.shared).drive(cancel.clone(), Arc::clone(&wake)));

        *driver = Some(DriverHandle {
            cancel,
            wake,
            task,
            restart_requested: false,
        });
    }

    /// Stop the driver, close the connection and return to `Idle`.
    pub async fn shutdown(&self) {
        let handle = self.shared.driver.lock().take();

        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await
                && e.is_panic()
            {
                tracing::error!(error = %e, "Live connection driver panicked");
            }
        }

        self.shared.set_state(ConnectionState::Idle);
        tracing::info!("Live connection shut down");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.shared.driver.lock().take() {
            handle.cancel.cancel();
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.session.lock().transition(state);
        metrics::set_connection_state(state);
    }

    async fn drive(self: Arc<Self>, cancel: CancellationToken, wake: Arc<Notify>) {
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());

        loop {
            self.set_state(ConnectionState::Connecting);

            let connection_id = Uuid::new_v4();
            let span = tracing::info_span!("live_connection", %connection_id, url = %self.url);
            let result = self
                .connect_and_run(&cancel, &mut policy)
                .instrument(span)
                .await;

            let Err(error) = result else {
                tracing::debug!("Live connection driver cancelled");
                return;
            };
            if cancel.is_cancelled() {
                return;
            }

            tracing::warn!(error = %error, "Live connection lost");
            metrics::record_transport_error(error.kind());
            self.set_state(ConnectionState::Closed);

            let Some(delay) = self.next_delay(&mut policy, &wake) else {
                tracing::error!(
                    attempts = policy.attempt_count(),
                    "Maximum reconnection attempts exceeded, staying closed"
                );
                return;
            };

            metrics::record_reconnect();
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Reconnecting to live feed"
            );

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Cancelled during reconnect delay");
                    return;
                }
                () = wake.notified() => {}
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Pick the next reconnect delay under the driver lock. A pending restart
    /// resets the policy; giving up vacates the slot so the next `start`
    /// spawns a fresh driver.
    fn next_delay(&self, policy: &mut ReconnectPolicy, wake: &Arc<Notify>) -> Option<Duration> {
        let mut driver = self.driver.lock();
        let own = driver
            .as_mut()
            .filter(|handle| Arc::ptr_eq(&handle.wake, wake));

        if let Some(handle) = own
            && std::mem::take(&mut handle.restart_requested)
        {
            policy.reset();
        }

        let delay = policy.next_delay();
        if delay.is_none()
            && driver
                .as_ref()
                .is_some_and(|handle| Arc::ptr_eq(&handle.wake, wake))
        {
            *driver = None;
        }
        delay
    }

    /// Run one connection until it drops (`Err`) or is cancelled (`Ok`).
    async fn connect_and_run(
        &self,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), TransportError> {
        tracing::info!("Connecting to live feed");

        let (mut sink, mut stream) = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            connected = self.connector.connect(&self.url) => connected?,
        };

        policy.reset();
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();
        let resubscribed = self.session.lock().open(link_tx);
        metrics::set_connection_state(ConnectionState::Open);
        tracing::info!(
            resubscribed = resubscribed.as_ref().map(|i| i.topic().as_str()),
            "Live connection open"
        );

        let mut heartbeat = self.heartbeat.clone().map(Heartbeat::new);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Frame::Close)).await;
                    return Ok(());
                }
                Some(intent) = link_rx.recv() => {
                    self.write_intent(&mut sink, &intent).await?;
                }
                event = tick_optional(heartbeat.as_mut()) => match event {
                    HeartbeatEvent::SendPing => sink.send(Frame::Ping(Vec::new())).await?,
                    HeartbeatEvent::Timeout => {
                        return Err(TransportError::Closed("heartbeat timeout".to_string()));
                    }
                },
                frame = stream.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return Err(e),
                        None => return Err(TransportError::Closed("stream ended".to_string())),
                    };
                    if let Some(hb) = heartbeat.as_mut() {
                        hb.record_activity();
                    }
                    match frame {
                        Frame::Text(text) => self.handle_text(&text),
                        Frame::Ping(data) => sink.send(Frame::Pong(data)).await?,
                        Frame::Pong(_) => {}
                        Frame::Close => {
                            return Err(TransportError::Closed("server sent close frame".to_string()));
                        }
                    }
                }
            }
        }
    }

    async fn write_intent(
        &self,
        sink: &mut FrameSink,
        intent: &OutboundIntent,
    ) -> Result<(), TransportError> {
        let text = match self.codec.encode(intent) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, kind = intent.kind(), "Failed to encode intent");
                return Ok(());
            }
        };

        sink.send(Frame::Text(text)).await?;
        metrics::record_intent_sent(intent.kind());
        tracing::debug!(kind = intent.kind(), topic = %intent.topic(), "Intent sent");
        Ok(())
    }

    fn handle_text(&self, text: &str) {
        let event = match self.codec.decode(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                metrics::record_frame_dropped();
                return;
            }
        };

        let kind = event.kind();
        metrics::record_frame_received(kind);
        let outcome = self.router.route(&self.session, event);
        if outcome == RouteOutcome::StaleTopic {
            metrics::record_stale_event(kind);
        }
        tracing::trace!(kind, outcome = ?outcome, "Frame routed");
    }
}
