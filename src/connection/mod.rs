//! Streaming connection supervision.
//!
//! The [`ConnectionManager`] owns the lifecycle of exactly one logical
//! streaming connection at a time: open the transport, authenticate it,
//! prove liveness with heartbeats, decode inbound frames, and reconnect
//! with capped exponential backoff when anything fails. The current
//! [`ConnectionPhase`] is published through a watch channel so dependents
//! (the UI's "disconnected" banner, the polling fallback) can react to
//! every transition without polling.

mod heartbeat;

pub use heartbeat::HeartbeatMonitor;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::auth::TokenSupplier;
use crate::config::StreamConfig;
use crate::error::{ClientError, ClientResult, ErrorClassification};
use crate::orders::{NotificationSink, OrderTracker};
use crate::protocol::{decode_frame, ClientFrame, StreamEvent};

/// Lifecycle of the logical streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No transport; a reconnect may be pending
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Transport open, waiting for the auth acknowledgement
    Authenticating,
    /// Authenticated and receiving events
    Live,
    /// Shutting down deliberately; no reconnect will follow
    Closing,
}

impl ConnectionPhase {
    /// Returns true if the stream is authenticated and receiving events.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionPhase::Live)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionPhase::Connecting => write!(f, "CONNECTING"),
            ConnectionPhase::Authenticating => write!(f, "AUTHENTICATING"),
            ConnectionPhase::Live => write!(f, "LIVE"),
            ConnectionPhase::Closing => write!(f, "CLOSING"),
        }
    }
}

/// Supervises one logical streaming connection.
///
/// There is exactly one supervision loop per manager ([`run`](Self::run)),
/// so there is never more than one transport or one pending reconnect
/// timer. Reconnection retries indefinitely - the backoff delay is capped,
/// the attempt count is not - because a long-lived client page must always
/// eventually recover; prolonged outage is surfaced through the phase
/// watch rather than by giving up.
pub struct ConnectionManager {
    config: StreamConfig,
    supplier: Arc<dyn TokenSupplier>,
    tracker: Arc<OrderTracker>,
    sink: Arc<dyn NotificationSink>,
    phase_tx: watch::Sender<ConnectionPhase>,
    reconnect_attempts: AtomicU32,
}

impl ConnectionManager {
    /// Create a new manager. Nothing connects until [`run`](Self::run) is
    /// spawned.
    pub fn new(
        config: StreamConfig,
        supplier: Arc<dyn TokenSupplier>,
        tracker: Arc<OrderTracker>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ConnectionPhase::Disconnected);
        Self {
            config,
            supplier,
            tracker,
            sink,
            phase_tx,
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase transitions.
    pub fn phase_watch(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase_tx.subscribe()
    }

    /// Number of consecutive failed connection attempts.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        let changed = self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
        if changed {
            info!(%phase, "connection phase changed");
        }
    }

    /// Reconnection delay before the given attempt, without jitter.
    ///
    /// Doubles from the initial delay and is capped at the configured
    /// maximum; the exponent is clamped so large attempt counts cannot
    /// overflow.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_initial_delay();
        let max = self.config.reconnect_max_delay();
        let factor = 2u32.saturating_pow(attempt.min(16));
        base.saturating_mul(factor).min(max)
    }

    /// Add uniform random jitter in `[0, delay / 2)` so reconnecting
    /// clients don't synchronize against a recovering server.
    fn with_jitter(delay: Duration) -> Duration {
        let half = delay.as_millis() as u64 / 2;
        if half == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..half))
    }

    /// Run the supervision loop until shutdown is signaled.
    ///
    /// Every suspension point - transport open, auth wait, reconnect sleep -
    /// also selects on the shutdown channel, so a shutdown synchronously
    /// cancels any pending reconnect timer instead of letting it fire later.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }

            match self.run_attempt(&mut shutdown).await {
                Err(ClientError::Shutdown) => break,
                Err(err) => {
                    self.set_phase(ConnectionPhase::Disconnected);
                    let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
                    let delay = Self::with_jitter(self.backoff_delay(attempt));
                    if err.is_transient() {
                        warn!(
                            error = %err,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "stream connection lost, reconnecting"
                        );
                    } else {
                        error!(
                            error = %err,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "stream connection failed, reconnecting"
                        );
                    }
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = sleep(delay) => {}
                    }
                }
                Ok(()) => break,
            }
        }
        self.set_phase(ConnectionPhase::Disconnected);
    }

    /// Run one connection attempt to completion.
    ///
    /// Returns `Err(ClientError::Shutdown)` on deliberate shutdown and any
    /// other error when the connection should be retried.
    async fn run_attempt(&self, shutdown: &mut broadcast::Receiver<()>) -> ClientResult<()> {
        // A failed auth invalidates the supplier's cache, so this re-fetch
        // never replays a rejected token.
        let token = self.supplier.token().await?;

        url::Url::parse(&self.config.ws_url)
            .map_err(|e| ClientError::Configuration(format!("invalid stream url: {e}")))?;

        self.set_phase(ConnectionPhase::Connecting);
        debug!(url = %self.config.ws_url, "opening stream transport");

        let ws = tokio::select! {
            _ = shutdown.recv() => {
                self.set_phase(ConnectionPhase::Closing);
                return Err(ClientError::Shutdown);
            }
            result = timeout(self.config.connect_timeout(), connect_async(&self.config.ws_url)) => {
                match result {
                    Err(_) => return Err(ClientError::Timeout(self.config.connect_timeout())),
                    Ok(Err(e)) => return Err(ClientError::Connection(e.to_string())),
                    Ok(Ok((ws, _response))) => ws,
                }
            }
        };

        let (mut write, mut read) = ws.split();

        self.set_phase(ConnectionPhase::Authenticating);
        let auth = ClientFrame::Auth { token }.encode()?;
        write
            .send(Message::Text(auth))
            .await
            .map_err(|e| ClientError::Stream(format!("failed to send auth frame: {e}")))?;

        let mut monitor = HeartbeatMonitor::new(self.config.liveness_timeout());
        let mut heartbeat = interval(self.config.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await; // consume the immediate first tick

        // Bound the wait for the auth acknowledgement.
        let auth_deadline = sleep(self.config.connect_timeout());
        tokio::pin!(auth_deadline);

        let mut live = false;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.set_phase(ConnectionPhase::Closing);
                    let _ = write.close().await;
                    return Err(ClientError::Shutdown);
                }

                _ = &mut auth_deadline, if !live => {
                    return Err(ClientError::Timeout(self.config.connect_timeout()));
                }

                _ = heartbeat.tick(), if live => {
                    if monitor.is_stale() {
                        // Half-open connection: transport never reported a
                        // close but the server has gone silent.
                        return Err(ClientError::Stream(format!(
                            "no server activity for {:?}",
                            monitor.idle_for()
                        )));
                    }
                    let frame = ClientFrame::Heartbeat.encode()?;
                    write
                        .send(Message::Text(frame))
                        .await
                        .map_err(|e| ClientError::Stream(format!("heartbeat send failed: {e}")))?;
                }

                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => Some(text),
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                            Ok(text) => Some(text),
                            Err(_) => {
                                warn!("discarding non-utf8 binary frame");
                                None
                            }
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            monitor.record_activity();
                            let _ = write.send(Message::Pong(payload)).await;
                            None
                        }
                        Some(Ok(Message::Pong(_))) => {
                            monitor.record_activity();
                            None
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Err(ClientError::Stream(format!(
                                "server closed connection: {frame:?}"
                            )));
                        }
                        Some(Ok(Message::Frame(_))) => None,
                        Some(Err(e)) => return Err(ClientError::Connection(e.to_string())),
                        None => return Err(ClientError::Stream("stream ended".to_string())),
                    };

                    let Some(text) = text else { continue };
                    monitor.record_activity();

                    match decode_frame(&text) {
                        StreamEvent::AuthAck => {
                            if !live {
                                live = true;
                                self.reconnect_attempts.store(0, Ordering::SeqCst);
                                self.set_phase(ConnectionPhase::Live);
                                info!("stream authenticated and live");
                            }
                        }
                        StreamEvent::AuthFailure { reason } => {
                            let reason =
                                reason.unwrap_or_else(|| "authentication rejected".to_string());
                            // The token is stale; make sure the next attempt
                            // fetches a fresh one.
                            self.supplier.invalidate().await;
                            self.sink.auth_failed(&reason);
                            let _ = write.close().await;
                            return Err(ClientError::Authentication(reason));
                        }
                        StreamEvent::HeartbeatAck => {
                            debug!("heartbeat acknowledged");
                        }
                        StreamEvent::Trade(event) => {
                            self.tracker.apply_trade(&event).await;
                        }
                        StreamEvent::Unrecognized => {}
                    }
                }
            }
        }
    }
}
