//! Liveness accounting for the streaming connection.

use std::time::{Duration, Instant};

/// Tracks proof-of-life for one connection.
///
/// Any inbound traffic counts as liveness, not just explicit heartbeat
/// acknowledgements. When nothing has been observed for longer than the
/// liveness timeout the connection is half-open: the transport still looks
/// established but the server has stopped responding, and the supervisor
/// must tear it down and reconnect.
pub struct HeartbeatMonitor {
    liveness_timeout: Duration,
    last_activity: Instant,
}

impl HeartbeatMonitor {
    /// Create a monitor that declares the connection stale after
    /// `liveness_timeout` of silence.
    pub fn new(liveness_timeout: Duration) -> Self {
        Self {
            liveness_timeout,
            last_activity: Instant::now(),
        }
    }

    /// Record inbound traffic.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// How long the server has been silent.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Returns true if the server has been silent past the timeout.
    pub fn is_stale(&self) -> bool {
        self.idle_for() > self.liveness_timeout
    }
}
