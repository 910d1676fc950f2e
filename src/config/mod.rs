//! Configuration types for the trade-stream engine.
//!
//! These types are designed to be deserialized from TOML configuration files
//! or constructed directly in code. Every tunable carries a serde default so
//! partial configuration files work.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    /// Streaming connection configuration
    #[serde(default)]
    pub stream: StreamConfig,
    /// REST fallback configuration
    #[serde(default)]
    pub rest: RestConfig,
    /// Polling fallback configuration
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Streaming connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket URL
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Transport connect + authentication timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Heartbeat send interval in seconds
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Maximum silence before the connection is declared dead, in seconds.
    /// Should be a small multiple of the heartbeat interval.
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,
    /// Initial reconnection delay in milliseconds
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Maximum reconnection delay in milliseconds
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

fn default_ws_url() -> String {
    String::new()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_liveness_timeout_secs() -> u64 {
    90
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            liveness_timeout_secs: default_liveness_timeout_secs(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

impl StreamConfig {
    /// Returns the connect timeout as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the heartbeat interval as a Duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Returns the liveness timeout as a Duration.
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    /// Returns the initial reconnection delay as a Duration.
    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }

    /// Returns the maximum reconnection delay as a Duration.
    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }
}

/// REST API configuration for the pull fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL for the REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_rest_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    String::new()
}

fn default_rest_timeout_ms() -> u64 {
    5_000
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_rest_timeout_ms(),
        }
    }
}

impl RestConfig {
    /// Returns the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Polling fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Snapshot poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// How long the stream must stay down before polling activates,
    /// in milliseconds. Avoids flapping on momentary reconnects.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_grace_period_ms() -> u64 {
    2_000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

impl PollingConfig {
    /// Returns the poll interval as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the activation grace period as a Duration.
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
