//! Wire protocol for the streaming connection.
//!
//! Everything that crosses the websocket is normalized here: outbound
//! frames are built from [`ClientFrame`], and inbound text is decoded into
//! one of a closed set of [`StreamEvent`] values. Anything that fails
//! validation - malformed JSON, an unknown `type`, an impossible field -
//! becomes [`StreamEvent::Unrecognized`] and is dropped with a warning
//! rather than crashing the connection or leaking loosely-typed data
//! deeper into the engine.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ClientError, ClientResult};
use crate::orders::TradeEvent;

/// Frames sent from the client to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Authenticate the connection with a bearer credential
    Auth { token: String },
    /// Liveness probe
    Heartbeat,
}

impl ClientFrame {
    /// Serialize the frame to its wire representation.
    pub fn encode(&self) -> ClientResult<String> {
        serde_json::to_string(self).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

/// Raw inbound frame shape. Kept private; consumers only ever see the
/// validated [`StreamEvent`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    AuthAck,
    AuthFailure {
        #[serde(default)]
        reason: Option<String>,
    },
    HeartbeatAck,
    Trade(TradeEvent),
}

/// A validated inbound event.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Authentication accepted; the connection is live
    AuthAck,
    /// Authentication rejected
    AuthFailure { reason: Option<String> },
    /// Server acknowledged a heartbeat
    HeartbeatAck,
    /// One fill notification
    Trade(TradeEvent),
    /// Malformed or unknown frame; already logged, to be dropped
    Unrecognized,
}

/// Decode one inbound text frame.
pub fn decode_frame(raw: &str) -> StreamEvent {
    match serde_json::from_str::<ServerFrame>(raw) {
        Ok(ServerFrame::AuthAck) => StreamEvent::AuthAck,
        Ok(ServerFrame::AuthFailure { reason }) => StreamEvent::AuthFailure { reason },
        Ok(ServerFrame::HeartbeatAck) => StreamEvent::HeartbeatAck,
        Ok(ServerFrame::Trade(event)) => {
            if event.filled_quantity == 0 {
                warn!(event_id = %event.event_id, "discarding trade frame with zero quantity");
                return StreamEvent::Unrecognized;
            }
            StreamEvent::Trade(event)
        }
        Err(err) => {
            warn!(error = %err, "discarding unrecognized stream frame");
            StreamEvent::Unrecognized
        }
    }
}
