//! Core order types and enums.
//!
//! This module defines the fundamental types of the order model:
//! - `OrderSide` - Buy or Sell
//! - `OrderKind` - Market or Limit
//! - `OrderStatus` - lifecycle states with controlled transitions
//! - `TradeEvent` - one incremental fill notification from the stream
//! - `OrderSnapshot` / `CancelAck` / `BatchCancelAck` - shapes returned by
//!   the pull-fallback and order-entry collaborators

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Create a new OrderId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a trade event, used for idempotent application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Create a new EventId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Order side indicating buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind determining execution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Market order - execute immediately at best available price
    Market,
    /// Limit order - execute at the limit price or better
    Limit,
}

impl OrderKind {
    /// Returns true if this order kind requires a limit price
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderKind::Limit)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Order status representing the current state in the order lifecycle.
///
/// State transitions:
/// ```text
/// Pending ─┬→ PartiallyComplete ─┬→ PartiallyComplete
///          │                     ├→ Completed
///          │                     └→ Cancelled
///          ├→ Completed
///          ├→ Cancelled
///          └→ Failed
/// ```
///
/// `Completed`, `Cancelled` and `Failed` are terminal: once reached, no
/// further transitions are accepted for that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted by the server, no fills yet
    Pending,
    /// Some quantity executed, some remaining
    PartiallyComplete,
    /// Fully executed (terminal)
    Completed,
    /// Cancelled; any executed portion is kept (terminal)
    Cancelled,
    /// Rejected or failed before any execution (terminal)
    Failed,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    /// Returns true if the order is still active/open
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyComplete)
    }

    /// Check if a transition from this status to the target is valid
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        match self {
            OrderStatus::Pending => matches!(
                target,
                OrderStatus::PartiallyComplete
                    | OrderStatus::Completed
                    | OrderStatus::Cancelled
                    | OrderStatus::Failed
            ),
            OrderStatus::PartiallyComplete => matches!(
                target,
                OrderStatus::PartiallyComplete | OrderStatus::Completed | OrderStatus::Cancelled
            ),
            // Terminal states cannot transition
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed => false,
        }
    }

    /// Position of this status in the lifecycle, for comparing how far two
    /// views of the same order have progressed. All terminal states share
    /// the final rank.
    pub fn progress_rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::PartiallyComplete => 1,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed => 2,
        }
    }

    /// Returns true if this status is equal-or-later than `other` in the
    /// lifecycle ordering.
    pub fn is_at_least(&self, other: OrderStatus) -> bool {
        self.progress_rank() >= other.progress_rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::PartiallyComplete => write!(f, "PARTIALLY_COMPLETE"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One incremental fill notification from the stream.
///
/// A single fill references both sides of a match: `order_id` is the buy
/// order and `counter_order_id` the sell order. Field names follow the wire
/// contract of the streaming server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    /// Idempotency key; applying the same event twice is a no-op
    pub event_id: EventId,
    /// Buy-side order of the match
    pub order_id: OrderId,
    /// Sell-side order of the match
    pub counter_order_id: OrderId,
    /// Instrument identifier
    pub symbol: String,
    /// Execution price
    pub price: Decimal,
    /// Executed quantity of this fill
    pub filled_quantity: u64,
    /// When the fill executed on the server
    pub executed_at: DateTime<Utc>,
}

/// Authoritative order state as returned by the pull fallback (`GET /orders`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrderSnapshot {
    /// Order identifier
    pub id: OrderId,
    /// Instrument identifier
    pub symbol: String,
    /// Buy or Sell
    pub side: OrderSide,
    /// Market or Limit
    pub kind: OrderKind,
    /// Limit price, present for limit orders
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Quantity originally ordered
    pub original_quantity: u64,
    /// Quantity still unfilled
    pub remaining_quantity: u64,
    /// Server-side status
    pub status: OrderStatus,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order last changed
    pub updated_at: DateTime<Utc>,
}

/// Result of a single-order cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAck {
    /// Whether the server accepted the cancellation
    pub success: bool,
    /// Reason for a rejected cancellation
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of a "cancel all partially-complete orders" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchCancelAck {
    /// Orders the server actually cancelled
    pub cancelled_order_ids: Vec<OrderId>,
}
