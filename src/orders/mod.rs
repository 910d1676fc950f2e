//! Client-side order model and state tracking.
//!
//! This module is the authoritative local view of the user's orders:
//! - `types` - identifiers, enums and the order status state machine
//! - `order` - the `Order` struct with fill and cancellation mutations
//! - `tracker` - the single-writer collection that applies stream events,
//!   cancellation results and polled snapshots

mod order;
mod tracker;
mod types;

pub use order::{Order, OrderError};
pub use tracker::{NotificationSink, OrderTracker, TradeAlert, DEFAULT_DEDUPE_WINDOW};
pub use types::{
    BatchCancelAck, CancelAck, EventId, OrderId, OrderKind, OrderSide, OrderSnapshot, OrderStatus,
    TradeEvent,
};
