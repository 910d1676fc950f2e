//! The `Order` struct and its lifecycle mutations.
//!
//! An order is created `Pending` once the server accepts a placement and is
//! mutated only through the operations here: fills, cancellation of the
//! unfilled remainder, failure, and snapshot merges. Every mutation goes
//! through the status state machine so a terminal order can never change
//! again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{OrderId, OrderKind, OrderSide, OrderSnapshot, OrderStatus};

/// One trading instruction and its execution progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Server-assigned identifier
    pub id: OrderId,
    /// Instrument identifier
    pub symbol: String,
    /// Buy or Sell
    pub side: OrderSide,
    /// Market or Limit
    pub kind: OrderKind,
    /// Limit price, present for limit orders
    pub limit_price: Option<Decimal>,
    /// Quantity originally ordered; immutable once set
    pub original_quantity: u64,
    /// Quantity still unfilled; monotonically non-increasing
    pub remaining_quantity: u64,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Volume-weighted average fill price
    pub avg_fill_price: Option<Decimal>,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order last changed
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a pending market order.
    pub fn market(
        id: impl Into<OrderId>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
    ) -> Result<Self, OrderError> {
        Self::new(id.into(), symbol.into(), side, OrderKind::Market, None, quantity)
    }

    /// Create a pending limit order.
    pub fn limit(
        id: impl Into<OrderId>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
        price: Decimal,
    ) -> Result<Self, OrderError> {
        Self::new(
            id.into(),
            symbol.into(),
            side,
            OrderKind::Limit,
            Some(price),
            quantity,
        )
    }

    fn new(
        id: OrderId,
        symbol: String,
        side: OrderSide,
        kind: OrderKind,
        limit_price: Option<Decimal>,
        quantity: u64,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity,
                reason: "quantity must be positive".to_string(),
            });
        }

        if kind.requires_price() {
            match limit_price {
                None => return Err(OrderError::MissingLimitPrice { kind }),
                Some(price) if price <= Decimal::ZERO => {
                    return Err(OrderError::InvalidPrice {
                        price,
                        reason: "limit price must be positive".to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        let now = Utc::now();
        Ok(Self {
            id,
            symbol,
            side,
            kind,
            limit_price,
            original_quantity: quantity,
            remaining_quantity: quantity,
            status: OrderStatus::Pending,
            avg_fill_price: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild an order from an authoritative server snapshot.
    pub fn from_snapshot(snap: &OrderSnapshot) -> Result<Self, OrderError> {
        if snap.remaining_quantity > snap.original_quantity {
            return Err(OrderError::InvalidQuantity {
                quantity: snap.remaining_quantity,
                reason: format!(
                    "remaining exceeds original quantity {}",
                    snap.original_quantity
                ),
            });
        }
        let remaining = if snap.status == OrderStatus::Completed {
            0
        } else {
            snap.remaining_quantity
        };
        Ok(Self {
            id: snap.id.clone(),
            symbol: snap.symbol.clone(),
            side: snap.side,
            kind: snap.kind,
            limit_price: snap.limit_price,
            original_quantity: snap.original_quantity,
            remaining_quantity: remaining,
            status: snap.status,
            avg_fill_price: None,
            created_at: snap.created_at,
            updated_at: snap.updated_at,
        })
    }

    // === State queries ===

    /// Returns the quantity executed so far.
    pub fn executed_quantity(&self) -> u64 {
        self.original_quantity - self.remaining_quantity
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the order is still active.
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    // === State transitions ===

    /// Apply a status change to the order.
    ///
    /// Returns an error if the transition is invalid according to the
    /// state machine.
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
                order_id: self.id.clone(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a fill on the order.
    ///
    /// The fill quantity is clamped to the remaining quantity, so an
    /// over-reported fill can never drive `remaining_quantity` negative.
    pub fn apply_fill(&mut self, quantity: u64, price: Decimal) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::Terminal {
                order_id: self.id.clone(),
            });
        }
        if quantity == 0 {
            return Ok(());
        }

        let fill = quantity.min(self.remaining_quantity);

        // Volume-weighted average across all fills.
        let executed_before = self.executed_quantity();
        let executed_after = executed_before + fill;
        self.avg_fill_price = Some(match self.avg_fill_price {
            Some(avg) => {
                (avg * Decimal::from(executed_before) + price * Decimal::from(fill))
                    / Decimal::from(executed_after)
            }
            None => price,
        });

        self.remaining_quantity -= fill;

        let target = if self.remaining_quantity == 0 {
            OrderStatus::Completed
        } else {
            OrderStatus::PartiallyComplete
        };
        self.transition_to(target)
    }

    /// Cancel the unfilled remainder of the order.
    ///
    /// The executed portion is kept; `remaining_quantity` is frozen at its
    /// current value and the order becomes terminal.
    pub fn cancel_remainder(&mut self) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::Terminal {
                order_id: self.id.clone(),
            });
        }
        self.transition_to(OrderStatus::Cancelled)
    }

    /// Mark the order as failed. Only valid before any execution.
    pub fn fail(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Failed)
    }

    /// Merge an authoritative snapshot into this order. The caller is
    /// responsible for checking that the snapshot is not stale; this method
    /// only enforces the data-model invariants.
    ///
    /// Returns true if anything changed.
    pub(crate) fn merge_snapshot(&mut self, snap: &OrderSnapshot) -> bool {
        let remaining = if snap.status == OrderStatus::Completed {
            0
        } else {
            snap.remaining_quantity.min(self.original_quantity)
        };
        if snap.status == self.status && remaining == self.remaining_quantity {
            return false;
        }
        self.remaining_quantity = remaining;
        self.status = snap.status;
        self.updated_at = snap.updated_at;
        true
    }
}

/// Errors that can occur during order operations.
#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Invalid transition from {from} to {to} for order {order_id}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        order_id: OrderId,
    },

    #[error("Order {order_id} is terminal and cannot change")]
    Terminal { order_id: OrderId },

    #[error("Invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: u64, reason: String },

    #[error("Invalid price {price}: {reason}")]
    InvalidPrice { price: Decimal, reason: String },

    #[error("{kind} order requires a limit price")]
    MissingLimitPrice { kind: OrderKind },

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Duplicate order: {0}")]
    Duplicate(OrderId),

    #[error("Cancellation failed for {order_id}: {reason}")]
    CancellationFailed { order_id: OrderId, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit_buy(quantity: u64) -> Order {
        Order::limit("o-1", "AAPL", OrderSide::Buy, quantity, dec!(150)).unwrap()
    }

    #[test]
    fn test_market_order_creation() {
        let order = Order::market("o-1", "AAPL", OrderSide::Buy, 100).unwrap();
        assert_eq!(order.kind, OrderKind::Market);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.remaining_quantity, 100);
        assert!(order.limit_price.is_none());
    }

    #[test]
    fn test_limit_order_requires_positive_price() {
        let result = Order::limit("o-1", "AAPL", OrderSide::Sell, 10, dec!(0));
        assert!(matches!(result, Err(OrderError::InvalidPrice { .. })));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = Order::market("o-1", "AAPL", OrderSide::Buy, 0);
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_partial_then_complete_fill() {
        let mut order = limit_buy(100);

        order.apply_fill(30, dec!(150)).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyComplete);
        assert_eq!(order.remaining_quantity, 70);
        assert_eq!(order.executed_quantity(), 30);

        order.apply_fill(70, dec!(152)).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.remaining_quantity, 0);
        assert!(order.is_terminal());

        // (150 * 30 + 152 * 70) / 100 = 151.4
        assert_eq!(order.avg_fill_price, Some(dec!(151.4)));
    }

    #[test]
    fn test_quantity_invariant_holds_after_every_fill() {
        let mut order = limit_buy(100);
        for fill in [10u64, 25, 40, 25] {
            order.apply_fill(fill, dec!(150)).unwrap();
            assert_eq!(
                order.executed_quantity() + order.remaining_quantity,
                order.original_quantity
            );
        }
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn test_overfill_is_clamped() {
        let mut order = limit_buy(100);
        order.apply_fill(250, dec!(150)).unwrap();
        assert_eq!(order.remaining_quantity, 0);
        assert_eq!(order.executed_quantity(), 100);
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn test_cancel_partially_filled_keeps_executed_portion() {
        let mut order = limit_buy(100);
        order.apply_fill(40, dec!(150)).unwrap();

        order.cancel_remainder().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.remaining_quantity, 60);
        assert_eq!(order.executed_quantity(), 40);
    }

    #[test]
    fn test_terminal_orders_reject_further_mutation() {
        let mut order = limit_buy(10);
        order.apply_fill(10, dec!(150)).unwrap();
        assert!(order.is_terminal());

        assert!(matches!(
            order.apply_fill(5, dec!(150)),
            Err(OrderError::Terminal { .. })
        ));
        assert!(matches!(
            order.cancel_remainder(),
            Err(OrderError::Terminal { .. })
        ));
        assert!(order.fail().is_err());
        assert_eq!(order.remaining_quantity, 0);
    }

    #[test]
    fn test_fail_only_from_pending() {
        let mut order = limit_buy(100);
        order.apply_fill(10, dec!(150)).unwrap();
        assert!(matches!(
            order.fail(),
            Err(OrderError::InvalidTransition { .. })
        ));

        let mut fresh = limit_buy(100);
        fresh.fail().unwrap();
        assert_eq!(fresh.status, OrderStatus::Failed);
        assert_eq!(fresh.remaining_quantity, 100);
    }

    #[test]
    fn test_merge_snapshot_clamps_completed_remaining() {
        let mut order = limit_buy(100);
        let snap = OrderSnapshot {
            id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            kind: order.kind,
            limit_price: order.limit_price,
            original_quantity: 100,
            remaining_quantity: 5,
            status: OrderStatus::Completed,
            created_at: order.created_at,
            updated_at: Utc::now(),
        };
        assert!(order.merge_snapshot(&snap));
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.remaining_quantity, 0);
    }
}
