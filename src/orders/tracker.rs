//! Order state tracking.
//!
//! The `OrderTracker` is the single writer over the local order collection.
//! Every mutation arrives as a discrete event - a trade fill from the
//! stream, a cancellation acknowledgement, or a polled snapshot - and is
//! applied under one write lock, so readers never observe a torn view.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::order::{Order, OrderError};
use super::types::{CancelAck, EventId, OrderId, OrderSnapshot, TradeEvent};

/// Default size of the rolling event-id dedupe window.
///
/// Event ids are monotonic per connection, so a duplicate can only arrive
/// within a short horizon of the original; a bounded window is enough.
pub const DEFAULT_DEDUPE_WINDOW: usize = 1_024;

/// Payload for a transient "trade executed" UI notification.
#[derive(Debug, Clone)]
pub struct TradeAlert {
    /// Instrument that traded
    pub symbol: String,
    /// Executed quantity
    pub quantity: u64,
    /// Execution price
    pub price: Decimal,
}

/// Receives change notifications so the UI layer can refresh caches and
/// show transient alerts. Implementations must be cheap and non-blocking;
/// they are invoked from the event-processing path.
pub trait NotificationSink: Send + Sync {
    /// A fill was applied to a tracked order.
    fn trade_executed(&self, alert: &TradeAlert);

    /// Tracked order state changed; cached order lists and portfolio views
    /// should be re-fetched.
    fn orders_invalidated(&self);

    /// The server rejected the streaming credential.
    fn auth_failed(&self, _reason: &str) {}
}

struct TrackerInner {
    orders: HashMap<OrderId, Order>,
    seen_events: HashSet<EventId>,
    seen_order: VecDeque<EventId>,
}

impl TrackerInner {
    fn remember_event(&mut self, event_id: EventId, capacity: usize) {
        if self.seen_events.insert(event_id.clone()) {
            self.seen_order.push_back(event_id);
            while self.seen_order.len() > capacity {
                if let Some(evicted) = self.seen_order.pop_front() {
                    self.seen_events.remove(&evicted);
                }
            }
        }
    }
}

/// The authoritative client-side view of the user's orders.
pub struct OrderTracker {
    inner: RwLock<TrackerInner>,
    sink: Arc<dyn NotificationSink>,
    dedupe_capacity: usize,
}

impl OrderTracker {
    /// Create a tracker with the default dedupe window.
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_dedupe_window(sink, DEFAULT_DEDUPE_WINDOW)
    }

    /// Create a tracker with an explicit dedupe window size.
    pub fn with_dedupe_window(sink: Arc<dyn NotificationSink>, capacity: usize) -> Self {
        Self {
            inner: RwLock::new(TrackerInner {
                orders: HashMap::new(),
                seen_events: HashSet::new(),
                seen_order: VecDeque::new(),
            }),
            sink,
            dedupe_capacity: capacity.max(1),
        }
    }

    /// Track a newly accepted order.
    pub async fn register(&self, order: Order) -> Result<(), OrderError> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(&order.id) {
            return Err(OrderError::Duplicate(order.id));
        }
        inner.orders.insert(order.id.clone(), order);
        Ok(())
    }

    /// Get an order by id.
    pub async fn get(&self, id: &OrderId) -> Option<Order> {
        let inner = self.inner.read().await;
        inner.orders.get(id).cloned()
    }

    /// Get all tracked orders.
    pub async fn all(&self) -> Vec<Order> {
        let inner = self.inner.read().await;
        inner.orders.values().cloned().collect()
    }

    /// Get all open (non-terminal) orders.
    pub async fn open_orders(&self) -> Vec<Order> {
        let inner = self.inner.read().await;
        inner
            .orders
            .values()
            .filter(|o| o.is_open())
            .cloned()
            .collect()
    }

    /// Apply one trade event from the stream.
    ///
    /// Idempotent by event id: a duplicate within the dedupe window is a
    /// no-op. A fill referencing a terminal or unknown order is discarded
    /// silently. Returns true if any tracked order changed.
    pub async fn apply_trade(&self, event: &TradeEvent) -> bool {
        let mut inner = self.inner.write().await;

        if inner.seen_events.contains(&event.event_id) {
            debug!(event_id = %event.event_id, "duplicate trade event ignored");
            return false;
        }

        let mut sides = vec![&event.order_id];
        if event.counter_order_id != event.order_id {
            sides.push(&event.counter_order_id);
        }

        let mut touched = false;
        for id in sides {
            let Some(order) = inner.orders.get_mut(id) else {
                continue;
            };
            if order.is_terminal() {
                debug!(order_id = %id, event_id = %event.event_id, "late trade event for terminal order ignored");
                continue;
            }
            match order.apply_fill(event.filled_quantity, event.price) {
                Ok(()) => touched = true,
                Err(err) => warn!(order_id = %id, error = %err, "failed to apply trade event"),
            }
        }

        inner.remember_event(event.event_id.clone(), self.dedupe_capacity);
        drop(inner);

        if touched {
            self.sink.trade_executed(&TradeAlert {
                symbol: event.symbol.clone(),
                quantity: event.filled_quantity,
                price: event.price,
            });
            self.sink.orders_invalidated();
        }
        touched
    }

    /// Merge a single-order cancellation result.
    ///
    /// A rejected cancellation leaves local state untouched and is returned
    /// to the caller. A successful cancellation of an already-terminal order
    /// is a no-op.
    pub async fn apply_cancellation(
        &self,
        id: &OrderId,
        ack: &CancelAck,
    ) -> Result<(), OrderError> {
        if !ack.success {
            return Err(OrderError::CancellationFailed {
                order_id: id.clone(),
                reason: ack
                    .reason
                    .clone()
                    .unwrap_or_else(|| "unspecified".to_string()),
            });
        }

        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;
        if order.is_terminal() {
            debug!(order_id = %id, "cancellation ack for terminal order ignored");
            return Ok(());
        }
        order.cancel_remainder()?;
        drop(inner);

        self.sink.orders_invalidated();
        Ok(())
    }

    /// Merge a batch cancellation result in one pass.
    ///
    /// The whole set is applied under a single write lock, so readers see
    /// either none or all of the batch. Returns how many orders changed.
    pub async fn apply_batch_cancellation(&self, cancelled: &[OrderId]) -> usize {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for id in cancelled {
            match inner.orders.get_mut(id) {
                Some(order) if order.is_terminal() => {}
                Some(order) => {
                    if order.cancel_remainder().is_ok() {
                        changed += 1;
                    }
                }
                None => warn!(order_id = %id, "batch cancellation referenced unknown order"),
            }
        }
        drop(inner);

        if changed > 0 {
            self.sink.orders_invalidated();
        }
        changed
    }

    /// Reconcile the local set against an authoritative snapshot.
    ///
    /// A snapshot entry is merged only when the server's view is strictly
    /// more advanced: equal-or-later status with a remaining quantity no
    /// greater than the local one. A locally-terminal order is never
    /// regressed by a stale snapshot. Unknown orders are adopted as-is.
    /// Returns how many orders changed.
    pub async fn reconcile_snapshot(&self, snapshots: Vec<OrderSnapshot>) -> usize {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for snap in snapshots {
            match inner.orders.get_mut(&snap.id) {
                Some(local) => {
                    if local.is_terminal() {
                        continue;
                    }
                    if !snap.status.is_at_least(local.status)
                        || snap.remaining_quantity > local.remaining_quantity
                    {
                        debug!(order_id = %snap.id, "stale snapshot entry ignored");
                        continue;
                    }
                    if local.merge_snapshot(&snap) {
                        changed += 1;
                    }
                }
                None => match Order::from_snapshot(&snap) {
                    Ok(order) => {
                        inner.orders.insert(order.id.clone(), order);
                        changed += 1;
                    }
                    Err(err) => {
                        warn!(order_id = %snap.id, error = %err, "discarding invalid order snapshot");
                    }
                },
            }
        }
        drop(inner);

        if changed > 0 {
            self.sink.orders_invalidated();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::types::{OrderKind, OrderSide, OrderStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        alerts: Mutex<Vec<TradeAlert>>,
        invalidations: AtomicUsize,
    }

    impl NotificationSink for RecordingSink {
        fn trade_executed(&self, alert: &TradeAlert) {
            self.alerts.lock().unwrap().push(alert.clone());
        }

        fn orders_invalidated(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracker() -> (Arc<RecordingSink>, OrderTracker) {
        let sink = Arc::new(RecordingSink::default());
        let tracker = OrderTracker::new(sink.clone());
        (sink, tracker)
    }

    fn trade(event_id: &str, order_id: &str, quantity: u64, price: Decimal) -> TradeEvent {
        TradeEvent {
            event_id: EventId::from(event_id),
            order_id: OrderId::from(order_id),
            counter_order_id: OrderId::from("counter"),
            symbol: "AAPL".to_string(),
            price,
            filled_quantity: quantity,
            executed_at: Utc::now(),
        }
    }

    fn snapshot(id: &str, remaining: u64, status: OrderStatus) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::from(id),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            kind: OrderKind::Market,
            limit_price: None,
            original_quantity: 100,
            remaining_quantity: remaining,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn register_buy(tracker: &OrderTracker, id: &str, quantity: u64) {
        tracker
            .register(Order::market(id, "AAPL", OrderSide::Buy, quantity).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fill_sequence_reaches_completed() {
        let (sink, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;

        assert!(tracker.apply_trade(&trade("e-1", "o-1", 30, dec!(150))).await);
        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyComplete);
        assert_eq!(order.remaining_quantity, 70);

        assert!(tracker.apply_trade(&trade("e-2", "o-1", 70, dec!(151))).await);
        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.remaining_quantity, 0);

        assert_eq!(sink.alerts.lock().unwrap().len(), 2);
        assert_eq!(sink.invalidations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_duplicate_event_is_noop() {
        let (sink, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;

        assert!(tracker.apply_trade(&trade("e-1", "o-1", 30, dec!(150))).await);
        let first = tracker.get(&OrderId::from("o-1")).await.unwrap();

        assert!(!tracker.apply_trade(&trade("e-1", "o-1", 30, dec!(150))).await);
        let second = tracker.get(&OrderId::from("o-1")).await.unwrap();

        assert_eq!(first.remaining_quantity, second.remaining_quantity);
        assert_eq!(first.status, second.status);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dedupe_window_eviction() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = OrderTracker::with_dedupe_window(sink, 2);
        register_buy(&tracker, "o-1", 100).await;

        tracker.apply_trade(&trade("e-1", "o-1", 10, dec!(150))).await;
        tracker.apply_trade(&trade("e-2", "o-1", 10, dec!(150))).await;
        tracker.apply_trade(&trade("e-3", "o-1", 10, dec!(150))).await;
        // e-1 has been evicted from the window; replaying it applies again.
        assert!(tracker.apply_trade(&trade("e-1", "o-1", 10, dec!(150))).await);
        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.remaining_quantity, 60);
    }

    #[tokio::test]
    async fn test_event_for_unknown_order_is_discarded() {
        let (sink, tracker) = tracker();
        assert!(!tracker.apply_trade(&trade("e-1", "o-9", 30, dec!(150))).await);
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fill_applies_to_counter_order_side() {
        let (_, tracker) = tracker();
        tracker
            .register(Order::market("sell-1", "AAPL", OrderSide::Sell, 50).unwrap())
            .await
            .unwrap();

        let mut event = trade("e-1", "buy-1", 20, dec!(150));
        event.counter_order_id = OrderId::from("sell-1");
        assert!(tracker.apply_trade(&event).await);

        let order = tracker.get(&OrderId::from("sell-1")).await.unwrap();
        assert_eq!(order.remaining_quantity, 30);
    }

    #[tokio::test]
    async fn test_cancellation_freezes_remaining() {
        let (_, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;
        tracker.apply_trade(&trade("e-1", "o-1", 40, dec!(150))).await;

        let ack = CancelAck {
            success: true,
            reason: None,
        };
        tracker
            .apply_cancellation(&OrderId::from("o-1"), &ack)
            .await
            .unwrap();

        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.remaining_quantity, 60);
        assert_eq!(order.executed_quantity(), 40);

        // A late fill for the cancelled order must not thaw it.
        tracker.apply_trade(&trade("e-2", "o-1", 10, dec!(150))).await;
        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.remaining_quantity, 60);
    }

    #[tokio::test]
    async fn test_failed_cancellation_leaves_state_untouched() {
        let (sink, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;

        let ack = CancelAck {
            success: false,
            reason: Some("order already matched".to_string()),
        };
        let result = tracker.apply_cancellation(&OrderId::from("o-1"), &ack).await;
        assert!(matches!(
            result,
            Err(OrderError::CancellationFailed { .. })
        ));

        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(sink.invalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_cancellation_is_selective() {
        let (sink, tracker) = tracker();
        register_buy(&tracker, "o1", 100).await;
        register_buy(&tracker, "o2", 100).await;
        register_buy(&tracker, "o3", 100).await;
        tracker.apply_trade(&trade("e-1", "o1", 10, dec!(150))).await;
        tracker.apply_trade(&trade("e-2", "o3", 20, dec!(150))).await;

        let cancelled = [OrderId::from("o1"), OrderId::from("o3")];
        let changed = tracker.apply_batch_cancellation(&cancelled).await;
        assert_eq!(changed, 2);

        assert_eq!(
            tracker.get(&OrderId::from("o1")).await.unwrap().status,
            OrderStatus::Cancelled
        );
        assert_eq!(
            tracker.get(&OrderId::from("o2")).await.unwrap().status,
            OrderStatus::Pending
        );
        assert_eq!(
            tracker.get(&OrderId::from("o3")).await.unwrap().status,
            OrderStatus::Cancelled
        );
        // One batch, one invalidation (the two fills account for the rest).
        assert_eq!(sink.invalidations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reconcile_adopts_and_advances() {
        let (_, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;

        let changed = tracker
            .reconcile_snapshot(vec![
                snapshot("o-1", 60, OrderStatus::PartiallyComplete),
                snapshot("o-2", 100, OrderStatus::Pending),
            ])
            .await;
        assert_eq!(changed, 2);

        let o1 = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(o1.status, OrderStatus::PartiallyComplete);
        assert_eq!(o1.remaining_quantity, 60);
        assert!(tracker.get(&OrderId::from("o-2")).await.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_never_regresses_terminal_order() {
        let (_, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;
        tracker.apply_trade(&trade("e-1", "o-1", 100, dec!(150))).await;

        let changed = tracker
            .reconcile_snapshot(vec![snapshot("o-1", 50, OrderStatus::PartiallyComplete)])
            .await;
        assert_eq!(changed, 0);

        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.remaining_quantity, 0);
    }

    #[tokio::test]
    async fn test_reconcile_rejects_stale_remaining() {
        let (_, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;
        tracker.apply_trade(&trade("e-1", "o-1", 40, dec!(150))).await;

        // Snapshot taken before the fill: same status rank but more remaining.
        let changed = tracker
            .reconcile_snapshot(vec![snapshot("o-1", 90, OrderStatus::PartiallyComplete)])
            .await;
        assert_eq!(changed, 0);

        let order = tracker.get(&OrderId::from("o-1")).await.unwrap();
        assert_eq!(order.remaining_quantity, 60);
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let (_, tracker) = tracker();
        register_buy(&tracker, "o-1", 100).await;
        let result = tracker
            .register(Order::market("o-1", "AAPL", OrderSide::Buy, 10).unwrap())
            .await;
        assert!(matches!(result, Err(OrderError::Duplicate(_))));
    }
}
