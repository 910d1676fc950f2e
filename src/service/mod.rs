//! Owned service lifecycle.
//!
//! [`TradeStreamHandle`] is the explicitly constructed instance of the
//! whole engine: it wires the connection supervisor, the order tracker and
//! the polling fallback together, and owns their tasks from
//! [`start`](TradeStreamHandle::start) to [`stop`](TradeStreamHandle::stop).
//! The application creates one and injects it where it is needed; nothing
//! in this crate holds global state.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::TokenSupplier;
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionPhase};
use crate::error::ClientResult;
use crate::orders::{NotificationSink, Order, OrderError, OrderId, OrderTracker};
use crate::polling::PollingFallback;
use crate::rest::OrdersApi;

/// Running trade-stream engine.
pub struct TradeStreamHandle {
    manager: Arc<ConnectionManager>,
    tracker: Arc<OrderTracker>,
    api: Arc<dyn OrdersApi>,
    shutdown_tx: broadcast::Sender<()>,
    connection_task: JoinHandle<()>,
    polling_task: JoinHandle<()>,
}

impl TradeStreamHandle {
    /// Start the engine: spawn the connection supervisor and the polling
    /// fallback.
    pub fn start(
        config: ClientConfig,
        supplier: Arc<dyn TokenSupplier>,
        api: Arc<dyn OrdersApi>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let tracker = Arc::new(OrderTracker::new(sink.clone()));
        let manager = Arc::new(ConnectionManager::new(
            config.stream,
            supplier,
            tracker.clone(),
            sink,
        ));
        let (shutdown_tx, _) = broadcast::channel(4);

        let connection_task = tokio::spawn({
            let manager = manager.clone();
            let shutdown = shutdown_tx.subscribe();
            async move { manager.run(shutdown).await }
        });

        let polling = PollingFallback::new(
            config.polling,
            api.clone(),
            tracker.clone(),
            manager.phase_watch(),
        );
        let polling_task = tokio::spawn({
            let shutdown = shutdown_tx.subscribe();
            async move { polling.run(shutdown).await }
        });

        info!("trade stream service started");
        Self {
            manager,
            tracker,
            api,
            shutdown_tx,
            connection_task,
            polling_task,
        }
    }

    /// Current connection phase, for "disconnected, data may be delayed"
    /// indicators.
    pub fn phase(&self) -> ConnectionPhase {
        self.manager.phase()
    }

    /// Subscribe to connection phase transitions.
    pub fn phase_watch(&self) -> watch::Receiver<ConnectionPhase> {
        self.manager.phase_watch()
    }

    /// Returns true if the stream is authenticated and receiving events.
    pub fn is_live(&self) -> bool {
        self.phase().is_live()
    }

    /// The order/portfolio view.
    pub fn tracker(&self) -> Arc<OrderTracker> {
        self.tracker.clone()
    }

    /// Track an order the order-entry collaborator has accepted.
    pub async fn register_order(&self, order: Order) -> Result<(), OrderError> {
        self.tracker.register(order).await
    }

    /// Cancel one order: forward the request to the order-entry
    /// collaborator and merge its acknowledgement into local state.
    pub async fn cancel_order(&self, id: &OrderId) -> ClientResult<()> {
        let ack = self.api.cancel_order(id).await?;
        self.tracker.apply_cancellation(id, &ack).await?;
        Ok(())
    }

    /// Cancel every partially-complete order. Returns how many local
    /// orders transitioned.
    pub async fn cancel_all_partial(&self) -> ClientResult<usize> {
        let ack = self.api.cancel_all_partial().await?;
        Ok(self
            .tracker
            .apply_batch_cancellation(&ack.cancelled_order_ids)
            .await)
    }

    /// Stop the engine: cancel any pending reconnect or poll timer and
    /// wait for both tasks to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.connection_task.await;
        let _ = self.polling_task.await;
        info!("trade stream service stopped");
    }
}
