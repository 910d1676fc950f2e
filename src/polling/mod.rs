//! Polling fallback for stream outages.
//!
//! When the streaming connection is anything but live for longer than a
//! short grace period, this scheduler starts pulling order snapshots on a
//! fixed interval and reconciling them into the tracker, so the UI is
//! never indefinitely stale. The moment the stream is live again the
//! pending poll timer is cancelled and the scheduler goes back to
//! watching.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::connection::ConnectionPhase;
use crate::orders::OrderTracker;
use crate::rest::OrdersApi;

/// Drives snapshot polling while the stream is down.
pub struct PollingFallback {
    config: PollingConfig,
    api: Arc<dyn OrdersApi>,
    tracker: Arc<OrderTracker>,
    phase_rx: watch::Receiver<ConnectionPhase>,
}

impl PollingFallback {
    /// Create a scheduler watching the given phase channel.
    pub fn new(
        config: PollingConfig,
        api: Arc<dyn OrdersApi>,
        tracker: Arc<OrderTracker>,
        phase_rx: watch::Receiver<ConnectionPhase>,
    ) -> Self {
        Self {
            config,
            api,
            tracker,
            phase_rx,
        }
    }

    /// Run until shutdown. There is at most one pending poll timer at any
    /// moment: this task is the only poller and every wait point either
    /// fires, is cancelled by the stream going live, or is cancelled by
    /// shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            // Wait for the stream to go down.
            if self.phase_rx.borrow_and_update().is_live() {
                tokio::select! {
                    _ = shutdown.recv() => return,
                    changed = self.phase_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue;
                    }
                }
            }

            // Grace period: a momentary reconnect should not trigger a poll.
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = Self::wait_for_live(&mut self.phase_rx) => continue,
                _ = sleep(self.config.grace_period()) => {}
            }

            info!("stream offline, polling fallback active");
            loop {
                match self.api.fetch_orders().await {
                    Ok(snapshots) => {
                        let merged = self.tracker.reconcile_snapshot(snapshots).await;
                        debug!(merged, "order snapshot reconciled");
                    }
                    Err(err) => {
                        warn!(error = %err, "order snapshot poll failed");
                    }
                }

                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = Self::wait_for_live(&mut self.phase_rx) => {
                        info!("stream restored, polling fallback suspended");
                        break;
                    }
                    _ = sleep(self.config.interval()) => {}
                }
            }
        }
    }

    async fn wait_for_live(phase_rx: &mut watch::Receiver<ConnectionPhase>) {
        loop {
            if phase_rx.borrow_and_update().is_live() {
                return;
            }
            if phase_rx.changed().await.is_err() {
                // Sender gone: the stream can never come back; park until
                // shutdown cancels us.
                std::future::pending::<()>().await;
            }
        }
    }
}
