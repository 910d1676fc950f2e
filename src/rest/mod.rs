//! Pull-based order data source and order-entry operations.
//!
//! The streaming connection is the primary data path; this module is the
//! REST side consumed by the polling fallback (`GET /orders`) and by the
//! cancellation operations the service forwards to the order-entry
//! collaborator. [`OrdersApi`] is the seam; [`HttpOrdersClient`] is the
//! production implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::TokenSupplier;
use crate::config::RestConfig;
use crate::error::{ClientError, ClientResult};
use crate::orders::{BatchCancelAck, CancelAck, OrderId, OrderSnapshot};

/// Order snapshot source and order-entry operations consumed by the engine.
#[async_trait]
pub trait OrdersApi: Send + Sync {
    /// Fetch the authoritative snapshot of the user's orders.
    async fn fetch_orders(&self) -> ClientResult<Vec<OrderSnapshot>>;

    /// Request cancellation of a single order.
    async fn cancel_order(&self, id: &OrderId) -> ClientResult<CancelAck>;

    /// Request cancellation of every partially-complete order.
    async fn cancel_all_partial(&self) -> ClientResult<BatchCancelAck>;
}

/// HTTP implementation of [`OrdersApi`] with bearer authentication.
pub struct HttpOrdersClient {
    http: reqwest::Client,
    base_url: String,
    supplier: Arc<dyn TokenSupplier>,
}

impl HttpOrdersClient {
    /// Create a client for the configured REST endpoint.
    pub fn new(config: &RestConfig, supplier: Arc<dyn TokenSupplier>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            supplier,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl OrdersApi for HttpOrdersClient {
    async fn fetch_orders(&self) -> ClientResult<Vec<OrderSnapshot>> {
        let token = self.supplier.token().await?;
        let response = self
            .http
            .get(self.endpoint("/orders"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        response
            .json::<Vec<OrderSnapshot>>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn cancel_order(&self, id: &OrderId) -> ClientResult<CancelAck> {
        let token = self.supplier.token().await?;
        let response = self
            .http
            .post(self.endpoint(&format!("/orders/{id}/cancel")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        response
            .json::<CancelAck>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn cancel_all_partial(&self) -> ClientResult<BatchCancelAck> {
        let token = self.supplier.token().await?;
        let response = self
            .http
            .post(self.endpoint("/orders/cancel-partial"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        response
            .json::<BatchCancelAck>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}
