//! Purchase service client.

use reqwest::Client;
use serde_json::json;

use paycore_types::{PaymentStatus, PeerError, Purchase, PurchaseId, PurchaseService};

use crate::PeerClient;

pub struct HttpPurchaseService {
    client: PeerClient,
}

impl HttpPurchaseService {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            client: PeerClient::new(base_url, http),
        }
    }
}

#[async_trait::async_trait]
impl PurchaseService for HttpPurchaseService {
    #[tracing::instrument(skip(self), fields(origin = %id))]
    async fn get_purchase(&self, id: &PurchaseId) -> Result<Purchase, PeerError> {
        let req = self.client.get(&["purchase", id.as_str()])?;
        self.client.fetch(req).await
    }

    #[tracing::instrument(skip(self), fields(origin = %id, status = %status))]
    async fn update_purchase_status(
        &self,
        id: &PurchaseId,
        status: PaymentStatus,
    ) -> Result<(), PeerError> {
        let req = self
            .client
            .put(&["purchase", id.as_str(), "status"])?
            .json(&json!({ "status": status }));
        self.client.execute(req).await
    }

    async fn update_order_status(
        &self,
        purchase: &PurchaseId,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<(), PeerError> {
        let req = self
            .client
            .put(&["purchase", purchase.as_str(), "order", order_id, "status"])?
            .json(&json!({ "status": status }));
        self.client.execute(req).await
    }

    async fn update_booking_status(
        &self,
        purchase: &PurchaseId,
        booking_id: &str,
        status: PaymentStatus,
    ) -> Result<(), PeerError> {
        let req = self
            .client
            .put(&["purchase", purchase.as_str(), "booking", booking_id, "status"])?
            .json(&json!({ "status": status }));
        self.client.execute(req).await
    }
}
