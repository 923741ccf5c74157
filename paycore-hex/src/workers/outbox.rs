use std::collections::HashMap;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument};

use paycore_gateway::signature;
use paycore_types::{EventLabel, OutboxEvent, OutboxStatus, PaymentStore, Topic};

use crate::service::PaymentService;

/// Pub/sub attribute carrying the envelope signature.
pub const SIGNATURE_ATTRIBUTE: &str = "Paycore-Signature";

const BATCH_SIZE: i64 = 50;

/// Publishes pending outbox rows as signed envelopes on `payment-events`.
pub struct OutboxRelay<S: PaymentStore> {
    service: PaymentService<S>,
    secret: String,
    livemode: bool,
    interval: Duration,
}

impl<S: PaymentStore> OutboxRelay<S> {
    pub fn new(
        service: PaymentService<S>,
        secret: impl Into<String>,
        livemode: bool,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            secret: secret.into(),
            livemode,
            interval,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting outbox relay every {:?}", self.interval);
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }

    /// Publishes one batch. Returns how many rows were published.
    pub async fn tick(&self) -> usize {
        let events = match self.service.store().pending_outbox_events(BATCH_SIZE).await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to fetch outbox events: {}", e);
                return 0;
            }
        };

        let mut published = 0;
        for event in events {
            if self.process_event(event).await {
                published += 1;
            }
        }
        published
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, label = %event.label))]
    async fn process_event(&self, event: OutboxEvent) -> bool {
        let seller = match event.label {
            EventLabel::OrderPlaced => event
                .payload
                .get("seller_id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        };
        let created = event.created_at.timestamp();
        let envelope = serde_json::json!({
            "id": event.id.to_string(),
            "type": event.label.as_ref(),
            "livemode": self.livemode,
            "created": created,
            "data": event.payload,
        });

        let result = match serde_json::to_vec(&envelope) {
            Ok(body) => {
                let header = signature::sign(&body, &self.secret, created, self.livemode);
                let mut attributes = HashMap::from([
                    (SIGNATURE_ATTRIBUTE.to_string(), header),
                    ("event_type".to_string(), event.label.to_string()),
                ]);
                if let Some(seller) = seller {
                    attributes.insert("seller_id".to_string(), seller);
                }
                self.service
                    .publisher()
                    .publish(Topic::PaymentEvents.as_ref(), envelope, attributes)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        let (status, last_error) = match result {
            Ok(()) => (OutboxStatus::Published, None),
            Err(e) => (OutboxStatus::Pending, Some(e)),
        };
        let published = status == OutboxStatus::Published;

        if let Err(e) = self
            .service
            .store()
            .update_outbox_status(event.id, status, last_error)
            .await
        {
            error!("Failed to update outbox status: {}", e);
        }
        published
    }
}
