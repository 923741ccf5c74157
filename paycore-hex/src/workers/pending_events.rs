use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument};

use paycore_types::PaymentStore;

use crate::service::PaymentService;

/// Replays `payment_intent.*` events that arrived before their intent row.
pub struct PendingEventsWorker<S: PaymentStore> {
    service: PaymentService<S>,
    interval: Duration,
}

impl<S: PaymentStore> PendingEventsWorker<S> {
    pub fn new(service: PaymentService<S>, interval: Duration) -> Self {
        Self { service, interval }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting pending events worker every {:?}", self.interval);
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }

    /// One pass over the queue. Returns how many rows were resolved.
    pub async fn tick(&self) -> usize {
        let pending = match self.service.store().list_pending_events().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("Failed to fetch pending events: {}", e);
                return 0;
            }
        };
        if pending.is_empty() {
            return 0;
        }

        info!("Retrying {} pending events", pending.len());
        let mut resolved = 0;
        for row in &pending {
            if self.service.retry_pending_event(row).await.is_ok() {
                resolved += 1;
            }
        }
        resolved
    }
}
