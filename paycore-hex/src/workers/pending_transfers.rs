use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use paycore_types::PaymentStore;

use crate::service::PaymentService;

/// Drains transfers parked by the payout engine.
pub struct PendingTransfersWorker<S: PaymentStore> {
    service: PaymentService<S>,
    interval: Duration,
}

impl<S: PaymentStore> PendingTransfersWorker<S> {
    pub fn new(service: PaymentService<S>, interval: Duration) -> Self {
        Self { service, interval }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting pending transfers worker every {:?}", self.interval);
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }

    /// One pass over the queue. Returns how many transfers were sent.
    pub async fn tick(&self) -> usize {
        let pending = match self.service.store().list_pending_transfers().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("Failed to fetch pending transfers: {}", e);
                return 0;
            }
        };
        if pending.is_empty() {
            return 0;
        }

        info!("Retrying {} pending transfers", pending.len());
        let mut sent = 0;
        for row in &pending {
            match self.service.retry_pending_transfer(row).await {
                Ok(_) => sent += 1,
                Err(e) => warn!(pending_id = row.id, "pending transfer left for next tick: {}", e),
            }
        }
        sent
    }
}
