//! Re-entry points used by the pending-event and pending-transfer loops.

use tracing::{info, instrument, warn};

use paycore_types::{
    AppError, CreateTransferParams, NewTransfer, PaymentStore, PendingEvent, PendingTransfer,
    RepoError,
};

use super::PaymentService;

impl<S: PaymentStore> PaymentService<S> {
    /// Re-runs a parked `payment_intent.*` event with fresh processor state.
    ///
    /// A failure is written to the error log, bumps the row's attempt
    /// counter and is returned.
    #[instrument(skip(self, pending), fields(event_id = %pending.event_id, intent_id = %pending.intent_id))]
    pub async fn retry_pending_event(&self, pending: &PendingEvent) -> Result<(), AppError> {
        let result = self.replay_event(pending).await;
        if let Err(e) = &result {
            warn!(attempts = pending.attempts + 1, "pending event retry failed: {}", e);
            self.record_failure(&pending.event_id, e).await;
            match self
                .store
                .record_pending_event_attempt(&pending.event_id, &e.to_string())
                .await
            {
                // Row already gone: nothing left to count against.
                Ok(()) | Err(RepoError::NotFound) => {}
                Err(attempt_err) => {
                    warn!("could not record pending event attempt: {}", attempt_err);
                }
            }
        }
        result
    }

    async fn replay_event(&self, pending: &PendingEvent) -> Result<(), AppError> {
        let event = self.processor.get_event(&pending.event_id).await?;
        let intent = self.processor.get_intent(&pending.intent_id).await?;
        self.handle_payment_intent(&event, &intent, false).await
    }

    /// Sends a parked transfer and records it, deleting the pending row.
    #[instrument(skip(self, pending), fields(pending_id = pending.id, origin = %pending.origin))]
    pub async fn retry_pending_transfer(
        &self,
        pending: &PendingTransfer,
    ) -> Result<String, AppError> {
        let account = self.users.payout_account(&pending.destination).await?;

        let params = CreateTransferParams {
            amount: pending.split.transferred_value,
            currency: pending.currency.clone(),
            destination: account.clone(),
            source_transaction: pending.source_transaction.clone(),
            origin: pending.origin.to_string(),
            leg: pending.leg.clone(),
        };
        let transfer = self.processor.create_transfer(params).await?;

        self.store
            .complete_pending_transfer(
                pending.id,
                NewTransfer {
                    external_transfer_id: transfer.id.clone(),
                    origin: pending.origin.clone(),
                    destination: pending.destination.clone(),
                    destination_account: account,
                    currency: pending.currency.clone(),
                    amount: pending.split.transferred_value,
                },
            )
            .await?;

        info!(transfer_id = %transfer.id, "pending transfer completed");
        Ok(transfer.id)
    }
}
