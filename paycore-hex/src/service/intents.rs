//! Intent state machine and source handling.

use tracing::{debug, info, instrument};

use paycore_types::{
    AppError, IntentEventKind, NewPendingEvent, PaymentStatus, PaymentStore, ProcessorEvent,
    ProcessorIntent, RepoError, Source, SourceStatus,
};

use super::PaymentService;

impl<S: PaymentStore> PaymentService<S> {
    /// Applies a `payment_intent.*` event to the local intent.
    ///
    /// On the first attempt an unknown intent is parked as a pending event;
    /// on a retry it is reported as `NotFound` so the row stays queued. A
    /// retry deletes its pending row only once the event is fully applied.
    #[instrument(skip(self, event, intent), fields(event_id = %event.id, intent_id = %intent.id))]
    pub async fn handle_payment_intent(
        &self,
        event: &ProcessorEvent,
        intent: &ProcessorIntent,
        first_attempt: bool,
    ) -> Result<(), AppError> {
        let local = match self.store.get_payment_intent(&intent.id).await {
            Ok(local) => local,
            Err(RepoError::NotFound) if first_attempt => {
                info!("intent not recorded yet, parking event");
                self.store
                    .create_pending_event(NewPendingEvent {
                        event_id: event.id.clone(),
                        intent_id: intent.id.clone(),
                        reason: format!("payment intent {} not found", intent.id),
                    })
                    .await?;
                return Ok(());
            }
            Err(RepoError::NotFound) => {
                return Err(AppError::NotFound(format!(
                    "payment intent {} still not recorded",
                    intent.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if local.status != intent.status {
            self.save_status(&intent.id, intent.status).await?;
        }

        match event.intent_kind() {
            IntentEventKind::Succeeded => {
                let purchase = self.purchases.get_purchase(&local.origin).await?;
                self.notify_payment_received(&purchase, intent, true).await;
                self.validate_purchase(&purchase, &event.id).await?;
            }
            IntentEventKind::PaymentFailed => {
                self.purchases
                    .update_purchase_status(&local.origin, PaymentStatus::Failed)
                    .await?;
                let purchase = self.purchases.get_purchase(&local.origin).await?;
                self.notify_payment_received(&purchase, intent, false).await;
            }
            IntentEventKind::Other => {
                debug!(event_type = %event.event_type, "status recorded, no further action");
            }
        }

        // A failed retry leaves the row queued for the next tick
        if !first_attempt {
            self.store.delete_pending_event(&event.id).await?;
        }
        Ok(())
    }

    /// Confirms or cancels the intent a source was created for.
    #[instrument(skip(self, event, source), fields(event_id = %event.id, source_id = %source.id))]
    pub async fn handle_source(
        &self,
        event: &ProcessorEvent,
        source: &Source,
    ) -> Result<(), AppError> {
        let Some(intent_id) = source.intent_id() else {
            debug!("source references no intent");
            return Ok(());
        };

        match source.status {
            SourceStatus::Chargeable => {
                let intent = self
                    .processor
                    .confirm_intent(intent_id, Some(&source.id))
                    .await?;
                info!(intent_id, status = %intent.status, "intent confirmed with source");
            }
            SourceStatus::Failed | SourceStatus::Canceled => {
                let intent = self.processor.cancel_intent(intent_id).await?;
                info!(intent_id, status = %intent.status, "intent canceled after source failure");
            }
            status => debug!(?status, "source status needs no action"),
        }
        Ok(())
    }
}
