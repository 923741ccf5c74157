//! Creation path: one processor intent per currency of a purchase.

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use paycore_types::{
    AppError, CreateIntentParams, Customer, EventLabel, IntentStatus, NewPaymentIntent,
    OutboxEvent, OutboxMutation, PaymentIntentView, PaymentStatus, PaymentStore, ProcessorError,
    ProcessorIntent, Purchase, PurchaseId,
};

use super::PaymentService;

/// How one leg of the creation loop ended.
enum Leg {
    Created(PaymentIntentView),
    Declined(PaymentIntentView),
    Failed(ProcessorError),
}

impl<S: PaymentStore> PaymentService<S> {
    /// Creates and confirms one intent per currency of `purchase`.
    ///
    /// `buyer` is the authenticated user; the internal route passes `None` and
    /// the buyer is resolved from `purchase.buyer_id`. On a failed leg the
    /// earlier legs are canceled and whatever was recorded is returned.
    #[instrument(skip(self, purchase, buyer), fields(origin = %purchase.id))]
    pub async fn create_payment_intents(
        &self,
        purchase: Purchase,
        buyer: Option<Customer>,
    ) -> Result<Vec<PaymentIntentView>, AppError> {
        purchase.validate()?;

        let customer = match (buyer, &purchase.buyer_id) {
            (Some(customer), _) => Some(customer),
            (None, Some(buyer_id)) => Some(self.users.get_customer(buyer_id).await?),
            (None, None) => None,
        };

        let payment_method = purchase
            .payment_method
            .clone()
            .or_else(|| customer.as_ref().and_then(|c| c.default_payment_method.clone()))
            .ok_or_else(|| AppError::BadRequest("No payment method available".into()))?;
        let processor_customer = customer.and_then(|c| c.processor_customer_id);

        let mut views: Vec<PaymentIntentView> = Vec::new();
        let mut created: Vec<String> = Vec::new();
        let mut failure: Option<AppError> = None;

        for (currency, amount) in purchase.expected_totals()? {
            if amount == 0 {
                continue;
            }

            let params = CreateIntentParams {
                amount,
                currency,
                payment_method: payment_method.clone(),
                customer: processor_customer.clone(),
                statement_descriptor: purchase.statement_descriptor.clone(),
                confirm: true,
                metadata: HashMap::from([("origin".to_string(), purchase.id.to_string())]),
            };

            match self.create_leg(&purchase.id, params).await {
                Leg::Created(view) => {
                    created.push(view.id.clone());
                    views.push(view);
                }
                Leg::Declined(view) => {
                    failure = Some(AppError::BadRequest(format!("Card declined for {}", view.id)));
                    views.push(view);
                    break;
                }
                Leg::Failed(err) => {
                    failure = Some(err.into());
                    break;
                }
            }
        }

        match failure {
            None => {
                if let Err(e) = self
                    .purchases
                    .update_purchase_status(&purchase.id, PaymentStatus::Pending)
                    .await
                {
                    warn!(origin = %purchase.id, "could not mark purchase pending: {}", e);
                }
            }
            Some(err) => {
                warn!(origin = %purchase.id, error = %err, "intent creation failed, rolling back");
                self.rollback(&created).await;
                if views.is_empty() {
                    return Err(err);
                }
                self.refresh_views(&mut views).await;
            }
        }

        info!(origin = %purchase.id, intents = views.len(), "payment intents created");
        Ok(views)
    }

    /// Runs `CreateIntent` for one currency and records the outcome.
    async fn create_leg(&self, origin: &PurchaseId, params: CreateIntentParams) -> Leg {
        match self.processor.create_intent(params).await {
            Ok(intent) => match self.record_created(origin, &intent).await {
                Ok(()) => Leg::Created(PaymentIntentView::from_processor(origin.clone(), &intent)),
                Err(e) => {
                    // The processor intent exists; cancel it with the others.
                    self.rollback(std::slice::from_ref(&intent.id)).await;
                    Leg::Failed(ProcessorError::Transport(format!(
                        "intent {} could not be recorded: {}",
                        intent.id, e
                    )))
                }
            },
            Err(ProcessorError::CardDeclined {
                decline_code,
                intent: Some(intent),
                ..
            }) => {
                if let Err(e) = self.record_created(origin, &intent).await {
                    warn!(intent_id = %intent.id, "could not record declined intent: {}", e);
                }
                Leg::Declined(
                    PaymentIntentView::from_processor(origin.clone(), &intent)
                        .with_decline_code(decline_code),
                )
            }
            Err(e) => Leg::Failed(e),
        }
    }

    /// Inserts the intent row and its `payment-created` event together.
    async fn record_created(
        &self,
        origin: &PurchaseId,
        intent: &ProcessorIntent,
    ) -> Result<(), AppError> {
        let payload = serde_json::json!({
            "id": intent.id,
            "origin": origin,
            "status": intent.status,
            "currency": intent.currency,
            "amount": intent.amount,
        });
        let row = NewPaymentIntent {
            external_intent_id: intent.id.clone(),
            origin: origin.clone(),
            status: intent.status,
            currency: intent.currency.clone(),
            origin_amount: intent.amount,
        };
        self.store
            .save_event(
                OutboxEvent::new(EventLabel::PaymentCreated, payload),
                OutboxMutation::CreateIntent(row),
            )
            .await?;
        Ok(())
    }

    /// Cancels already-created intents. Failures are logged, never propagated.
    #[instrument(skip(self))]
    pub(crate) async fn rollback(&self, intent_ids: &[String]) {
        for id in intent_ids {
            if let Err(e) = self.processor.cancel_intent(id).await {
                warn!(intent_id = %id, "rollback cancel failed: {}", e);
                continue;
            }
            let status = match self.processor.get_intent(id).await {
                Ok(canonical) => canonical.status,
                Err(e) => {
                    warn!(intent_id = %id, "could not fetch canceled intent: {}", e);
                    IntentStatus::Canceled
                }
            };
            if let Err(e) = self.save_status(id, status).await {
                warn!(intent_id = %id, "could not record rollback status: {}", e);
            }
        }
    }

    /// Overwrites a local status and emits `payment-updated` in one transaction.
    pub(crate) async fn save_status(
        &self,
        intent_id: &str,
        status: IntentStatus,
    ) -> Result<(), AppError> {
        let payload = serde_json::json!({ "id": intent_id, "status": status });
        self.store
            .save_event(
                OutboxEvent::new(EventLabel::PaymentUpdated, payload),
                OutboxMutation::UpdateIntentStatus {
                    external_intent_id: intent_id.to_string(),
                    status,
                },
            )
            .await?;
        Ok(())
    }

    async fn refresh_views(&self, views: &mut [PaymentIntentView]) {
        for view in views.iter_mut() {
            if let Ok(stored) = self.store.get_payment_intent(&view.id).await {
                view.status = stored.status;
            }
        }
    }

    /// Confirms a stored intent with the processor.
    ///
    /// Fails with `NotFound` for unknown intents and `Conflict` when the
    /// processor reports the status already on record.
    #[instrument(skip(self))]
    pub async fn confirm_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntentView, AppError> {
        let local = self.store.get_payment_intent(intent_id).await?;
        let intent = self.processor.confirm_intent(intent_id, None).await?;

        if intent.status == local.status {
            return Err(AppError::Conflict(format!(
                "Payment intent {} is already {}",
                intent_id, local.status
            )));
        }

        self.save_status(intent_id, intent.status).await?;
        info!(intent_id, status = %intent.status, "payment intent confirmed");
        Ok(PaymentIntentView::from_processor(local.origin, &intent))
    }
}
