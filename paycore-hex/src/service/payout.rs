//! Payout engine: completeness gate, fee selection and per-leg transfers.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use paycore_types::{
    AppError, CreateTransferParams, CurrencyCode, CurrencyTotals, EventLabel, FeeSplit,
    NewPendingTransfer, NewTransfer, OutboxEvent, OutboxMutation, PartyId, PaymentStatus,
    PaymentStore, Purchase, PurchaseId, default_fee_rate, leg_key,
};

use super::PaymentService;

/// Result of one payout leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The processor accepted the transfer.
    Transferred(String),
    /// Parked as a pending transfer for the retry loop.
    Queued,
    /// Nothing to transfer after the fee.
    Skipped,
}

/// One (order or booking, currency) leg of a purchase payout.
struct PayoutLeg<'a> {
    origin: &'a PurchaseId,
    /// `order:<id>` or `booking:<id>`.
    leg: String,
    destination: &'a PartyId,
    currency: &'a CurrencyCode,
    total: i64,
    fee_rate: Decimal,
    source_transaction: Option<String>,
}

impl<S: PaymentStore> PaymentService<S> {
    /// Pays out sellers and hosts once every currency of the purchase is paid.
    ///
    /// Returns `false` when the purchase is incomplete or already completed.
    #[instrument(skip(self, purchase), fields(origin = %purchase.id))]
    pub async fn validate_purchase(
        &self,
        purchase: &Purchase,
        event_id: &str,
    ) -> Result<bool, AppError> {
        if purchase.status == Some(PaymentStatus::Completed) {
            debug!("purchase already completed");
            return Ok(false);
        }

        let succeeded = self
            .store
            .successful_payment_intents_by_origin(&purchase.id)
            .await?;

        let mut paid = CurrencyTotals::new();
        let mut intents_by_currency: HashMap<CurrencyCode, String> = HashMap::new();
        for intent in &succeeded {
            let entry = paid.entry(intent.currency.clone()).or_insert(0);
            *entry = entry
                .checked_add(intent.origin_amount)
                .ok_or_else(|| AppError::Internal("paid amount overflow".into()))?;
            intents_by_currency
                .entry(intent.currency.clone())
                .or_insert_with(|| intent.external_intent_id.clone());
        }

        let mut expected = purchase.expected_totals()?;
        expected.retain(|_, amount| *amount != 0);
        if paid != expected {
            debug!(?paid, ?expected, "purchase not fully paid yet");
            return Ok(false);
        }

        let fee_rate = self.fee_rate(&purchase.site).await;
        info!(%fee_rate, "purchase fully paid, starting payout");

        let mut charges: HashMap<CurrencyCode, Option<String>> = HashMap::new();

        for order in &purchase.orders {
            let totals = order.totals_by_currency()?;
            for (currency, total) in &totals {
                let source_transaction = self
                    .source_charge(&mut charges, &intents_by_currency, currency)
                    .await;
                let leg = PayoutLeg {
                    origin: &purchase.id,
                    leg: leg_key("order", &order.id),
                    destination: &order.seller_id,
                    currency,
                    total: *total,
                    fee_rate,
                    source_transaction,
                };
                self.payout_leg(event_id, leg).await;
            }
            if let Err(e) = self
                .purchases
                .update_order_status(&purchase.id, &order.id, PaymentStatus::Completed)
                .await
            {
                self.record_failure(event_id, format!("order {} status: {}", order.id, e))
                    .await;
            }
            self.notify_sale_complete(purchase, &order.seller_id, "order", &order.id, &totals)
                .await;
        }

        for booking in &purchase.bookings {
            let total = booking.total()?;
            let source_transaction = self
                .source_charge(&mut charges, &intents_by_currency, total.currency())
                .await;
            let leg = PayoutLeg {
                origin: &purchase.id,
                leg: leg_key("booking", &booking.id),
                destination: &booking.host_id,
                currency: total.currency(),
                total: total.amount(),
                fee_rate,
                source_transaction,
            };
            self.payout_leg(event_id, leg).await;
            if let Err(e) = self
                .purchases
                .update_booking_status(&purchase.id, &booking.id, PaymentStatus::Completed)
                .await
            {
                self.record_failure(event_id, format!("booking {} status: {}", booking.id, e))
                    .await;
            }
            let totals = CurrencyTotals::from([(total.currency().clone(), total.amount())]);
            self.notify_sale_complete(purchase, &booking.host_id, "booking", &booking.id, &totals)
                .await;
        }

        if let Err(e) = self
            .purchases
            .update_purchase_status(&purchase.id, PaymentStatus::Completed)
            .await
        {
            self.record_failure(event_id, format!("purchase status: {}", e))
                .await;
        }
        self.notify_payment_status(purchase, PaymentStatus::Completed)
            .await;

        for order in &purchase.orders {
            let payload = serde_json::json!({
                "seller_id": order.seller_id,
                "purchase_id": purchase.id,
                "order": order,
            });
            if let Err(e) = self
                .store
                .save_event(
                    OutboxEvent::new(EventLabel::OrderPlaced, payload),
                    OutboxMutation::None,
                )
                .await
            {
                self.record_failure(event_id, format!("order.placed {}: {}", order.id, e))
                    .await;
            }
        }

        info!("purchase payout completed");
        Ok(true)
    }

    /// Site fee for `site_url`, or the default rate when unknown or invalid.
    pub async fn fee_rate(&self, site_url: &str) -> Decimal {
        match self.sites.site_by_url(site_url).await {
            Ok(Some(site)) if site.fee >= Decimal::ZERO && site.fee < Decimal::ONE => site.fee,
            Ok(Some(site)) => {
                warn!(site = %site.url, fee = %site.fee, "site fee out of range, using default");
                default_fee_rate()
            }
            Ok(None) => default_fee_rate(),
            Err(e) => {
                warn!(site = site_url, "site lookup failed, using default fee: {}", e);
                default_fee_rate()
            }
        }
    }

    /// Charge backing transfers in `currency`, fetched once per payout.
    async fn source_charge(
        &self,
        cache: &mut HashMap<CurrencyCode, Option<String>>,
        intents_by_currency: &HashMap<CurrencyCode, String>,
        currency: &CurrencyCode,
    ) -> Option<String> {
        if let Some(charge) = cache.get(currency) {
            return charge.clone();
        }
        let charge = match intents_by_currency.get(currency) {
            Some(intent_id) => match self.processor.get_intent(intent_id).await {
                Ok(intent) => intent.charge_id().map(str::to_string),
                Err(e) => {
                    warn!(intent_id = %intent_id, "could not fetch intent charge: {}", e);
                    None
                }
            },
            None => None,
        };
        cache.insert(currency.clone(), charge.clone());
        charge
    }

    /// Runs one leg. A leg that can be neither transferred nor parked is
    /// logged against the event; the remaining legs still run.
    async fn payout_leg(&self, event_id: &str, leg: PayoutLeg<'_>) {
        let label = format!("{} {}", leg.leg, leg.currency);
        match self.perform_transfer(leg).await {
            Ok(outcome) => debug!(leg = %label, ?outcome, "payout leg done"),
            Err(e) => {
                self.record_failure(event_id, format!("payout {}: {}", label, e))
                    .await;
            }
        }
    }

    /// Transfers one leg, or parks it as a pending transfer.
    #[instrument(skip(self, leg), fields(leg = %leg.leg, destination = %leg.destination, currency = %leg.currency, total = leg.total))]
    async fn perform_transfer(&self, leg: PayoutLeg<'_>) -> Result<TransferOutcome, AppError> {
        let split = FeeSplit::compute(leg.total, leg.fee_rate)?;
        if split.transferred_value <= 0 {
            debug!("nothing left to transfer after fee");
            return Ok(TransferOutcome::Skipped);
        }

        let Some(source) = leg.source_transaction.clone() else {
            return self
                .queue_transfer(&leg, split, "source charge unavailable".into())
                .await;
        };

        let account = match self.users.payout_account(leg.destination).await {
            Ok(account) => account,
            Err(e) => {
                return self
                    .queue_transfer(&leg, split, format!("payout account: {}", e))
                    .await;
            }
        };

        let params = CreateTransferParams {
            amount: split.transferred_value,
            currency: leg.currency.clone(),
            destination: account.clone(),
            source_transaction: Some(source),
            origin: leg.origin.to_string(),
            leg: leg.leg.clone(),
        };
        let transfer = match self.processor.create_transfer(params).await {
            Ok(transfer) => transfer,
            Err(e) => {
                return self
                    .queue_transfer(&leg, split, format!("create transfer: {}", e))
                    .await;
            }
        };

        let recorded = self
            .store
            .create_transfer(
                NewTransfer {
                    external_transfer_id: transfer.id.clone(),
                    origin: leg.origin.clone(),
                    destination: leg.destination.clone(),
                    destination_account: account,
                    currency: leg.currency.clone(),
                    amount: split.transferred_value,
                },
                split,
            )
            .await;
        if let Err(e) = recorded {
            // The retry re-sends under the same idempotency key and records
            // whatever transfer the processor returns.
            return self
                .queue_transfer(&leg, split, format!("record transfer {}: {}", transfer.id, e))
                .await;
        }

        info!(transfer_id = %transfer.id, amount = split.transferred_value, fee = split.fee_value, "transfer created");
        Ok(TransferOutcome::Transferred(transfer.id))
    }

    async fn queue_transfer(
        &self,
        leg: &PayoutLeg<'_>,
        split: FeeSplit,
        reason: String,
    ) -> Result<TransferOutcome, AppError> {
        warn!(leg = %leg.leg, destination = %leg.destination, currency = %leg.currency, reason = %reason, "transfer queued for retry");
        self.store
            .create_pending_transfer(NewPendingTransfer {
                origin: leg.origin.clone(),
                leg: leg.leg.clone(),
                destination: leg.destination.clone(),
                currency: leg.currency.clone(),
                source_transaction: leg.source_transaction.clone(),
                split,
                reason,
            })
            .await?;
        Ok(TransferOutcome::Queued)
    }
}
