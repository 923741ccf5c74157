//! Notifications for buyers, sellers and hosts.
//!
//! Publishing is best effort: failures are logged and never fail the caller.

use std::collections::HashMap;

use tracing::{debug, warn};

use paycore_types::{
    CurrencyTotals, Notification, PartyId, PaymentStatus, PaymentStore, ProcessorIntent,
    Purchase, Topic,
};

use super::PaymentService;

impl<S: PaymentStore> PaymentService<S> {
    async fn publish_notification(&self, topic: Topic, notification: Notification) {
        let payload = match serde_json::to_value(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%topic, "could not encode notification: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .publisher
            .publish(topic.as_ref(), payload, HashMap::new())
            .await
        {
            warn!(%topic, "notification not published: {}", e);
        }
    }

    /// Buyer receipt for one intent.
    pub(crate) async fn notify_payment_received(
        &self,
        purchase: &Purchase,
        intent: &ProcessorIntent,
        success: bool,
    ) {
        let Some(email) = purchase.email.as_deref() else {
            debug!(origin = %purchase.id, "purchase has no email, skipping receipt");
            return;
        };
        let notification = Notification::new(&purchase.site, purchase.language.as_deref(), email)
            .with("purchase_id", purchase.id.as_str())
            .with("intent_id", intent.id.as_str())
            .with("amount", intent.amount)
            .with("currency", intent.currency.as_str())
            .with("success", success);
        self.publish_notification(Topic::PaymentReceived, notification)
            .await;
    }

    /// Buyer-facing purchase status.
    pub(crate) async fn notify_payment_status(&self, purchase: &Purchase, status: PaymentStatus) {
        let Some(email) = purchase.email.as_deref() else {
            debug!(origin = %purchase.id, "purchase has no email, skipping status");
            return;
        };
        let notification = Notification::new(&purchase.site, purchase.language.as_deref(), email)
            .with("purchase_id", purchase.id.as_str())
            .with("status", status.to_string());
        self.publish_notification(Topic::PaymentStatus, notification)
            .await;
    }

    /// Sale notice for the seller of an order or the host of a booking.
    pub(crate) async fn notify_sale_complete(
        &self,
        purchase: &Purchase,
        party: &PartyId,
        kind: &str,
        id: &str,
        totals: &CurrencyTotals,
    ) {
        let recipient = match self.users.get_customer(party).await {
            Ok(customer) => customer,
            Err(e) => {
                warn!(party = %party, "could not resolve sale recipient: {}", e);
                return;
            }
        };
        let Some(email) = recipient.email.as_deref() else {
            debug!(party = %party, "recipient has no email, skipping sale notice");
            return;
        };

        let totals: serde_json::Map<String, serde_json::Value> = totals
            .iter()
            .map(|(currency, amount)| (currency.to_string(), (*amount).into()))
            .collect();
        let notification =
            Notification::new(&purchase.site, recipient.language.as_deref(), email)
                .with("purchase_id", purchase.id.as_str())
                .with("kind", kind)
                .with("id", id)
                .with("totals", totals);
        self.publish_notification(Topic::SaleComplete, notification)
            .await;
    }
}
