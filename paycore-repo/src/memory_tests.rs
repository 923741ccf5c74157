//! In-memory repository behaviour tests.

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use paycore_types::{
        CurrencyCode, EventLabel, FeeSplit, IntentStatus, NewPaymentIntent, NewPendingEvent,
        NewPendingTransfer, NewReceivedEvent, NewTransfer, OutboxEvent, OutboxMutation,
        OutboxStatus, PartyId, PaymentStore, PurchaseId, RepoError,
    };

    use crate::MemoryRepo;

    fn eur() -> CurrencyCode {
        CurrencyCode::parse("eur").unwrap()
    }

    fn new_intent(id: &str, origin: &str, status: IntentStatus) -> NewPaymentIntent {
        NewPaymentIntent {
            external_intent_id: id.to_string(),
            origin: PurchaseId::new(origin),
            status,
            currency: eur(),
            origin_amount: 1000,
        }
    }

    fn new_transfer(id: &str) -> NewTransfer {
        NewTransfer {
            external_transfer_id: id.to_string(),
            origin: PurchaseId::new("p1"),
            destination: PartyId::new("seller"),
            destination_account: "acct_1".into(),
            currency: eur(),
            amount: 850,
        }
    }

    #[tokio::test]
    async fn test_create_intent_is_idempotent() {
        let repo = MemoryRepo::new();

        repo.create_payment_intent(new_intent("pi_1", "p1", IntentStatus::Processing))
            .await
            .unwrap();
        repo.create_payment_intent(new_intent("pi_1", "p1", IntentStatus::Succeeded))
            .await
            .unwrap();

        let stored = repo.get_payment_intent("pi_1").await.unwrap();
        assert_eq!(stored.status, IntentStatus::Processing);
    }

    #[tokio::test]
    async fn test_update_missing_intent_is_not_found() {
        let repo = MemoryRepo::new();

        let result = repo
            .update_payment_intent_status("pi_missing", IntentStatus::Canceled)
            .await;

        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_successful_intents_filter_on_status() {
        let repo = MemoryRepo::new();
        repo.create_payment_intent(new_intent("pi_1", "p1", IntentStatus::Succeeded))
            .await
            .unwrap();
        repo.create_payment_intent(new_intent("pi_2", "p1", IntentStatus::Processing))
            .await
            .unwrap();
        repo.create_payment_intent(new_intent("pi_3", "p2", IntentStatus::Succeeded))
            .await
            .unwrap();

        let found = repo
            .successful_payment_intents_by_origin(&PurchaseId::new("p1"))
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].external_intent_id, "pi_1");
    }

    #[tokio::test]
    async fn test_received_event_inserted_once() {
        let repo = MemoryRepo::new();
        let event = NewReceivedEvent {
            event_id: "evt_1".into(),
            idempotency_key: Some("idem".into()),
            event_type: "payment_intent.succeeded".into(),
        };

        repo.create_received_event(event.clone()).await.unwrap();
        let second = repo.create_received_event(event).await;

        assert!(matches!(second, Err(RepoError::Conflict(_))));
        assert_eq!(repo.received_event_count().await, 1);

        repo.mark_event_handled("evt_1").await.unwrap();
        assert!(repo.get_received_event("evt_1").await.unwrap().is_handled);
    }

    #[tokio::test]
    async fn test_pending_event_attempts_and_delete() {
        let repo = MemoryRepo::new();
        let pending = NewPendingEvent {
            event_id: "evt_1".into(),
            intent_id: "pi_1".into(),
            reason: "intent not found".into(),
        };
        repo.create_pending_event(pending.clone()).await.unwrap();
        repo.create_pending_event(pending).await.unwrap();

        repo.record_pending_event_attempt("evt_1", "still missing")
            .await
            .unwrap();

        let events = repo.list_pending_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attempts, 1);
        assert_eq!(events[0].reason, "still missing");

        repo.delete_pending_event("evt_1").await.unwrap();
        assert!(repo.list_pending_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_written_with_remainder() {
        let repo = MemoryRepo::new();
        let split = FeeSplit::compute(1234, Decimal::new(15, 2)).unwrap();

        repo.create_transfer(new_transfer("tr_1"), split).await.unwrap();
        repo.create_transfer(new_transfer("tr_1"), split).await.unwrap();

        let transfers = repo.transfers_by_origin(&PurchaseId::new("p1")).await.unwrap();
        assert_eq!(transfers.len(), 1);

        let remainder = repo.transfer_remainder("tr_1").await.unwrap();
        assert_eq!(remainder.fee_value, 185);
        assert_eq!(remainder.fee_remainder, Decimal::new(1, 1));
    }

    #[tokio::test]
    async fn test_complete_pending_transfer_moves_row() {
        let repo = MemoryRepo::new();
        let split = FeeSplit {
            total_value: 1234,
            fee_value: 185,
            fee_remainder: Decimal::ZERO,
            transferred_value: 1049,
            transferred_remainder: Decimal::ZERO,
        };
        let pending = NewPendingTransfer {
            origin: PurchaseId::new("p1"),
            leg: "order:o1".into(),
            destination: PartyId::new("seller"),
            currency: eur(),
            source_transaction: Some("ch_1".into()),
            split,
            reason: "payout account unavailable".into(),
        };
        repo.create_pending_transfer(pending.clone()).await.unwrap();
        repo.create_pending_transfer(pending).await.unwrap();

        let rows = repo.list_pending_transfers().await.unwrap();
        assert_eq!(rows.len(), 1);

        let mut transfer = new_transfer("tr_9");
        transfer.amount = 1049;
        repo.complete_pending_transfer(rows[0].id, transfer).await.unwrap();

        assert!(repo.list_pending_transfers().await.unwrap().is_empty());
        let remainder = repo.transfer_remainder("tr_9").await.unwrap();
        assert_eq!(remainder.transferred_value, 1049);
        assert_eq!(remainder.total_value, 1234);

        let again = repo.complete_pending_transfer(rows[0].id, new_transfer("tr_10")).await;
        assert!(matches!(again, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_pending_transfers_keyed_by_leg() {
        let repo = MemoryRepo::new();
        let pending = |leg: &str, total: i64| NewPendingTransfer {
            origin: PurchaseId::new("p1"),
            leg: leg.into(),
            destination: PartyId::new("seller"),
            currency: eur(),
            source_transaction: None,
            split: FeeSplit::compute(total, Decimal::new(15, 2)).unwrap(),
            reason: "payout account unavailable".into(),
        };

        repo.create_pending_transfer(pending("order:o1", 1000)).await.unwrap();
        repo.create_pending_transfer(pending("order:o2", 1000)).await.unwrap();
        repo.create_pending_transfer(pending("order:o2", 1000)).await.unwrap();

        let mut legs: Vec<_> = repo
            .list_pending_transfers()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.leg)
            .collect();
        legs.sort();
        assert_eq!(legs, vec!["order:o1", "order:o2"]);
    }

    #[tokio::test]
    async fn test_save_event_applies_mutation_atomically() {
        let repo = MemoryRepo::new();

        repo.save_event(
            OutboxEvent::new(EventLabel::PaymentCreated, json!({ "id": "pi_1" })),
            OutboxMutation::CreateIntent(new_intent("pi_1", "p1", IntentStatus::Processing)),
        )
        .await
        .unwrap();

        // Missing intent: neither the status nor the outbox row is written
        let failed = repo
            .save_event(
                OutboxEvent::new(EventLabel::PaymentUpdated, json!({ "id": "pi_x" })),
                OutboxMutation::UpdateIntentStatus {
                    external_intent_id: "pi_x".into(),
                    status: IntentStatus::Succeeded,
                },
            )
            .await;

        assert!(matches!(failed, Err(RepoError::NotFound)));
        assert!(repo.get_payment_intent("pi_1").await.is_ok());
        assert_eq!(repo.outbox_events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_outbox_status_update() {
        let repo = MemoryRepo::new();
        let event = OutboxEvent::new(EventLabel::OrderPlaced, json!({}));
        let id = event.id;
        repo.save_event(event, OutboxMutation::None).await.unwrap();

        repo.update_outbox_status(id, OutboxStatus::Pending, Some("timeout".into()))
            .await
            .unwrap();
        let pending = repo.pending_outbox_events(10).await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("timeout"));

        repo.update_outbox_status(id, OutboxStatus::Published, None)
            .await
            .unwrap();
        assert!(repo.pending_outbox_events(10).await.unwrap().is_empty());
        assert!(repo.outbox_events().await[0].published_at.is_some());
    }
}
