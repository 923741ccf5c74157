//! In-memory repository adapter.
//!
//! Mirrors the Postgres semantics (row-level `ON CONFLICT DO NOTHING`,
//! `NotFound` on updates of missing rows, atomic multi-row writes) with one
//! mutex over all tables. Used by tests and local runs without a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use paycore_types::{
    ErrorLog, FeeSplit, IntentStatus, NewPaymentIntent, NewPendingEvent, NewPendingTransfer,
    NewReceivedEvent, NewTransfer, OutboxEvent, OutboxEventId, OutboxMutation, OutboxStatus,
    PaymentIntent, PaymentStore, PendingEvent, PendingTransfer, PurchaseId, ReceivedEvent,
    RepoError, Transfer, TransferRemainder,
};

#[derive(Default)]
struct Tables {
    intents: HashMap<String, PaymentIntent>,
    transfers: Vec<Transfer>,
    remainders: HashMap<String, TransferRemainder>,
    received: HashMap<String, ReceivedEvent>,
    pending_events: BTreeMap<String, PendingEvent>,
    pending_transfers: BTreeMap<i64, PendingTransfer>,
    next_pending_id: i64,
    error_logs: Vec<ErrorLog>,
    outbox: Vec<OutboxEvent>,
}

impl Tables {
    fn insert_intent(&mut self, intent: &NewPaymentIntent) {
        self.intents
            .entry(intent.external_intent_id.clone())
            .or_insert_with(|| intent.clone().into_intent(Utc::now()));
    }

    fn update_intent_status(
        &mut self,
        external_intent_id: &str,
        status: IntentStatus,
    ) -> Result<PaymentIntent, RepoError> {
        let intent = self
            .intents
            .get_mut(external_intent_id)
            .ok_or(RepoError::NotFound)?;
        intent.status = status;
        intent.last_update = Utc::now();
        Ok(intent.clone())
    }

    fn insert_transfer_pair(&mut self, transfer: &NewTransfer, split: &FeeSplit) {
        let now = Utc::now();
        let exists = self
            .transfers
            .iter()
            .any(|t| t.external_transfer_id == transfer.external_transfer_id);
        if !exists {
            self.transfers.push(Transfer {
                external_transfer_id: transfer.external_transfer_id.clone(),
                origin: transfer.origin.clone(),
                destination: transfer.destination.clone(),
                destination_account: transfer.destination_account.clone(),
                currency: transfer.currency.clone(),
                amount: transfer.amount,
                created_at: now,
            });
        }
        self.remainders
            .entry(transfer.external_transfer_id.clone())
            .or_insert_with(|| TransferRemainder::for_transfer(transfer, split, now));
    }
}

#[derive(Default)]
pub struct MemoryRepo {
    tables: Mutex<Tables>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every outbox row, published or not, in insertion order.
    pub async fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.tables.lock().await.outbox.clone()
    }

    pub async fn received_event_count(&self) -> usize {
        self.tables.lock().await.received.len()
    }
}

#[async_trait]
impl PaymentStore for MemoryRepo {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<(), RepoError> {
        self.tables.lock().await.insert_intent(&intent);
        Ok(())
    }

    async fn get_payment_intent(&self, external_intent_id: &str) -> Result<PaymentIntent, RepoError> {
        self.tables
            .lock()
            .await
            .intents
            .get(external_intent_id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn update_payment_intent_status(
        &self,
        external_intent_id: &str,
        status: IntentStatus,
    ) -> Result<PaymentIntent, RepoError> {
        self.tables
            .lock()
            .await
            .update_intent_status(external_intent_id, status)
    }

    async fn successful_payment_intents_by_origin(
        &self,
        origin: &PurchaseId,
    ) -> Result<Vec<PaymentIntent>, RepoError> {
        let intents = self.payment_intents_by_origin(origin).await?;
        Ok(intents
            .into_iter()
            .filter(|intent| intent.status == IntentStatus::Succeeded)
            .collect())
    }

    async fn payment_intents_by_origin(
        &self,
        origin: &PurchaseId,
    ) -> Result<Vec<PaymentIntent>, RepoError> {
        let tables = self.tables.lock().await;
        let mut intents: Vec<_> = tables
            .intents
            .values()
            .filter(|intent| &intent.origin == origin)
            .cloned()
            .collect();
        intents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.external_intent_id.cmp(&b.external_intent_id))
        });
        Ok(intents)
    }

    async fn create_transfer(&self, transfer: NewTransfer, split: FeeSplit) -> Result<(), RepoError> {
        self.tables
            .lock()
            .await
            .insert_transfer_pair(&transfer, &split);
        Ok(())
    }

    async fn transfers_by_origin(&self, origin: &PurchaseId) -> Result<Vec<Transfer>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transfers
            .iter()
            .filter(|t| &t.origin == origin)
            .cloned()
            .collect())
    }

    async fn transfer_remainder(&self, transfer_id: &str) -> Result<TransferRemainder, RepoError> {
        self.tables
            .lock()
            .await
            .remainders
            .get(transfer_id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn get_received_event(&self, event_id: &str) -> Result<ReceivedEvent, RepoError> {
        self.tables
            .lock()
            .await
            .received
            .get(event_id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn create_received_event(&self, event: NewReceivedEvent) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.received.contains_key(&event.event_id) {
            return Err(RepoError::Conflict(format!(
                "event {} already received",
                event.event_id
            )));
        }
        tables.received.insert(
            event.event_id.clone(),
            ReceivedEvent {
                event_id: event.event_id,
                idempotency_key: event.idempotency_key,
                event_type: event.event_type,
                is_handled: false,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn mark_event_handled(&self, event_id: &str) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let event = tables.received.get_mut(event_id).ok_or(RepoError::NotFound)?;
        event.is_handled = true;
        Ok(())
    }

    async fn create_pending_event(&self, event: NewPendingEvent) -> Result<(), RepoError> {
        let now = Utc::now();
        self.tables
            .lock()
            .await
            .pending_events
            .entry(event.event_id.clone())
            .or_insert_with(|| PendingEvent {
                event_id: event.event_id,
                intent_id: event.intent_id,
                reason: event.reason,
                attempts: 0,
                last_update: now,
                created_at: now,
            });
        Ok(())
    }

    async fn get_pending_event(&self, event_id: &str) -> Result<PendingEvent, RepoError> {
        self.tables
            .lock()
            .await
            .pending_events
            .get(event_id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_pending_events(&self) -> Result<Vec<PendingEvent>, RepoError> {
        let tables = self.tables.lock().await;
        let mut events: Vec<_> = tables.pending_events.values().cloned().collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    async fn record_pending_event_attempt(&self, event_id: &str, reason: &str) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let event = tables
            .pending_events
            .get_mut(event_id)
            .ok_or(RepoError::NotFound)?;
        event.attempts += 1;
        event.reason = reason.to_string();
        event.last_update = Utc::now();
        Ok(())
    }

    async fn delete_pending_event(&self, event_id: &str) -> Result<(), RepoError> {
        self.tables.lock().await.pending_events.remove(event_id);
        Ok(())
    }

    async fn create_pending_transfer(&self, transfer: NewPendingTransfer) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let duplicate = tables.pending_transfers.values().any(|p| {
            p.origin == transfer.origin && p.leg == transfer.leg && p.currency == transfer.currency
        });
        if duplicate {
            return Ok(());
        }
        tables.next_pending_id += 1;
        let id = tables.next_pending_id;
        tables.pending_transfers.insert(
            id,
            PendingTransfer {
                id,
                origin: transfer.origin,
                leg: transfer.leg,
                destination: transfer.destination,
                currency: transfer.currency,
                source_transaction: transfer.source_transaction,
                split: transfer.split,
                reason: transfer.reason,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_pending_transfers(&self) -> Result<Vec<PendingTransfer>, RepoError> {
        Ok(self
            .tables
            .lock()
            .await
            .pending_transfers
            .values()
            .cloned()
            .collect())
    }

    async fn complete_pending_transfer(&self, pending_id: i64, transfer: NewTransfer) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let pending = tables
            .pending_transfers
            .remove(&pending_id)
            .ok_or(RepoError::NotFound)?;
        tables.insert_transfer_pair(&transfer, &pending.split);
        Ok(())
    }

    async fn create_error_log(&self, event_id: &str, error: &str) -> Result<(), RepoError> {
        self.tables.lock().await.error_logs.push(ErrorLog {
            event_id: event_id.to_string(),
            error: error.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn error_logs(&self, event_id: &str) -> Result<Vec<ErrorLog>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .error_logs
            .iter()
            .filter(|log| log.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn save_event(&self, event: OutboxEvent, mutation: OutboxMutation) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        match &mutation {
            OutboxMutation::None => {}
            OutboxMutation::CreateIntent(intent) => tables.insert_intent(intent),
            OutboxMutation::UpdateIntentStatus {
                external_intent_id,
                status,
            } => {
                tables.update_intent_status(external_intent_id, *status)?;
            }
        }
        tables.outbox.push(event);
        Ok(())
    }

    async fn pending_outbox_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .outbox
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn update_outbox_status(
        &self,
        id: OutboxEventId,
        status: OutboxStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        if let Some(event) = tables.outbox.iter_mut().find(|e| e.id == id) {
            if status == OutboxStatus::Published {
                event.published_at = Some(Utc::now());
            }
            event.status = status;
            event.last_error = last_error;
            event.attempts += 1;
        }
        Ok(())
    }
}
