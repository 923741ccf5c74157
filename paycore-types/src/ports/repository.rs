//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, in-memory) implement this trait.

use crate::domain::{
    ErrorLog, FeeSplit, IntentStatus, NewPaymentIntent, NewPendingEvent, NewPendingTransfer,
    NewReceivedEvent, NewTransfer, OutboxEvent, OutboxEventId, OutboxMutation, OutboxStatus,
    PaymentIntent, PendingEvent, PendingTransfer, PurchaseId, ReceivedEvent, Transfer,
    TransferRemainder,
};
use crate::error::RepoError;

/// Durable state of the payment core.
///
/// Every mutation runs in its own short transaction. `create_*` operations are
/// idempotent at the row level (`ON CONFLICT DO NOTHING`): callers must re-read
/// when they need the stored row. `update_*` operations fail with
/// `RepoError::NotFound` when the row does not exist.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Payment intents
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<(), RepoError>;

    async fn get_payment_intent(&self, external_intent_id: &str)
    -> Result<PaymentIntent, RepoError>;

    async fn update_payment_intent_status(
        &self,
        external_intent_id: &str,
        status: IntentStatus,
    ) -> Result<PaymentIntent, RepoError>;

    /// Intents of `origin` whose status is `succeeded`.
    async fn successful_payment_intents_by_origin(
        &self,
        origin: &PurchaseId,
    ) -> Result<Vec<PaymentIntent>, RepoError>;

    async fn payment_intents_by_origin(
        &self,
        origin: &PurchaseId,
    ) -> Result<Vec<PaymentIntent>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Transfers (transfer + remainder are always written together)
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_transfer(&self, transfer: NewTransfer, split: FeeSplit)
    -> Result<(), RepoError>;

    async fn transfers_by_origin(&self, origin: &PurchaseId) -> Result<Vec<Transfer>, RepoError>;

    async fn transfer_remainder(&self, transfer_id: &str)
    -> Result<TransferRemainder, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Received events (exactly-once boundary)
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_received_event(&self, event_id: &str) -> Result<ReceivedEvent, RepoError>;

    /// Records an event id. Fails with `RepoError::Conflict` when the id was
    /// already recorded, so concurrent deliveries resolve to a single winner.
    async fn create_received_event(&self, event: NewReceivedEvent) -> Result<(), RepoError>;

    async fn mark_event_handled(&self, event_id: &str) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Pending events
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_pending_event(&self, event: NewPendingEvent) -> Result<(), RepoError>;

    async fn get_pending_event(&self, event_id: &str) -> Result<PendingEvent, RepoError>;

    async fn list_pending_events(&self) -> Result<Vec<PendingEvent>, RepoError>;

    /// Bumps `attempts` and `last_update` after a failed retry.
    async fn record_pending_event_attempt(
        &self,
        event_id: &str,
        reason: &str,
    ) -> Result<(), RepoError>;

    async fn delete_pending_event(&self, event_id: &str) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Pending transfers
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_pending_transfer(&self, transfer: NewPendingTransfer)
    -> Result<(), RepoError>;

    async fn list_pending_transfers(&self) -> Result<Vec<PendingTransfer>, RepoError>;

    /// Inserts the transfer and its remainder and deletes the pending row,
    /// all in one transaction.
    async fn complete_pending_transfer(
        &self,
        pending_id: i64,
        transfer: NewTransfer,
    ) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Error logs
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_error_log(&self, event_id: &str, error: &str) -> Result<(), RepoError>;

    async fn error_logs(&self, event_id: &str) -> Result<Vec<ErrorLog>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Outbox
    // ─────────────────────────────────────────────────────────────────────────────

    /// Applies `mutation` and records `event` in the same transaction.
    async fn save_event(
        &self,
        event: OutboxEvent,
        mutation: OutboxMutation,
    ) -> Result<(), RepoError>;

    async fn pending_outbox_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, RepoError>;

    async fn update_outbox_status(
        &self,
        id: OutboxEventId,
        status: OutboxStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError>;
}
