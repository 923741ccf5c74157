//! Database row structs for the PostgreSQL adapter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use paycore_types::{
    CurrencyCode, ErrorLog, FeeSplit, OutboxEvent, OutboxEventId, OutboxStatus, PartyId,
    PaymentIntent, PendingEvent, PendingTransfer, PurchaseId, ReceivedEvent, RepoError, Transfer,
    TransferRemainder,
};

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
pub struct DbPaymentIntent {
    pub external_intent_id: String,
    pub origin: String,
    pub status: String,
    pub currency: String,
    pub origin_amount: i64,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl DbPaymentIntent {
    pub fn into_domain(self) -> Result<PaymentIntent, RepoError> {
        Ok(PaymentIntent {
            external_intent_id: self.external_intent_id,
            origin: PurchaseId::new(self.origin),
            status: self.status.parse()?,
            currency: CurrencyCode::parse(&self.currency)?,
            origin_amount: self.origin_amount,
            created_at: self.created_at,
            last_update: self.last_update,
        })
    }
}

#[derive(FromRow)]
pub struct DbTransfer {
    pub external_transfer_id: String,
    pub origin: String,
    pub destination: String,
    pub destination_account: String,
    pub currency: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl DbTransfer {
    pub fn into_domain(self) -> Result<Transfer, RepoError> {
        Ok(Transfer {
            external_transfer_id: self.external_transfer_id,
            origin: PurchaseId::new(self.origin),
            destination: PartyId::new(self.destination),
            destination_account: self.destination_account,
            currency: CurrencyCode::parse(&self.currency)?,
            amount: self.amount,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
pub struct DbTransferRemainder {
    pub transfer_id: String,
    pub destination: String,
    pub destination_account: String,
    pub currency: String,
    pub total_value: i64,
    pub fee_value: i64,
    pub transferred_value: i64,
    pub fee_remainder: Decimal,
    pub transferred_remainder: Decimal,
    pub created_at: DateTime<Utc>,
}

impl DbTransferRemainder {
    pub fn into_domain(self) -> Result<TransferRemainder, RepoError> {
        Ok(TransferRemainder {
            transfer_id: self.transfer_id,
            destination: PartyId::new(self.destination),
            destination_account: self.destination_account,
            currency: CurrencyCode::parse(&self.currency)?,
            total_value: self.total_value,
            fee_value: self.fee_value,
            transferred_value: self.transferred_value,
            fee_remainder: self.fee_remainder.normalize(),
            transferred_remainder: self.transferred_remainder.normalize(),
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
pub struct DbReceivedEvent {
    pub event_id: String,
    pub idempotency_key: Option<String>,
    pub event_type: String,
    pub is_handled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbReceivedEvent> for ReceivedEvent {
    fn from(row: DbReceivedEvent) -> Self {
        Self {
            event_id: row.event_id,
            idempotency_key: row.idempotency_key,
            event_type: row.event_type,
            is_handled: row.is_handled,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
pub struct DbPendingEvent {
    pub event_id: String,
    pub intent_id: String,
    pub reason: String,
    pub attempts: i32,
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<DbPendingEvent> for PendingEvent {
    fn from(row: DbPendingEvent) -> Self {
        Self {
            event_id: row.event_id,
            intent_id: row.intent_id,
            reason: row.reason,
            attempts: row.attempts,
            last_update: row.last_update,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
pub struct DbPendingTransfer {
    pub id: i64,
    pub origin: String,
    pub leg: String,
    pub destination: String,
    pub currency: String,
    pub source_transaction: Option<String>,
    pub total_value: i64,
    pub fee_value: i64,
    pub transferred_value: i64,
    pub fee_remainder: Decimal,
    pub transferred_remainder: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl DbPendingTransfer {
    pub fn into_domain(self) -> Result<PendingTransfer, RepoError> {
        Ok(PendingTransfer {
            id: self.id,
            origin: PurchaseId::new(self.origin),
            leg: self.leg,
            destination: PartyId::new(self.destination),
            currency: CurrencyCode::parse(&self.currency)?,
            source_transaction: self.source_transaction,
            split: FeeSplit {
                total_value: self.total_value,
                fee_value: self.fee_value,
                fee_remainder: self.fee_remainder.normalize(),
                transferred_value: self.transferred_value,
                transferred_remainder: self.transferred_remainder.normalize(),
            },
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
pub struct DbErrorLog {
    pub event_id: String,
    pub error: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbErrorLog> for ErrorLog {
    fn from(row: DbErrorLog) -> Self {
        Self {
            event_id: row.event_id,
            error: row.error,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
pub struct DbOutboxEvent {
    pub id: Uuid,
    pub label: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl DbOutboxEvent {
    pub fn into_domain(self) -> Result<OutboxEvent, RepoError> {
        let status = match self.status.as_str() {
            "PUBLISHED" => OutboxStatus::Published,
            _ => OutboxStatus::Pending,
        };

        Ok(OutboxEvent {
            id: OutboxEventId::from_uuid(self.id),
            label: self.label.parse()?,
            payload: self.payload,
            status,
            created_at: self.created_at,
            published_at: self.published_at,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}
