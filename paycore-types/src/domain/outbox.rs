//! Outbox rows: outbound events recorded in the same transaction as the
//! mutation that justifies them, published later by the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::intent::{IntentStatus, NewPaymentIntent};

/// Unique identifier for an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxEventId(Uuid);

impl OutboxEventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for OutboxEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label of an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventLabel {
    #[serde(rename = "payment-created")]
    PaymentCreated,
    #[serde(rename = "payment-updated")]
    PaymentUpdated,
    #[serde(rename = "order.placed")]
    OrderPlaced,
}

impl AsRef<str> for EventLabel {
    fn as_ref(&self) -> &str {
        match self {
            Self::PaymentCreated => "payment-created",
            Self::PaymentUpdated => "payment-updated",
            Self::OrderPlaced => "order.placed",
        }
    }
}

impl std::fmt::Display for EventLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for EventLabel {
    type Err = crate::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment-created" => Ok(Self::PaymentCreated),
            "payment-updated" => Ok(Self::PaymentUpdated),
            "order.placed" => Ok(Self::OrderPlaced),
            other => Err(crate::error::DomainError::ValidationError(format!(
                "Unknown event label: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutboxStatus {
    #[default]
    Pending,
    Published,
}

impl AsRef<str> for OutboxStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: OutboxEventId,
    pub label: EventLabel,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl OutboxEvent {
    pub fn new(label: EventLabel, payload: serde_json::Value) -> Self {
        Self {
            id: OutboxEventId::new(),
            label,
            payload,
            status: OutboxStatus::Pending,
            created_at: Utc::now(),
            published_at: None,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Business mutation committed atomically with an outbox row.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboxMutation {
    /// The event stands on its own.
    None,
    /// Insert an intent row (`ON CONFLICT DO NOTHING`).
    CreateIntent(NewPaymentIntent),
    /// Overwrite the status of an existing intent; fails with `NotFound` if absent.
    UpdateIntentStatus {
        external_intent_id: String,
        status: IntentStatus,
    },
}
