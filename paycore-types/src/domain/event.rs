//! Inbound processor events: deduplication, deferred retries and error logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker that an inbound event id has been seen.
///
/// Inserted at most once per `event_id`; `is_handled` only moves false -> true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedEvent {
    pub event_id: String,
    pub idempotency_key: Option<String>,
    pub event_type: String,
    pub is_handled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReceivedEvent {
    pub event_id: String,
    pub idempotency_key: Option<String>,
    pub event_type: String,
}

/// An intent event that arrived before the local intent row existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub event_id: String,
    pub intent_id: String,
    pub reason: String,
    pub attempts: i32,
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPendingEvent {
    pub event_id: String,
    pub intent_id: String,
    pub reason: String,
}

/// Append-only record of a non-fatal failure tied to an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub event_id: String,
    pub error: String,
    pub created_at: DateTime<Utc>,
}
