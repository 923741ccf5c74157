//! Card-processor shapes (Stripe-compatible) exchanged with the gateway.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::intent::IntentStatus;
use super::money::CurrencyCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChargeList {
    #[serde(default)]
    pub data: Vec<Charge>,
}

/// Processor view of a payment intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorIntent {
    pub id: String,
    pub status: IntentStatus,
    pub currency: CurrencyCode,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_charge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charges: Option<ChargeList>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProcessorIntent {
    /// Charge that captured the funds; backs downstream transfers.
    pub fn charge_id(&self) -> Option<&str> {
        self.latest_charge.as_deref().or_else(|| {
            self.charges
                .as_ref()
                .and_then(|list| list.data.first())
                .map(|charge| charge.id.as_str())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Chargeable,
    Consumed,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Payment source (e.g. redirect-based methods) that may back an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub status: SourceStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Source {
    /// Intent the source was created for, if any.
    pub fn intent_id(&self) -> Option<&str> {
        self.metadata
            .get("payment_intent")
            .or_else(|| self.metadata.get("intent"))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorTransfer {
    pub id: String,
    pub amount: i64,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub source_transaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Event envelope as delivered to the webhook or fetched by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    #[serde(default)]
    pub request: Option<EventRequest>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: Option<bool>,
}

/// Decoded `data.object` of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventObject {
    PaymentIntent(ProcessorIntent),
    Source(Source),
    Other(String),
}

/// What a `payment_intent.*` event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentEventKind {
    Succeeded,
    PaymentFailed,
    Other,
}

impl ProcessorEvent {
    /// `data.object.object`, e.g. `payment_intent` or `source`.
    pub fn object_kind(&self) -> Option<&str> {
        self.data.object.get("object").and_then(|v| v.as_str())
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.request
            .as_ref()
            .and_then(|r| r.idempotency_key.as_deref())
    }

    pub fn intent_kind(&self) -> IntentEventKind {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => IntentEventKind::Succeeded,
            "payment_intent.payment_failed" => IntentEventKind::PaymentFailed,
            _ => IntentEventKind::Other,
        }
    }

    /// Decodes the inner object according to its kind.
    pub fn decode_object(&self) -> Result<EventObject, serde_json::Error> {
        match self.object_kind() {
            Some("payment_intent") => {
                serde_json::from_value(self.data.object.clone()).map(EventObject::PaymentIntent)
            }
            Some("source") => serde_json::from_value(self.data.object.clone()).map(EventObject::Source),
            Some(other) => Ok(EventObject::Other(other.to_string())),
            None => Ok(EventObject::Other(String::new())),
        }
    }
}

/// Parameters of `CreateIntent`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentParams {
    pub amount: i64,
    pub currency: CurrencyCode,
    pub payment_method: String,
    pub customer: Option<String>,
    pub statement_descriptor: Option<String>,
    pub confirm: bool,
    pub metadata: HashMap<String, String>,
}

/// Parameters of `CreateTransfer`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTransferParams {
    pub amount: i64,
    pub currency: CurrencyCode,
    pub destination: String,
    pub source_transaction: Option<String>,
    /// Purchase the transfer pays out.
    pub origin: String,
    /// Order or booking within `origin`.
    pub leg: String,
}

impl CreateTransferParams {
    /// Key the processor uses to collapse duplicate transfer requests.
    ///
    /// One key per payout leg, so retries of a leg collapse while sibling
    /// legs with the same destination and amount stay distinct.
    pub fn idempotency_key(&self) -> String {
        format!(
            "transfer:{}:{}:{}:{}:{}",
            self.origin, self.leg, self.destination, self.currency, self.amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent_event(kind: &str) -> ProcessorEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": kind,
            "request": { "id": "req_1", "idempotency_key": "idem_1" },
            "data": { "object": {
                "id": "pi_1",
                "object": "payment_intent",
                "status": "succeeded",
                "currency": "EUR",
                "amount": 1000,
                "charges": { "data": [ { "id": "ch_1" } ] }
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_payment_intent_event() {
        let event = intent_event("payment_intent.succeeded");

        assert_eq!(event.object_kind(), Some("payment_intent"));
        assert_eq!(event.idempotency_key(), Some("idem_1"));
        assert_eq!(event.intent_kind(), IntentEventKind::Succeeded);

        match event.decode_object().unwrap() {
            EventObject::PaymentIntent(intent) => {
                assert_eq!(intent.status, IntentStatus::Succeeded);
                assert_eq!(intent.currency.as_str(), "eur");
                assert_eq!(intent.charge_id(), Some("ch_1"));
            }
            other => panic!("unexpected object: {:?}", other),
        }
    }

    #[test]
    fn test_latest_charge_preferred() {
        let mut intent = match intent_event("payment_intent.succeeded").decode_object().unwrap() {
            EventObject::PaymentIntent(intent) => intent,
            _ => unreachable!(),
        };
        intent.latest_charge = Some("ch_latest".into());
        assert_eq!(intent.charge_id(), Some("ch_latest"));
    }

    #[test]
    fn test_decode_source_event() {
        let event: ProcessorEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "source.chargeable",
            "data": { "object": {
                "id": "src_1",
                "object": "source",
                "status": "chargeable",
                "metadata": { "payment_intent": "pi_9" }
            }}
        }))
        .unwrap();

        match event.decode_object().unwrap() {
            EventObject::Source(source) => {
                assert_eq!(source.status, SourceStatus::Chargeable);
                assert_eq!(source.intent_id(), Some("pi_9"));
            }
            other => panic!("unexpected object: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_object_kind() {
        let event: ProcessorEvent = serde_json::from_value(json!({
            "id": "evt_3",
            "type": "charge.refunded",
            "data": { "object": { "id": "ch_1", "object": "charge" } }
        }))
        .unwrap();

        assert_eq!(
            event.decode_object().unwrap(),
            EventObject::Other("charge".into())
        );
        assert_eq!(event.intent_kind(), IntentEventKind::Other);
    }

    #[test]
    fn test_transfer_key_distinguishes_legs() {
        let first = CreateTransferParams {
            amount: 850,
            currency: CurrencyCode::parse("eur").unwrap(),
            destination: "acct_seller_1".into(),
            source_transaction: Some("ch_1".into()),
            origin: "p1".into(),
            leg: "order:o1".into(),
        };
        let second = CreateTransferParams {
            leg: "order:o2".into(),
            ..first.clone()
        };

        assert_ne!(first.idempotency_key(), second.idempotency_key());
        assert_eq!(first.idempotency_key(), first.clone().idempotency_key());
    }
}
