//! Data Transfer Objects (DTOs) for requests and responses.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CurrencyCode, IntentStatus, PaymentIntent, ProcessorIntent, PurchaseId};

// ─────────────────────────────────────────────────────────────────────────────
// Payment intent DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Payment intent as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentView {
    /// Processor intent identifier
    #[schema(example = "pi_3MtwBwLkdIwHu7ix28a3tqPa")]
    pub id: String,
    /// Purchase the intent pays for
    pub origin: PurchaseId,
    pub status: IntentStatus,
    pub currency: CurrencyCode,
    /// Amount in minor units
    #[schema(example = 1000)]
    pub amount: i64,
    /// Secret the client needs to finish the payment (3-D Secure etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub next_action: Option<serde_json::Value>,
    /// Set when the card was declined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "insufficient_funds")]
    pub decline_code: Option<String>,
}

impl PaymentIntentView {
    /// View of a fresh processor intent.
    pub fn from_processor(origin: PurchaseId, intent: &ProcessorIntent) -> Self {
        Self {
            id: intent.id.clone(),
            origin,
            status: intent.status,
            currency: intent.currency.clone(),
            amount: intent.amount,
            client_secret: intent.client_secret.clone(),
            next_action: intent.next_action.clone(),
            decline_code: None,
        }
    }

    pub fn with_decline_code(mut self, code: impl Into<String>) -> Self {
        self.decline_code = Some(code.into());
        self
    }
}

impl From<PaymentIntent> for PaymentIntentView {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.external_intent_id,
            origin: intent.origin,
            status: intent.status,
            currency: intent.currency,
            amount: intent.origin_amount,
            client_secret: None,
            next_action: None,
            decline_code: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Common responses
// ─────────────────────────────────────────────────────────────────────────────

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Resource not found")]
    pub error: String,
    #[schema(example = 404)]
    pub code: u16,
}
