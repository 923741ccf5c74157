//! Payment intent domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::money::CurrencyCode;
use super::purchase::PurchaseId;
use crate::error::DomainError;

/// Processor-reported status of a payment intent.
///
/// Stored verbatim: the local view reflects whichever report arrived last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    #[serde(alias = "requires_source")]
    RequiresPaymentMethod,
    RequiresConfirmation,
    #[serde(alias = "requires_source_action")]
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        }
    }

    /// `succeeded` and `canceled` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requires_payment_method" | "requires_source" => Ok(Self::RequiresPaymentMethod),
            "requires_confirmation" => Ok(Self::RequiresConfirmation),
            "requires_action" | "requires_source_action" => Ok(Self::RequiresAction),
            "processing" => Ok(Self::Processing),
            "requires_capture" => Ok(Self::RequiresCapture),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" => Ok(Self::Canceled),
            other => Err(DomainError::ValidationError(format!(
                "Unknown intent status: {}",
                other
            ))),
        }
    }
}

/// Local record of one processor intent; one per currency of a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor identifier (`pi_...`), unique.
    pub external_intent_id: String,
    /// Purchase the intent pays for.
    pub origin: PurchaseId,
    pub status: IntentStatus,
    pub currency: CurrencyCode,
    /// Amount in minor units; never changes after creation.
    pub origin_amount: i64,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// Row to insert for a freshly created processor intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaymentIntent {
    pub external_intent_id: String,
    pub origin: PurchaseId,
    pub status: IntentStatus,
    pub currency: CurrencyCode,
    pub origin_amount: i64,
}

impl NewPaymentIntent {
    /// Stamps the row with the given creation time.
    pub fn into_intent(self, now: DateTime<Utc>) -> PaymentIntent {
        PaymentIntent {
            external_intent_id: self.external_intent_id,
            origin: self.origin,
            status: self.status,
            currency: self.currency,
            origin_amount: self.origin_amount,
            created_at: now,
            last_update: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            IntentStatus::RequiresPaymentMethod,
            IntentStatus::RequiresAction,
            IntentStatus::Succeeded,
            IntentStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<IntentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_legacy_source_statuses_are_accepted() {
        let status: IntentStatus = serde_json::from_str("\"requires_source\"").unwrap();
        assert_eq!(status, IntentStatus::RequiresPaymentMethod);
        assert_eq!(
            "requires_source_action".parse::<IntentStatus>().unwrap(),
            IntentStatus::RequiresAction
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(IntentStatus::Succeeded.is_terminal());
        assert!(IntentStatus::Canceled.is_terminal());
        assert!(!IntentStatus::Processing.is_terminal());
    }
}
