//! Read-only records owned by peer services (users, sites) and the
//! notification message published to topics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::purchase::PartyId;

/// A user as known by the user service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: PartyId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Processor customer id (`cus_...`)
    #[serde(default)]
    pub processor_customer_id: Option<String>,
    /// Processor payment method used when the purchase names none
    #[serde(default)]
    pub default_payment_method: Option<String>,
}

/// Site metadata from the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Platform fee rate in `[0, 1)`
    pub fee: Decimal,
}

/// Pub/sub topics the payment core publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Buyer-facing purchase status
    PaymentStatus,
    /// Buyer receipt for one intent
    PaymentReceived,
    /// Seller/host sale notice
    SaleComplete,
    /// Relayed outbox events
    PaymentEvents,
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        match self {
            Self::PaymentStatus => "payment-status-topic",
            Self::PaymentReceived => "payment-received-topic",
            Self::SaleComplete => "sale-complete-topic",
            Self::PaymentEvents => "payment-events",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Message consumed by the notification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub site: String,
    pub language: String,
    pub email: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Notification {
    pub fn new(site: impl Into<String>, language: Option<&str>, email: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            language: language.unwrap_or("en").to_string(),
            email: email.into(),
            data: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}
