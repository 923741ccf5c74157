//! Transfers to seller/host payout accounts and their deferred retries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{CurrencyCode, FeeSplit};
use super::purchase::{PartyId, PurchaseId};

/// A transfer created at the processor and recorded locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub external_transfer_id: String,
    pub origin: PurchaseId,
    pub destination: PartyId,
    pub destination_account: String,
    pub currency: CurrencyCode,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub external_transfer_id: String,
    pub origin: PurchaseId,
    pub destination: PartyId,
    pub destination_account: String,
    pub currency: CurrencyCode,
    pub amount: i64,
}

/// Fee bookkeeping recorded next to every transfer.
///
/// `total_value = fee_value + transferred_value + ceil(fee_remainder + transferred_remainder)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRemainder {
    pub transfer_id: String,
    pub destination: PartyId,
    pub destination_account: String,
    pub currency: CurrencyCode,
    pub total_value: i64,
    pub fee_value: i64,
    pub transferred_value: i64,
    pub fee_remainder: Decimal,
    pub transferred_remainder: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TransferRemainder {
    /// Builds the remainder row for `transfer` from its fee split.
    pub fn for_transfer(transfer: &NewTransfer, split: &FeeSplit, now: DateTime<Utc>) -> Self {
        Self {
            transfer_id: transfer.external_transfer_id.clone(),
            destination: transfer.destination.clone(),
            destination_account: transfer.destination_account.clone(),
            currency: transfer.currency.clone(),
            total_value: split.total_value,
            fee_value: split.fee_value,
            transferred_value: split.transferred_value,
            fee_remainder: split.fee_remainder,
            transferred_remainder: split.transferred_remainder,
            created_at: now,
        }
    }

    pub fn split(&self) -> FeeSplit {
        FeeSplit {
            total_value: self.total_value,
            fee_value: self.fee_value,
            fee_remainder: self.fee_remainder,
            transferred_value: self.transferred_value,
            transferred_remainder: self.transferred_remainder,
        }
    }
}

/// Identifies one payout leg of a purchase: `order:<id>` or `booking:<id>`.
pub fn leg_key(kind: &str, id: &str) -> String {
    format!("{}:{}", kind, id)
}

/// A payout leg that could not be completed synchronously.
///
/// At most one row exists per `(origin, leg, currency)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub id: i64,
    pub origin: PurchaseId,
    pub leg: String,
    pub destination: PartyId,
    pub currency: CurrencyCode,
    /// Charge backing the transfer, when it was known at enqueue time.
    pub source_transaction: Option<String>,
    pub split: FeeSplit,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPendingTransfer {
    pub origin: PurchaseId,
    pub leg: String,
    pub destination: PartyId,
    pub currency: CurrencyCode,
    pub source_transaction: Option<String>,
    pub split: FeeSplit,
    pub reason: String,
}
