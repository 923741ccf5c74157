//! Purchase model as served by the purchase service.
//!
//! A purchase holds orders (one seller each) and bookings (one host each).
//! The payment core only reads it and reports status changes back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::money::{CurrencyCode, Money};
use crate::error::DomainError;

/// Identifier of a purchase; the `origin` of intents and transfers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct PurchaseId(String);

impl PurchaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a user: buyer, seller or host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct PartyId(String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment status reported to the purchase service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-currency amounts in minor units, ordered by currency code.
pub type CurrencyTotals = BTreeMap<CurrencyCode, i64>;

fn add_to(totals: &mut CurrencyTotals, currency: &CurrencyCode, amount: i64) -> Result<(), DomainError> {
    let entry = totals.entry(currency.clone()).or_insert(0);
    *entry = entry.checked_add(amount).ok_or(DomainError::Overflow)?;
    Ok(())
}

fn line_total(price: i64, quantity: i64) -> Result<i64, DomainError> {
    price.checked_mul(quantity).ok_or(DomainError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Unit price in minor units
    #[schema(example = 1000)]
    pub price: i64,
    #[schema(example = 1)]
    pub quantity: i64,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Delivery {
    /// Delivery fee in minor units
    pub price: i64,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: String,
    pub seller_id: PartyId,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub delivery: Option<Delivery>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl Order {
    /// Item totals grouped by currency, plus the delivery fee in its own currency.
    pub fn totals_by_currency(&self) -> Result<CurrencyTotals, DomainError> {
        let mut totals = CurrencyTotals::new();
        for item in &self.items {
            add_to(&mut totals, &item.currency, line_total(item.price, item.quantity)?)?;
        }
        if let Some(delivery) = &self.delivery {
            add_to(&mut totals, &delivery.currency, delivery.price)?;
        }
        Ok(totals)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: String,
    pub host_id: PartyId,
    pub price: i64,
    pub quantity: i64,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl Booking {
    pub fn total(&self) -> Result<Money, DomainError> {
        Money::new(line_total(self.price, self.quantity)?, self.currency.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Purchase {
    pub id: PurchaseId,
    /// URL of the site the purchase was made on
    #[schema(example = "https://shop.example.com")]
    pub site: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub buyer_id: Option<PartyId>,
    /// Processor payment method (`pm_...`); falls back to the buyer's default
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub statement_descriptor: Option<String>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl Purchase {
    /// Rejects purchases that cannot be charged.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.as_str().trim().is_empty() {
            return Err(DomainError::ValidationError("Purchase id is required".into()));
        }
        if self.orders.is_empty() && self.bookings.is_empty() {
            return Err(DomainError::ValidationError(
                "Purchase has no orders or bookings".into(),
            ));
        }
        for order in &self.orders {
            if order.items.is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "Order {} has no items",
                    order.id
                )));
            }
            for item in &order.items {
                check_line(item.price, item.quantity)?;
            }
            if let Some(delivery) = &order.delivery {
                if delivery.price < 0 {
                    return Err(DomainError::NegativeAmount);
                }
            }
        }
        for booking in &self.bookings {
            check_line(booking.price, booking.quantity)?;
        }
        let totals = self.expected_totals()?;
        if totals.values().all(|amount| *amount == 0) {
            return Err(DomainError::ValidationError("Purchase total is zero".into()));
        }
        Ok(())
    }

    /// Amount the buyer owes per currency: orders (items and delivery) and bookings.
    pub fn expected_totals(&self) -> Result<CurrencyTotals, DomainError> {
        let mut totals = CurrencyTotals::new();
        for order in &self.orders {
            for (currency, amount) in order.totals_by_currency()? {
                add_to(&mut totals, &currency, amount)?;
            }
        }
        for booking in &self.bookings {
            let total = booking.total()?;
            add_to(&mut totals, total.currency(), total.amount())?;
        }
        Ok(totals)
    }
}

fn check_line(price: i64, quantity: i64) -> Result<(), DomainError> {
    if price < 0 {
        return Err(DomainError::NegativeAmount);
    }
    if quantity < 1 {
        return Err(DomainError::ValidationError(
            "Quantity must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: &str) -> CurrencyCode {
        CurrencyCode::parse(c).unwrap()
    }

    fn item(price: i64, quantity: i64, currency: &str) -> Item {
        Item {
            id: None,
            name: None,
            price,
            quantity,
            currency: code(currency),
        }
    }

    fn purchase(orders: Vec<Order>, bookings: Vec<Booking>) -> Purchase {
        Purchase {
            id: PurchaseId::new("p1"),
            site: "https://shop.example.com".into(),
            language: None,
            email: None,
            buyer_id: None,
            payment_method: None,
            statement_descriptor: None,
            status: None,
            orders,
            bookings,
        }
    }

    #[test]
    fn test_order_totals_group_by_currency_with_delivery() {
        let order = Order {
            id: "o1".into(),
            seller_id: PartyId::new("s1"),
            items: vec![item(500, 2, "EUR"), item(300, 1, "usd"), item(100, 3, "eur")],
            delivery: Some(Delivery {
                price: 250,
                currency: code("eur"),
            }),
            payment_status: None,
        };

        let totals = order.totals_by_currency().unwrap();

        assert_eq!(totals.get(&code("eur")), Some(&1550));
        assert_eq!(totals.get(&code("usd")), Some(&300));
    }

    #[test]
    fn test_expected_totals_include_bookings() {
        let order = Order {
            id: "o1".into(),
            seller_id: PartyId::new("s1"),
            items: vec![item(500, 1, "eur")],
            delivery: None,
            payment_status: None,
        };
        let booking = Booking {
            id: "b1".into(),
            host_id: PartyId::new("h1"),
            price: 350,
            quantity: 2,
            currency: code("usd"),
            payment_status: None,
        };

        let totals = purchase(vec![order], vec![booking]).expected_totals().unwrap();

        assert_eq!(totals.get(&code("eur")), Some(&500));
        assert_eq!(totals.get(&code("usd")), Some(&700));
    }

    #[test]
    fn test_empty_purchase_is_invalid() {
        let result = purchase(vec![], vec![]).validate();
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_zero_quantity_is_invalid() {
        let order = Order {
            id: "o1".into(),
            seller_id: PartyId::new("s1"),
            items: vec![item(500, 0, "eur")],
            delivery: None,
            payment_status: None,
        };
        assert!(purchase(vec![order], vec![]).validate().is_err());
    }

    #[test]
    fn test_overflowing_line_is_rejected() {
        let order = Order {
            id: "o1".into(),
            seller_id: PartyId::new("s1"),
            items: vec![item(i64::MAX, 2, "eur")],
            delivery: None,
            payment_status: None,
        };
        assert!(matches!(
            order.totals_by_currency(),
            Err(DomainError::Overflow)
        ));
    }
}
