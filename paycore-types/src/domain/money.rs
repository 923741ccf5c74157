//! Integer money in minor units and the platform fee split.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::DomainError;

/// Lowercased three-letter ISO 4217 currency code (`eur`, `usd`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "eur")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    pub fn parse(code: &str) -> Result<Self, DomainError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Amount in the smallest unit of its currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: i64, currency: CurrencyCode) -> Result<Self, DomainError> {
        if amount < 0 {
            return Err(DomainError::NegativeAmount);
        }
        Ok(Self { amount, currency })
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    /// Checked addition - returns error if currencies don't match or the sum overflows.
    pub fn checked_add(&self, other: &Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency.to_string(),
                got: other.currency.to_string(),
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(DomainError::Overflow)?;
        Ok(Money {
            amount,
            currency: self.currency.clone(),
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Fee rate applied when a purchase's site is unknown.
pub fn default_fee_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// Split of a gross amount into the platform fee and the net transfer.
///
/// Both integer parts are floored; the fractional parts are kept exactly.
/// Since `fee + net == total`, the two remainders always add up to either
/// 0 or 1: that single minor unit is never transferred and stays with the
/// platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeeSplit {
    pub total_value: i64,
    pub fee_value: i64,
    pub fee_remainder: Decimal,
    pub transferred_value: i64,
    pub transferred_remainder: Decimal,
}

impl FeeSplit {
    /// Computes the split of `total` minor units at `fee_rate` in `[0, 1)`.
    pub fn compute(total: i64, fee_rate: Decimal) -> Result<Self, DomainError> {
        if total < 0 {
            return Err(DomainError::NegativeAmount);
        }
        if fee_rate < Decimal::ZERO || fee_rate >= Decimal::ONE {
            return Err(DomainError::InvalidFeeRate(fee_rate));
        }

        let gross = Decimal::from(total);
        let fee_to_collect = gross.checked_mul(fee_rate).ok_or(DomainError::Overflow)?;
        let fee_floor = fee_to_collect.floor();
        let net = gross - fee_to_collect;
        let net_floor = net.floor();

        Ok(Self {
            total_value: total,
            fee_value: fee_floor.to_i64().ok_or(DomainError::Overflow)?,
            fee_remainder: (fee_to_collect - fee_floor).normalize(),
            transferred_value: net_floor.to_i64().ok_or(DomainError::Overflow)?,
            transferred_remainder: (net - net_floor).normalize(),
        })
    }

    /// Minor units retained by the platform on top of `fee_value`.
    pub fn unallocated(&self) -> i64 {
        (self.fee_remainder + self.transferred_remainder)
            .ceil()
            .to_i64()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    #[test]
    fn test_currency_is_lowercased() {
        assert_eq!(eur().as_str(), "eur");
    }

    #[test]
    fn test_invalid_currency_fails() {
        assert!(matches!(
            CurrencyCode::parse("euro"),
            Err(DomainError::InvalidCurrency(_))
        ));
        assert!(CurrencyCode::parse("e1r").is_err());
    }

    #[test]
    fn test_currency_deserializes_lowercased() {
        let code: CurrencyCode = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(code.as_str(), "usd");
    }

    #[test]
    fn test_negative_money_fails() {
        assert!(matches!(
            Money::new(-1, eur()),
            Err(DomainError::NegativeAmount)
        ));
    }

    #[test]
    fn test_money_addition_and_mismatch() {
        let a = Money::new(100, eur()).unwrap();
        let b = Money::new(50, eur()).unwrap();
        assert_eq!(a.checked_add(&b).unwrap().amount(), 150);

        let usd = Money::new(50, CurrencyCode::parse("usd").unwrap()).unwrap();
        assert!(matches!(
            a.checked_add(&usd),
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_default_fee_split() {
        let split = FeeSplit::compute(1000, default_fee_rate()).unwrap();
        assert_eq!(split.fee_value, 150);
        assert_eq!(split.transferred_value, 850);
        assert_eq!(split.fee_remainder, Decimal::ZERO);
        assert_eq!(split.transferred_remainder, Decimal::ZERO);
    }

    #[test]
    fn test_site_fee_split_is_exact() {
        let split = FeeSplit::compute(1000, Decimal::from_str("0.155").unwrap()).unwrap();
        assert_eq!(split.fee_value, 155);
        assert_eq!(split.transferred_value, 845);
        assert_eq!(split.fee_remainder, Decimal::ZERO);
        assert_eq!(split.transferred_remainder, Decimal::ZERO);
    }

    #[test]
    fn test_fractional_cent_is_retained() {
        let split = FeeSplit::compute(1234, default_fee_rate()).unwrap();
        assert_eq!(split.fee_value, 185);
        assert_eq!(split.transferred_value, 1048);
        assert_eq!(split.fee_remainder, Decimal::from_str("0.1").unwrap());
        assert_eq!(split.transferred_remainder, Decimal::from_str("0.9").unwrap());
        assert_eq!(split.unallocated(), 1);
        assert_eq!(
            split.fee_value + split.transferred_value + split.unallocated(),
            split.total_value
        );
    }

    #[test]
    fn test_split_invariants_hold_across_inputs() {
        let rates = ["0", "0.01", "0.07", "0.1", "0.15", "0.155", "0.3333", "0.5", "0.999"];
        for rate in rates {
            let rate = Decimal::from_str(rate).unwrap();
            for total in [0_i64, 1, 3, 7, 99, 100, 101, 999, 1234, 50_001, 9_999_999] {
                let split = FeeSplit::compute(total, rate).unwrap();
                assert!(split.fee_remainder >= Decimal::ZERO && split.fee_remainder < Decimal::ONE);
                assert!(
                    split.transferred_remainder >= Decimal::ZERO
                        && split.transferred_remainder < Decimal::ONE
                );
                assert!(split.fee_value + split.transferred_value + split.unallocated() <= total);
                assert_eq!(
                    split.fee_value + split.transferred_value + split.unallocated(),
                    total,
                    "total={} rate={}",
                    total,
                    rate
                );
            }
        }
    }

    #[test]
    fn test_invalid_fee_rate_fails() {
        assert!(matches!(
            FeeSplit::compute(100, Decimal::ONE),
            Err(DomainError::InvalidFeeRate(_))
        ));
        assert!(FeeSplit::compute(100, Decimal::from_str("-0.1").unwrap()).is_err());
        assert!(matches!(
            FeeSplit::compute(-5, default_fee_rate()),
            Err(DomainError::NegativeAmount)
        ));
    }
}
