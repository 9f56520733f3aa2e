use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Normalize a monetary value to 2 decimal places. Nightly rates are stored
/// at 2dp, so totals only ever extend scale with zeros.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.with_scale(2)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),
    #[error("negative amount not allowed: {0}")]
    NegativeAmount(String),
}

/// ISO-4217 style currency code, uppercased on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-negative monetary amount normalized to 2 decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: BigDecimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: BigDecimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount < BigDecimal::from(0) {
            return Err(MoneyError::NegativeAmount(amount.to_string()));
        }
        Ok(Self {
            amount: normalize_scale(&amount),
            currency,
        })
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: normalize_scale(&BigDecimal::from(0)),
            currency,
        }
    }

    pub fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(Money {
            amount: normalize_scale(&(&self.amount + &other.amount)),
            currency: self.currency.clone(),
        })
    }

    /// Multiply by a unit count (room quantity, night count).
    pub fn times(&self, units: u32) -> Money {
        Money {
            amount: normalize_scale(&(&self.amount * BigDecimal::from(units))),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn usd() -> Currency {
        Currency::new("usd").unwrap()
    }

    #[test]
    fn currency_uppercased_and_validated() {
        assert_eq!(usd().as_str(), "USD");
        assert!(Currency::new("dollars").is_err());
        assert!(Currency::new("U1D").is_err());
    }

    #[test]
    fn normalizes_to_two_decimals() {
        let m = Money::new(BigDecimal::from_str("100.5").unwrap(), usd()).unwrap();
        assert_eq!(m.amount().to_string(), "100.50");
    }

    #[test]
    fn rejects_negative_amounts() {
        let err = Money::new(BigDecimal::from_str("-1").unwrap(), usd()).unwrap_err();
        assert!(matches!(err, MoneyError::NegativeAmount(_)));
    }

    #[test]
    fn add_requires_same_currency() {
        let a = Money::new(BigDecimal::from(100), usd()).unwrap();
        let b = Money::new(BigDecimal::from(50), Currency::new("EUR").unwrap()).unwrap();
        assert!(a.checked_add(&b).is_err());
    }

    #[test]
    fn stay_total_accumulates() {
        // 2 rooms x 3 nights at 99.99
        let nightly = Money::new(BigDecimal::from_str("99.99").unwrap(), usd()).unwrap();
        let per_night = nightly.times(2);
        let mut total = Money::zero(usd());
        for _ in 0..3 {
            total = total.checked_add(&per_night).unwrap();
        }
        assert_eq!(total.amount().to_string(), "599.94");
    }
}
