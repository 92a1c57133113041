//! Value Objects for cart snapshots

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest scale `Decimal` can represent.
const MAX_MINOR_UNIT: u32 = 28;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }

    /// Parses a Store API price: an integer string in the currency's minor
    /// unit, e.g. `"1999"` with `minor_unit = 2` is `19.99`.
    pub fn from_minor_units(minor: &str, minor_unit: u32, currency: &str) -> Result<Self, MoneyError> {
        let minor = minor.trim();
        if minor_unit > MAX_MINOR_UNIT { return Err(MoneyError::InvalidAmount(minor.to_string())); }
        if minor.is_empty() { return Ok(Self::zero(currency)); }
        let value: i128 = minor.parse().map_err(|_| MoneyError::InvalidAmount(minor.to_string()))?;
        let amount = Decimal::try_from_i128_with_scale(value, minor_unit).map_err(|_| MoneyError::InvalidAmount(minor.to_string()))?;
        Ok(Self::new(amount, currency))
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch, InvalidAmount(String) }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrencyMismatch => write!(f, "Currency mismatch"),
            Self::InvalidAmount(raw) => write!(f, "Invalid amount: {raw}"),
        }
    }
}
