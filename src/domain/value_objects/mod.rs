//! Value Objects for the order pipeline

use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Human-readable order identifier, e.g. `ORD-20240131-4F9A0C2B7E`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    const PREFIX: &'static str = "ORD";
    const RANDOM_LEN: usize = 10;

    pub fn generate(at: DateTime<Utc>) -> Self {
        let random: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(Self::RANDOM_LEN)
            .collect();
        Self(format!("{}-{}-{}", Self::PREFIX, at.format("%Y%m%d"), random.to_uppercase()))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, OrderNumberError> {
        let value = value.into().trim().to_uppercase();
        let mut parts = value.split('-');
        let valid = parts.next() == Some(Self::PREFIX)
            && parts.next().is_some_and(|d| d.len() == 8 && d.chars().all(|c| c.is_ascii_digit()))
            && parts
                .next()
                .is_some_and(|r| r.len() == Self::RANDOM_LEN && r.chars().all(|c| c.is_ascii_hexdigit()))
            && parts.next().is_none();
        if !valid {
            return Err(OrderNumberError::Malformed);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone)] pub enum OrderNumberError { Malformed }
impl std::error::Error for OrderNumberError {}
impl fmt::Display for OrderNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Malformed order number") }
}

/// Strictly positive line-item quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
    /// Returns `None` once the quantity would reach zero.
    pub fn decrement(&self) -> Option<Self> { Self::new(self.0 - 1) }
}

impl TryFrom<u32> for Quantity {
    type Error = String;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "quantity must be positive".to_string())
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

/// Price after applying a percentage discount to the MRP, rounded to cents.
pub fn discounted_price(mrp: Decimal, discount_percent: u8) -> Decimal {
    let discount = Decimal::from(discount_percent.min(100));
    (mrp * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn line_total(unit_price: Decimal, quantity: Quantity) -> Decimal {
    unit_price * Decimal::from(quantity.value())
}

/// Converts a decimal amount into the minor currency unit (cents).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
