//! Value Objects for the shop domain

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested quantity of one listing. Always at least one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }

    /// Sums two quantities, failing instead of wrapping.
    pub fn checked_add(&self, other: Quantity) -> Result<Self, QuantityError> {
        self.0.checked_add(other.0).map(Self).ok_or(QuantityError::Overflow)
    }

    /// Stock left after taking `self` out of `available`, if there is enough.
    pub fn take_from(&self, available: u32) -> Option<u32> { available.checked_sub(self.0) }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { Zero, Overflow }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Zero => write!(f, "quantity must be at least 1"), Self::Overflow => write!(f, "quantity too large") }
    }
}

/// Non-negative unit price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount < Decimal::ZERO { return Err(PriceError::Negative); }
        Ok(Self(amount))
    }
    pub fn zero() -> Self { Self(Decimal::ZERO) }
    pub fn amount(&self) -> Decimal { self.0 }
    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_total(&self, qty: Quantity) -> Option<Decimal> { self.0.checked_mul(Decimal::from(qty.value())) }
}

impl Default for Price { fn default() -> Self { Self::zero() } }

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PriceError { Negative }
impl std::error::Error for PriceError {}
impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "price must not be negative") }
}
