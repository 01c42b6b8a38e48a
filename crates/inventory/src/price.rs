use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, ValueObject};

/// Unit price of a stock item, in currency units with cent precision.
///
/// Mirrors a `NUMERIC(10, 2)` column: strictly positive, at most two decimal
/// places and at most eight integer digits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct UnitPrice(Decimal);

impl UnitPrice {
    pub const SCALE: u32 = 2;

    pub fn new(amount: Decimal) -> Result<Self, DomainError> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("Unit price must be greater than zero."));
        }
        let normalized = amount.normalize();
        if normalized.scale() > Self::SCALE {
            return Err(DomainError::validation(
                "Unit price cannot have more than 2 decimal places.",
            ));
        }
        if normalized >= Self::ceiling() {
            return Err(DomainError::validation(
                "Unit price cannot exceed 8 integer digits.",
            ));
        }
        let mut amount = normalized;
        amount.rescale(Self::SCALE);
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `quantity × price`, the stock value of a holding.
    pub fn value_of(&self, quantity: i64) -> Decimal {
        self.0 * Decimal::from(quantity)
    }

    fn ceiling() -> Decimal {
        Decimal::from(100_000_000_i64)
    }
}

impl ValueObject for UnitPrice {}

impl TryFrom<Decimal> for UnitPrice {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UnitPrice> for Decimal {
    fn from(value: UnitPrice) -> Self {
        value.0
    }
}

impl core::fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
