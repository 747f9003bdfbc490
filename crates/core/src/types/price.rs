//! Unit price representation using decimal arithmetic.
//!
//! Prices are carried through the cart untouched: nothing in this workspace
//! adds, multiplies, or rounds them. `Decimal` keeps the stored value exact,
//! and the wire format is a plain JSON number so payloads written by other
//! clients of the same storage key stay readable.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unit price in the store's currency.
///
/// Serialized as a JSON number (`1.5`, not `"1.5"`) carrying the decimal's
/// exact digits, never an `f64` approximation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::arbitrary_precision")] Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer count of minor units (e.g., cents).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Decimal>().map(Self)
    }
}
