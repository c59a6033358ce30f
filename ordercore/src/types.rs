//! Core value types for the `OrderCore` order workflow library.
//!
//! This module defines the fundamental types used throughout the library.
//! All types use smart constructors to ensure validity at construction time,
//! following the "parse, don't validate" principle: once a value exists it is
//! valid, and no further checks are needed downstream.

use nutype::nutype;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a product row.
///
/// `ProductId` values are guaranteed to be positive. Row identifiers are
/// assigned by the backing store and never reused for a different product.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        TryFrom,
        Serialize,
        Deserialize
    )
)]
pub struct ProductId(i64);

/// Identifier of an order row, assigned by the backing store at creation.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        TryFrom,
        Serialize,
        Deserialize
    )
)]
pub struct OrderId(i64);

/// Identifier of the user owning an order.
///
/// Identity always enters the system as an explicit caller-supplied value on
/// each request; there is no ambient session state.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        TryFrom,
        Serialize,
        Deserialize
    )
)]
pub struct UserId(i64);

/// Error raised by the [`Quantity`] smart constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// An order line must carry at least one unit.
    #[error("quantity must be greater than 0")]
    Zero,
    /// Adding or restoring stock exceeded the representable range.
    #[error("quantity overflow")]
    Overflow,
}

/// A count of product units.
///
/// Two validity regimes share this type: order lines require a positive
/// count ([`Quantity::new`]), while a product's stock on hand may be zero
/// ([`Quantity::on_hand`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Create a quantity for an order line. Rejects zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::Zero);
        }
        Ok(Self(value))
    }

    /// Create a stock-on-hand quantity. Zero is a valid (sold out) level.
    pub const fn on_hand(value: u32) -> Self {
        Self(value)
    }

    /// The underlying count.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Add two quantities, failing on overflow.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(QuantityError::Overflow)
    }

    /// Subtract `other` units, or `None` when fewer than `other` are on hand.
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(left) => Some(Self(left)),
            None => None,
        }
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        // Wire values deserialize under the permissive stock-on-hand rule;
        // order-line positivity is enforced where requests are validated.
        Ok(Self::on_hand(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error raised by the [`Money`] smart constructor and checked arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Monetary amounts are never negative in this system.
    #[error("money amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Currency is tracked to whole cents.
    #[error("money amount cannot have more than 2 decimal places: {0}")]
    TooPrecise(Decimal),
    /// The amount left the supported range.
    #[error("money amount {0} exceeds maximum {max}", max = Money::MAX_AMOUNT)]
    Overflow(Decimal),
}

/// A non-negative currency amount with at most two decimal places.
///
/// Uses [`Decimal`] for exact arithmetic; unit prices snapshotted onto order
/// lines and order totals are all `Money` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Maximum supported amount (100 million).
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

    /// Create a money value, validating sign, scale and range.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.scale() > 2 {
            return Err(MoneyError::TooPrecise(amount));
        }
        if amount > Self::MAX_AMOUNT {
            return Err(MoneyError::Overflow(amount));
        }
        Ok(Self(amount))
    }

    /// Create a money value from whole cents, avoiding float round-trips.
    pub fn from_cents(cents: u64) -> Result<Self, MoneyError> {
        let cents = i64::try_from(cents).map_err(|_| MoneyError::Overflow(Decimal::from(cents)))?;
        Self::new(Decimal::new(cents, 2))
    }

    /// The zero amount.
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The underlying decimal value.
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Add two amounts, failing when the sum leaves the supported range.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        Self::new(self.0 + other.0)
    }

    /// A line total: unit price multiplied by an order-line quantity.
    pub fn multiply_by_quantity(self, quantity: Quantity) -> Result<Self, MoneyError> {
        Self::new(self.0 * Decimal::from(quantity.value()))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Serde adapter for the `YYYY-MM-DD HH:MM:SS` timestamp wire format.
pub mod sql_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Serialize a timestamp as `YYYY-MM-DD HH:MM:SS`.
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    /// Deserialize a timestamp from `YYYY-MM-DD HH:MM:SS`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }

    /// The same wire format for optional timestamps (`null` when absent).
    pub mod option {
        use chrono::{DateTime, NaiveDateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        use super::FORMAT;

        /// Serialize an optional timestamp, `null` when `None`.
        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(datetime) => serializer.serialize_str(&datetime.format(FORMAT).to_string()),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional timestamp.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|value| {
                NaiveDateTime::parse_from_str(&value, FORMAT)
                    .map(|naive| naive.and_utc())
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}
