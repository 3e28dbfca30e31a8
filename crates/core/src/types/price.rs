//! Type-safe price representation using decimal arithmetic.
//!
//! All listing prices in WalaDaw are euros with two decimal places. Prices are
//! validated on construction so a `Price` in hand is always sellable.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The amount is zero or negative.
    #[error("price must be greater than zero")]
    NotPositive,
    /// The amount exceeds the listing ceiling.
    #[error("price must be at most {max}")]
    TooLarge {
        /// Maximum allowed amount.
        max: Decimal,
    },
    /// More than two decimal places were given.
    #[error("price must have at most two decimal places")]
    TooPrecise,
}

/// A price in euros.
///
/// ## Constraints
///
/// - Greater than zero
/// - At most 1,000,000.00
/// - At most two decimal places
///
/// ## Examples
///
/// ```
/// use waladaw_core::Price;
///
/// let price = Price::parse("19.90").unwrap();
/// assert_eq!(price.to_string(), "19.90 €");
///
/// assert!(Price::parse("0").is_err());
/// assert!(Price::parse("1.999").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Highest price a listing may carry.
    pub const MAX: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 2);

    /// Zero, used as the identity when summing line totals.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount, validating listing constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive, too large, or has more
    /// than two decimal places.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        if amount > Self::MAX {
            return Err(PriceError::TooLarge { max: Self::MAX });
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        Ok(Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)))
    }

    /// Parse a price from user input. Accepts `,` as the decimal separator.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotANumber`] for non-numeric input, otherwise the
    /// errors of [`Price::new`].
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let normalized = s.trim().replace(',', ".");
        let amount: Decimal = normalized.parse().map_err(|_| PriceError::NotANumber)?;
        Self::new(amount)
    }

    /// Wrap an amount read back from storage without re-validating it.
    ///
    /// Sums of several prices may exceed [`Price::MAX`], so totals use this.
    #[must_use]
    pub const fn from_stored(amount: Decimal) -> Self {
        Self(amount)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} €", self.0)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_prices() {
        assert_eq!(Price::parse("10").unwrap().amount(), Decimal::new(10, 0));
        assert_eq!(Price::parse("0.01").unwrap().amount(), Decimal::new(1, 2));
        assert_eq!(Price::parse(" 12,50 ").unwrap().amount(), Decimal::new(1250, 2));
        assert!(Price::parse("1000000").is_ok());
    }

    #[test]
    fn test_parse_rejects_non_numbers() {
        assert_eq!(Price::parse("abc"), Err(PriceError::NotANumber));
        assert_eq!(Price::parse(""), Err(PriceError::NotANumber));
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert_eq!(Price::parse("0"), Err(PriceError::NotPositive));
        assert_eq!(Price::parse("-5"), Err(PriceError::NotPositive));
    }

    #[test]
    fn test_parse_rejects_too_large() {
        assert!(matches!(
            Price::parse("1000000.01"),
            Err(PriceError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_three_decimals() {
        assert_eq!(Price::parse("1.999"), Err(PriceError::TooPrecise));
        // Trailing zeros are not extra precision
        assert!(Price::parse("1.500").is_ok());
    }

    #[test]
    fn test_display_uses_two_decimals() {
        assert_eq!(Price::parse("5").unwrap().to_string(), "5.00 €");
        assert_eq!(Price::parse("5.5").unwrap().to_string(), "5.50 €");
    }

    #[test]
    fn test_sum_is_exact() {
        let total: Price = ["0.10", "0.20", "0.30"]
            .iter()
            .map(|s| Price::parse(s).unwrap())
            .sum();
        assert_eq!(total.amount(), Decimal::new(60, 2));
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        let total: Price = std::iter::empty().sum();
        assert_eq!(total, Price::ZERO);
    }
}
